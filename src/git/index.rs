use anyhow::{Context, Result, bail};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::git::repo::GitRepository;

pub const MODE_TYPE_REGULAR: u8 = 0b1000;
pub const MODE_TYPE_SYMLINK: u8 = 0b1010;
pub const MODE_TYPE_GITLINK: u8 = 0b1110;

/// A single staged file. `ctime`/`mtime` keep their nanosecond component
/// (`.1`) separately rather than collapsing to a `SystemTime`, since the
/// status engine's "did this file change" check compares the raw stat
/// fields bit-for-bit against the working tree, the same way Git does.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub ctime: (u32, u32),
    pub mtime: (u32, u32),
    pub dev: u32,
    pub ino: u32,
    pub mode_type: u8,
    pub mode_perms: u16,
    pub uid: u32,
    pub gid: u32,
    pub fsize: u32,
    pub sha: String,
    pub flag_assume_valid: bool,
    pub flag_stage: u16,
    pub name: String,
}

#[derive(Debug, Default)]
pub struct GitIndex {
    pub version: u32,
    pub entries: Vec<IndexEntry>,
}

impl GitIndex {
    pub fn new() -> Self {
        Self { version: 2, entries: Vec::new() }
    }
}

/// Read the index file, or an empty v2 index if none exists yet.
pub fn read_index(repo: &GitRepository) -> Result<GitIndex> {
    let index_path = repo.gitdir.join("index");
    if !index_path.exists() {
        return Ok(GitIndex::new());
    }

    let mut f = File::open(&index_path)
        .with_context(|| format!("could not open index at {}", index_path.display()))?;

    let mut signature = [0u8; 4];
    f.read_exact(&mut signature)?;
    if &signature != b"DIRC" {
        bail!("malformed index: bad signature {signature:?}");
    }

    let version = f.read_u32::<BigEndian>()?;
    if version != 2 {
        bail!("unsupported index version: {version}");
    }

    let count = f.read_u32::<BigEndian>()?;
    let mut entries = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let ctime_s = f.read_u32::<BigEndian>()?;
        let ctime_ns = f.read_u32::<BigEndian>()?;
        let mtime_s = f.read_u32::<BigEndian>()?;
        let mtime_ns = f.read_u32::<BigEndian>()?;
        let dev = f.read_u32::<BigEndian>()?;
        let ino = f.read_u32::<BigEndian>()?;

        let unused = f.read_u16::<BigEndian>()?;
        if unused != 0 {
            bail!("malformed index: reserved field is non-zero");
        }
        let mode = f.read_u16::<BigEndian>()?;
        let mode_type = (mode >> 12) as u8;
        if ![MODE_TYPE_REGULAR, MODE_TYPE_SYMLINK, MODE_TYPE_GITLINK].contains(&mode_type) {
            bail!("malformed index: unexpected mode_type {mode_type:#o}");
        }
        let mode_perms = mode & 0o0777;

        let uid = f.read_u32::<BigEndian>()?;
        let gid = f.read_u32::<BigEndian>()?;
        let fsize = f.read_u32::<BigEndian>()?;

        let mut sha_buf = [0u8; 20];
        f.read_exact(&mut sha_buf)?;
        let sha = hex::encode(sha_buf);

        let flags = f.read_u16::<BigEndian>()?;
        let flag_assume_valid = (flags & 0x8000) != 0;
        let flag_extended = (flags & 0x4000) != 0;
        if flag_extended {
            bail!("malformed index: extended flag must be 0");
        }
        let flag_stage = flags & 0x3000;
        let name_len = (flags & 0x0FFF) as usize;

        let name = if name_len < 0xFFF {
            let mut buf = vec![0u8; name_len];
            f.read_exact(&mut buf)?;
            let mut nul = [0u8; 1];
            f.read_exact(&mut nul)?;
            if nul[0] != 0 {
                bail!("malformed index: missing name terminator");
            }
            String::from_utf8(buf).context("malformed index: non-utf8 path")?
        } else {
            // Name is 0xFFF bytes or longer: its length isn't recorded, so
            // scan for the terminating NUL instead.
            let mut buf = Vec::new();
            loop {
                let mut byte = [0u8; 1];
                f.read_exact(&mut byte)?;
                if byte[0] == 0 {
                    break;
                }
                buf.push(byte[0]);
            }
            String::from_utf8(buf).context("malformed index: non-utf8 path")?
        };

        let entry_len = 62 + name.len() + 1;
        let padding = (8 - (entry_len % 8)) % 8;
        if padding > 0 {
            f.seek(SeekFrom::Current(padding as i64))?;
        }

        entries.push(IndexEntry {
            ctime: (ctime_s, ctime_ns),
            mtime: (mtime_s, mtime_ns),
            dev,
            ino,
            mode_type,
            mode_perms,
            uid,
            gid,
            fsize,
            sha,
            flag_assume_valid,
            flag_stage,
            name,
        });
    }

    debug!("read index with {} entries", entries.len());
    Ok(GitIndex { version, entries })
}

/// Write the index file. Entries are always written name-sorted, regardless
/// of the order they were appended in memory.
pub fn write_index(repo: &GitRepository, index: &GitIndex) -> Result<()> {
    let mut sorted = index.entries.clone();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut f = File::create(repo.gitdir.join("index"))?;

    f.write_all(b"DIRC")?;
    f.write_u32::<BigEndian>(2)?;
    f.write_u32::<BigEndian>(sorted.len() as u32)?;

    for e in &sorted {
        f.write_u32::<BigEndian>(e.ctime.0)?;
        f.write_u32::<BigEndian>(e.ctime.1)?;
        f.write_u32::<BigEndian>(e.mtime.0)?;
        f.write_u32::<BigEndian>(e.mtime.1)?;
        f.write_u32::<BigEndian>(e.dev)?;
        f.write_u32::<BigEndian>(e.ino)?;

        f.write_u16::<BigEndian>(0)?;
        let mode = ((e.mode_type as u16) << 12) | (e.mode_perms & 0o0777);
        f.write_u16::<BigEndian>(mode)?;

        f.write_u32::<BigEndian>(e.uid)?;
        f.write_u32::<BigEndian>(e.gid)?;
        f.write_u32::<BigEndian>(e.fsize)?;

        let sha_bytes = hex::decode(&e.sha).context("malformed index entry: invalid sha")?;
        f.write_all(&sha_bytes)?;

        let name_bytes = e.name.as_bytes();
        let name_len = name_bytes.len().min(0xFFF) as u16;
        let flags = (if e.flag_assume_valid { 0x8000 } else { 0 }) | (e.flag_stage & 0x3000) | name_len;
        f.write_u16::<BigEndian>(flags)?;

        f.write_all(name_bytes)?;
        f.write_all(&[0])?;

        let entry_len = 62 + name_bytes.len() + 1;
        let padding = (8 - (entry_len % 8)) % 8;
        if padding > 0 {
            f.write_all(&vec![0u8; padding])?;
        }
    }

    Ok(())
}

use std::fs;

use chrono::{DateTime, Local, TimeZone};
use tempfile::tempdir;

use wyag::git::ignore::{check_ignore, gitignore_read};
use wyag::git::index::{GitIndex, IndexEntry, MODE_TYPE_REGULAR, read_index, write_index};
use wyag::git::kvlm::Kvlm;
use wyag::git::objects::{GitObject, GitObjectType, object_find, object_hash, object_read, object_write};
use wyag::git::refs::{ref_create, resolve_ref};
use wyag::git::repo::GitRepository;
use wyag::git::tree::{commit_create, tree_from_index};

#[test]
fn init_writes_the_expected_skeleton_and_config() {
    let dir = tempdir().unwrap();
    let repo = GitRepository::create(dir.path()).unwrap();

    let head = fs::read_to_string(repo.gitdir.join("HEAD")).unwrap();
    assert_eq!(head, "ref: refs/heads/master\n");

    let config = fs::read_to_string(repo.gitdir.join("config")).unwrap();
    assert!(config.contains("repositoryformatversion = 0"));

    assert!(repo.gitdir.join("objects").is_dir());
    assert!(repo.gitdir.join("refs/heads").is_dir());
    assert!(repo.gitdir.join("refs/tags").is_dir());
}

#[test]
fn hashing_hello_matches_git() {
    let sha = object_hash(b"hello\n".to_vec(), GitObjectType::Blob, None).unwrap();
    assert_eq!(sha, "ce013625030ba8dba906f756967f9e9ca394464a");
}

#[test]
fn empty_tree_matches_git() {
    let sha = object_write(&GitObject::tree(Vec::new()), None).unwrap();
    assert_eq!(sha, "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
}

#[test]
fn commit_over_the_empty_tree_hashes_to_the_expected_sha() {
    let dir = tempdir().unwrap();
    let repo = GitRepository::create(dir.path()).unwrap();

    let empty_tree = object_write(&GitObject::tree(Vec::new()), Some(&repo)).unwrap();

    let mut kvlm = Kvlm::new();
    kvlm.headers.push((b"tree".to_vec(), empty_tree.clone().into_bytes()));
    kvlm.headers
        .push((b"author".to_vec(), b"A U Thor <a@u.th> 0 +0000".to_vec()));
    kvlm.headers
        .push((b"committer".to_vec(), b"A U Thor <a@u.th> 0 +0000".to_vec()));
    kvlm.message = b"Initial commit\n".to_vec();

    let sha = object_write(&GitObject::commit(kvlm), Some(&repo)).unwrap();
    assert_eq!(sha, "ecb159502afb5f32d01c935ba6c7fad658713237");

    let read_back = object_read(&repo, &sha).unwrap();
    assert_eq!(read_back.kind, GitObjectType::Commit);
    assert_eq!(
        read_back.as_kvlm().unwrap().get(b"tree"),
        Some(empty_tree.as_bytes())
    );
}

#[test]
fn index_entry_round_trips_through_disk_with_exact_fields() {
    let dir = tempdir().unwrap();
    let repo = GitRepository::create(dir.path()).unwrap();

    let entry = IndexEntry {
        ctime: (1_700_000_000, 1),
        mtime: (1_700_000_100, 2),
        dev: 42,
        ino: 7,
        mode_type: MODE_TYPE_REGULAR,
        mode_perms: 0o644,
        uid: 1000,
        gid: 1000,
        fsize: 6,
        sha: "ce013625030ba8dba906f756967f9e9ca394464a".to_string(),
        flag_assume_valid: false,
        flag_stage: 0,
        name: "hello.txt".to_string(),
    };

    let mut index = GitIndex::new();
    index.entries.push(entry);
    write_index(&repo, &index).unwrap();

    let read_back = read_index(&repo).unwrap();
    assert_eq!(read_back.entries.len(), 1);
    let e = &read_back.entries[0];
    assert_eq!(e.name, "hello.txt");
    assert_eq!(e.dev, 42);
    assert_eq!(e.ino, 7);
    assert_eq!(e.sha, "ce013625030ba8dba906f756967f9e9ca394464a");
}

#[test]
fn tree_synthesis_and_commit_creation_from_a_staged_index() {
    let dir = tempdir().unwrap();
    let repo = GitRepository::create(dir.path()).unwrap();

    let blob_sha = object_hash(b"fn main() {}\n".to_vec(), GitObjectType::Blob, Some(&repo)).unwrap();

    let mut index = GitIndex::new();
    index.entries.push(IndexEntry {
        ctime: (0, 0),
        mtime: (0, 0),
        dev: 0,
        ino: 0,
        mode_type: MODE_TYPE_REGULAR,
        mode_perms: 0o644,
        uid: 0,
        gid: 0,
        fsize: 13,
        sha: blob_sha.clone(),
        flag_assume_valid: false,
        flag_stage: 0,
        name: "src/main.rs".to_string(),
    });

    let tree_sha = tree_from_index(&repo, &index).unwrap();
    let root = object_read(&repo, &tree_sha).unwrap();
    let root_entries = root.as_tree().unwrap();
    assert_eq!(root_entries.len(), 1);
    assert_eq!(root_entries[0].path, "src");
    assert_eq!(root_entries[0].mode, b"040000".to_vec());

    let src_tree = object_read(&repo, &root_entries[0].sha_hex()).unwrap();
    let src_entries = src_tree.as_tree().unwrap();
    assert_eq!(src_entries[0].path, "main.rs");
    assert_eq!(src_entries[0].sha_hex(), blob_sha);

    let timestamp: DateTime<Local> = Local.timestamp_opt(1_700_000_000, 0).unwrap();
    let commit_sha = commit_create(
        &tree_sha,
        None,
        "A U Thor <a@u.th>",
        timestamp,
        "first commit",
        &repo,
    )
    .unwrap();

    ref_create(&repo, "heads/master", &commit_sha).unwrap();
    assert_eq!(resolve_ref(&repo, "HEAD").unwrap(), Some(commit_sha.clone()));

    let resolved_tree = object_find(&repo, &commit_sha, Some(GitObjectType::Tree), true)
        .unwrap()
        .unwrap();
    assert_eq!(resolved_tree, tree_sha);
}

#[test]
fn inner_gitignore_overrides_an_outer_exclusion() {
    let dir = tempdir().unwrap();
    let repo = GitRepository::create(dir.path()).unwrap();

    fs::create_dir_all(repo.gitdir.join("info")).unwrap();
    fs::write(repo.gitdir.join("info").join("exclude"), "*.log\n").unwrap();

    fs::create_dir_all(dir.path().join("logs")).unwrap();
    fs::write(dir.path().join("logs/.gitignore"), "!keep.log\n").unwrap();
    let gitignore_sha = object_hash(b"!keep.log\n".to_vec(), GitObjectType::Blob, Some(&repo)).unwrap();

    let mut index = GitIndex::new();
    index.entries.push(IndexEntry {
        ctime: (0, 0),
        mtime: (0, 0),
        dev: 0,
        ino: 0,
        mode_type: MODE_TYPE_REGULAR,
        mode_perms: 0o644,
        uid: 0,
        gid: 0,
        fsize: 10,
        sha: gitignore_sha,
        flag_assume_valid: false,
        flag_stage: 0,
        name: "logs/.gitignore".to_string(),
    });
    write_index(&repo, &index).unwrap();

    let rules = gitignore_read(&repo).unwrap();
    assert!(check_ignore(&rules, "build.log").unwrap());
    assert!(!check_ignore(&rules, "logs/keep.log").unwrap());
    assert!(check_ignore(&rules, "logs/other.log").unwrap());
}

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use wyag::commands;
use wyag::git::objects::GitObjectType;

#[derive(Debug, Parser)]
#[command(name = "wyag")]
#[command(about = "A content-addressed version-control engine core, in rust", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create an empty repository.
    Init {
        path: Option<String>,
    },
    /// Print the contents of an object.
    CatFile {
        #[arg(value_enum)]
        r#type: GitObjectType,
        object: String,
    },
    /// Hash a file, optionally writing it into the object store.
    HashObject {
        #[arg(short, long)]
        write: bool,
        #[arg(short = 't', long = "type", value_enum, default_value = "blob")]
        object_type: GitObjectType,
        file: PathBuf,
    },
    /// Render the commit history as a graphviz graph.
    Log {
        #[arg(default_value = "HEAD")]
        commit: String,
    },
    /// List the contents of a tree object.
    LsTree {
        #[arg(short, long)]
        recursive: bool,
        tree: String,
    },
    /// Check out a commit's tree into the working directory.
    Checkout {
        commit: String,
    },
    /// List every ref, recursively.
    ShowRef {},
    /// Create or list tags.
    Tag {
        name: Option<String>,
        #[arg(default_value = "HEAD")]
        object: String,
        #[arg(short = 'a', long)]
        annotated: bool,
    },
    /// Resolve a name to a full SHA.
    RevParse {
        #[arg(long = "wyag-type", value_enum)]
        r#type: Option<GitObjectType>,
        name: String,
    },
    /// List staged files.
    LsFiles {},
    /// Check whether paths are ignored.
    CheckIgnore {
        paths: Vec<PathBuf>,
    },
    /// Show the working tree status.
    Status {},
    /// Remove files from the working tree and the index.
    Rm {
        paths: Vec<PathBuf>,
    },
    /// Add file contents to the index.
    Add {
        paths: Vec<PathBuf>,
    },
    /// Record changes to the repository.
    Commit {
        #[arg(short, long)]
        message: String,
    },
}

fn main() {
    env_logger::init();

    let args = Cli::parse();

    let result = match args.command {
        Commands::Init { path } => commands::init::run(path.as_deref()),
        Commands::CatFile { r#type, object } => commands::cat_file::run(r#type, &object),
        Commands::HashObject { write, object_type, file } => commands::hash_object::run(write, object_type, file),
        Commands::Log { commit } => commands::log::run(&commit),
        Commands::LsTree { recursive, tree } => commands::ls_tree::run(&tree, recursive),
        Commands::Checkout { commit } => commands::checkout::run(&commit),
        Commands::ShowRef {} => commands::show_ref::run(),
        Commands::Tag { name, object, annotated } => commands::tag::run(name.as_deref(), &object, annotated),
        Commands::RevParse { r#type, name } => commands::rev_parse::run(&name, r#type),
        Commands::LsFiles {} => commands::ls_files::run(),
        Commands::CheckIgnore { paths } => commands::check_ignore::run(&paths),
        Commands::Status {} => commands::status::run(),
        Commands::Rm { paths } => commands::rm::run(&paths),
        Commands::Add { paths } => commands::add::run(&paths),
        Commands::Commit { message } => commands::commit::run(&message),
    };

    if let Err(err) = result {
        eprintln!("wyag: {err:#}");
        std::process::exit(1);
    }
}

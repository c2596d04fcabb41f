//! CED CLI - run content edits against a course working copy.

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use ced_core::{EntityKind, PathScope};
use std::path::PathBuf;

mod commands;

use commands::Globals;

#[derive(Parser)]
#[command(name = "ced")]
#[command(about = "Course content editor with durable edit jobs", long_about = None)]
#[command(version)]
struct Cli {
    /// Course working-copy directory
    #[arg(long, global = true, default_value = ".")]
    course: PathBuf,
    /// Course id (defaults to the directory name)
    #[arg(long, global = true)]
    course_id: Option<String>,
    /// Acting user (defaults to $USER)
    #[arg(long, global = true)]
    user: Option<String>,
    /// Directory holding config.toml (defaults to <course>/.course)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

/// Limits which paths an edit may touch.
#[derive(Args)]
struct ScopeArgs {
    /// Only allow paths below this directory
    #[arg(long, default_value = "")]
    scope: String,
    /// Forbid this path and everything below it (repeatable)
    #[arg(long)]
    deny: Vec<String>,
}

impl ScopeArgs {
    fn to_scope(&self) -> PathScope {
        let scope = if self.scope.is_empty() {
            PathScope::course()
        } else {
            PathScope::under(self.scope.trim_end_matches('/'))
        };
        self.deny
            .iter()
            .fold(scope, |scope, path| scope.deny(path.trim_end_matches('/')))
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    CourseInstance,
    Assessment,
    Question,
}

impl From<KindArg> for EntityKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::CourseInstance => EntityKind::CourseInstance,
            KindArg::Assessment => EntityKind::Assessment,
            KindArg::Question => EntityKind::Question,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize course metadata and take the first snapshot
    Init,
    /// Print the fingerprint of a course file
    Fingerprint {
        /// Path relative to the course root
        path: String,
    },
    /// Replace a file's contents
    Modify {
        /// Path relative to the course root
        path: String,
        /// File with the new contents
        #[arg(long)]
        content_file: PathBuf,
        /// Fingerprint of the file as you last read it ("absent" to create)
        #[arg(long)]
        origin: String,
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Move a file or directory
    Rename {
        path: String,
        new_path: String,
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Duplicate a file or directory
    Copy {
        path: String,
        /// Destination (defaults to the first free <name>_copyN)
        #[arg(long)]
        to: Option<String>,
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Remove a file or directory
    Delete {
        path: String,
        /// Succeed without changes if the path is already gone
        #[arg(long)]
        tolerate_missing: bool,
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Create a new entity with a scaffold info file and a fresh uuid
    Add {
        kind: KindArg,
        /// Directory to create it in, e.g. courseInstances
        parent: String,
        /// Entity directory name (defaults to the first free New_N)
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Update properties of an info file, optionally moving its directory
    UpdateInfo {
        /// Info file path, e.g. assessments/hw1/infoAssessment.json
        info_file: String,
        /// Property to set, as key=value (value parsed as JSON, else string)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
        /// Default for a property; matching values stay implicit
        #[arg(long = "default", value_name = "KEY=VALUE")]
        defaults: Vec<String>,
        /// Move the info file's directory here afterwards
        #[arg(long)]
        rename: Option<String>,
        /// Fingerprint of the info file as you last read it
        #[arg(long)]
        origin: String,
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Inspect job sequences
    Jobs {
        #[command(subcommand)]
        command: JobsCommands,
    },
    /// Show snapshot history
    History {
        /// Maximum number of commits to show
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
enum JobsCommands {
    /// Show one job sequence with its steps
    Show {
        /// Job sequence id
        id: u64,
    },
    /// List recent job sequences for this course
    List {
        /// Maximum number of jobs to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Include jobs from every course in the store
        #[arg(long)]
        all: bool,
    },
}

fn main() -> Result<()> {
    // Respects RUST_LOG (e.g. RUST_LOG=ced_core=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let globals = Globals {
        course: cli.course,
        course_id: cli.course_id,
        user: cli.user,
        config_dir: cli.config_dir,
    };

    match cli.command {
        Commands::Init => commands::init::run(&globals),
        Commands::Fingerprint { path } => commands::fingerprint::run(&globals, &path),
        Commands::Modify {
            path,
            content_file,
            origin,
            scope,
        } => commands::edit::modify(&globals, scope.to_scope(), &path, &content_file, &origin),
        Commands::Rename {
            path,
            new_path,
            scope,
        } => commands::edit::rename(&globals, scope.to_scope(), &path, &new_path),
        Commands::Copy { path, to, scope } => {
            commands::edit::copy(&globals, scope.to_scope(), &path, to.as_deref())
        }
        Commands::Delete {
            path,
            tolerate_missing,
            scope,
        } => commands::edit::delete(&globals, scope.to_scope(), &path, tolerate_missing),
        Commands::Add {
            kind,
            parent,
            name,
            scope,
        } => commands::edit::add(&globals, scope.to_scope(), kind.into(), &parent, name.as_deref()),
        Commands::UpdateInfo {
            info_file,
            set,
            defaults,
            rename,
            origin,
            scope,
        } => commands::edit::update_info(
            &globals,
            scope.to_scope(),
            &info_file,
            &set,
            &defaults,
            rename.as_deref(),
            &origin,
        ),
        Commands::Jobs { command } => match command {
            JobsCommands::Show { id } => commands::jobs::show(&globals, id),
            JobsCommands::List { limit, all } => commands::jobs::list(&globals, limit, all),
        },
        Commands::History { limit } => commands::history::run(&globals, limit),
    }
}

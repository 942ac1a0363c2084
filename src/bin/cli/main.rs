//! CLI tool for zipsession archive operations.

mod commands;
mod exit_codes;
mod file_selector;
mod output;
mod password;
mod progress;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use std::path::PathBuf;

use exit_codes::ExitCode;

/// Session-based ZIP archive tool
#[derive(Parser)]
#[command(name = "zipsession")]
#[command(author, version, about = "Session-based ZIP archive tool", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, short = 'f', value_enum, default_value = "human", global = true)]
    format: OutputFormat,

    /// Suppress progress output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List archive contents (alias: l)
    #[command(alias = "l")]
    List {
        /// Archive file to list
        archive: PathBuf,

        /// Show technical details
        #[arg(long)]
        technical: bool,
    },

    /// Write an entry to standard output
    Cat {
        /// Archive file to read
        archive: PathBuf,

        /// Entry name
        name: String,

        /// Password (will prompt if needed)
        #[arg(short = 'p', long)]
        password: Option<String>,
    },

    /// Add files to an archive, creating it if missing (alias: a)
    #[command(alias = "a")]
    Add {
        /// Archive file to update
        archive: PathBuf,

        /// Files and directories to add
        files: Vec<PathBuf>,

        /// Compression method
        #[arg(short = 'm', long, value_enum, default_value = "deflate")]
        method: CompressionMethod,

        /// Compression level (1-9, 0 = codec default)
        #[arg(short = 'l', long, default_value = "0")]
        level: u32,

        /// Encryption method
        #[arg(short = 'e', long, value_enum, default_value = "none")]
        encryption: EncryptionMethod,

        /// Password for encrypted entries (will prompt if needed)
        #[arg(short = 'p', long)]
        password: Option<String>,

        /// Exclude patterns
        #[arg(short = 'x', long)]
        exclude: Vec<String>,

        /// Recursive directory scanning
        #[arg(short = 'r', long, default_value = "true")]
        recursive: bool,
    },

    /// Remove entries matching patterns
    Rm {
        /// Archive file to update
        archive: PathBuf,

        /// Entry name patterns (glob patterns supported)
        #[arg(required = true)]
        patterns: Vec<String>,
    },

    /// Rename an entry
    Mv {
        /// Archive file to update
        archive: PathBuf,

        /// Current entry name
        from: String,

        /// New entry name
        to: String,
    },

    /// Show or set the archive comment, or an entry comment with --entry
    Comment {
        /// Archive file
        archive: PathBuf,

        /// New comment; prints the current one if omitted
        text: Option<String>,

        /// Entry whose comment to show or set
        #[arg(long)]
        entry: Option<String>,

        /// Clear the comment
        #[arg(long, conflicts_with = "text")]
        clear: bool,
    },

    /// Test archive integrity (alias: t)
    #[command(alias = "t")]
    Test {
        /// Archive file to test
        archive: PathBuf,

        /// Password (will prompt if needed)
        #[arg(short = 'p', long)]
        password: Option<String>,

        /// Include patterns
        #[arg(short = 'i', long)]
        include: Vec<String>,
    },

    /// Show archive information (alias: i)
    #[command(alias = "i")]
    Info {
        /// Archive file to inspect
        archive: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum CompressionMethod {
    Store,
    Deflate,
    Bzip2,
}

impl From<CompressionMethod> for zipsession::CompressionMethod {
    fn from(method: CompressionMethod) -> Self {
        match method {
            CompressionMethod::Store => zipsession::CompressionMethod::Store,
            CompressionMethod::Deflate => zipsession::CompressionMethod::Deflate,
            CompressionMethod::Bzip2 => zipsession::CompressionMethod::Bzip2,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum EncryptionMethod {
    None,
    #[value(name = "zipcrypto")]
    Traditional,
    Aes128,
    Aes192,
    Aes256,
}

impl From<EncryptionMethod> for zipsession::EncryptionMethod {
    fn from(method: EncryptionMethod) -> Self {
        match method {
            EncryptionMethod::None => zipsession::EncryptionMethod::None,
            EncryptionMethod::Traditional => zipsession::EncryptionMethod::Traditional,
            EncryptionMethod::Aes128 => zipsession::EncryptionMethod::Aes128,
            EncryptionMethod::Aes192 => zipsession::EncryptionMethod::Aes192,
            EncryptionMethod::Aes256 => zipsession::EncryptionMethod::Aes256,
        }
    }
}

fn main() {
    // A commit in flight only ever touches its temporary file, so exiting
    // here leaves the archive intact.
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted");
        std::process::exit(exit_codes::USER_INTERRUPT);
    })
    .ok();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::List { archive, technical } => commands::list(&archive, technical, cli.format),

        Commands::Cat {
            archive,
            name,
            password,
        } => commands::cat(&archive, &name, password),

        Commands::Add {
            archive,
            files,
            method,
            level,
            encryption,
            password,
            exclude,
            recursive,
        } => commands::add(&commands::AddConfig {
            archive_path: &archive,
            files: &files,
            method,
            level,
            encryption,
            password,
            exclude: &exclude,
            recursive,
            format: cli.format,
            quiet: cli.quiet,
        }),

        Commands::Rm { archive, patterns } => {
            commands::remove(&archive, &patterns, cli.format, cli.quiet)
        }

        Commands::Mv { archive, from, to } => commands::rename(&archive, &from, &to, cli.quiet),

        Commands::Comment {
            archive,
            text,
            entry,
            clear,
        } => commands::comment(&archive, entry.as_deref(), text, clear),

        Commands::Test {
            archive,
            password,
            include,
        } => commands::test(&archive, password, &include, cli.format, cli.quiet),

        Commands::Info { archive } => commands::info(&archive, cli.format),

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut std::io::stdout());
            ExitCode::Success
        }
    };

    std::process::exit(exit_code.code());
}

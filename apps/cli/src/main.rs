mod commands;
mod server;
mod watch;

use clap::{Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

/// Replaces `--src-dir` when set to a non-empty value.
const SOURCE_DIR_ENV: &str = "INPUT_SRCDIR";

#[derive(Parser)]
#[command(name = "squatch")]
#[command(about = "A markdown static site generator with live reload", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the site once
    Build {
        /// Overridden by INPUT_SRCDIR when it is set
        #[arg(long, default_value = "src")]
        src_dir: PathBuf,

        /// Overrides `dist_dir` from the .squatch config
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Build, then serve the output and rebuild on changes
    Serve {
        #[arg(long, default_value = "src")]
        src_dir: PathBuf,

        #[arg(long, short)]
        output: Option<PathBuf>,

        #[arg(long, default_value = "8080")]
        port: u16,

        #[arg(long, default_value = "web/static")]
        static_dir: PathBuf,

        #[arg(long)]
        open: bool,
    },
}

fn resolve_source_dir(flag: PathBuf, env_value: Option<OsString>) -> PathBuf {
    match env_value {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => flag,
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Build { src_dir, output } => {
            let src_dir = resolve_source_dir(src_dir, std::env::var_os(SOURCE_DIR_ENV));
            commands::build_site(&src_dir, output.as_deref())
        }
        Commands::Serve {
            src_dir,
            output,
            port,
            static_dir,
            open,
        } => {
            let src_dir = resolve_source_dir(src_dir, std::env::var_os(SOURCE_DIR_ENV));
            commands::serve_site(&src_dir, output.as_deref(), port, &static_dir, open).await
        }
    };

    if let Err(error) = result {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

//! Cartograph CLI - semantic knowledge base for source repositories
//!
//! Usage: cartograph <group> <verb> [arguments]

mod export_cmd;
mod graph_cmd;
mod query_cmd;
mod repo_cmd;
mod system_cmd;

use std::path::PathBuf;
use std::process::ExitCode;

use cartograph::{Config, CartographError, TripleStore};
use tracing_subscriber::EnvFilter;

fn print_usage() {
    eprintln!("Cartograph - semantic knowledge base for source repositories");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  cartograph repo add <org/repo> [--url <URL>]");
    eprintln!("  cartograph repo update <org/repo>");
    eprintln!("  cartograph repo remove <org/repo> [--force]");
    eprintln!("  cartograph repo list");
    eprintln!("  cartograph repo show <org/repo>");
    eprintln!("  cartograph graph add <org/repo> [<version>] [--force]");
    eprintln!("  cartograph graph update <org/repo> <version>");
    eprintln!("  cartograph graph remove <org/repo> [<version>] [--force]");
    eprintln!("  cartograph graph list [<org>[/<repo>]]");
    eprintln!("  cartograph graph show <org/repo> [<version>]");
    eprintln!("  cartograph export compact <org/repo> <version> [--output <FILE>]");
    eprintln!("  cartograph export outline <org/repo> <version> [--output <FILE>]");
    eprintln!("  cartograph query <SPARQL> [--timeout <SECONDS>]");
    eprintln!("  cartograph system config show");
    eprintln!("  cartograph system config set <key> <value>");
    eprintln!("  cartograph system status");
    eprintln!("  cartograph version");
    eprintln!();
    eprintln!("Global arguments:");
    eprintln!("  --root <DIR>   Storage root (default: $CARTOGRAPH_ROOT or ~/.cartograph)");
    eprintln!();
    eprintln!("Destructive operations require --force unless confirmation is disabled");
    eprintln!("in the configuration.");
}

/// Parsed invocation: storage root plus the remaining arguments.
struct Invocation {
    root: PathBuf,
    args: Vec<String>,
}

fn parse_invocation() -> Option<Invocation> {
    let mut root: Option<PathBuf> = None;
    let mut args = Vec::new();
    let mut raw = std::env::args().skip(1);
    while let Some(arg) = raw.next() {
        if arg == "--root" {
            root = raw.next().map(PathBuf::from);
            if root.is_none() {
                eprintln!("error: --root requires a directory argument");
                return None;
            }
        } else {
            args.push(arg);
        }
    }
    let root = root
        .or_else(|| std::env::var_os("CARTOGRAPH_ROOT").map(PathBuf::from))
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cartograph")))
        .unwrap_or_else(|| PathBuf::from(".cartograph"));
    Some(Invocation { root, args })
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(invocation: Invocation) -> Result<(), CartographError> {
    let config = Config::load(&invocation.root)?;
    init_tracing(&config);

    let mut args = invocation.args.iter().map(String::as_str);
    let group = args.next();
    let rest: Vec<&str> = args.collect();

    match group {
        Some("repo") => {
            let store = TripleStore::open(&config.store_dir())?;
            repo_cmd::run(&config, &store, &rest)
        }
        Some("graph") => {
            let store = TripleStore::open(&config.store_dir())?;
            graph_cmd::run(&config, &store, &rest)
        }
        Some("export") => {
            let store = TripleStore::open(&config.store_dir())?;
            export_cmd::run(&config, &store, &rest)
        }
        Some("query") => {
            let store = TripleStore::open(&config.store_dir())?;
            query_cmd::run(&config, &store, &rest)
        }
        Some("system") => system_cmd::run(&config, &rest),
        Some("version") => {
            println!("{}", cartograph::version::version());
            Ok(())
        }
        _ => {
            print_usage();
            Err(CartographError::validation("missing or unknown command"))
        }
    }
}

fn main() -> ExitCode {
    let Some(invocation) = parse_invocation() else {
        return ExitCode::from(2);
    };
    match run(invocation) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error ({}): {e}", e.kind().as_str());
            for suggestion in e.suggestions() {
                eprintln!("  - {suggestion}");
            }
            ExitCode::from(e.kind().exit_code().clamp(0, 255) as u8)
        }
    }
}

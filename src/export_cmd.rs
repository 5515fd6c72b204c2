//! `cartograph export <format>` commands.

use std::path::PathBuf;

use cartograph::export::default_export_path;
use cartograph::validation::validate_org_repo;
use cartograph::{CartographError, CompactExporter, Config, OutlineExporter, TripleStore};

pub fn run(config: &Config, store: &TripleStore, args: &[&str]) -> Result<(), CartographError> {
    match args {
        ["compact", org_repo, version, rest @ ..] => {
            let (org, repo) = validate_org_repo(org_repo)?;
            let output = output_path(config, rest, &org, &repo, version, "jsonl");
            let report =
                CompactExporter::new(store, config).export(&org, &repo, version, &output, None)?;
            println!(
                "exported {} records ({} functions) to {}",
                report.records_written,
                report.functions_exported,
                report.path.display()
            );
            Ok(())
        }
        ["outline", org_repo, version, rest @ ..] => {
            let (org, repo) = validate_org_repo(org_repo)?;
            let output = output_path(config, rest, &org, &repo, version, "txt");
            let report =
                OutlineExporter::new(store, config).export(&org, &repo, version, &output, None)?;
            println!(
                "exported outline ({} modules, {} functions) to {}",
                report.modules_exported,
                report.functions_exported,
                report.path.display()
            );
            Ok(())
        }
        _ => Err(CartographError::validation(
            "usage: cartograph export <compact|outline> <org/repo> <version> [--output <FILE>]",
        )),
    }
}

fn output_path(
    config: &Config,
    args: &[&str],
    org: &str,
    repo: &str,
    version: &str,
    extension: &str,
) -> PathBuf {
    crate::repo_cmd::flag_value(args, "--output")
        .map(PathBuf::from)
        .unwrap_or_else(|| default_export_path(config, org, repo, version, extension))
}

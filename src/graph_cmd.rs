//! `cartograph graph <verb>` commands.

use cartograph::validation::validate_org_repo;
use cartograph::{
    BuildReport, CancellationToken, CartographError, Config, GraphManager, ProgressUpdate,
    TripleStore,
};

pub fn run(config: &Config, store: &TripleStore, args: &[&str]) -> Result<(), CartographError> {
    let manager = GraphManager::new(config, store);
    let cancel = CancellationToken::new();
    let observer = progress_to_stderr();

    match args {
        ["add", org_repo, rest @ ..] => {
            let (org, repo) = validate_org_repo(org_repo)?;
            let version = positional(rest);
            let force = crate::repo_cmd::has_flag(rest, "--force");
            let build = manager.add(&org, &repo, version, force, Some(&observer), &cancel)?;
            print_report(&build);
            Ok(())
        }
        ["update", org_repo, version] => {
            let (org, repo) = validate_org_repo(org_repo)?;
            let build = manager.update(&org, &repo, version, Some(&observer), &cancel)?;
            print_report(&build);
            Ok(())
        }
        ["remove", org_repo, rest @ ..] => {
            let (org, repo) = validate_org_repo(org_repo)?;
            let version = positional(rest);
            let force = crate::repo_cmd::has_flag(rest, "--force");
            manager.remove(&org, &repo, version, force)?;
            match version {
                Some(version) => println!("removed graphs for {org}/{repo} {version}"),
                None => println!("removed all graphs for {org}/{repo}"),
            }
            Ok(())
        }
        ["list", rest @ ..] => {
            let (org, repo) = match positional(rest) {
                Some(spec) if spec.contains('/') => {
                    let (org, repo) = validate_org_repo(spec)?;
                    (Some(org), Some(repo))
                }
                Some(org) => (Some(org.to_string()), None),
                None => (None, None),
            };
            for info in manager.list(org.as_deref(), repo.as_deref())? {
                println!("{}  triples={}", info.graph_uri, info.triple_count);
            }
            Ok(())
        }
        ["show", org_repo, rest @ ..] => {
            let (org, repo) = validate_org_repo(org_repo)?;
            for info in manager.show(&org, &repo, positional(rest))? {
                println!(
                    "{}  triples={}{}",
                    info.graph_uri,
                    info.triple_count,
                    info.version
                        .as_deref()
                        .map(|v| format!("  version={v}"))
                        .unwrap_or_default()
                );
            }
            Ok(())
        }
        _ => Err(CartographError::validation(
            "usage: cartograph graph <add|update|remove|list|show> ...",
        )),
    }
}

/// First argument that is not a flag.
fn positional<'a>(args: &[&'a str]) -> Option<&'a str> {
    args.iter().find(|a| !a.starts_with("--")).copied()
}

fn progress_to_stderr() -> impl Fn(ProgressUpdate) + Send + Sync {
    |update: ProgressUpdate| {
        eprintln!(
            "[{:>3.0}%] {}: {}",
            update.percent,
            update.stage.as_str(),
            update.message
        );
    }
}

fn print_report(report: &BuildReport) {
    println!(
        "built {}/{} {}: {} functions, {} classes, {} modules, {} commits, {} events, {} triples in {:.1?}",
        report.org,
        report.repo,
        report.version,
        report.functions,
        report.classes,
        report.modules,
        report.commits,
        report.change_events,
        report.triples_written,
        report.duration
    );
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
}

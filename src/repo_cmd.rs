//! `cartograph repo <verb>` commands.

use cartograph::{CartographError, Config, RepoManager, RepositoryRecord, TripleStore};
use cartograph::validation::validate_org_repo;

pub fn run(config: &Config, store: &TripleStore, args: &[&str]) -> Result<(), CartographError> {
    let manager = RepoManager::new(config, store);
    match args {
        ["add", org_repo, rest @ ..] => {
            let (org, repo) = validate_org_repo(org_repo)?;
            let url = flag_value(rest, "--url");
            let record = manager.add(&org, &repo, url, None)?;
            print_record(&record);
            Ok(())
        }
        ["update", org_repo] => {
            let (org, repo) = validate_org_repo(org_repo)?;
            let record = manager.update(&org, &repo)?;
            if record.newly_discovered.is_empty() {
                println!("no new versions for {org}/{repo}");
            } else {
                println!(
                    "new versions for {org}/{repo}: {}",
                    record.newly_discovered.join(", ")
                );
            }
            print_record(&record);
            Ok(())
        }
        ["remove", org_repo, rest @ ..] => {
            let (org, repo) = validate_org_repo(org_repo)?;
            manager.remove(&org, &repo, has_flag(rest, "--force"))?;
            println!("removed {org}/{repo}");
            Ok(())
        }
        ["list"] => {
            for record in manager.list()? {
                println!(
                    "{}/{}  releases={}  status={:?}",
                    record.org,
                    record.name,
                    record.releases.len(),
                    record.status
                );
            }
            Ok(())
        }
        ["show", org_repo] => {
            let (org, repo) = validate_org_repo(org_repo)?;
            print_record(&manager.show(&org, &repo)?);
            Ok(())
        }
        _ => Err(CartographError::validation(
            "usage: cartograph repo <add|update|remove|list|show> ...",
        )),
    }
}

fn print_record(record: &RepositoryRecord) {
    match serde_json::to_string_pretty(record) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{record:?}"),
    }
}

pub(crate) fn flag_value<'a>(args: &[&'a str], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| *a == flag)
        .and_then(|i| args.get(i + 1).copied())
}

pub(crate) fn has_flag(args: &[&str], flag: &str) -> bool {
    args.iter().any(|a| *a == flag)
}

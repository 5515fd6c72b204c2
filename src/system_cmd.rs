//! `cartograph system <verb>` commands: configuration and status.

use cartograph::{CartographError, Config};

pub fn run(config: &Config, args: &[&str]) -> Result<(), CartographError> {
    match args {
        ["config", "show"] => {
            let text = serde_json::to_string_pretty(config)
                .map_err(|e| CartographError::configuration(format!("serialize config: {e}")))?;
            println!("{text}");
            Ok(())
        }
        ["config", "set", key, value] => {
            // apply() validates; on failure the prior config stays in
            // effect and on disk
            let updated = config.apply(key, value)?;
            updated.save()?;
            println!("{key} = {value}");
            Ok(())
        }
        ["status"] => {
            println!("storage_root: {}", config.storage_root.display());
            println!("store: {}", config.store_dir().display());
            println!("repos: {}", config.repos_dir().display());
            println!("exports: {}", config.exports_dir().display());
            println!("logs: {}", config.logs_dir().display());
            println!("version: {}", cartograph::version::version());
            Ok(())
        }
        _ => Err(CartographError::validation(
            "usage: cartograph system <config show|config set <key> <value>|status>",
        )),
    }
}

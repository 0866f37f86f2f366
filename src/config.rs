use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};

use crate::cli::{Cli, GlobalArgs};
use crate::paths::{catalog_file_path, database_file_path};

pub const DEFAULT_DWELL_SECS: u64 = 20;
pub const DEFAULT_LANGUAGE: &str = "en";
const LOG_FILE_NAME: &str = "episodic.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryBackend {
    Local,
    Remote {
        base_url: String,
        auth_token: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub catalog_path: PathBuf,
    pub database_path: PathBuf,
    pub log_path: PathBuf,
    pub user_id: Option<String>,
    pub history: HistoryBackend,
    pub dwell: Duration,
    pub default_language: String,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        Self::from_args(&cli.global)
    }

    pub fn from_args(args: &GlobalArgs) -> Result<Self> {
        let catalog_path = match &args.catalog {
            Some(path) => path.clone(),
            None => catalog_file_path()?,
        };
        let database_path = match &args.database {
            Some(path) => path.clone(),
            None => database_file_path()?,
        };

        let history = match non_blank(args.history_url.as_deref()) {
            Some(url) => HistoryBackend::Remote {
                base_url: url.trim_end_matches('/').to_string(),
                auth_token: non_blank(args.history_token.as_deref()).map(str::to_string),
            },
            None => HistoryBackend::Local,
        };

        let dwell_secs = args.dwell_secs.unwrap_or(DEFAULT_DWELL_SECS);
        if dwell_secs == 0 {
            bail!("dwell time must be at least one second");
        }

        Ok(Self {
            catalog_path,
            log_path: database_path.with_file_name(LOG_FILE_NAME),
            database_path,
            user_id: non_blank(args.user.as_deref()).map(str::to_string),
            history,
            dwell: Duration::from_secs(dwell_secs),
            default_language: non_blank(args.language.as_deref())
                .unwrap_or(DEFAULT_LANGUAGE)
                .to_string(),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> GlobalArgs {
        GlobalArgs {
            catalog: Some(PathBuf::from("/tmp/catalog.json")),
            database: Some(PathBuf::from("/tmp/episodic.db")),
            user: None,
            history_url: None,
            history_token: None,
            dwell_secs: None,
            language: None,
        }
    }

    #[test]
    fn defaults_to_local_history_and_twenty_second_dwell() {
        let config = Config::from_args(&args()).expect("config should resolve");
        assert_eq!(config.history, HistoryBackend::Local);
        assert_eq!(config.dwell, Duration::from_secs(20));
        assert_eq!(config.default_language, "en");
        assert!(config.user_id.is_none());
    }

    #[test]
    fn remote_backend_strips_trailing_slash_and_blank_token() {
        let mut raw = args();
        raw.history_url = Some("https://store.example/".to_string());
        raw.history_token = Some("  ".to_string());
        raw.user = Some(" uid-1 ".to_string());

        let config = Config::from_args(&raw).expect("config should resolve");
        assert_eq!(
            config.history,
            HistoryBackend::Remote {
                base_url: "https://store.example".to_string(),
                auth_token: None,
            }
        );
        assert_eq!(config.user_id.as_deref(), Some("uid-1"));
    }

    #[test]
    fn rejects_zero_dwell() {
        let mut raw = args();
        raw.dwell_secs = Some(0);
        assert!(Config::from_args(&raw).is_err());
    }
}

//! Startup configuration, read from the environment.

use std::path::PathBuf;

use crate::auth::AuthTimeouts;
use crate::errors::Error;

pub const ENV_API_ID:      &str = "TELEGRAM_API_ID";
pub const ENV_API_HASH:    &str = "TELEGRAM_API_HASH";
pub const ENV_PHONE:       &str = "TELEGRAM_PHONE";
pub const ENV_SESSION_DIR: &str = "TELEGRAM_SESSION_DIR";

/// Directory under `$HOME` used when no session directory is configured.
pub const DEFAULT_SESSION_DIR: &str = ".telegram-mcp";
/// Session credentials, owned by the session client.
pub const SESSION_FILE: &str = "session.json";
/// Peer cache database.
pub const PEER_DB_FILE: &str = "peers.sqlite3";

/// Configuration for [`crate::Bootstrap`].
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Application id from https://my.telegram.org.
    pub api_id:        i32,
    pub api_hash:      String,
    /// Account phone number, international format.
    pub phone:         String,
    /// Where the session file and peer database live. `None` means
    /// `$HOME/.telegram-mcp`.
    pub session_dir:   Option<PathBuf>,
    pub auth_timeouts: AuthTimeouts,
}

impl Config {
    /// Read `TELEGRAM_API_ID`, `TELEGRAM_API_HASH`, `TELEGRAM_PHONE` and the
    /// optional `TELEGRAM_SESSION_DIR`.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Config::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<&str> = [ENV_API_ID, ENV_API_HASH, ENV_PHONE]
            .into_iter()
            .filter(|key| get(*key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let raw_id = get(ENV_API_ID).unwrap_or_default();
        let api_id = raw_id.trim().parse::<i32>()
            .map_err(|e| Error::Config(format!("invalid {ENV_API_ID} {raw_id:?}: {e}")))?;

        Ok(Self {
            api_id,
            api_hash:    get(ENV_API_HASH).unwrap_or_default(),
            phone:       get(ENV_PHONE).unwrap_or_default(),
            session_dir: get(ENV_SESSION_DIR).map(PathBuf::from),
            ..Default::default()
        })
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.api_id <= 0 {
            return Err(Error::Config(format!("{ENV_API_ID} must be a positive integer")));
        }
        if self.api_hash.trim().is_empty() {
            return Err(Error::Config(format!("{ENV_API_HASH} is required")));
        }
        if self.phone.trim().is_empty() {
            return Err(Error::Config(format!("{ENV_PHONE} is required")));
        }
        Ok(())
    }

    /// The configured session directory, or `$HOME/.telegram-mcp`.
    pub fn session_dir(&self) -> Result<PathBuf, Error> {
        if let Some(dir) = &self.session_dir {
            return Ok(dir.clone());
        }
        dirs::home_dir()
            .map(|home| home.join(DEFAULT_SESSION_DIR))
            .ok_or_else(|| Error::Config("cannot determine home directory".into()))
    }

    pub fn session_file(&self) -> Result<PathBuf, Error> {
        Ok(self.session_dir()?.join(SESSION_FILE))
    }

    pub fn peer_db_file(&self) -> Result<PathBuf, Error> {
        Ok(self.session_dir()?.join(PEER_DB_FILE))
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn reports_every_missing_variable() {
        let err = Config::from_lookup(env(&[(ENV_API_HASH, "abc")])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "config: missing required environment variables: TELEGRAM_API_ID, TELEGRAM_PHONE"
        );
    }

    #[test]
    fn parses_full_environment() {
        let cfg = Config::from_lookup(env(&[
            (ENV_API_ID, "12345"),
            (ENV_API_HASH, "deadbeef"),
            (ENV_PHONE, "+15550100"),
            (ENV_SESSION_DIR, "/tmp/courier"),
        ])).unwrap();
        assert_eq!(cfg.api_id, 12345);
        cfg.validate().unwrap();
        assert_eq!(cfg.peer_db_file().unwrap(), PathBuf::from("/tmp/courier/peers.sqlite3"));
        assert_eq!(cfg.session_file().unwrap(), PathBuf::from("/tmp/courier/session.json"));
    }

    #[test]
    fn rejects_non_numeric_api_id() {
        let err = Config::from_lookup(env(&[
            (ENV_API_ID, "twelve"),
            (ENV_API_HASH, "x"),
            (ENV_PHONE, "+1"),
        ])).unwrap_err();
        assert!(err.to_string().contains("invalid TELEGRAM_API_ID"));
    }

    #[test]
    fn blank_phone_fails_validation() {
        let cfg = Config { api_id: 1, api_hash: "h".into(), phone: "  ".into(), ..Default::default() };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }
}

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::assistant::DEFAULT_MODEL;
use crate::security::PasswordPolicy;

/// Process configuration, read once from `INTELHUB_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub http_port: u16,
    pub db_folder: PathBuf,
    pub session_ttl: Duration,
    pub password_min_len: usize,
    pub password_require_mixed: bool,
    pub seed_demo: bool,
    pub ai_model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 7878,
            db_folder: PathBuf::from("data"),
            session_ttl: Duration::from_secs(3600),
            password_min_len: 8,
            password_require_mixed: false,
            seed_demo: false,
            ai_model: DEFAULT_MODEL.to_string(),
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                warn!(target: "intelhub", key, value = %raw, "invalid config value, using default");
                default
            }
        },
    }
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    match lookup(key).map(|s| s.trim().to_ascii_lowercase()) {
        None => default,
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                warn!(target: "intelhub", key, value = %v, "invalid boolean config value, using default");
                default
            }
        },
    }
}

impl Config {
    pub fn from_env() -> Self { Self::from_lookup(|k| std::env::var(k).ok()) }

    /// Build from an arbitrary key lookup; invalid values fall back to defaults.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let d = Self::default();
        let ttl_secs = parse_or(&lookup, "INTELHUB_SESSION_TTL_SECS", d.session_ttl.as_secs());
        let ttl_secs = if ttl_secs == 0 {
            warn!(target: "intelhub", "INTELHUB_SESSION_TTL_SECS=0 is not usable, using default");
            d.session_ttl.as_secs()
        } else {
            ttl_secs
        };
        Self {
            http_port: parse_or(&lookup, "INTELHUB_HTTP_PORT", d.http_port),
            db_folder: lookup("INTELHUB_DB_FOLDER").filter(|s| !s.trim().is_empty()).map(PathBuf::from).unwrap_or(d.db_folder),
            session_ttl: Duration::from_secs(ttl_secs),
            password_min_len: parse_or(&lookup, "INTELHUB_PASSWORD_MIN_LEN", d.password_min_len),
            password_require_mixed: parse_flag(&lookup, "INTELHUB_PASSWORD_REQUIRE_MIXED", d.password_require_mixed),
            seed_demo: parse_flag(&lookup, "INTELHUB_SEED_DEMO", d.seed_demo),
            ai_model: lookup("INTELHUB_AI_MODEL").filter(|s| !s.trim().is_empty()).unwrap_or(d.ai_model),
        }
    }

    pub fn password_policy(&self) -> PasswordPolicy {
        PasswordPolicy { min_length: self.password_min_len, require_mixed: self.password_require_mixed }
    }
}

//! Credential loading: environment variables, overridden by/merged with an
//! optional `~/.config/tra/config.json`.

use crate::slot::RateLimiterParams;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One TDX client-credentials pair, immutable after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub id: String,
    pub client_id: String,
    pub client_secret: String,
    pub label: Option<String>,
}

/// On-disk settings under `~/.config/tra/config.json`. Entirely optional;
/// environment variables always take precedence over anything loaded here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub credentials: Vec<Credential>,
    #[serde(default)]
    pub rate_limiter_max_tokens: Option<usize>,
    #[serde(default)]
    pub rate_limiter_refill_rate_per_sec: Option<f64>,
}

fn config_file_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("tra").join("config.json"))
}

/// Loads the on-disk config, if present. A missing or unparsable file is
/// treated as an empty config rather than an error: it is optional.
pub fn load_file_config() -> FileConfig {
    let Some(path) = config_file_path() else {
        return FileConfig::default();
    };
    let Ok(contents) = std::fs::read_to_string(&path) else {
        return FileConfig::default();
    };
    serde_json::from_str(&contents).unwrap_or_else(|err| {
        tracing::warn!(path = %path.display(), %err, "ignoring unparsable tra config file");
        FileConfig::default()
    })
}

/// Reads `TDX_CLIENT_ID`/`TDX_CLIENT_SECRET` (slot 1) and
/// `TDX_CLIENT_ID_{2..10}`/`TDX_CLIENT_SECRET_{2..10}` (additional slots),
/// falling back to `~/.config/tra/config.json` if no environment credential
/// is present at all. Incomplete env pairs are skipped silently.
pub fn load_credentials() -> Vec<Credential> {
    let mut credentials = Vec::new();

    if let (Ok(client_id), Ok(client_secret)) = (
        std::env::var("TDX_CLIENT_ID"),
        std::env::var("TDX_CLIENT_SECRET"),
    ) {
        credentials.push(Credential {
            id: "1".to_string(),
            client_id,
            client_secret,
            label: std::env::var("TDX_KEY_LABEL").ok(),
        });
    }

    for n in 2..=10 {
        let id_var = format!("TDX_CLIENT_ID_{n}");
        let secret_var = format!("TDX_CLIENT_SECRET_{n}");
        if let (Ok(client_id), Ok(client_secret)) =
            (std::env::var(&id_var), std::env::var(&secret_var))
        {
            credentials.push(Credential {
                id: n.to_string(),
                client_id,
                client_secret,
                label: std::env::var(format!("TDX_KEY_LABEL_{n}")).ok(),
            });
        }
    }

    if credentials.is_empty() {
        credentials = load_file_config().credentials;
    }

    credentials
}

impl FileConfig {
    /// Resolves the on-disk rate-limiter override, if any, against the
    /// access layer's built-in defaults (spec §9 Open Question 2).
    pub fn rate_limiter_params(&self) -> RateLimiterParams {
        let defaults = RateLimiterParams::default();
        RateLimiterParams {
            max_tokens: self.rate_limiter_max_tokens.unwrap_or(defaults.max_tokens),
            refill_rate_per_sec: self
                .rate_limiter_refill_rate_per_sec
                .unwrap_or(defaults.refill_rate_per_sec),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize the tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_tdx_env() {
        std::env::remove_var("TDX_CLIENT_ID");
        std::env::remove_var("TDX_CLIENT_SECRET");
        std::env::remove_var("TDX_KEY_LABEL");
        for n in 2..=10 {
            std::env::remove_var(format!("TDX_CLIENT_ID_{n}"));
            std::env::remove_var(format!("TDX_CLIENT_SECRET_{n}"));
            std::env::remove_var(format!("TDX_KEY_LABEL_{n}"));
        }
    }

    #[test]
    fn loads_primary_slot_from_env() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_tdx_env();
        std::env::set_var("TDX_CLIENT_ID", "abc");
        std::env::set_var("TDX_CLIENT_SECRET", "secret");

        let creds = load_credentials();
        assert_eq!(creds.len(), 1);
        assert_eq!(creds[0].id, "1");
        assert_eq!(creds[0].client_id, "abc");
        clear_tdx_env();
    }

    #[test]
    fn incomplete_pairs_are_skipped() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_tdx_env();
        std::env::set_var("TDX_CLIENT_ID", "abc");
        std::env::set_var("TDX_CLIENT_SECRET", "secret");
        // slot 2 has only a client id, no secret: should be skipped.
        std::env::set_var("TDX_CLIENT_ID_2", "partial");

        let creds = load_credentials();
        assert_eq!(creds.len(), 1);
        clear_tdx_env();
    }

    #[test]
    fn rate_limiter_params_fall_back_to_defaults_when_unset() {
        let params = FileConfig::default().rate_limiter_params();
        assert_eq!(params.max_tokens, 50);
        assert_eq!(params.refill_rate_per_sec, 5.0);
    }

    #[test]
    fn rate_limiter_params_honor_file_overrides() {
        let file = FileConfig {
            rate_limiter_max_tokens: Some(20),
            rate_limiter_refill_rate_per_sec: Some(3.0),
            ..Default::default()
        };
        let params = file.rate_limiter_params();
        assert_eq!(params.max_tokens, 20);
        assert_eq!(params.refill_rate_per_sec, 3.0);
    }

    #[test]
    fn loads_multiple_slots_in_order() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_tdx_env();
        std::env::set_var("TDX_CLIENT_ID", "one");
        std::env::set_var("TDX_CLIENT_SECRET", "one-secret");
        std::env::set_var("TDX_CLIENT_ID_2", "two");
        std::env::set_var("TDX_CLIENT_SECRET_2", "two-secret");

        let creds = load_credentials();
        assert_eq!(creds.len(), 2);
        assert_eq!(creds[1].id, "2");
        clear_tdx_env();
    }
}

use std::fmt::Display;
use std::str::FromStr;

use tracing::{info, warn};

use crate::upload::GpsPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    /// Simulated backend persisted in the local database
    Mock,
    Remote { url: String, anon_key: String },
}

#[derive(Debug, Clone)]
pub struct EnvVariables {
    pub server_port: u16,
    pub database_url: String,
    pub backend: BackendConfig,
    pub gps_policy: GpsPolicy,
}

impl EnvVariables {
    pub fn get_all() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let backend = match (var("SUPABASE_URL"), var("SUPABASE_ANON_KEY")) {
            (Some(url), Some(anon_key)) => BackendConfig::Remote { url, anon_key },
            (None, None) => BackendConfig::Mock,
            _ => {
                warn!("SUPABASE_URL and SUPABASE_ANON_KEY must be set together, using mock mode");
                BackendConfig::Mock
            }
        };

        Self {
            server_port: try_load(&var, "SERVER_PORT", 3000),
            database_url: var("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://geophoto.db?mode=rwc".to_string()),
            backend,
            gps_policy: try_load(&var, "GPS_POLICY", GpsPolicy::default()),
        }
    }
}

fn try_load<T>(var: impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(raw) = var(key) else {
        info!("{key} not set, using default: {default}");
        return default;
    };

    raw.trim().parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value `{raw}`: {e}, using default: {default}");
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> EnvVariables {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvVariables::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_mock_mode() {
        let vars = env(&[]);

        assert_eq!(vars.backend, BackendConfig::Mock);
        assert_eq!(vars.server_port, 3000);
        assert_eq!(vars.gps_policy, GpsPolicy::Warn);
        assert_eq!(vars.database_url, "sqlite://geophoto.db?mode=rwc");
    }

    #[test]
    fn remote_needs_url_and_key() {
        let vars = env(&[
            ("SUPABASE_URL", "https://example.supabase.co"),
            ("SUPABASE_ANON_KEY", "anon"),
        ]);
        assert_eq!(
            vars.backend,
            BackendConfig::Remote {
                url: "https://example.supabase.co".into(),
                anon_key: "anon".into()
            }
        );

        let vars = env(&[("SUPABASE_URL", "https://example.supabase.co")]);
        assert_eq!(vars.backend, BackendConfig::Mock);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let vars = env(&[("SERVER_PORT", "nope"), ("GPS_POLICY", "require")]);

        assert_eq!(vars.server_port, 3000);
        assert_eq!(vars.gps_policy, GpsPolicy::Require);
    }
}

use std::str::FromStr;
use std::time::Duration;

use holdmap_core::dedup::{DEFAULT_DEDUP_MAX_ENTRIES, DEFAULT_DEDUP_PURGE_INTERVAL, DEFAULT_DEDUP_WINDOW};
use holdmap_core::registry::DEFAULT_HOLD_TTL;
use holdmap_core::sweep::DEFAULT_SWEEP_INTERVAL;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address for both listeners (default: `0.0.0.0`).
    pub host: String,
    /// HTTP API port (default: `3000`).
    pub port: u16,
    /// First port tried for the realtime listener (default: `8080`).
    pub realtime_port: u16,
    /// Sequential ports tried before falling back to an OS-assigned one.
    pub realtime_port_attempts: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Hold lifetime before the sweeper releases it.
    pub hold_ttl: Duration,
    /// How often the sweeper runs.
    pub sweep_interval: Duration,
    /// Window inside which identical intents are dropped.
    pub dedup_window: Duration,
    /// How often stale dedup entries are purged.
    pub dedup_purge_interval: Duration,
    /// Upper bound on remembered dedup keys.
    pub dedup_max_entries: usize,
}

/// A configuration variable that failed to parse.
#[derive(Debug, thiserror::Error)]
#[error("{var} must be a valid {expected}, got '{value}'")]
pub struct ConfigError {
    pub var: &'static str,
    pub expected: &'static str,
    pub value: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                 |
    /// |-----------------------------|-------------------------|
    /// | `HOST`                      | `0.0.0.0`               |
    /// | `PORT`                      | `3000`                  |
    /// | `REALTIME_PORT`             | `8080`                  |
    /// | `REALTIME_PORT_ATTEMPTS`    | `30`                    |
    /// | `CORS_ORIGINS`              | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                    |
    /// | `HOLD_TTL_SECS`             | `600`                   |
    /// | `SWEEP_INTERVAL_SECS`       | `60`                    |
    /// | `DEDUP_WINDOW_MS`           | `100`                   |
    /// | `DEDUP_PURGE_INTERVAL_SECS` | `300`                   |
    /// | `DEDUP_MAX_ENTRIES`         | `10000`                 |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host,
            port: parse_var(&lookup, "PORT", 3000, "u16")?,
            realtime_port: parse_var(&lookup, "REALTIME_PORT", 8080, "u16")?,
            realtime_port_attempts: parse_var(&lookup, "REALTIME_PORT_ATTEMPTS", 30, "u16")?,
            cors_origins,
            request_timeout_secs: parse_var(&lookup, "REQUEST_TIMEOUT_SECS", 30, "u64")?,
            hold_ttl: Duration::from_secs(parse_positive(
                &lookup,
                "HOLD_TTL_SECS",
                DEFAULT_HOLD_TTL.as_secs(),
            )?),
            sweep_interval: Duration::from_secs(parse_positive(
                &lookup,
                "SWEEP_INTERVAL_SECS",
                DEFAULT_SWEEP_INTERVAL.as_secs(),
            )?),
            dedup_window: Duration::from_millis(parse_positive(
                &lookup,
                "DEDUP_WINDOW_MS",
                DEFAULT_DEDUP_WINDOW.as_millis() as u64,
            )?),
            dedup_purge_interval: Duration::from_secs(parse_positive(
                &lookup,
                "DEDUP_PURGE_INTERVAL_SECS",
                DEFAULT_DEDUP_PURGE_INTERVAL.as_secs(),
            )?),
            dedup_max_entries: parse_var(
                &lookup,
                "DEDUP_MAX_ENTRIES",
                DEFAULT_DEDUP_MAX_ENTRIES,
                "usize",
            )?,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            realtime_port: 8080,
            realtime_port_attempts: 30,
            cors_origins: vec!["http://localhost:5173".into()],
            request_timeout_secs: 30,
            hold_ttl: DEFAULT_HOLD_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            dedup_window: DEFAULT_DEDUP_WINDOW,
            dedup_purge_interval: DEFAULT_DEDUP_PURGE_INTERVAL,
            dedup_max_entries: DEFAULT_DEDUP_MAX_ENTRIES,
        }
    }
}

fn parse_var<F, T>(
    lookup: &F,
    var: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError {
            var,
            expected,
            value,
        }),
    }
}

/// Like [`parse_var`] for `u64` durations, refusing zero.
fn parse_positive<F>(lookup: &F, var: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    const EXPECTED: &str = "positive integer";
    let value = parse_var(lookup, var, default, EXPECTED)?;
    if value == 0 {
        return Err(ConfigError {
            var,
            expected: EXPECTED,
            value: "0".into(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ServerConfig::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.realtime_port, 8080);
        assert_eq!(config.hold_ttl, Duration::from_secs(600));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.dedup_window, Duration::from_millis(100));
        assert_eq!(config.cors_origins, ["http://localhost:5173"]);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("HOLD_TTL_SECS", "120"),
            ("REALTIME_PORT", "9100"),
            ("CORS_ORIGINS", "http://a.test, http://b.test,"),
        ]))
        .unwrap();

        assert_eq!(config.hold_ttl, Duration::from_secs(120));
        assert_eq!(config.realtime_port, 9100);
        assert_eq!(config.cors_origins, ["http://a.test", "http://b.test"]);
    }

    #[test]
    fn invalid_value_names_the_variable() {
        let err = ServerConfig::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();

        assert_eq!(err.var, "PORT");
        assert!(err.to_string().contains("PORT must be a valid u16"));
    }

    #[test]
    fn zero_sweep_interval_is_rejected() {
        let err = ServerConfig::from_lookup(lookup_from(&[("SWEEP_INTERVAL_SECS", "0")]))
            .unwrap_err();

        assert_eq!(err.var, "SWEEP_INTERVAL_SECS");
        assert!(err
            .to_string()
            .contains("SWEEP_INTERVAL_SECS must be a valid positive integer, got '0'"));
    }

    #[test]
    fn zero_durations_are_rejected() {
        for var in ["DEDUP_PURGE_INTERVAL_SECS", "HOLD_TTL_SECS", "DEDUP_WINDOW_MS"] {
            let err = ServerConfig::from_lookup(lookup_from(&[(var, " 0 ")])).unwrap_err();
            assert_eq!(err.var, var);
        }
    }

    #[test]
    fn positive_durations_are_accepted() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("SWEEP_INTERVAL_SECS", "1"),
            ("DEDUP_PURGE_INTERVAL_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.sweep_interval, Duration::from_secs(1));
        assert_eq!(config.dedup_purge_interval, Duration::from_secs(5));
    }
}

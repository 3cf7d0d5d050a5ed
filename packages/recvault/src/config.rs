use std::{path::PathBuf, time::Duration};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_APP_SUBPATH: &str = "Android/data/recvault/files";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    /// Explicit recording directory; when unset the first storage candidate is used.
    pub recording_dir: Option<PathBuf>,
    pub assets_dir: PathBuf,
    pub read_timeout: Duration,
    pub app_dirs: Vec<PathBuf>,
    pub app_subpath: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            recording_dir: None,
            assets_dir: PathBuf::from("./assets"),
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
            app_dirs: Vec::new(),
            app_subpath: PathBuf::from(DEFAULT_APP_SUBPATH),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let var = |key: &str| {
            get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            bind: var("RECVAULT_BIND").unwrap_or(defaults.bind),
            port: var("RECVAULT_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            recording_dir: var("RECVAULT_RECORDING_DIR").map(PathBuf::from),
            assets_dir: var("RECVAULT_ASSETS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.assets_dir),
            read_timeout: var("RECVAULT_READ_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .filter(|ms: &u64| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.read_timeout),
            app_dirs: var("RECVAULT_APP_DIRS")
                .map(|v| std::env::split_paths(&v).collect())
                .unwrap_or_default(),
            app_subpath: var("RECVAULT_APP_SUBPATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.app_subpath),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = Config::from_lookup(lookup(&[]));
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.read_timeout, Duration::from_secs(5));
        assert!(cfg.recording_dir.is_none());
        assert!(cfg.app_dirs.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn reads_overrides_and_ignores_garbage() {
        let cfg = Config::from_lookup(lookup(&[
            ("RECVAULT_PORT", "9000"),
            ("RECVAULT_READ_TIMEOUT_MS", "nope"),
            ("RECVAULT_RECORDING_DIR", " /data/rec "),
            ("RECVAULT_APP_DIRS", "/a:/b"),
        ]));
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.read_timeout, Duration::from_millis(DEFAULT_READ_TIMEOUT_MS));
        assert_eq!(cfg.recording_dir, Some(PathBuf::from("/data/rec")));
        assert_eq!(cfg.app_dirs, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
    }
}

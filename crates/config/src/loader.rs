use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::schema::WicketConfig;

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["wicket.toml", "wicket.yaml", "wicket.yml", "wicket.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<WicketConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./wicket.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/wicket/wicket.{toml,yaml,yml,json}` (user-global)
///
/// Returns `WicketConfig::default()` if no config file is found or the
/// found file fails to parse.
pub fn discover_and_load() -> WicketConfig {
    let Some(path) = find_config_file() else {
        debug!("no config file found, using defaults");
        return WicketConfig::default();
    };
    debug!(path = %path.display(), "loading config");
    match load_config(&path) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            WicketConfig::default()
        },
    }
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    find_in_dir(Path::new("."))
        .or_else(|| config_dir().and_then(|dir| find_in_dir(&dir)))
}

/// The first recognized config file directly under `dir`, if any.
pub fn find_in_dir(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// `~/.config/wicket/` on all platforms.
pub fn config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".config").join("wicket"))
}

/// The path of an existing config file, or the default TOML path.
pub fn find_or_default_config_path() -> PathBuf {
    if let Some(path) = find_config_file() {
        return path;
    }
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wicket.toml")
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<WicketConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_toml() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(
            tmp.path(),
            "wicket.toml",
            "[gateway]\nport = 9100\n\n[access]\nrequest_ttl_secs = 30\n",
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.gateway.port, 9100);
        assert_eq!(config.access.request_ttl_secs, Some(30));
    }

    #[test]
    fn loads_yaml_and_json() {
        let tmp = tempfile::tempdir().unwrap();
        let yaml = write(tmp.path(), "wicket.yaml", "gateway:\n  bind: 0.0.0.0\n");
        assert_eq!(load_config(&yaml).unwrap().gateway.bind, "0.0.0.0");

        let json = write(tmp.path(), "wicket.json", r#"{"gateway": {"port": 0}}"#);
        assert_eq!(load_config(&json).unwrap().gateway.port, 0);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(tmp.path(), "wicket.toml", "[access]\n");
        let config = load_config(&path).unwrap();
        assert_eq!(config.gateway.port, 5000);
        assert!(config.access.request_ttl_secs.is_none());
    }

    #[test]
    fn rejects_unknown_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(tmp.path(), "wicket.ini", "gateway=1");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn find_in_dir_respects_precedence() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "wicket.yaml", "gateway: {}\n");
        write(tmp.path(), "wicket.toml", "");
        let found = find_in_dir(tmp.path()).unwrap();
        assert!(found.ends_with("wicket.toml"));
    }

    #[test]
    fn find_in_dir_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(find_in_dir(tmp.path()).is_none());
    }
}

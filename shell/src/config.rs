use shell_types::InstalledApp;

/// Apps shipped with the shell. Always present in the registry and refused
/// by uninstall.
pub const BUILTIN_APPS: &[(&str, &str, &str)] = &[
    ("App Store", "/appstore/index.html", "/appstore/icon.png"),
    ("Terminal", "/terminal/index.html", "/terminal/icon.png"),
];

/// Source suffixes permitted to invoke protected capabilities.
pub const DEFAULT_TRUSTED_SUFFIXES: &[&str] = &["/appstore/index.html", "/terminal/index.html"];

#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Origin every channel-level sender must match before an envelope is
    /// considered at all.
    pub host_origin: String,
    /// Global kill switch for guest embedding.
    pub embedding_enabled: bool,
    /// Suffix allow-list consulted when trust tokens are assigned.
    pub trusted_suffixes: Vec<String>,
    /// Path to the key-value store database; `None` keeps state in memory.
    pub store_path: Option<String>,
}

impl ShellConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            host_origin: env_str("SHELL_HOST_ORIGIN", "https://gurasuraisu.github.io"),
            embedding_enabled: env_parse("SHELL_EMBEDDING_ENABLED", true)?,
            trusted_suffixes: env_csv("SHELL_TRUSTED_SUFFIXES", DEFAULT_TRUSTED_SUFFIXES),
            store_path: std::env::var("SHELL_STORE_PATH").ok(),
        })
    }

    /// Built-in registry entries, constructed fresh so callers can own them.
    pub fn builtin_apps() -> Vec<InstalledApp> {
        BUILTIN_APPS
            .iter()
            .map(|(name, url, icon)| InstalledApp {
                name: (*name).to_string(),
                launch_url: (*url).to_string(),
                icon_url: (*icon).to_string(),
            })
            .collect()
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            host_origin: "https://gurasuraisu.github.io".to_string(),
            embedding_enabled: true,
            trusted_suffixes: DEFAULT_TRUSTED_SUFFIXES
                .iter()
                .map(ToString::to_string)
                .collect(),
            store_path: None,
        }
    }
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Failed to parse env var {key}={val}: {e}")),
        Err(_) => Ok(default),
    }
}

fn env_csv(key: &str, default: &[&str]) -> Vec<String> {
    match std::env::var(key) {
        Ok(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect(),
        Err(_) => default.iter().map(|s| (*s).to_string()).collect(),
    }
}

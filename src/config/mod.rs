use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Optional color overrides (`#RRGGBB` or `#RGB`)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ThemeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub danger: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_dim: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Supabase project URL, e.g. https://abcd.supabase.co
    #[serde(default)]
    pub supabase_url: String,

    /// Public anon key of the project
    #[serde(default)]
    pub supabase_anon_key: String,

    /// Origin used for share links (defaults to the Supabase URL's origin)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_base_url: Option<String>,

    /// Copy share links to the system clipboard
    #[serde(default = "default_true")]
    pub copy_links: bool,

    /// Mirror notifications to the desktop
    #[serde(default)]
    pub notifications: bool,

    /// Keep the session between runs
    #[serde(default = "default_true")]
    pub remember_session: bool,

    #[serde(default)]
    pub theme: ThemeConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            share_base_url: None,
            copy_links: true,
            notifications: false,
            remember_session: true,
            theme: ThemeConfig::default(),
        }
    }
}

impl AppConfig {
    /// Get the config file path
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("stampcards");

        if let Err(e) = std::fs::create_dir_all(&config_dir) {
            tracing::warn!("Could not create config directory: {}", e);
        }

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from the default location with environment overrides applied
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Ok(path) => Self::load_from(&path),
            Err(_) => AppConfig::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load config from a file, or create a default one there
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("Failed to parse config: {}", e),
                },
                Err(e) => tracing::warn!("Failed to read config: {}", e),
            }
            // Leave a broken file alone so the user can fix it
            return AppConfig::default();
        }

        let config = AppConfig::default();
        if let Err(e) = config.save_to(path) {
            tracing::warn!("Could not write default config: {}", e);
        }
        config
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let mut clean_config = self.clone();
        clean_config.supabase_url = clean_config.supabase_url.trim().to_string();
        if clean_config.share_base_url.as_ref().map(|s| s.trim().is_empty()).unwrap_or(false) {
            clean_config.share_base_url = None;
        }

        let content = toml::to_string_pretty(&clean_config)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Override backend settings from the environment
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(url) = get("STAMPCARDS_SUPABASE_URL").or_else(|| get("SUPABASE_URL")) {
            self.supabase_url = url;
        }
        if let Some(key) = get("STAMPCARDS_SUPABASE_ANON_KEY").or_else(|| get("SUPABASE_ANON_KEY")) {
            self.supabase_anon_key = key;
        }
    }

    /// Base URL for share links
    pub fn share_base(&self) -> String {
        match &self.share_base_url {
            Some(base) if !base.trim().is_empty() => base.trim().trim_end_matches('/').to_string(),
            _ => origin_of(&self.supabase_url),
        }
    }
}

/// `scheme://host[:port]` part of a URL
fn origin_of(url: &str) -> String {
    let url = url.trim();
    match reqwest::Url::parse(url) {
        Ok(parsed) if parsed.has_host() => parsed.origin().ascii_serialization(),
        // No scheme: keep the host part as given
        _ => url.split(['/', '?', '#']).next().unwrap_or_default().to_string(),
    }
}

//! Configuration management for genfriends.
//!
//! Settings are resolved once at startup from (lowest to highest precedence)
//! built-in defaults, an optional config file, and environment variables.
//! The resulting [`Settings`] is immutable and shared by reference.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default KIE.AI base URL.
pub const DEFAULT_KIE_API_URL: &str = "https://api.kie.ai";

/// Default Seedream (BytePlus ModelArk) base URL.
pub const DEFAULT_SEEDREAM_API_URL: &str = "https://ark.ap-southeast.bytepluses.com/api/v3";

/// Default Kling AI base URL.
pub const DEFAULT_KLING_API_URL: &str = "https://api-singapore.klingai.com";

/// Default OpenAI-compatible endpoint for the prompt rewriter.
pub const DEFAULT_LLM_ENDPOINT: &str = "https://api.openai.com/v1";

/// Default rewriter model.
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

/// Default Supabase Storage bucket for generated images.
pub const DEFAULT_SUPABASE_BUCKET: &str = "generated-images";

/// Default local database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "genfriends.db";

/// Default FTP control port.
pub const DEFAULT_FTP_PORT: u16 = 21;

/// Errors raised while resolving or using configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Missing(String),

    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(String),
}

/// KIE.AI credentials.
#[derive(Debug, Clone, Default)]
pub struct KieSettings {
    pub api_key: Option<String>,
    pub api_url: String,
}

/// Seedream / BytePlus credentials.
#[derive(Debug, Clone, Default)]
pub struct SeedreamSettings {
    pub api_key: Option<String>,
    pub api_url: String,
}

/// Kling AI access/secret key pair.
#[derive(Debug, Clone, Default)]
pub struct KlingSettings {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub api_url: String,
}

/// Supabase project access (Storage and PostgREST).
#[derive(Debug, Clone, Default)]
pub struct SupabaseSettings {
    pub url: Option<String>,
    pub service_key: Option<String>,
    pub bucket: String,
}

/// Resolved Supabase credentials, both present.
#[derive(Debug, Clone)]
pub struct SupabaseCredentials {
    pub url: String,
    pub service_key: String,
}

impl SupabaseSettings {
    /// Both URL and key, or a configuration error.
    pub fn credentials(&self) -> Result<SupabaseCredentials, ConfigError> {
        match (&self.url, &self.service_key) {
            (Some(url), Some(key)) => Ok(SupabaseCredentials {
                url: url.trim_end_matches('/').to_string(),
                service_key: key.clone(),
            }),
            _ => Err(ConfigError::Missing(
                "Supabase configuration missing".to_string(),
            )),
        }
    }
}

/// FTP host for public image delivery.
#[derive(Debug, Clone, Default)]
pub struct FtpSettings {
    pub host: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub port: u16,
    pub base_url: Option<String>,
}

/// Resolved FTP credentials, all present.
#[derive(Debug, Clone)]
pub struct FtpCredentials {
    pub host: String,
    pub user: String,
    pub password: String,
    pub port: u16,
    pub base_url: String,
}

impl FtpSettings {
    /// All FTP values, or a configuration error.
    pub fn credentials(&self) -> Result<FtpCredentials, ConfigError> {
        match (&self.host, &self.user, &self.password, &self.base_url) {
            (Some(host), Some(user), Some(password), Some(base_url)) => Ok(FtpCredentials {
                host: host.clone(),
                user: user.clone(),
                password: password.clone(),
                port: self.port,
                base_url: base_url.trim_end_matches('/').to_string(),
            }),
            _ => Err(ConfigError::Missing("FTP configuration missing".to_string())),
        }
    }
}

/// OpenAI-compatible chat endpoint used by the prompt rewriter.
#[derive(Debug, Clone, Default)]
pub struct RewriterSettings {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Paging and pacing for batch work over `community_prompts`.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub batch_size: usize,
    pub delay_ms: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            delay_ms: 500,
        }
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory for local state (saga and transform logs).
    pub data_dir: PathBuf,
    /// Database URL (overrides data_dir/genfriends.db if set).
    pub database_url: Option<String>,
    /// User agent for outbound HTTP requests.
    pub user_agent: String,
    /// Outbound request timeout in seconds.
    pub request_timeout: u64,
    pub kie: KieSettings,
    pub seedream: SeedreamSettings,
    pub kling: KlingSettings,
    pub supabase: SupabaseSettings,
    pub ftp: FtpSettings,
    pub rewriter: RewriterSettings,
    pub batch: BatchSettings,
}

/// Trimmed copy of a config-file value, treating blank strings as unset.
fn nonempty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl Default for Settings {
    fn default() -> Self {
        Self::resolve(&Config::default(), |_| None)
    }
}

impl Settings {
    /// Resolve settings from a config file overlay and an environment lookup.
    ///
    /// The lookup is a parameter so tests never touch the process environment.
    pub fn resolve<F>(config: &Config, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |names: &[&str]| -> Option<String> {
            names
                .iter()
                .filter_map(|name| env(name))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };

        let data_dir = lookup(&["GENFRIENDS_DATA_DIR"])
            .map(PathBuf::from)
            .or_else(|| config.data_dir.as_ref().map(PathBuf::from))
            .unwrap_or_else(default_data_dir);

        let kie = &config.kie;
        let seedream = &config.seedream;
        let kling = &config.kling;
        let supabase = &config.supabase;
        let ftp = &config.ftp;
        let llm = &config.rewriter;

        let ftp_port = lookup(&["FTP_PORT"])
            .and_then(|p| p.parse::<u16>().ok())
            .or(ftp.port)
            .unwrap_or(DEFAULT_FTP_PORT);

        Self {
            data_dir,
            database_url: lookup(&["DATABASE_URL"]).or_else(|| nonempty(&config.database_url)),
            user_agent: config
                .user_agent
                .clone()
                .unwrap_or_else(|| format!("genfriends/{}", env!("CARGO_PKG_VERSION"))),
            request_timeout: config.request_timeout.unwrap_or(120),
            kie: KieSettings {
                api_key: lookup(&["KIE_AI_API_KEY", "KIE_API_KEY"]).or_else(|| nonempty(&kie.api_key)),
                api_url: lookup(&["KIE_AI_API_URL"])
                    .or_else(|| nonempty(&kie.api_url))
                    .unwrap_or_else(|| DEFAULT_KIE_API_URL.to_string()),
            },
            seedream: SeedreamSettings {
                api_key: lookup(&["SEEDREAM_API_KEY", "BYTEPLUS_API_KEY"])
                    .or_else(|| nonempty(&seedream.api_key)),
                api_url: lookup(&["SEEDREAM_API_URL"])
                    .or_else(|| nonempty(&seedream.api_url))
                    .unwrap_or_else(|| DEFAULT_SEEDREAM_API_URL.to_string()),
            },
            kling: KlingSettings {
                access_key: lookup(&["KLING_ACCESS_KEY"]).or_else(|| nonempty(&kling.access_key)),
                secret_key: lookup(&["KLING_SECRET_KEY"]).or_else(|| nonempty(&kling.secret_key)),
                api_url: lookup(&["KLING_API_URL"])
                    .or_else(|| nonempty(&kling.api_url))
                    .unwrap_or_else(|| DEFAULT_KLING_API_URL.to_string()),
            },
            supabase: SupabaseSettings {
                url: lookup(&["SUPABASE_URL", "VITE_SUPABASE_URL"])
                    .or_else(|| nonempty(&supabase.url)),
                service_key: lookup(&[
                    "SUPABASE_SERVICE_ROLE_KEY",
                    "SUPABASE_SERVICE_KEY",
                    "SUPABASE_ANON_KEY",
                    "VITE_SUPABASE_ANON_KEY",
                ])
                .or_else(|| nonempty(&supabase.service_key)),
                bucket: lookup(&["SUPABASE_BUCKET"])
                    .or_else(|| nonempty(&supabase.bucket))
                    .unwrap_or_else(|| DEFAULT_SUPABASE_BUCKET.to_string()),
            },
            ftp: FtpSettings {
                host: lookup(&["FTP_HOST"]).or_else(|| nonempty(&ftp.host)),
                user: lookup(&["FTP_USER"]).or_else(|| nonempty(&ftp.user)),
                password: lookup(&["FTP_PASSWORD"]).or_else(|| nonempty(&ftp.password)),
                port: ftp_port,
                base_url: lookup(&["FTP_BASE_URL"]).or_else(|| nonempty(&ftp.base_url)),
            },
            rewriter: RewriterSettings {
                endpoint: lookup(&["LLM_ENDPOINT"])
                    .or_else(|| nonempty(&llm.endpoint))
                    .unwrap_or_else(|| DEFAULT_LLM_ENDPOINT.to_string()),
                api_key: lookup(&["LLM_API_KEY", "OPENAI_API_KEY"]).or_else(|| nonempty(&llm.api_key)),
                model: lookup(&["LLM_MODEL"])
                    .or_else(|| nonempty(&llm.model))
                    .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
                temperature: llm.temperature.unwrap_or(0.2),
                max_tokens: llm.max_tokens.unwrap_or(1024),
            },
            batch: BatchSettings {
                batch_size: config.batch.batch_size.unwrap_or(100),
                delay_ms: config.batch.delay_ms.unwrap_or(500),
            },
        }
    }

    /// Resolve from the process environment.
    pub fn from_env(config: &Config) -> Self {
        Self::resolve(config, |name| std::env::var(name).ok())
    }

    /// Local SQLite database location.
    pub fn database_url(&self) -> String {
        match &self.database_url {
            Some(url) => url.clone(),
            None => self
                .data_dir
                .join(DEFAULT_DATABASE_FILENAME)
                .display()
                .to_string(),
        }
    }

    /// Create the data directory if needed.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }

    /// Which named secrets are present. Never exposes values.
    pub fn presence(&self) -> BTreeMap<&'static str, bool> {
        let mut map = BTreeMap::new();
        map.insert("KIE_AI_API_KEY", self.kie.api_key.is_some());
        map.insert("SEEDREAM_API_KEY", self.seedream.api_key.is_some());
        map.insert("KLING_ACCESS_KEY", self.kling.access_key.is_some());
        map.insert("KLING_SECRET_KEY", self.kling.secret_key.is_some());
        map.insert("SUPABASE_URL", self.supabase.url.is_some());
        map.insert("SUPABASE_SERVICE_ROLE_KEY", self.supabase.service_key.is_some());
        map.insert("FTP_HOST", self.ftp.host.is_some());
        map.insert("FTP_USER", self.ftp.user.is_some());
        map.insert("FTP_PASSWORD", self.ftp.password.is_some());
        map.insert("FTP_BASE_URL", self.ftp.base_url.is_some());
        map.insert("LLM_API_KEY", self.rewriter.api_key.is_some());
        map
    }

    /// Presence map restricted to the storage-related names.
    pub fn storage_presence(&self) -> BTreeMap<&'static str, bool> {
        self.presence()
            .into_iter()
            .filter(|(name, _)| name.starts_with("FTP_") || name.starts_with("SUPABASE_"))
            .collect()
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("genfriends"))
        .unwrap_or_else(|| PathBuf::from(".genfriends"))
}

/// Upstream API section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

/// Kling section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KlingSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

/// Supabase section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupabaseSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
}

/// FTP section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FtpSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Rewriter section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewriterSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Batch section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

/// Configuration file structure. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Local database URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// User agent string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    #[serde(default)]
    pub kie: ApiSection,
    #[serde(default)]
    pub seedream: ApiSection,
    #[serde(default)]
    pub kling: KlingSection,
    #[serde(default)]
    pub supabase: SupabaseSection,
    #[serde(default)]
    pub ftp: FtpSection,
    #[serde(default, alias = "llm")]
    pub rewriter: RewriterSection,
    #[serde(default)]
    pub batch: BatchSection,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Falls back to defaults when no config file is found.
    pub async fn load() -> Self {
        match prefer::load("genfriends").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("Ignoring config file {}: {}", path.display(), e);
                            Self::default()
                        }
                    }
                } else {
                    Self::default()
                }
            }
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path).await?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config = Self::parse(&contents, ext)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse config text in the given format.
    pub fn parse(contents: &str, ext: &str) -> Result<Self, ConfigError> {
        match ext {
            "toml" => toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string())),
            "yaml" | "yml" => {
                serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            _ => serde_json::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string())),
        }
    }
}

/// Load settings, honouring an explicit config path.
pub async fn load_settings(config_path: Option<&Path>) -> anyhow::Result<(Settings, Config)> {
    let config = match config_path {
        Some(path) => Config::load_from_path(path).await?,
        None => Config::load().await,
    };
    let settings = Settings::from_env(&config);
    Ok((settings, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let settings = Settings::resolve(&Config::default(), |_| None);
        assert_eq!(settings.kie.api_url, DEFAULT_KIE_API_URL);
        assert_eq!(settings.kling.api_url, DEFAULT_KLING_API_URL);
        assert_eq!(settings.ftp.port, DEFAULT_FTP_PORT);
        assert_eq!(settings.supabase.bucket, DEFAULT_SUPABASE_BUCKET);
        assert!(settings.kie.api_key.is_none());
        assert!(settings.presence().values().all(|present| !present));
    }

    #[test]
    fn test_supabase_aliases() {
        let env = env_of(&[
            ("VITE_SUPABASE_URL", "https://proj.supabase.co/"),
            ("VITE_SUPABASE_ANON_KEY", "anon"),
        ]);
        let settings = Settings::resolve(&Config::default(), env);
        let creds = settings.supabase.credentials().unwrap();
        assert_eq!(creds.url, "https://proj.supabase.co");
        assert_eq!(creds.service_key, "anon");
    }

    #[test]
    fn test_service_role_key_preferred_over_anon() {
        let env = env_of(&[
            ("SUPABASE_URL", "https://a.supabase.co"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service"),
            ("SUPABASE_ANON_KEY", "anon"),
        ]);
        let settings = Settings::resolve(&Config::default(), env);
        assert_eq!(settings.supabase.service_key.as_deref(), Some("service"));
    }

    #[test]
    fn test_empty_env_values_ignored() {
        let env = env_of(&[("KIE_AI_API_KEY", "  "), ("KIE_API_KEY", "fallback")]);
        let settings = Settings::resolve(&Config::default(), env);
        assert_eq!(settings.kie.api_key.as_deref(), Some("fallback"));
    }

    #[test]
    fn test_blank_file_values_are_unset() {
        let config = Config::parse(
            r#"
            [kie]
            api_key = ""

            [kling]
            access_key = ""
            secret_key = "  "

            [ftp]
            host = " ftp.example.com "
            user = ""
            "#,
            "toml",
        )
        .unwrap();
        let settings = Settings::resolve(&config, |_| None);
        assert!(settings.kie.api_key.is_none());
        assert!(settings.kling.access_key.is_none());
        assert!(settings.kling.secret_key.is_none());
        assert_eq!(settings.ftp.host.as_deref(), Some("ftp.example.com"));
        assert!(settings.ftp.user.is_none());

        let presence = settings.presence();
        assert!(!presence["KIE_AI_API_KEY"]);
        assert!(!presence["KLING_ACCESS_KEY"]);
        assert!(presence["FTP_HOST"]);
    }

    #[test]
    fn test_env_overrides_file() {
        let config = Config::parse(
            r#"
            [ftp]
            host = "file-host"
            port = 2121

            [kie]
            api_key = "from-file"
            "#,
            "toml",
        )
        .unwrap();
        let env = env_of(&[("FTP_HOST", "env-host")]);
        let settings = Settings::resolve(&config, env);
        assert_eq!(settings.ftp.host.as_deref(), Some("env-host"));
        assert_eq!(settings.ftp.port, 2121);
        assert_eq!(settings.kie.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_ftp_credentials_require_all_fields() {
        let env = env_of(&[("FTP_HOST", "h"), ("FTP_USER", "u")]);
        let settings = Settings::resolve(&Config::default(), env);
        assert!(settings.ftp.credentials().is_err());

        let presence = settings.storage_presence();
        assert_eq!(presence.get("FTP_HOST"), Some(&true));
        assert_eq!(presence.get("FTP_PASSWORD"), Some(&false));
        assert!(!presence.contains_key("KIE_AI_API_KEY"));
    }

    #[test]
    fn test_yaml_llm_alias() {
        let config = Config::parse("llm:\n  model: local-model\n", "yaml").unwrap();
        let settings = Settings::resolve(&config, |_| None);
        assert_eq!(settings.rewriter.model, "local-model");
    }

    #[test]
    fn test_database_url_defaults_to_data_dir() {
        let env = env_of(&[("GENFRIENDS_DATA_DIR", "/tmp/gf")]);
        let settings = Settings::resolve(&Config::default(), env);
        assert_eq!(settings.database_url(), "/tmp/gf/genfriends.db");
    }
}

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::scoring::{BlendWeights, EngagementWeights, VelocityWeights};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringSection {
    pub min_age_hours: f64,
    pub velocity: VelocityWeights,
    pub engagement: EngagementWeights,
    pub blend: BlendWeights,
}

impl Default for ScoringSection {
    fn default() -> Self {
        Self {
            min_age_hours: 1.0,
            velocity: VelocityWeights::default(),
            engagement: EngagementWeights::default(),
            blend: BlendWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub max_videos_per_term: u32,
    pub top_creators_to_rank: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_videos_per_term: 100,
            top_creators_to_rank: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub max_users: usize,
    pub videos_per_user: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            max_users: 20,
            videos_per_user: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApifyConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for ApifyConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.apify.com/v2/acts/natanielsantos~douyin-scraper/run-sync-get-dataset-items"
                .to_string(),
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RapidApiConfig {
    pub base_url: String,
    pub host: String,
    pub user_timeout_secs: u64,
    pub detail_timeout_secs: u64,
    pub download_timeout_secs: u64,
}

impl Default for RapidApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://douyin-media-no-watermark1.p.rapidapi.com".to_string(),
            host: "douyin-media-no-watermark1.p.rapidapi.com".to_string(),
            user_timeout_secs: 30,
            detail_timeout_secs: 45,
            download_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub sheets_base: String,
    pub drive_base: String,
    pub upload_base: String,
    pub scopes: Vec<String>,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            sheets_base: "https://sheets.googleapis.com/v4".to_string(),
            drive_base: "https://www.googleapis.com/drive/v3".to_string(),
            upload_base: "https://www.googleapis.com/upload/drive/v3".to_string(),
            scopes: vec![
                "https://www.googleapis.com/auth/spreadsheets".to_string(),
                "https://www.googleapis.com/auth/drive".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub scoring: ScoringSection,
    pub discovery: DiscoveryConfig,
    pub report: ReportConfig,
    pub apify: ApifyConfig,
    pub rapidapi: RapidApiConfig,
    pub google: GoogleConfig,
    pub server: ServerConfig,
}

impl ServiceConfig {
    pub fn load(path: Option<PathBuf>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let config_path = path.or_else(default_config_path);
        let mut config = match config_path.as_ref() {
            Some(path) if path.exists() => Self::from_file(path)?,
            _ => ServiceConfig::default(),
        };

        config.apply_env_overrides();
        Ok((config, config_path))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn write(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let payload = toml::to_string_pretty(self)?;
        std::fs::write(path, payload)?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = env::var("APIFY_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                self.apify.endpoint = endpoint;
            }
        }
        if let Ok(base) = env::var("RAPIDAPI_BASE") {
            if !base.trim().is_empty() {
                self.rapidapi.base_url = base;
            }
        }
        if let Ok(max_users) = env::var("REPORT_MAX_USERS") {
            if let Ok(value) = max_users.parse::<usize>() {
                self.report.max_users = value;
            }
        }
        if let Ok(videos) = env::var("REPORT_VIDEOS_PER_USER") {
            if let Ok(value) = videos.parse::<u32>() {
                self.report.videos_per_user = value;
            }
        }
        if let Ok(host) = env::var("SERVER_HOST") {
            if !host.trim().is_empty() {
                self.server.host = host;
            }
        }
        if let Ok(port) = env::var("SERVER_PORT") {
            if let Ok(value) = port.parse::<u16>() {
                self.server.port = value;
            }
        }
    }
}

/// Secrets are only ever read from the environment, once, at startup.
#[derive(Clone, Default)]
pub struct Secrets {
    pub api_key: Option<String>,
    pub apify_token: Option<String>,
    pub rapidapi_key: Option<String>,
    pub google_credentials_path: Option<PathBuf>,
    pub google_credentials_json: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            api_key: non_empty_var("API_KEY_SECRET"),
            apify_token: non_empty_var("APIFY_TOKEN"),
            rapidapi_key: non_empty_var("RAPIDAPI_KEY"),
            google_credentials_path: non_empty_var("GOOGLE_CREDENTIALS_PATH").map(PathBuf::from),
            google_credentials_json: non_empty_var("GOOGLE_SERVICE_ACCOUNT_JSON"),
        }
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("api_key", &self.api_key.is_some())
            .field("apify_token", &self.apify_token.is_some())
            .field("rapidapi_key", &self.rapidapi_key.is_some())
            .field("google_credentials_path", &self.google_credentials_path)
            .field("google_credentials_json", &self.google_credentials_json.is_some())
            .finish()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn default_config_path() -> Option<PathBuf> {
    env::var("VIRALITY_CONFIG_PATH")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .or_else(|| Some(PathBuf::from("config/service.toml")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_sections() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [report]
            max_users = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.report.max_users, 5);
        assert_eq!(config.report.videos_per_user, 10);
        assert_eq!(config.discovery.top_creators_to_rank, 20);
        assert!((config.scoring.min_age_hours - 1.0).abs() < 1e-12);
    }

    #[test]
    fn written_config_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/service.toml");
        let mut config = ServiceConfig::default();
        config.scoring.blend.velocity = 0.25;

        config.write(&path).unwrap();
        let loaded = ServiceConfig::from_file(&path).unwrap();

        assert!((loaded.scoring.blend.velocity - 0.25).abs() < 1e-12);
        assert_eq!(loaded.apify.endpoint, config.apify.endpoint);
    }
}

use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::parser::ParseSettings;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub language_model: LanguageModelConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Google,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub default_timezone: String,
    pub prefer_future: bool,
    pub conflict_padding_minutes: i64,
    pub check_conflicts: bool,
    pub default_duration_minutes: i64,
    pub max_results: u32,
    pub backend: BackendKind,
    /// Static alias table: phrase as spoken -> backend calendar id.
    pub aliases: BTreeMap<String, String>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            default_timezone: "America/Chicago".to_string(),
            prefer_future: true,
            conflict_padding_minutes: 60,
            check_conflicts: true,
            default_duration_minutes: 60,
            max_results: 250,
            backend: BackendKind::Google,
            aliases: BTreeMap::new(),
        }
    }
}

impl CalendarConfig {
    pub fn timezone(&self) -> Result<Tz> {
        self.default_timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("Invalid default_timezone '{}': {}", self.default_timezone, e))
    }

    pub fn conflict_padding(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.conflict_padding_minutes.max(0))
    }

    pub fn default_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.default_duration_minutes.max(1))
    }

    /// Parser settings anchored at the current instant.
    pub fn parse_settings(&self) -> Result<ParseSettings> {
        Ok(ParseSettings::new(self.timezone()?, self.prefer_future))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub api_base: String,
    /// Token JSON written by an out-of-band OAuth flow.
    pub token_path: Option<PathBuf>,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_base: "https://www.googleapis.com/calendar/v3".to_string(),
            token_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    #[default]
    Gemini,
    OpenAI,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LanguageModelConfig {
    #[serde(default)]
    pub provider: LLMProvider,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8000 }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid server address {}:{}", self.host, self.port))
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&get_config_path()?)
    }

    /// Load from an explicit path, writing defaults there when the file is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let default_config = Config::default();
            default_config.save_to(path)?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        config.calendar.timezone()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }
}

pub fn get_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CALVOX_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    Ok(project_dirs()?.config_dir().join("config.toml"))
}

/// Default location of the OAuth token file.
pub fn default_token_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("token.json"))
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("com", "calvox", "calvox").context("Failed to determine config directory")
}

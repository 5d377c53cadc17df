use crate::constants::{CURSOR_GLYPH, DEFAULT_CODE_THEME, DEFAULT_ENDPOINT, ENDPOINT_ENV_VAR};
use crate::errors::{PanelError, PanelResult};
use crate::highlight;
use once_cell::sync::Lazy;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, path::PathBuf, sync::RwLock};

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub endpoint: String,
    pub cursor_glyph: String,
    pub raw_html: bool,
    pub linkify: bool,
    pub typographer: bool,
    pub code_theme: String,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            cursor_glyph: CURSOR_GLYPH.to_string(),
            raw_html: true,
            linkify: true,
            typographer: true,
            code_theme: DEFAULT_CODE_THEME.to_string(),
            log_level: "info".to_string(),
        }
    }
}

static CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::default()));

/// Loads the user's config file (creating it with defaults when missing),
/// applies environment overrides and installs the result globally.
pub fn initialize_config() -> PanelResult<Config> {
    let config_path = get_config_path()?;
    let mut config = load_config_from(&config_path)?;
    apply_env_overrides(&mut config);
    validate_config(&config)?;

    set_config(config.clone());
    Ok(config)
}

/// Reads a config file, or writes the defaults to it if it does not exist yet.
pub fn load_config_from(config_path: &Path) -> PanelResult<Config> {
    if config_path.exists() {
        let config_str = fs::read_to_string(config_path).map_err(|e| {
            PanelError::config_error(format!("Failed to read config file: {}", e))
        })?;

        let config: Config = serde_json::from_str(&config_str)
            .map_err(|e| PanelError::config_error(format!("Failed to parse config: {}", e)))?;

        validate_config(&config)?;
        Ok(config)
    } else {
        let config = Config::default();

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                PanelError::config_error(format!("Failed to create config directory: {}", e))
            })?;
        }

        let config_str = serde_json::to_string_pretty(&config)?;
        fs::write(config_path, config_str).map_err(|e| {
            PanelError::config_error(format!("Failed to write config file: {}", e))
        })?;

        log::info!("Wrote default config to {}", config_path.display());
        Ok(config)
    }
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(endpoint) = env::var(ENDPOINT_ENV_VAR) {
        if !endpoint.trim().is_empty() {
            config.endpoint = endpoint.trim().to_string();
        }
    }
}

fn get_config_path() -> PanelResult<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| PanelError::config_error("Could not determine home directory"))?;

    Ok(home_dir.join(".config").join("arc1610").join("config.json"))
}

pub fn validate_config(config: &Config) -> PanelResult<()> {
    let endpoint = Url::parse(&config.endpoint)
        .map_err(|e| PanelError::config_error(format!("Invalid endpoint '{}': {}", config.endpoint, e)))?;
    if !matches!(endpoint.scheme(), "http" | "https") {
        return Err(PanelError::config_error(format!(
            "Endpoint must use http or https, got '{}'",
            endpoint.scheme()
        )));
    }

    if config.cursor_glyph.trim().is_empty() {
        return Err(PanelError::config_error("cursor_glyph must not be empty"));
    }

    if !highlight::theme_exists(&config.code_theme) {
        return Err(PanelError::config_error(format!(
            "Unknown code theme '{}'",
            config.code_theme
        )));
    }

    if !LOG_LEVELS.contains(&config.log_level.to_lowercase().as_str()) {
        return Err(PanelError::config_error(format!(
            "log_level must be one of {:?}",
            LOG_LEVELS
        )));
    }

    Ok(())
}

pub fn get_config() -> Config {
    match CONFIG.read() {
        Ok(config) => config.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

pub fn set_config(config: Config) {
    match CONFIG.write() {
        Ok(mut guard) => *guard = config,
        Err(poisoned) => *poisoned.into_inner() = config,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_validate_config_valid() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_config_invalid_endpoint() {
        let mut config = Config::default();
        config.endpoint = "not a url".to_string();
        assert!(validate_config(&config).is_err());

        config.endpoint = "ftp://127.0.0.1/ask".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_config_invalid_theme_and_glyph() {
        let mut config = Config::default();
        config.code_theme = "no-such-theme".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.cursor_glyph = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_missing_config_file_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = load_config_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        let written: Config = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, Config::default());
    }

    #[test]
    fn test_partial_config_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "endpoint": "http://localhost:9000/ask", "linkify": false }"#).unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.endpoint, "http://localhost:9000/ask");
        assert!(!config.linkify);
        assert_eq!(config.cursor_glyph, CURSOR_GLYPH);
    }

    #[test]
    fn test_malformed_config_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ endpoint: ").unwrap();

        assert!(matches!(load_config_from(&path), Err(PanelError::Config(_))));
    }

    #[test]
    fn test_global_config_is_replaced() {
        let mut config = Config::default();
        config.code_theme = "InspiredGitHub".to_string();
        set_config(config.clone());
        assert_eq!(get_config(), config);
        set_config(Config::default());
    }
}

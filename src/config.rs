use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{error::Result, search::MAX_RESULTS_LIMIT};

pub const API_KEY_ENV: &str = "YOUTUBE_API_KEY";
pub const DEFAULT_MAX_RESULTS: u32 = 25;
pub const DEFAULT_LANGUAGE: &str = "en";

/// Settings persisted in `config.toml`. Every field is optional on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    // From YOUTUBE_API_KEY; lives for the session only and is never written back.
    #[serde(skip)]
    env_api_key: Option<String>,
    pub download_dir: PathBuf,
    pub max_results: u32,
    pub language: String,
    pub yt_dlp_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            env_api_key: None,
            download_dir: default_download_dir(),
            max_results: DEFAULT_MAX_RESULTS,
            language: DEFAULT_LANGUAGE.to_string(),
            yt_dlp_path: PathBuf::from("yt-dlp"),
        }
    }
}

/// `<config dir>/tubedeck/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tubedeck").join("config.toml"))
}

pub fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("TubeDeck")
}

impl Config {
    /// Reads the file at `path` (missing is fine) and applies the
    /// `YOUTUBE_API_KEY` override.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_env(path, |key| env::var(key).ok())
    }

    fn load_with_env(path: &Path, env_lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)?;
            toml::from_str::<Config>(&content)?
        } else {
            Config::default()
        };
        if let Some(key) = env_lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            config.env_api_key = Some(key.trim().to_string());
        }
        Ok(config)
    }

    /// Writes atomically through a temporary sibling file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// The environment key if set, otherwise the one from the file.
    pub fn api_key(&self) -> Option<&str> {
        self.env_api_key
            .as_deref()
            .or(self.api_key.as_deref())
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn max_results(&self) -> u32 {
        self.max_results.clamp(1, MAX_RESULTS_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_with_env(&dir.path().join("none.toml"), no_env).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.api_key(), None);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let file = make_config("api_key = \"abc123\"\nmax_results = 10\n");
        let config = Config::load_with_env(file.path(), no_env).unwrap();
        assert_eq!(config.api_key(), Some("abc123"));
        assert_eq!(config.max_results(), 10);
        assert_eq!(config.language, DEFAULT_LANGUAGE);
        assert_eq!(config.yt_dlp_path, PathBuf::from("yt-dlp"));
    }

    #[test]
    fn env_overrides_file_key() {
        let file = make_config("api_key = \"from-file\"\n");
        let config = Config::load_with_env(file.path(), |key| {
            (key == API_KEY_ENV).then(|| " from-env ".to_string())
        })
        .unwrap();
        assert_eq!(config.api_key(), Some("from-env"));
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn env_key_is_not_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::load_with_env(&path, |key| {
            (key == API_KEY_ENV).then(|| "SECRET".to_string())
        })
        .unwrap();
        assert_eq!(config.api_key(), Some("SECRET"));

        config.download_dir = dir.path().join("elsewhere");
        config.save(&path).unwrap();
        assert!(!std::fs::read_to_string(&path).unwrap().contains("SECRET"));

        let reloaded = Config::load_with_env(&path, no_env).unwrap();
        assert_eq!(reloaded.api_key(), None);
        assert_eq!(reloaded.download_dir, dir.path().join("elsewhere"));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let file = make_config("api_key = \"   \"\n");
        let config = Config::load_with_env(file.path(), no_env).unwrap();
        assert_eq!(config.api_key(), None);
    }

    #[test]
    fn max_results_is_clamped_to_api_limits() {
        let file = make_config("max_results = 500\n");
        assert_eq!(Config::load_with_env(file.path(), no_env).unwrap().max_results(), 50);
        let file = make_config("max_results = 0\n");
        assert_eq!(Config::load_with_env(file.path(), no_env).unwrap().max_results(), 1);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let file = make_config("max_results = \"lots\"\n");
        assert!(matches!(
            Config::load_with_env(file.path(), no_env),
            Err(AppError::ConfigParse(_))
        ));
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            api_key: Some("k".into()),
            download_dir: dir.path().join("media"),
            env_api_key: None,
            max_results: 7,
            language: "ja".into(),
            yt_dlp_path: PathBuf::from("/opt/yt-dlp"),
        };
        config.save(&path).unwrap();
        assert_eq!(Config::load_with_env(&path, no_env).unwrap(), config);
        assert!(!path.with_extension("toml.tmp").exists());
    }
}

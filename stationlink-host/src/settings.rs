//! Workstation settings.
//!
//! One JSON file per workstation, by default in the platform config
//! directory (`~/.config/stationlink/settings.json` on Linux). Every field
//! has a default, so a partial file or no file at all is fine:
//!
//! ```json
//! {
//!   "workstation": "WS-07",
//!   "display": { "address": "10.0.0.20", "unicode": true, "translate": true,
//!                "dictionary": "/etc/stationlink/zh.dict" },
//!   "reader": { "address": "10.0.0.30", "readerType": "fixed" }
//! }
//! ```

use std::fs;
use std::io::{self, BufReader};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stationlink_core::display::button::DEFAULT_POLL_INTERVAL_MS;
use stationlink_core::display::CONNECT_TIMEOUT_MS;
use stationlink_core::reader::{DEFAULT_PASSWORD, DEFAULT_USER, MAX_ATTEMPTS, SUPPRESSION_WINDOW_MS};
use stationlink_core::translate::RuleSpec;
use stationlink_core::{DictionaryError, DisplayMode, ReaderType, RuleTranslator};
use thiserror::Error;

use crate::display::DisplayConfig;
use crate::dmcc::{Credentials, DmccConnector, COMMAND_TIMEOUT_MS};
use crate::reader::ReaderConfig;

const SETTINGS_FILE: &str = "settings.json";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid translation table: {0}")]
    Dictionary(#[from] DictionaryError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Name of this workstation, used as the display's name in logs
    pub workstation: String,
    pub display: DisplaySettings,
    pub reader: ReaderSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            workstation: "workstation".to_string(),
            display: DisplaySettings::default(),
            reader: ReaderSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DisplaySettings {
    pub address: Option<IpAddr>,
    pub unicode: bool,
    pub translate: bool,
    pub poll_interval_ms: u64,
    pub connect_timeout_ms: u64,
    /// `key|value` translation file
    pub dictionary: Option<PathBuf>,
    /// Pattern rules, tried before the dictionary
    pub rules: Vec<RuleSpec>,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        DisplaySettings {
            address: None,
            unicode: false,
            translate: false,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            connect_timeout_ms: CONNECT_TIMEOUT_MS,
            dictionary: None,
            rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReaderSettings {
    pub address: Option<IpAddr>,
    pub reader_type: ReaderType,
    pub suppression_ms: u64,
    pub command_timeout_ms: u64,
    /// Tries for connect and for each command before a fault is reported
    pub max_attempts: u32,
    pub user: String,
    pub password: String,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        ReaderSettings {
            address: None,
            reader_type: ReaderType::default(),
            suppression_ms: SUPPRESSION_WINDOW_MS,
            command_timeout_ms: COMMAND_TIMEOUT_MS,
            max_attempts: MAX_ATTEMPTS,
            user: DEFAULT_USER.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
        }
    }
}

/// Where settings live when no path is given
pub fn default_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "stationlink", "stationlink")
        .map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
}

impl Settings {
    /// Load settings from `path`, or from [`default_path`] when `None`.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Settings, SettingsError> {
        let path = match path.map(Path::to_path_buf).or_else(default_path) {
            Some(path) => path,
            None => {
                log::warn!("No config directory on this platform, using default settings");
                return Ok(Settings::default());
            }
        };

        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("{} not found, using default settings", path.display());
                return Ok(Settings::default());
            }
            Err(source) => return Err(SettingsError::Io { path, source }),
        };

        match serde_json::from_reader(BufReader::new(file)) {
            Ok(settings) => {
                log::debug!("Loaded settings from {}", path.display());
                Ok(settings)
            }
            Err(source) => Err(SettingsError::Parse { path, source }),
        }
    }

    pub fn display_config(&self) -> DisplayConfig {
        let mut config = DisplayConfig::new(&self.workstation);
        config.mode = DisplayMode {
            unicode: self.display.unicode,
            translate: self.display.translate,
        };
        config.poll_interval = Duration::from_millis(self.display.poll_interval_ms);
        config.connect_timeout = Duration::from_millis(self.display.connect_timeout_ms);
        config
    }

    pub fn reader_config(&self) -> ReaderConfig {
        let mut config = ReaderConfig::new(
            format!("{} reader", self.workstation),
            self.reader.reader_type,
        );
        config.credentials = Credentials {
            user: self.reader.user.clone(),
            password: self.reader.password.clone(),
        };
        config.suppression_window = Duration::from_millis(self.reader.suppression_ms);
        config.max_attempts = self.reader.max_attempts;
        config
    }

    pub fn dmcc_connector(&self) -> DmccConnector {
        DmccConnector {
            timeout: Duration::from_millis(self.reader.command_timeout_ms),
        }
    }

    /// Build the translator from the configured rules and dictionary file
    pub fn translator(&self) -> Result<RuleTranslator, SettingsError> {
        let mut translator = RuleTranslator::with_rules(&self.display.rules)?;
        if let Some(path) = &self.display.dictionary {
            let contents = fs::read_to_string(path).map_err(|source| SettingsError::Io {
                path: path.clone(),
                source,
            })?;
            let count = translator.load_dictionary(&contents)?;
            log::info!("Loaded {} translations from {}", count, path.display());
        }
        Ok(translator)
    }
}

#[cfg(test)]
mod tests {
    use stationlink_core::{Translation, Translator};

    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(Some(&dir.path().join("settings.json"))).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.reader.user, "admin");
        assert_eq!(settings.reader.suppression_ms, 4000);
        assert_eq!(settings.display.connect_timeout_ms, 5000);
        assert_eq!(settings.reader.max_attempts, 2);
        assert_eq!(settings.reader_config().max_attempts, 2);
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"workstation":"WS-07","display":{"address":"10.0.0.20","unicode":true},
               "reader":{"readerType":"fixed","maxAttempts":3,"suppressionMs":2500}}"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.workstation, "WS-07");
        assert_eq!(settings.display.address, Some("10.0.0.20".parse().unwrap()));
        assert!(settings.display.unicode);
        assert!(!settings.display.translate);
        assert_eq!(settings.display.poll_interval_ms, 1000);
        assert_eq!(settings.reader.reader_type, ReaderType::Fixed);
        assert_eq!(settings.reader.address, None);

        let display = settings.display_config();
        assert_eq!(display.name, "WS-07");
        assert!(display.mode.unicode);
        let reader = settings.reader_config();
        assert_eq!(reader.name, "WS-07 reader");
        assert_eq!(reader.reader_type, ReaderType::Fixed);
        assert_eq!(reader.max_attempts, 3);
        assert_eq!(reader.suppression_window, Duration::from_millis(2500));
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"reader":{"readerType":"overhead"}}"#).unwrap();

        let err = Settings::load(Some(&path)).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
        assert!(err.to_string().contains("settings.json"));
    }

    #[test]
    fn test_translator_from_settings() {
        let dir = tempfile::tempdir().unwrap();
        let dictionary = dir.path().join("zh.dict");
        fs::write(&dictionary, "Pass|合格\nFail|不合格\n").unwrap();

        let mut settings = Settings::default();
        settings.display.dictionary = Some(dictionary);
        settings.display.rules = vec![RuleSpec {
            pattern: r"^Scan (?<part>\w+)$".to_string(),
            template: "扫描 $part".to_string(),
        }];

        let translator = settings.translator().unwrap();
        assert_eq!(translator.translate("Pass"), Translation::Hit("合格".into()));
        assert_eq!(
            translator.translate("Scan P100"),
            Translation::Hit("扫描 P100".into())
        );
        assert_eq!(translator.translate("Retry"), Translation::Miss);
    }

    #[test]
    fn test_translator_errors() {
        let mut settings = Settings::default();
        settings.display.rules = vec![RuleSpec {
            pattern: "(".to_string(),
            template: String::new(),
        }];
        assert!(matches!(
            settings.translator(),
            Err(SettingsError::Dictionary(DictionaryError::InvalidRule { .. }))
        ));

        let mut settings = Settings::default();
        settings.display.dictionary = Some(PathBuf::from("/nonexistent/zh.dict"));
        assert!(matches!(settings.translator(), Err(SettingsError::Io { .. })));
    }
}

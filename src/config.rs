use crate::settings::{EditorPreferences, ReaderSettings};
use eyre::Result;
use log::warn;
use serde::de::DeserializeOwned;
use std::{
    fs,
    path::{Path, PathBuf},
};

const CONFIG_FILE: &str = "configuration.json";
const APP_NAME: &str = "quire";

#[derive(Debug, Clone)]
pub struct Config {
    pub reader: ReaderSettings,
    pub editor: EditorPreferences,
    filepath: PathBuf,
}

impl Config {
    /// Loads `configuration.json` from the app data prefix, writing the
    /// defaults there on first run.
    pub fn new() -> Result<Self> {
        let prefix = get_app_data_prefix()?;
        Self::load_from(prefix.join(CONFIG_FILE))
    }

    /// Loads configuration from a custom path; a missing file is created
    /// with defaults.
    pub fn load_from(filepath: PathBuf) -> Result<Self> {
        let mut reader = ReaderSettings::default();
        let mut editor = EditorPreferences::default();

        if filepath.exists() {
            let config_str = fs::read_to_string(&filepath)?;
            match serde_json::from_str::<serde_json::Value>(&config_str) {
                Ok(user_config) => {
                    if let Some(section) = user_config.get("Reader") {
                        reader = section_or_default(section, "Reader");
                    }
                    if let Some(section) = user_config.get("Editor") {
                        editor = section_or_default(section, "Editor");
                    }
                }
                Err(err) => warn!("Ignoring unreadable {}: {err}", filepath.display()),
            }
        } else {
            let config = Self {
                reader: reader.clone(),
                editor,
                filepath: filepath.clone(),
            };
            config.save()?;
        }

        Ok(Self {
            reader,
            editor,
            filepath,
        })
    }

    pub fn filepath(&self) -> &Path {
        &self.filepath
    }

    pub fn save(&self) -> Result<()> {
        let config_json = serde_json::json!({
            "Reader": self.reader,
            "Editor": self.editor,
        });
        let config_str = serde_json::to_string_pretty(&config_json)?;

        if let Some(parent) = self.filepath.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.filepath, config_str)?;
        Ok(())
    }
}

fn section_or_default<T: DeserializeOwned + Default>(section: &serde_json::Value, name: &str) -> T {
    serde_json::from_value(section.clone()).unwrap_or_else(|err| {
        warn!("Invalid \"{name}\" configuration, using defaults: {err}");
        T::default()
    })
}

pub fn get_app_data_prefix() -> Result<PathBuf> {
    if let Some(config_home) = std::env::var_os("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(config_home).join(APP_NAME));
    } else if let Some(home) = std::env::var_os("HOME") {
        let path = PathBuf::from(&home).join(".config").join(APP_NAME);
        if path.exists() {
            return Ok(path);
        }
        return Ok(PathBuf::from(home).join(format!(".{APP_NAME}")));
    } else if let Some(user_profile) = std::env::var_os("USERPROFILE") {
        return Ok(PathBuf::from(user_profile).join(format!(".{APP_NAME}")));
    }

    Err(eyre::eyre!("Could not determine application data directory"))
}

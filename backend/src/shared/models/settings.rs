use serde::Deserialize;
use std::{env, fs, io, path::PathBuf};

const SETTINGS_FILENAME: &str = "settings.json";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot read settings file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot parse JSON content from file {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("invalid value {value:?} for {key}")]
    InvalidOverride { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tcp_socket_binding: String,
    pub tcp_socket_port: u16,
    pub database_path: PathBuf,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tcp_socket_binding: "0.0.0.0".to_string(),
            tcp_socket_port: 3000,
            database_path: PathBuf::from("taskboard.redb"),
            log_filter: "taskboard_server=info,tower_http=info".to_string(),
        }
    }
}

impl Settings {
    /// Load `settings.json` from the working directory, falling back to the
    /// copy the build script places next to the binary, then to defaults.
    /// `HOST`, `PORT` and `DATABASE_PATH` override the file.
    pub fn load() -> Result<Settings, SettingsError> {
        let mut settings = match Self::locate() {
            Some(path) => Self::load_from(path)?,
            None => Settings::default(),
        };
        settings.apply_overrides(|key| env::var(key).ok())?;
        Ok(settings)
    }

    pub fn load_from(path: PathBuf) -> Result<Settings, SettingsError> {
        let content = fs::read_to_string(&path).map_err(|source| SettingsError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| SettingsError::Parse { path, source })
    }

    fn locate() -> Option<PathBuf> {
        let beside_binary = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(SETTINGS_FILENAME)));
        std::iter::once(PathBuf::from(SETTINGS_FILENAME))
            .chain(beside_binary)
            .find(|candidate| candidate.is_file())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), SettingsError> {
        if let Some(host) = lookup("HOST") {
            self.tcp_socket_binding = host;
        }
        if let Some(port) = lookup("PORT") {
            self.tcp_socket_port = port
                .trim()
                .parse()
                .map_err(|_| SettingsError::InvalidOverride { key: "PORT", value: port })?;
        }
        if let Some(path) = lookup("DATABASE_PATH") {
            self.database_path = PathBuf::from(path);
        }
        Ok(())
    }

    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.tcp_socket_binding, self.tcp_socket_port)
    }
}

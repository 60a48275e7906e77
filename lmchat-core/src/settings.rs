//! Persisted client setting: the inference server address.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CoreResult, RelayError};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub server_url: String,
}

/// JSON file holding [`Settings`]. Reads never fail: a missing, unreadable or
/// blank file yields the fallback address.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
    fallback_url: String,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>, fallback_url: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fallback_url: fallback_url.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Settings {
        let stored = match fs::read_to_string(&self.path) {
            Ok(s) => match serde_json::from_str::<Settings>(&s) {
                Ok(settings) => Some(settings),
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        error = %e,
                        "ignoring unreadable settings file"
                    );
                    None
                }
            },
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "no settings file");
                None
            }
        };
        stored
            .filter(|s| !s.server_url.trim().is_empty())
            .unwrap_or_else(|| Settings {
                server_url: self.fallback_url.clone(),
            })
    }

    pub fn server_url(&self) -> String {
        self.load().server_url
    }

    pub fn save(&self, settings: &Settings) -> CoreResult<()> {
        let url = settings.server_url.trim();
        if url.is_empty() {
            return Err(RelayError::Validation("server address must not be empty".into()));
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(&Settings {
            server_url: url.to_string(),
        })
        .map_err(|e| RelayError::Other(e.into()))?;
        fs::write(&self.path, body)?;
        Ok(())
    }

    /// Forget the stored address. Safe to call when nothing is stored.
    pub fn reset(&self) -> CoreResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

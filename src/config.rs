use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::fs;

use crate::error::{Error, Result};
use crate::tmux::DEFAULT_CAPTURE_LIMIT;

/// Environment variable naming the session script directory
pub const SESSIONS_ENV: &str = "TMUX_SESSIONS";

/// Environment variable selecting a tmux socket name
pub const SOCKET_ENV: &str = "TSS_TMUX_SOCKET";

const FALLBACK_EDITOR: &str = "vi";

/// On-disk settings, `<config_dir>/tss/config.json`
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ConfigFile {
    pub sessions_dir: Option<PathBuf>,
    pub tmux_socket: Option<String>,
    pub editor: Option<String>,
    pub capture_limit: Option<usize>,
}

impl ConfigFile {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("tss").join("config.json"))
    }

    /// Load the default config file; a missing file is `Ok(None)`
    pub async fn load() -> Result<Option<Self>> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path).await,
            None => Ok(None),
        }
    }

    pub async fn load_from(path: &Path) -> Result<Option<Self>> {
        let content = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(_) => return Ok(None),
        };
        let cfg = serde_json::from_str::<Self>(&content)?;
        tracing::debug!("loaded config from {}", path.display());
        Ok(Some(cfg))
    }
}

/// Settings after merging flags, environment and the config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub sessions_dir: PathBuf,
    pub tmux_socket: Option<String>,
    pub editor: String,
    pub capture_limit: usize,
}

impl Config {
    /// Flags (and their env fallbacks, already applied by clap) win over the
    /// file. The sessions directory has no default.
    pub fn resolve(
        sessions_dir: Option<PathBuf>,
        tmux_socket: Option<String>,
        file: Option<ConfigFile>,
    ) -> Result<Self> {
        let file = file.unwrap_or_default();

        let sessions_dir = sessions_dir
            .or(file.sessions_dir)
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| {
                Error::config(format!(
                    "{} is unset and no sessions_dir is configured",
                    SESSIONS_ENV
                ))
            })?;

        let capture_limit = file.capture_limit.unwrap_or(DEFAULT_CAPTURE_LIMIT);
        if capture_limit == 0 {
            return Err(Error::config("capture_limit must be greater than zero"));
        }

        let editor = std::env::var("VISUAL")
            .or_else(|_| std::env::var("EDITOR"))
            .ok()
            .filter(|e| !e.trim().is_empty())
            .or(file.editor)
            .unwrap_or_else(|| FALLBACK_EDITOR.to_string());

        Ok(Self {
            sessions_dir,
            tmux_socket: tmux_socket.or(file.tmux_socket),
            editor,
            capture_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_flag_wins_over_file() {
        let file = ConfigFile {
            sessions_dir: Some(PathBuf::from("/from/file")),
            tmux_socket: Some("filesock".to_string()),
            ..Default::default()
        };
        let cfg = Config::resolve(
            Some(PathBuf::from("/from/flag")),
            Some("flagsock".to_string()),
            Some(file),
        )
        .unwrap();
        assert_eq!(cfg.sessions_dir, PathBuf::from("/from/flag"));
        assert_eq!(cfg.tmux_socket.as_deref(), Some("flagsock"));
    }

    #[test]
    fn test_file_fills_gaps() {
        let file = ConfigFile {
            sessions_dir: Some(PathBuf::from("/from/file")),
            capture_limit: Some(1024),
            ..Default::default()
        };
        let cfg = Config::resolve(None, None, Some(file)).unwrap();
        assert_eq!(cfg.sessions_dir, PathBuf::from("/from/file"));
        assert_eq!(cfg.capture_limit, 1024);
        assert_eq!(cfg.tmux_socket, None);
    }

    #[test]
    fn test_missing_sessions_dir() {
        let err = Config::resolve(None, None, None).unwrap_err();
        assert!(err.to_string().contains(SESSIONS_ENV));
    }

    #[test]
    fn test_zero_capture_limit_rejected() {
        let file = ConfigFile {
            capture_limit: Some(0),
            ..Default::default()
        };
        assert!(Config::resolve(Some(PathBuf::from("/x")), None, Some(file)).is_err());
    }

    #[tokio::test]
    async fn test_load_from_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"sessions_dir": "/srv/sessions", "editor": "nano"}"#)
            .await
            .unwrap();

        let cfg = ConfigFile::load_from(&path).await.unwrap().unwrap();
        assert_eq!(cfg.sessions_dir, Some(PathBuf::from("/srv/sessions")));
        assert_eq!(cfg.editor.as_deref(), Some("nano"));
        assert_eq!(cfg.capture_limit, None);

        let missing = ConfigFile::load_from(&dir.path().join("nope.json")).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_load_rejects_bad_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").await.unwrap();
        assert!(matches!(
            ConfigFile::load_from(&path).await,
            Err(Error::Json(_))
        ));
    }
}

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{LAYOUT_EXT, LAYOUT_TEMPLATE, LEGACY_EXT, RESERVED_FILES, TEMPLATE_FILE};
use crate::error::{Error, Result};

/// A session script found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// tmux command file, run through `source-file`
    Layout(PathBuf),
    /// Executable shell recipe, run directly
    Executable(PathBuf),
}

impl Script {
    pub fn path(&self) -> &Path {
        match self {
            Script::Layout(p) | Script::Executable(p) => p,
        }
    }
}

/// Directory of session scripts
#[derive(Debug, Clone)]
pub struct ScriptStore {
    dir: PathBuf,
}

impl ScriptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the script for `session` is saved
    pub fn script_path(&self, session: &str) -> Result<PathBuf> {
        validate_name(session)?;
        Ok(self.dir.join(format!("{}.{}", session, LAYOUT_EXT)))
    }

    fn legacy_path(&self, session: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", session, LEGACY_EXT))
    }

    /// Names of all scripts, sorted
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::config(format!(
                    "Sessions directory does not exist: {}",
                    self.dir.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if RESERVED_FILES.contains(&file_name.as_str()) {
                continue;
            }
            let name = stem(&file_name);
            if !name.is_empty() {
                names.push(name.to_string());
            }
        }

        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Scripts whose name matches `filter`, ignoring extensions
    pub async fn list_matching(&self, filter: &str) -> Result<Vec<String>> {
        let wanted = stem(filter);
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|name| name == wanted)
            .collect())
    }

    /// Locate the script for `session`, preferring a saved layout
    pub async fn find(&self, session: &str) -> Result<Option<Script>> {
        let layout = self.script_path(session)?;
        if is_file(&layout).await {
            return Ok(Some(Script::Layout(layout)));
        }
        let legacy = self.legacy_path(session);
        if is_file(&legacy).await {
            return Ok(Some(Script::Executable(legacy)));
        }
        Ok(None)
    }

    /// Create a script for `session`.
    ///
    /// `template.conf` seeds a `<session>.conf` layout. Otherwise
    /// `template.sh` seeds an executable `<session>.sh`, since shell content
    /// cannot be fed to `source-file`. With neither, the layout starts empty.
    pub async fn create(&self, session: &str) -> Result<Script> {
        if self.find(session).await?.is_some() {
            return Err(Error::InvalidInput(format!(
                "Session script already exists: {}",
                session
            )));
        }

        let layout = self.script_path(session)?;
        if let Some(content) = read_optional(&self.dir.join(LAYOUT_TEMPLATE)).await? {
            write_new(&layout, &content).await?;
            return Ok(Script::Layout(layout));
        }
        if let Some(content) = read_optional(&self.dir.join(TEMPLATE_FILE)).await? {
            let legacy = self.legacy_path(session);
            write_new(&legacy, &content).await?;
            make_executable(&legacy).await?;
            return Ok(Script::Executable(legacy));
        }
        write_new(&layout, &[]).await?;
        Ok(Script::Layout(layout))
    }

    /// Delete the script for `session`, returning the removed path
    pub async fn remove(&self, session: &str) -> Result<PathBuf> {
        let script = self
            .find(session)
            .await?
            .ok_or_else(|| Error::SessionNotFound(session.to_string()))?;
        fs::remove_file(script.path()).await?;
        Ok(script.path().to_path_buf())
    }
}

/// Name up to the first `.`
fn stem(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_new(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(content).await?;
    file.flush().await?;
    Ok(())
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}

fn validate_name(session: &str) -> Result<()> {
    if session.is_empty()
        || session == "."
        || session == ".."
        || session.contains('/')
        || session.contains('\0')
    {
        return Err(Error::InvalidInput(format!(
            "Invalid session name: {:?}",
            session
        )));
    }
    Ok(())
}

use anyhow::{Context, Result};
use directories::BaseDirs;
use parking_lot::RwLock;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Persistence for the raw session token. No validation happens here.
pub trait TokenStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, token: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Keeps the token in a single file so it survives process restarts.
#[derive(Clone, Debug)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `<config dir>/gait/session.token`, falling back to `.gait/` when the
    /// platform has no home directory.
    pub fn default_location() -> Self {
        let dir = BaseDirs::new()
            .map(|base| base.config_dir().join("gait"))
            .unwrap_or_else(|| PathBuf::from(".gait"));
        Self::new(dir.join("session.token"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<String> {
        let contents = fs::read_to_string(&self.path).ok()?;
        let token = contents.trim();
        (!token.is_empty()).then(|| token.to_string())
    }

    fn set(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut file = open_private(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        file.write_all(token.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("failed to remove {}", self.path.display()))
            }
        }
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::File::create(path)
}

/// Process-local store. Counts writes so callers can assert on them.
#[derive(Clone, Default)]
pub struct MemoryTokenStore {
    token: Arc<RwLock<Option<String>>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let store = Self::default();
        *store.token.write() = Some(token.into());
        store
    }

    /// Number of `set` calls so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<String> {
        self.token.read().clone()
    }

    fn set(&self, token: &str) -> Result<()> {
        *self.token.write() = Some(token.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.token.write().take();
        Ok(())
    }
}

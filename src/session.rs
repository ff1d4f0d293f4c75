//! Bearer-token session storage injected into the API client.

use std::path::PathBuf;

use parking_lot::RwLock;
use tracing::{debug, warn};

/// Source of the current bearer token.
///
/// The client reads the token on every request and calls [`invalidate`]
/// when the backend rejects it; login is the only writer.
///
/// [`invalidate`]: SessionProvider::invalidate
pub trait SessionProvider: Send + Sync {
    fn token(&self) -> Option<String>;

    fn store(&self, token: &str) -> std::io::Result<()>;

    fn invalidate(&self);
}

/// Session held for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemorySession {
    token: RwLock<Option<String>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl SessionProvider for MemorySession {
    fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    fn store(&self, token: &str) -> std::io::Result<()> {
        *self.token.write() = Some(token.to_string());
        Ok(())
    }

    fn invalidate(&self) {
        self.token.write().take();
    }
}

/// Session kept in a single token file so it survives between CLI runs.
#[derive(Debug)]
pub struct FileSession {
    path: PathBuf,
    cached: RwLock<Option<String>>,
}

impl FileSession {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cached = match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let token = contents.trim().to_string();
                (!token.is_empty()).then_some(token)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read session file");
                None
            }
        };
        Self {
            path,
            cached: RwLock::new(cached),
        }
    }
}

impl SessionProvider for FileSession {
    fn token(&self) -> Option<String> {
        self.cached.read().clone()
    }

    fn store(&self, token: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, token)?;
        *self.cached.write() = Some(token.to_string());
        debug!(path = %self.path.display(), "session stored");
        Ok(())
    }

    fn invalidate(&self) {
        self.cached.write().take();
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "session file removed"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to remove session file")
            }
        }
    }
}

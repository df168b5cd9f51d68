//! # Client Instance Identity
//!
//! Every locally-originated write is tagged with the session's client
//! instance id. The push channel reflects that tag back, which is how the
//! reconciliation engine recognizes (and drops) the echo of its own writes.
//!
//! ## Usage
//!
//! ```rust
//! use chatsync::client::identity::IdentityProvider;
//!
//! let identity = IdentityProvider::ephemeral();
//! let first = identity.client_instance_id().clone();
//! assert_eq!(&first, identity.client_instance_id());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use uuid::Uuid;

/// Opaque id of one running client session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientInstanceId(String);

impl ClientInstanceId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a raw origin tag from a payload names this session
    pub fn matches(&self, origin: &str) -> bool {
        self.0 == origin
    }
}

impl fmt::Display for ClientInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientInstanceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ClientInstanceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Produces the session's [`ClientInstanceId`].
///
/// The id is created lazily on first request and then stays fixed for the
/// provider's lifetime.
#[derive(Debug)]
pub struct IdentityProvider {
    id: OnceLock<ClientInstanceId>,
    session_file: Option<PathBuf>,
}

impl IdentityProvider {
    /// Provider whose id lives only as long as the process
    pub fn ephemeral() -> Self {
        Self {
            id: OnceLock::new(),
            session_file: None,
        }
    }

    /// Provider that reuses the id stored at `path`, creating it if needed
    pub fn session_file(path: impl Into<PathBuf>) -> Self {
        Self {
            id: OnceLock::new(),
            session_file: Some(path.into()),
        }
    }

    /// Provider that always reports the given id
    pub fn fixed(id: ClientInstanceId) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(id);
        Self {
            id: cell,
            session_file: None,
        }
    }

    /// The session's id. Idempotent.
    pub fn client_instance_id(&self) -> &ClientInstanceId {
        self.id.get_or_init(|| match &self.session_file {
            Some(path) => load_or_create(path),
            None => {
                let id = ClientInstanceId::generate();
                tracing::debug!(client_id = %id, "[IDENTITY] Generated ephemeral client id");
                id
            }
        })
    }
}

impl Default for IdentityProvider {
    fn default() -> Self {
        Self::ephemeral()
    }
}

/// Platform location of the session id file
///
/// Prefers the runtime directory (cleared on logout/reboot), then the cache
/// directory.
pub fn default_session_file() -> Option<PathBuf> {
    let mut path = dirs::runtime_dir().or_else(dirs::cache_dir)?;
    path.push("chatsync");
    path.push("session-id");
    Some(path)
}

fn load_or_create(path: &Path) -> ClientInstanceId {
    match fs::read_to_string(path) {
        Ok(contents) if !contents.trim().is_empty() => {
            let id = ClientInstanceId::from(contents.trim());
            tracing::debug!(client_id = %id, path = %path.display(), "[IDENTITY] Reusing session id");
            return id;
        }
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), "[IDENTITY] Failed to read session id: {}", e);
        }
    }

    let id = ClientInstanceId::generate();
    if let Err(e) = store(path, &id) {
        tracing::warn!(
            path = %path.display(),
            "[IDENTITY] Failed to persist session id, continuing with in-memory id: {}",
            e
        );
    }
    id
}

fn store(path: &Path, id: &ClientInstanceId) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, id.as_str())
}

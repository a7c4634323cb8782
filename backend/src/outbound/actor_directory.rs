//! Actor directory loaded from a JSON file.
//!
//! The file holds SHA-256 fingerprints of bearer tokens, never the tokens
//! themselves:
//!
//! ```json
//! [
//!   {
//!     "tokenSha256": "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08",
//!     "actor": { "id": "admin-1", "role": "ADMIN", "permissions": ["AMENITY_CREATE"] }
//!   }
//! ]
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cap_std::{ambient_authority, fs::Dir};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

use crate::domain::Actor;
use crate::domain::ports::{ActorDirectory, ActorDirectoryError};

/// Failures while loading the directory file.
#[derive(Debug, Error)]
pub enum ActorDirectoryLoadError {
    /// The file could not be read.
    #[error("failed to read actor directory at {path}: {source}")]
    Read {
        /// File location.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not a valid directory document.
    #[error("failed to parse actor directory at {path}: {source}")]
    Parse {
        /// File location.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// A fingerprint is not 64 hex digits.
    #[error("entry {index} has a malformed token fingerprint")]
    Fingerprint {
        /// Zero-based entry index.
        index: usize,
    },
    /// Two entries share a fingerprint.
    #[error("entry {index} repeats an earlier token fingerprint")]
    DuplicateToken {
        /// Zero-based entry index.
        index: usize,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectoryEntry {
    token_sha256: String,
    actor: Actor,
}

/// Hex-encoded SHA-256 of `token`.
///
/// # Examples
/// ```
/// use hospitality_backend::outbound::token_fingerprint;
///
/// assert_eq!(
///     token_fingerprint("test"),
///     "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
/// );
/// ```
#[must_use]
pub fn token_fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// In-memory token table keyed by fingerprint.
#[derive(Debug, Default, Clone)]
pub struct StaticActorDirectory {
    actors: HashMap<[u8; 32], Actor>,
}

impl StaticActorDirectory {
    /// Parse a directory document.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON, malformed fingerprints or repeated tokens.
    pub fn from_json(path: &Path, contents: &str) -> Result<Self, ActorDirectoryLoadError> {
        let entries: Vec<DirectoryEntry> =
            serde_json::from_str(contents).map_err(|source| ActorDirectoryLoadError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let mut actors = HashMap::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            let mut fingerprint = [0_u8; 32];
            hex::decode_to_slice(entry.token_sha256.trim(), &mut fingerprint)
                .map_err(|_| ActorDirectoryLoadError::Fingerprint { index })?;
            if actors.insert(fingerprint, entry.actor).is_some() {
                return Err(ActorDirectoryLoadError::DuplicateToken { index });
            }
        }
        Ok(Self { actors })
    }

    /// Read and parse the directory file at `path`.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ActorDirectoryLoadError> {
        let read_error = |source| ActorDirectoryLoadError::Read {
            path: path.to_path_buf(),
            source,
        };
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let file_name = path.file_name().ok_or_else(|| {
            read_error(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "actor directory path must be a file",
            ))
        })?;
        let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(read_error)?;
        let contents = dir.read_to_string(Path::new(file_name)).map_err(read_error)?;
        let directory = Self::from_json(path, &contents)?;
        info!(path = %path.display(), actors = directory.len(), "actor directory loaded");
        Ok(directory)
    }

    /// Number of known tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    /// Whether no token is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}

#[async_trait]
impl ActorDirectory for StaticActorDirectory {
    async fn resolve(&self, token: &str) -> Result<Option<Actor>, ActorDirectoryError> {
        let fingerprint: [u8; 32] = Sha256::digest(token.as_bytes()).into();
        Ok(self.actors.get(&fingerprint).cloned())
    }
}

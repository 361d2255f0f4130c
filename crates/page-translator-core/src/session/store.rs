use serde::{Deserialize, Serialize};
use sled::Db;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

use crate::config::Lang;
use crate::error::{Error, Result};
use super::{Document, Session, TranslationLog, check_prefix};

/// Identifies a stored session: one document translated in one direction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(document_id: &str, source: &Lang, target: &Lang) -> Self {
        Self(format!("{document_id}:{source}:{target}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    page_count: usize,
    /// [`Document::content_digest`] of the pages the log was made for
    pages_digest: String,
    translations: TranslationLog,
}

/// Disk-backed session persistence using sled.
///
/// Lets a rerun of the viewer on the same file pick up at the first
/// untranslated page instead of paying for the earlier pages again.
pub struct SessionStore {
    db: Db,
}

impl SessionStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::SessionStore(format!(
                    "Failed to create session directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let db = sled::open(path).map_err(|e| {
            let err_str = e.to_string();
            if err_str.contains("WouldBlock") || err_str.contains("lock") {
                Error::SessionStore(format!(
                    "Session store locked at {}\n\n\
                    Another instance is using it, or a previous one crashed.\n\
                    To fix: rm {}/db/LOCK",
                    path.display(),
                    path.display()
                ))
            } else {
                Error::SessionStore(format!("Failed to open session store at {}: {}", path.display(), e))
            }
        })?;

        debug!("Opened session store at {}", path.display());

        Ok(Self { db })
    }

    /// Load the stored log for `document`, if any.
    ///
    /// A log recorded for other page texts (a different page count, or the
    /// same file extracted with other settings) cannot belong to this
    /// document and is reported as an invariant violation.
    pub fn load(&self, key: &SessionKey, document: &Document) -> Result<Option<TranslationLog>> {
        let Some(bytes) = self
            .db
            .get(key.as_str().as_bytes())
            .map_err(|e| Error::SessionStore(e.to_string()))?
        else {
            return Ok(None);
        };

        let stored: StoredSession = serde_json::from_slice(&bytes)
            .map_err(|e| Error::SessionStore(format!("Corrupt session {key}: {e}")))?;

        if stored.page_count != document.page_count() {
            return Err(Error::invariant(format!(
                "stored session {key} has {} pages, document has {}",
                stored.page_count,
                document.page_count()
            )));
        }
        if stored.pages_digest != document.content_digest() {
            return Err(Error::invariant(format!(
                "stored session {key} was made for different page texts"
            )));
        }
        check_prefix(document.page_count(), stored.translations.len())?;

        debug!("Restored {} translated pages for {}", stored.translations.len(), key);
        Ok(Some(stored.translations))
    }

    /// Restore the session for `document`, or start a fresh one.
    ///
    /// Unreadable entries are dropped with a warning: losing a resume point
    /// only costs a re-translation.
    pub fn restore(&self, key: &SessionKey, document: Document) -> Session {
        match self.load(key, &document) {
            Ok(Some(log)) => Session::resume(document.clone(), log).unwrap_or_else(|e| {
                warn!("Discarding stored session {}: {}", key, e);
                Session::new(document)
            }),
            Ok(None) => Session::new(document),
            Err(e) => {
                warn!("Discarding stored session {}: {}", key, e);
                if let Err(e) = self.remove(key) {
                    warn!("Failed to remove stored session {}: {}", key, e);
                }
                Session::new(document)
            }
        }
    }

    pub fn save(&self, key: &SessionKey, session: &Session) -> Result<()> {
        let stored = StoredSession {
            page_count: session.document().page_count(),
            pages_digest: session.document().content_digest(),
            translations: session.log().clone(),
        };
        let bytes = serde_json::to_vec(&stored)
            .map_err(|e| Error::SessionStore(format!("Failed to encode session: {e}")))?;

        self.db
            .insert(key.as_str().as_bytes(), bytes)
            .map_err(|e| Error::SessionStore(e.to_string()))?;

        // Flush to ensure persistence
        self.db
            .flush()
            .map_err(|e| Error::SessionStore(format!("Flush failed: {e}")))?;

        Ok(())
    }

    pub fn remove(&self, key: &SessionKey) -> Result<()> {
        self.db
            .remove(key.as_str().as_bytes())
            .map_err(|e| Error::SessionStore(e.to_string()))?;
        Ok(())
    }

    /// Drop every stored session, returning how many there were
    pub fn clear(&self) -> Result<usize> {
        let count = self.db.len();
        self.db.clear().map_err(|e| Error::SessionStore(e.to_string()))?;
        self.db
            .flush()
            .map_err(|e| Error::SessionStore(format!("Flush failed: {e}")))?;
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }
}

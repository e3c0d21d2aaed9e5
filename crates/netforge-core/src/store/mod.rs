// ── State persistence ──
//
// Full-document load/store. Every command loads the whole document once,
// mutates it in memory, and persists it with one explicit save under the
// governing lock. Intermediate states are never visible to other readers.

mod accessors;

use std::fs::File;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::CoreError;
use crate::model::{IspDocument, StateDocument};

/// A whole-document JSON store for one file.
///
/// A missing file loads as the default (empty) document -- that is the
/// normal bootstrap path. A file that exists but does not parse is a fatal
/// error: silently reinitializing it would orphan live OS resources.
pub struct DocStore<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

pub type StateStore = DocStore<StateDocument>;
pub type IspStore = DocStore<IspDocument>;

impl<T: Serialize + DeserializeOwned + Default> DocStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<T, CoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(T::default());
            }
            Err(source) => {
                return Err(CoreError::StateRead {
                    path: self.path.display().to_string(),
                    source,
                });
            }
        };

        serde_json::from_str(&raw).map_err(|source| CoreError::StateMalformed {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Serialize, write, flush, fsync, then re-read to confirm the document
    /// on disk is what the next process will successfully parse.
    pub fn save(&self, doc: &T) -> Result<(), CoreError> {
        debug!("writing state to {}", self.path.display());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| CoreError::StateWrite {
                path: self.path.display().to_string(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(doc).map_err(|source| {
            CoreError::StateMalformed {
                path: self.path.display().to_string(),
                source,
            }
        })?;

        let write = |path: &Path| -> std::io::Result<()> {
            let mut file = File::create(path)?;
            file.write_all(json.as_bytes())?;
            file.flush()?;
            file.sync_all()
        };
        write(&self.path).map_err(|source| CoreError::StateWrite {
            path: self.path.display().to_string(),
            source,
        })?;

        self.load().map(|_| ())
    }

    /// Remove the backing file; absent is fine.
    pub fn delete_file(&self) -> Result<(), CoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CoreError::StateWrite {
                path: self.path.display().to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{Node, NodeType};

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = StateStore::new(dir.path().join("t.json"));
        let doc = store.load().expect("load");
        assert!(doc.is_empty());
    }

    #[test]
    fn save_and_reload_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = StateStore::new(dir.path().join("t.json"));

        let mut doc = StateDocument::default();
        doc.node.insert("n1".into(), Node::new(NodeType::Ap));
        store.save(&doc).expect("save");

        let reloaded = store.load().expect("reload");
        assert_eq!(reloaded.node_ids(), vec!["n1"]);
        assert_eq!(reloaded.node("n1").expect("n1").node_type, NodeType::Ap);
    }

    #[test]
    fn malformed_file_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("t.json");
        std::fs::write(&path, "{ not json").expect("write");

        let store = StateStore::new(&path);
        assert!(matches!(
            store.load(),
            Err(CoreError::StateMalformed { .. })
        ));
    }
}

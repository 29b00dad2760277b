//! Persisted per-user run counter.
//!
//! Generated observation IDs end in a run index. When the configuration
//! does not fix one, the next index for the user's token is read from
//! `.obsflow-runs.json` in the output root and the counter is bumped.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ids::{rnd_token, USER_TOKEN_LEN};
use crate::metadata::{atomic_write, MetaError, MetaResult};

/// Counter file name under the output root.
pub const RUN_INDEX_FILE: &str = ".obsflow-runs.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RunIndexState {
    version: u32,
    /// Next index per user token.
    next: BTreeMap<String, u64>,
}

impl Default for RunIndexState {
    fn default() -> Self {
        Self {
            version: 1,
            next: BTreeMap::new(),
        }
    }
}

/// Run counters keyed by user token.
#[derive(Debug)]
pub struct RunIndexStore {
    path: PathBuf,
    state: RunIndexState,
}

impl RunIndexStore {
    /// Open the counter file in `output_root`. A missing file starts every
    /// counter at 0; an unreadable or malformed one is an error.
    pub fn open(output_root: &Path) -> MetaResult<Self> {
        let path = output_root.join(RUN_INDEX_FILE);

        let state = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<RunIndexState>(&content)
                .map_err(|e| MetaError::io("parsing run counter", &path, e.into()))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => RunIndexState::default(),
            Err(e) => return Err(MetaError::io("reading run counter", &path, e)),
        };

        Ok(Self { path, state })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the next index for `seed` and persist the bumped counter.
    pub fn next_index(&mut self, seed: Option<&str>) -> MetaResult<u64> {
        let key = Self::key(seed);
        let index = self.state.next.get(&key).copied().unwrap_or(0);
        self.state.next.insert(key, index + 1);
        self.save()?;
        tracing::debug!("Allocated run index {}", index);
        Ok(index)
    }

    fn save(&self) -> MetaResult<()> {
        let json = serde_json::to_string_pretty(&self.state)?;
        atomic_write(&self.path, json.as_bytes())
    }

    fn key(seed: Option<&str>) -> String {
        rnd_token(seed, USER_TOKEN_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn counters_start_at_zero_and_persist() {
        let dir = tempdir().unwrap();

        let mut store = RunIndexStore::open(dir.path()).unwrap();
        assert_eq!(store.next_index(Some("alice")).unwrap(), 0);
        assert_eq!(store.next_index(Some("alice")).unwrap(), 1);
        assert_eq!(store.next_index(Some("bob")).unwrap(), 0);

        let mut reopened = RunIndexStore::open(dir.path()).unwrap();
        assert_eq!(reopened.next_index(Some("alice")).unwrap(), 2);
        assert_eq!(reopened.next_index(Some("bob")).unwrap(), 1);
        assert_eq!(reopened.next_index(None).unwrap(), 0);
    }

    #[test]
    fn user_names_are_not_stored() {
        let dir = tempdir().unwrap();
        let mut store = RunIndexStore::open(dir.path()).unwrap();
        store.next_index(Some("alice")).unwrap();

        let content = fs::read_to_string(store.path()).unwrap();
        assert!(!content.contains("alice"));
    }

    #[test]
    fn malformed_counter_file_is_an_error() {
        let dir = tempdir().unwrap();
        let mut store = RunIndexStore::open(dir.path()).unwrap();
        for _ in 0..3 {
            store.next_index(Some("alice")).unwrap();
        }

        let path = dir.path().join(RUN_INDEX_FILE);
        fs::write(&path, r#"{"version":1,"next":{"#).unwrap();

        let err = RunIndexStore::open(dir.path()).unwrap_err();
        assert!(matches!(err, MetaError::Io { .. }));
        assert!(err.to_string().contains(RUN_INDEX_FILE));
        // The damaged file is left for inspection.
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            r#"{"version":1,"next":{"#
        );
    }

    #[test]
    fn counter_path_that_is_a_directory_is_an_error() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(RUN_INDEX_FILE)).unwrap();

        assert!(RunIndexStore::open(dir.path()).is_err());
    }
}

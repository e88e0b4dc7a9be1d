//! Persisted window positions.
//!
//! One JSON document maps identity keys (see [`ident`]) to saved
//! rectangles. The store is deliberately simple: every mutation is a full
//! load-modify-save cycle under one mutex, and the save is made durable by
//! writing a temp file and renaming it over the real one — a crash can
//! lose the in-flight write but never corrupt the previous state.

pub mod ident;

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// File name of the persisted document inside the storage directory.
const STORE_FILE: &str = "positions.json";

/// A saved window rectangle. `x`/`y` may be negative (monitors left of or
/// above the primary origin); `width`/`height` are always positive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPosition {
    /// Left edge in screen coordinates.
    pub x: i32,
    /// Top edge in screen coordinates.
    pub y: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

/// Errors surfaced by the store.
#[derive(Error, Debug)]
pub enum Error {
    /// No per-user configuration directory could be resolved.
    #[error("no configuration directory available for this user")]
    NoStorageDir,

    /// Reading or writing the document failed.
    #[error("position store I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The document exists but is not valid JSON.
    #[error("position store is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Rejected a save with a non-positive width or height.
    #[error("invalid window size {width}x{height}")]
    InvalidSize {
        /// Offending width.
        width: i32,
        /// Offending height.
        height: i32,
    },
}

/// Convenience alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The persisted identity→position map.
///
/// All operations serialize through one mutex, so writers never
/// interleave; concurrent writers are last-writer-wins at identity
/// granularity by design.
pub struct PositionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl PositionStore {
    /// Open the per-user store (`<config dir>/winpin/positions.json`),
    /// creating the directory if needed. The document itself is created
    /// lazily on first save.
    pub fn open() -> Result<Self> {
        let dir = dirs::config_dir().ok_or(Error::NoStorageDir)?.join("winpin");
        Self::open_in(dir)
    }

    /// Open a store rooted at an explicit directory.
    pub fn open_in(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let path = dir.join(STORE_FILE);
        debug!(path = %path.display(), "position store ready");
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    /// Path of the persisted document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or replace the position for `key`, persisted synchronously
    /// before returning.
    pub fn save(&self, key: &str, pos: SavedPosition) -> Result<()> {
        if pos.width <= 0 || pos.height <= 0 {
            return Err(Error::InvalidSize {
                width: pos.width,
                height: pos.height,
            });
        }
        let _guard = self.lock.lock();
        let mut map = self.load_all()?;
        map.insert(key.to_string(), pos);
        self.store_all(&map)
    }

    /// Look up the position saved for `key`.
    pub fn load(&self, key: &str) -> Result<Option<SavedPosition>> {
        let _guard = self.lock.lock();
        Ok(self.load_all()?.remove(key))
    }

    /// Remove the entry for `key`. Removing an absent key is not an
    /// error — the resulting state is what was asked for.
    pub fn delete(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut map = self.load_all()?;
        map.remove(key);
        self.store_all(&map)
    }

    /// The full persisted map.
    pub fn list(&self) -> Result<BTreeMap<String, SavedPosition>> {
        let _guard = self.lock.lock();
        self.load_all()
    }

    /// Read the whole document; a missing file is the empty map.
    fn load_all(&self) -> Result<BTreeMap<String, SavedPosition>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_slice(&data)?)
    }

    /// Write the whole document: temp file first, then an atomic rename
    /// over the previous state.
    fn store_all(&self, map: &BTreeMap<String, SavedPosition>) -> Result<()> {
        let data = serde_json::to_vec_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, PositionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = PositionStore::open_in(dir.path().join("winpin")).unwrap();
        (dir, store)
    }

    #[test]
    fn save_load_round_trips_negative_coordinates() {
        let (_dir, store) = store();
        let pos = SavedPosition {
            x: -1920,
            y: -64,
            width: 1280,
            height: 720,
        };
        store.save("left-monitor", pos).unwrap();
        assert_eq!(store.load("left-monitor").unwrap(), Some(pos));
    }

    #[test]
    fn missing_key_loads_as_none() {
        let (_dir, store) = store();
        assert_eq!(store.load("nope").unwrap(), None);
    }

    #[test]
    fn non_positive_sizes_are_rejected() {
        let (_dir, store) = store();
        let bad = SavedPosition {
            x: 0,
            y: 0,
            width: 0,
            height: 600,
        };
        assert!(matches!(
            store.save("k", bad),
            Err(Error::InvalidSize { width: 0, .. })
        ));
        // Nothing was persisted.
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn save_list_delete_scenario() {
        let (_dir, store) = store();
        let key = "A|B|C|0x00000000|0x00000000";
        let pos = SavedPosition {
            x: 100,
            y: 100,
            width: 800,
            height: 600,
        };

        assert!(store.list().unwrap().is_empty());
        store.save(key, pos).unwrap();

        let all = store.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all.get(key), Some(&pos));

        store.delete(key).unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn document_is_created_lazily() {
        let (_dir, store) = store();
        assert!(!store.path().exists());
        store
            .save(
                "k",
                SavedPosition {
                    x: 1,
                    y: 2,
                    width: 3,
                    height: 4,
                },
            )
            .unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn stale_temp_file_never_corrupts_persisted_state() {
        let (_dir, store) = store();
        let pos = SavedPosition {
            x: 10,
            y: 20,
            width: 300,
            height: 200,
        };
        store.save("keep", pos).unwrap();

        // An interrupted writer leaves a truncated temp file behind; the
        // renamed document must be unaffected on the next load.
        fs::write(store.path().with_extension("json.tmp"), b"{\"trunc").unwrap();
        assert_eq!(store.load("keep").unwrap(), Some(pos));

        // The next save replaces the stale temp file and still succeeds.
        store.save("other", pos).unwrap();
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn corrupt_document_surfaces_as_json_error() {
        let (_dir, store) = store();
        fs::write(store.path(), b"not json").unwrap();
        assert!(matches!(store.list(), Err(Error::Json(_))));
    }

    #[test]
    fn document_is_pretty_printed_utf8() {
        let (_dir, store) = store();
        store
            .save(
                "Übersicht|Class|exe|0x00000000|0x00000000",
                SavedPosition {
                    x: 5,
                    y: 6,
                    width: 700,
                    height: 500,
                },
            )
            .unwrap();
        let text = fs::read_to_string(store.path()).unwrap();
        assert!(text.contains('\n'), "expected pretty-printed output");
        assert!(text.contains("Übersicht"));
    }
}

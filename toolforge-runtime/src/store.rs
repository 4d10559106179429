use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{DeployError, Result};

/// Resolve the state directory from `TOOLFORGE_STATE_DIR` env var,
/// defaulting to `./toolforge-state`.
///
/// Creates the directory with restrictive permissions (0o700) if it doesn't exist.
pub fn state_dir() -> PathBuf {
    let dir = std::env::var("TOOLFORGE_STATE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("toolforge-state"));

    if !dir.exists() {
        std::fs::create_dir_all(&dir).ok();
        // Restrict directory permissions: only owner can read/write/traverse.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700)).ok();
        }
    }

    dir
}

/// JSON-file-backed keyed store. The whole map is held in memory and written
/// back atomically (tmp file + rename) on every mutation.
pub struct PersistentStore<V> {
    path: PathBuf,
    map: Mutex<HashMap<String, V>>,
}

impl<V> PersistentStore<V>
where
    V: serde::Serialize + serde::de::DeserializeOwned + Clone,
{
    pub fn open(path: PathBuf) -> Result<Self> {
        let map = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .map_err(|err| DeployError::Storage(format!("read {}: {err}", path.display())))?;
            serde_json::from_str(&raw)
                .map_err(|err| DeployError::Storage(format!("parse {}: {err}", path.display())))?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            map: Mutex::new(map),
        })
    }

    fn persist(&self, map: &HashMap<String, V>) -> Result<()> {
        let raw = serde_json::to_string_pretty(map)
            .map_err(|err| DeployError::Storage(format!("serialize store: {err}")))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, raw)
            .map_err(|err| DeployError::Storage(format!("write {}: {err}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|err| DeployError::Storage(format!("rename {}: {err}", tmp.display())))
    }

    pub fn get(&self, key: &str) -> Result<Option<V>> {
        Ok(self.map.lock().unwrap().get(key).cloned())
    }

    pub fn find<F>(&self, predicate: F) -> Result<Option<V>>
    where
        F: Fn(&V) -> bool,
    {
        Ok(self
            .map
            .lock()
            .unwrap()
            .values()
            .find(|v| predicate(v))
            .cloned())
    }

    pub fn values(&self) -> Result<Vec<V>> {
        Ok(self.map.lock().unwrap().values().cloned().collect())
    }

    pub fn insert(&self, key: String, value: V) -> Result<()> {
        let mut map = self.map.lock().unwrap();
        map.insert(key, value);
        self.persist(&map)
    }

    pub fn remove(&self, key: &str) -> Result<Option<V>> {
        let mut map = self.map.lock().unwrap();
        let removed = map.remove(key);
        if removed.is_some() {
            self.persist(&map)?;
        }
        Ok(removed)
    }

    /// Apply `f` to the value under `key`, if present. Returns whether a
    /// value was updated.
    pub fn update<F>(&self, key: &str, f: F) -> Result<bool>
    where
        F: FnOnce(&mut V),
    {
        let mut map = self.map.lock().unwrap();
        match map.get_mut(key) {
            Some(value) => {
                f(value);
                self.persist(&map)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

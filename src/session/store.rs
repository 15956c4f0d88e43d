use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use log::{debug, info};

use super::error::SessionStoreError;
use super::types::{session_key, ConversationId};

type Bindings = BTreeMap<String, String>;

/// Durable `(provider, conversation) -> session token` map.
///
/// The in-memory map is authoritative; every mutation rewrites the backing
/// JSON file in full before the lock is released.
pub struct SessionStore {
    path: PathBuf,
    bindings: Mutex<Bindings>,
}

impl SessionStore {
    /// Loads the store at `path`, creating an empty file when none exists.
    pub fn load(path: &Path) -> Result<Self, SessionStoreError> {
        let path = path.to_path_buf();

        let bindings = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => Bindings::new(),
            Ok(content) => serde_json::from_str::<Option<Bindings>>(&content)
                .map_err(|source| SessionStoreError::Parse {
                    path: path.clone(),
                    source,
                })?
                .unwrap_or_default(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let empty = Bindings::new();
                write_bindings(&path, &empty)?;
                empty
            }
            Err(e) => return Err(SessionStoreError::io("reading session store", &path, e)),
        };

        info!(
            "session store loaded path={} bindings={}",
            path.display(),
            bindings.len()
        );

        Ok(Self {
            path,
            bindings: Mutex::new(bindings),
        })
    }

    pub fn get(&self, provider: &str, conversation: &ConversationId) -> Option<String> {
        self.lock()
            .get(&session_key(provider, conversation))
            .cloned()
    }

    /// Binds `token`. The in-memory value is updated even when persisting fails;
    /// the error is returned so the caller can report it.
    pub fn set(
        &self,
        provider: &str,
        conversation: &ConversationId,
        token: &str,
    ) -> Result<(), SessionStoreError> {
        let key = session_key(provider, conversation);
        let mut bindings = self.lock();
        bindings.insert(key.clone(), token.to_string());
        debug!("session bound key={} token={}", key, token);
        write_bindings(&self.path, &bindings)
    }

    pub fn clear(
        &self,
        provider: &str,
        conversation: &ConversationId,
    ) -> Result<(), SessionStoreError> {
        let key = session_key(provider, conversation);
        let mut bindings = self.lock();
        bindings.remove(&key);
        debug!("session cleared key={}", key);
        write_bindings(&self.path, &bindings)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Bindings> {
        self.bindings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Writes via a sibling temp file, fsync and rename so readers never observe a
/// half-written store.
fn write_bindings(path: &Path, bindings: &Bindings) -> Result<(), SessionStoreError> {
    let content =
        serde_json::to_string_pretty(bindings).map_err(|source| SessionStoreError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;

    let tmp_path = temp_path_for(path);
    let mut tmp_file = File::create(&tmp_path)
        .map_err(|e| SessionStoreError::io("creating temp session store", &tmp_path, e))?;
    tmp_file
        .write_all(content.as_bytes())
        .map_err(|e| SessionStoreError::io("writing temp session store", &tmp_path, e))?;
    tmp_file
        .sync_all()
        .map_err(|e| SessionStoreError::io("syncing temp session store", &tmp_path, e))?;
    drop(tmp_file);

    fs::rename(&tmp_path, path)
        .map_err(|e| SessionStoreError::io("replacing session store", path, e))
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "sessions.json".to_string());
    path.with_file_name(format!(".{}.tmp", file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn store_path(dir: &TempDir) -> PathBuf {
        dir.path().join("sessions.json")
    }

    #[test]
    fn test_load_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);

        let store = SessionStore::load(&path).unwrap();

        assert!(store.is_empty());
        assert!(path.exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn test_load_whitespace_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);
        fs::write(&path, "  \n\t").unwrap();

        let store = SessionStore::load(&path).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_json_null_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);
        fs::write(&path, "null").unwrap();

        assert!(SessionStore::load(&path).unwrap().is_empty());
    }

    #[test]
    fn test_load_malformed_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);
        fs::write(&path, "{not json").unwrap();

        let result = SessionStore::load(&path);
        assert!(matches!(result, Err(SessionStoreError::Parse { .. })));
    }

    #[test]
    fn test_round_trip_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);
        let chat = ConversationId::from(42);

        let store = SessionStore::load(&path).unwrap();
        store.set("codex", &chat, "sid-42").unwrap();
        assert_eq!(store.get("codex", &chat).as_deref(), Some("sid-42"));
        drop(store);

        let reloaded = SessionStore::load(&path).unwrap();
        assert_eq!(reloaded.get("codex", &chat).as_deref(), Some("sid-42"));
    }

    #[test]
    fn test_persisted_layout_is_flat_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);

        let store = SessionStore::load(&path).unwrap();
        store.set("Codex", &ConversationId::from(1), "a").unwrap();
        store.set("generic", &ConversationId::from(2), "b").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\n  \"codex:1\": \"a\",\n  \"generic:2\": \"b\"\n}");
    }

    #[test]
    fn test_set_overwrites_existing_binding() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::load(&store_path(&dir)).unwrap();
        let chat = ConversationId::from(7);

        store.set("codex", &chat, "first").unwrap();
        store.set("codex", &chat, "second").unwrap();

        assert_eq!(store.get("codex", &chat).as_deref(), Some("second"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_provider_is_case_folded_and_defaulted() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::load(&store_path(&dir)).unwrap();
        let chat = ConversationId::from(5);

        store.set("", &chat, "tok").unwrap();

        assert_eq!(store.get("CODEX", &chat).as_deref(), Some("tok"));
        assert_eq!(store.get("generic", &chat), None);
    }

    #[test]
    fn test_clear_removes_binding_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);
        let chat = ConversationId::from(9);

        let store = SessionStore::load(&path).unwrap();
        store.set("codex", &chat, "tok").unwrap();
        store.clear("codex", &chat).unwrap();
        assert_eq!(store.get("codex", &chat), None);

        let reloaded = SessionStore::load(&path).unwrap();
        assert!(reloaded.is_empty());
    }

    #[test]
    fn test_persist_failure_still_updates_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("sessions.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let store = SessionStore::load(&path).unwrap();

        fs::remove_dir_all(path.parent().unwrap()).unwrap();

        let chat = ConversationId::from(3);
        let result = store.set("codex", &chat, "kept");
        assert!(matches!(result, Err(SessionStoreError::Io { .. })));
        assert_eq!(store.get("codex", &chat).as_deref(), Some("kept"));
    }

    #[test]
    fn test_concurrent_writers_across_conversations() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);
        let store = Arc::new(SessionStore::load(&path).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let chat = ConversationId::from(i as i64);
                    store.set("codex", &chat, &format!("tok-{}", i)).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let reloaded = SessionStore::load(&path).unwrap();
        assert_eq!(reloaded.len(), 8);
        assert_eq!(
            reloaded.get("codex", &ConversationId::from(3)).as_deref(),
            Some("tok-3")
        );
    }
}

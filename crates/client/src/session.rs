//! Persisted client state.
//!
//! [`SessionStore`] is the one place identity and preferences live: the auth
//! token, the cached user, the guest session id, the last selected store, the
//! sound preference and the last cart snapshot. Every component that needs
//! identity receives a clone of the store instead of reading globals.
//!
//! Every read goes back to the backing [`Storage`]. Another process sharing the
//! same profile may have changed it since the last call; last write wins.
//! A value that fails to parse is treated as absent.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use bento_core::{Cart, CartItemId, StoreId, User};
use secrecy::SecretString;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

/// Storage keys.
pub mod keys {
    pub const AUTH_TOKEN: &str = "authToken";
    pub const CURRENT_USER: &str = "currentUser";
    pub const SOUND_ENABLED: &str = "notificationSoundEnabled";
    pub const SELECTED_STORE: &str = "selectedStoreId";
    pub const GUEST_SESSION: &str = "guestSessionId";
    pub const CART_SNAPSHOT: &str = "cartSnapshot";
    pub const MIGRATED_LINES: &str = "migratedGuestLines";

    /// Keys removed by a full clear (logout or expired session).
    pub const IDENTITY: &[&str] = &[AUTH_TOKEN, CURRENT_USER, CART_SNAPSHOT];
}

/// Errors from the backing storage.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session storage I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("session value could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A key/value backend for [`SessionStore`].
pub trait Storage: Send + Sync {
    /// Read one value. `Ok(None)` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the backing medium cannot be read.
    fn read(&self, key: &str) -> Result<Option<Value>, SessionError>;

    /// Write one value.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the backing medium cannot be written.
    fn write(&self, key: &str, value: Value) -> Result<(), SessionError>;

    /// Remove the given keys in one step.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the backing medium cannot be written.
    fn remove(&self, keys: &[&str]) -> Result<(), SessionError>;
}

/// A JSON object file, re-read on every access.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SessionError {
        SessionError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn load(&self) -> Result<Map<String, Value>, SessionError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) | Err(_) => {
                warn!(path = %self.path.display(), "Session file is malformed, treating as empty");
                Ok(Map::new())
            }
        }
    }

    /// Write through a temporary file and rename so readers never see a partial file.
    fn store(&self, map: &Map<String, Value>) -> Result<(), SessionError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;
        }
        let bytes = serde_json::to_vec_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<Value>, SessionError> {
        Ok(self.load()?.remove(key))
    }

    fn write(&self, key: &str, value: Value) -> Result<(), SessionError> {
        let mut map = self.load()?;
        map.insert(key.to_string(), value);
        self.store(&map)
    }

    fn remove(&self, keys: &[&str]) -> Result<(), SessionError> {
        let mut map = self.load()?;
        let before = map.len();
        for key in keys {
            map.remove(*key);
        }
        if map.len() == before {
            return Ok(());
        }
        self.store(&map)
    }
}

/// In-process storage for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<Value>, SessionError> {
        Ok(self.values().get(key).cloned())
    }

    fn write(&self, key: &str, value: Value) -> Result<(), SessionError> {
        self.values().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, keys: &[&str]) -> Result<(), SessionError> {
        let mut values = self.values();
        for key in keys {
            values.remove(*key);
        }
        Ok(())
    }
}

/// Shared handle to the persisted client state.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn Storage>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    pub fn new(storage: impl Storage + 'static) -> Self {
        Self {
            storage: Arc::new(storage),
        }
    }

    /// A store backed by the JSON file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(FileStorage::new(path))
    }

    /// A store that lives only as long as this process.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    /// Read a raw value. Storage failures are logged and read as absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.storage.read(key) {
            Ok(value) => value.filter(|v| !v.is_null()),
            Err(e) => {
                warn!(key, error = %e, "Failed to read session value");
                None
            }
        }
    }

    /// Write a raw value.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the value cannot be persisted.
    pub fn set(&self, key: &str, value: Value) -> Result<(), SessionError> {
        self.storage.write(key, value)
    }

    /// Remove the given keys, or the identity keys when `keys` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the removal cannot be persisted.
    pub fn clear(&self, keys: Option<&[&str]>) -> Result<(), SessionError> {
        self.storage.remove(keys.unwrap_or(keys::IDENTITY))
    }

    fn get_typed<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(key, error = %e, "Ignoring malformed session value");
                None
            }
        }
    }

    fn set_typed<T: Serialize>(&self, key: &str, value: &T) -> Result<(), SessionError> {
        self.set(key, serde_json::to_value(value)?)
    }

    // =========================================================================
    // Identity
    // =========================================================================

    #[must_use]
    pub fn auth_token(&self) -> Option<SecretString> {
        self.get_typed::<String>(keys::AUTH_TOKEN)
            .filter(|t| !t.is_empty())
            .map(SecretString::from)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.auth_token().is_some()
    }

    /// Persist the token and user from a login response.
    ///
    /// Either both are stored or neither is: if the user cannot be written
    /// the token is removed again.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if either value cannot be persisted.
    pub fn sign_in(&self, token: &SecretString, user: &User) -> Result<(), SessionError> {
        use secrecy::ExposeSecret;

        self.set(keys::AUTH_TOKEN, Value::String(token.expose_secret().to_string()))?;
        if let Err(e) = self.set_typed(keys::CURRENT_USER, user) {
            if let Err(undo) = self.storage.remove(&[keys::AUTH_TOKEN]) {
                warn!(error = %undo, "Failed to roll back auth token");
            }
            return Err(e);
        }
        Ok(())
    }

    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.get_typed(keys::CURRENT_USER)
    }

    /// Replace the cached user.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the value cannot be persisted.
    pub fn set_current_user(&self, user: &User) -> Result<(), SessionError> {
        self.set_typed(keys::CURRENT_USER, user)
    }

    // =========================================================================
    // Guest session and store selection
    // =========================================================================

    #[must_use]
    pub fn guest_session_id(&self) -> Option<String> {
        self.get_typed::<String>(keys::GUEST_SESSION)
            .filter(|s| !s.is_empty())
    }

    /// Remember the guest session id sent as a cookie on every request.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the value cannot be persisted.
    pub fn set_guest_session_id(&self, id: &str) -> Result<(), SessionError> {
        self.set(keys::GUEST_SESSION, Value::String(id.to_string()))
    }

    #[must_use]
    pub fn selected_store(&self) -> Option<StoreId> {
        self.get_typed(keys::SELECTED_STORE)
    }

    /// Remember the last selected store.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the value cannot be persisted.
    pub fn set_selected_store(&self, store_id: StoreId) -> Result<(), SessionError> {
        self.set_typed(keys::SELECTED_STORE, &store_id)
    }

    // =========================================================================
    // Preferences and snapshots
    // =========================================================================

    /// Whether new-order sounds are enabled. Defaults to `true`.
    #[must_use]
    pub fn sound_enabled(&self) -> bool {
        self.get_typed(keys::SOUND_ENABLED).unwrap_or(true)
    }

    /// Persist the sound preference.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the value cannot be persisted.
    pub fn set_sound_enabled(&self, enabled: bool) -> Result<(), SessionError> {
        self.set(keys::SOUND_ENABLED, Value::Bool(enabled))
    }

    #[must_use]
    pub fn cart_snapshot(&self) -> Option<Cart> {
        self.get_typed(keys::CART_SNAPSHOT)
    }

    /// Persist the last confirmed cart.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the value cannot be persisted.
    pub fn set_cart_snapshot(&self, cart: &Cart) -> Result<(), SessionError> {
        self.set_typed(keys::CART_SNAPSHOT, cart)
    }

    // =========================================================================
    // Migration progress
    // =========================================================================

    /// Guest cart lines already copied into the user cart whose guest copy
    /// may still exist.
    #[must_use]
    pub fn migrated_guest_lines(&self) -> Vec<CartItemId> {
        self.get_typed(keys::MIGRATED_LINES).unwrap_or_default()
    }

    /// Record that a guest line has been copied into the user cart.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the value cannot be persisted.
    pub fn record_migrated_guest_line(&self, id: CartItemId) -> Result<(), SessionError> {
        let mut lines = self.migrated_guest_lines();
        if !lines.contains(&id) {
            lines.push(id);
        }
        self.set_typed(keys::MIGRATED_LINES, &lines)
    }

    /// Forget all recorded guest lines.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the removal cannot be persisted.
    pub fn forget_migrated_guest_lines(&self) -> Result<(), SessionError> {
        self.storage.remove(&[keys::MIGRATED_LINES])
    }
}

#[cfg(test)]
mod tests {
    use bento_core::{CartKind, Role, UserId};
    use secrecy::ExposeSecret;

    use super::*;

    fn user() -> User {
        User {
            id: UserId::new(1),
            username: "customer1".to_string(),
            full_name: Some("Hanako Yamada".to_string()),
            role: Role::Customer,
            store_id: None,
            roles: Vec::new(),
        }
    }

    #[test]
    fn test_clear_removes_identity_but_keeps_preferences() {
        let store = SessionStore::in_memory();
        store
            .sign_in(&SecretString::from("token-1"), &user())
            .expect("sign in");
        store
            .set_cart_snapshot(&Cart::empty(CartKind::User))
            .expect("snapshot");
        store.set_sound_enabled(false).expect("pref");

        store.clear(None).expect("clear");

        assert!(store.auth_token().is_none());
        assert!(store.current_user().is_none());
        assert!(store.cart_snapshot().is_none());
        assert!(!store.sound_enabled());
    }

    /// Accepts every write except the cached user.
    #[derive(Debug, Default)]
    struct UserWriteFails(MemoryStorage);

    impl Storage for UserWriteFails {
        fn read(&self, key: &str) -> Result<Option<Value>, SessionError> {
            self.0.read(key)
        }

        fn write(&self, key: &str, value: Value) -> Result<(), SessionError> {
            if key == keys::CURRENT_USER {
                return Err(SessionError::Io {
                    path: PathBuf::from("session.json"),
                    source: std::io::Error::other("disk full"),
                });
            }
            self.0.write(key, value)
        }

        fn remove(&self, keys: &[&str]) -> Result<(), SessionError> {
            self.0.remove(keys)
        }
    }

    #[test]
    fn test_sign_in_leaves_no_token_when_user_write_fails() {
        let store = SessionStore::new(UserWriteFails::default());

        let result = store.sign_in(&SecretString::from("token-1"), &user());

        assert!(matches!(result, Err(SessionError::Io { .. })));
        assert!(store.auth_token().is_none());
        assert!(store.current_user().is_none());
    }

    #[test]
    fn test_migrated_guest_lines_are_recorded_once() {
        let store = SessionStore::in_memory();
        assert!(store.migrated_guest_lines().is_empty());

        store.record_migrated_guest_line(CartItemId::new(4)).expect("write");
        store.record_migrated_guest_line(CartItemId::new(4)).expect("write");
        store.record_migrated_guest_line(CartItemId::new(7)).expect("write");
        assert_eq!(
            store.migrated_guest_lines(),
            vec![CartItemId::new(4), CartItemId::new(7)]
        );

        store.forget_migrated_guest_lines().expect("remove");
        assert!(store.migrated_guest_lines().is_empty());
    }

    #[test]
    fn test_sound_defaults_to_enabled() {
        assert!(SessionStore::in_memory().sound_enabled());
    }

    #[test]
    fn test_file_reads_see_external_writes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        let first = SessionStore::open(&path);
        let second = SessionStore::open(&path);

        first
            .sign_in(&SecretString::from("token-a"), &user())
            .expect("sign in");
        let token = second.auth_token().expect("visible to second handle");
        assert_eq!(token.expose_secret(), "token-a");

        second.clear(None).expect("clear");
        assert!(!first.is_authenticated());
    }

    #[test]
    fn test_malformed_file_reads_as_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        fs::write(&path, b"{not json").expect("write");

        let store = SessionStore::open(&path);
        assert!(store.auth_token().is_none());

        // Writing recovers the file.
        store.set_selected_store(StoreId::new(3)).expect("write");
        assert_eq!(store.selected_store(), Some(StoreId::new(3)));
    }

    #[test]
    fn test_malformed_value_reads_as_absent() {
        let store = SessionStore::in_memory();
        store
            .set(keys::CURRENT_USER, Value::String("not a user".to_string()))
            .expect("write");
        store
            .set(keys::SOUND_ENABLED, Value::String("yes".to_string()))
            .expect("write");

        assert!(store.current_user().is_none());
        assert!(store.sound_enabled());
    }

    #[test]
    fn test_file_is_created_in_missing_profile_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("profile").join("session.json");
        let store = SessionStore::open(&path);
        store.set_guest_session_id("guest-123").expect("write");
        assert!(path.exists());
        assert_eq!(store.guest_session_id().as_deref(), Some("guest-123"));
    }
}

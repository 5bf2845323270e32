//! # Persistent Storage
//!
//! Key/value backends plus the [`ProfileStore`] built on them.
//!
//! `FileBackend` keeps one file per key and never writes in place: contents go
//! to a temp file in the same directory, are synced, then renamed over the
//! target. A reader sees either the previous complete file or the new one.
//!
//! ## Usage
//! ```rust,ignore
//! let store = ProfileStore::new(FileBackend::new("./data")?);
//! match store.load() {
//!     Ok(profile) => { /* ready */ }
//!     Err(e) if e.kind() == ErrorKind::ProfileNotFound => { /* onboard */ }
//!     Err(e) => return Err(e),
//! }
//! ```

use crate::error::{self, Error, ErrorKind, Result};
use crate::profile::Profile;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

pub const PROFILE_KEY: &str = "profile";
pub const HISTORY_KEY: &str = "history";

/// Storage backend trait
pub trait StoreBackend: Send + Sync {
    /// Read the full contents stored under `key`, `None` if absent
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replace the contents under `key`. Atomic for durable backends.
    fn write(&self, key: &str, contents: &str) -> Result<()>;

    /// Remove `key`; absent keys are not an error
    fn remove(&self, key: &str) -> Result<()>;

    /// Move the contents under `key` aside so a fresh value can be written.
    /// Returns where the old contents went, if anywhere.
    fn quarantine(&self, key: &str) -> Result<Option<String>>;

    fn backend_name(&self) -> &'static str;

    /// Human-readable location of `key`, for messages
    fn location(&self, key: &str) -> String {
        format!("{}:{}", self.backend_name(), key)
    }
}

impl<B: StoreBackend + ?Sized> StoreBackend for Arc<B> {
    fn read(&self, key: &str) -> Result<Option<String>> {
        (**self).read(key)
    }

    fn write(&self, key: &str, contents: &str) -> Result<()> {
        (**self).write(key, contents)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }

    fn quarantine(&self, key: &str) -> Result<Option<String>> {
        (**self).quarantine(key)
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }

    fn location(&self, key: &str) -> String {
        (**self).location(key)
    }
}

// ============================================================================
// Memory Backend
// ============================================================================

/// In-memory backend, used when saving is disabled and in tests
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let data = self.data.lock().map_err(|_| error::lock_poisoned("memory_backend"))?;
        Ok(data.get(key).cloned())
    }

    fn write(&self, key: &str, contents: &str) -> Result<()> {
        let mut data = self.data.lock().map_err(|_| error::lock_poisoned("memory_backend"))?;
        data.insert(key.to_string(), contents.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut data = self.data.lock().map_err(|_| error::lock_poisoned("memory_backend"))?;
        data.remove(key);
        Ok(())
    }

    fn quarantine(&self, key: &str) -> Result<Option<String>> {
        let mut data = self.data.lock().map_err(|_| error::lock_poisoned("memory_backend"))?;
        match data.remove(key) {
            Some(old) => {
                let aside = format!("{}.corrupt", key);
                data.insert(aside.clone(), old);
                Ok(Some(aside))
            }
            None => Ok(None),
        }
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

// ============================================================================
// File Backend
// ============================================================================

/// One `<key>.json` file per key under a base directory
#[derive(Debug, Clone)]
pub struct FileBackend {
    base_path: PathBuf,
}

impl FileBackend {
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path).map_err(|e| {
            Error::from(e)
                .with_operation("file_backend::new")
                .with_context("path", base_path.display().to_string())
        })?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        self.base_path.join(format!("{}.json", safe_key))
    }

    /// Write `contents` to a synced temp file next to the target. The temp
    /// file is deleted when dropped unless it is persisted.
    fn stage(&self, key: &str, contents: &str) -> Result<tempfile::NamedTempFile> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.base_path)
            .map_err(|e| error::write_failed(key, e).with_operation("file_backend::stage"))?;
        tmp.write_all(contents.as_bytes())
            .map_err(|e| error::write_failed(key, e).with_operation("file_backend::stage"))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| error::write_failed(key, e).with_operation("file_backend::stage"))?;
        Ok(tmp)
    }
}

impl StoreBackend for FileBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::from(e)
                .with_operation("file_backend::read")
                .with_context("path", path.display().to_string())),
        }
    }

    fn write(&self, key: &str, contents: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp = self.stage(key, contents)?;
        tmp.persist(&path).map_err(|e| {
            error::write_failed(key, &e.error)
                .with_operation("file_backend::write")
                .with_context("path", path.display().to_string())
        })?;
        debug!(path = %path.display(), bytes = contents.len(), "wrote file");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::from(e)
                .with_operation("file_backend::remove")
                .with_context("path", path.display().to_string())),
        }
    }

    fn quarantine(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let mut aside = path.clone().into_os_string();
        aside.push(".corrupt");
        let aside = PathBuf::from(aside);
        std::fs::rename(&path, &aside).map_err(|e| {
            Error::from(e)
                .with_operation("file_backend::quarantine")
                .with_context("path", path.display().to_string())
        })?;
        Ok(Some(aside.display().to_string()))
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }

    fn location(&self, key: &str) -> String {
        self.path_for(key).display().to_string()
    }
}

// ============================================================================
// Profile Store
// ============================================================================

/// Loads and saves the single local [`Profile`]
pub struct ProfileStore {
    backend: Arc<dyn StoreBackend>,
}

impl ProfileStore {
    pub fn new(backend: impl StoreBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Share a backend with other stores
    pub fn with_backend(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    pub fn location(&self) -> String {
        self.backend.location(PROFILE_KEY)
    }

    pub fn exists(&self) -> Result<bool> {
        Ok(self.backend.read(PROFILE_KEY)?.is_some())
    }

    /// Load the stored profile.
    ///
    /// Errors with `ProfileNotFound` when nothing was saved yet and
    /// `ProfileCorrupt` when the stored document cannot be parsed. A profile
    /// whose liked and allergy sets overlap (hand-edited) is repaired.
    pub fn load(&self) -> Result<Profile> {
        let contents = self
            .backend
            .read(PROFILE_KEY)
            .map_err(|e| e.with_operation("profile_store::load"))?
            .ok_or_else(|| Error::profile_not_found(self.location()))?;

        let mut profile: Profile = serde_json::from_str(&contents).map_err(|e| {
            Error::profile_corrupt(format!("cannot parse stored profile: {}", e))
                .with_operation("profile_store::load")
                .with_context("location", self.location())
                .set_source(e)
        })?;

        profile.normalize();
        let removed = profile.repair();
        if !removed.is_empty() {
            warn!(location = %self.location(), "stored profile listed allergens as liked foods");
        }
        Ok(profile)
    }

    /// Validate and atomically persist the profile
    pub fn save(&self, profile: &Profile) -> Result<()> {
        profile.validate()?;
        let json = serde_json::to_string_pretty(profile).map_err(|e| {
            error::serialization_error(e.to_string()).with_operation("profile_store::save")
        })?;
        self.backend
            .write(PROFILE_KEY, &json)
            .map_err(|e| e.with_operation("profile_store::save"))?;
        info!(location = %self.location(), "profile saved");
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.backend
            .remove(PROFILE_KEY)
            .map_err(|e| e.with_operation("profile_store::clear"))
    }

    /// Move an unparseable profile aside so onboarding can write a new one
    pub fn quarantine(&self) -> Result<Option<String>> {
        let moved = self
            .backend
            .quarantine(PROFILE_KEY)
            .map_err(|e| e.with_operation("profile_store::quarantine"))?;
        if let Some(to) = &moved {
            warn!(to = %to, "moved unreadable profile aside");
        }
        Ok(moved)
    }
}

/// Outcome of opening the profile at startup
#[derive(Debug)]
pub enum ProfileState {
    Loaded(Profile),
    /// Nothing stored yet; onboarding required
    Missing,
    /// Stored profile was unreadable and has been moved to the given location
    Quarantined(String),
}

impl ProfileStore {
    /// Load the profile, turning a corrupt file into a fresh start. Only a
    /// corrupt file that cannot be moved aside, or an unreadable one, is an
    /// error.
    pub fn open(&self) -> Result<ProfileState> {
        match self.load() {
            Ok(profile) => Ok(ProfileState::Loaded(profile)),
            Err(e) if e.kind() == ErrorKind::ProfileNotFound => Ok(ProfileState::Missing),
            Err(e) if e.kind() == ErrorKind::ProfileCorrupt => {
                warn!(error = %e, "stored profile is corrupt");
                match self.quarantine()? {
                    Some(to) => Ok(ProfileState::Quarantined(to)),
                    None => Ok(ProfileState::Missing),
                }
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_profile() -> Profile {
        Profile::builder()
            .liked(["vegan", "spicy"])
            .disliked(["olives"])
            .allergies(["nuts"])
            .dietary_restrictions(["gluten-free"])
            .fitness_goals(["high-protein"])
            .build()
    }

    #[test]
    fn test_memory_backend() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.read("k").unwrap(), None);

        backend.write("k", "v1").unwrap();
        backend.write("k", "v2").unwrap();
        assert_eq!(backend.read("k").unwrap().as_deref(), Some("v2"));

        backend.remove("k").unwrap();
        assert_eq!(backend.read("k").unwrap(), None);
        backend.remove("k").unwrap();
    }

    #[test]
    fn test_file_backend_write_replaces() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path()).unwrap();

        backend.write("profile", "{\"a\":1}").unwrap();
        backend.write("profile", "{\"a\":2}").unwrap();

        assert_eq!(backend.read("profile").unwrap().as_deref(), Some("{\"a\":2}"));
        assert!(dir.path().join("profile.json").exists());

        // no temp files left behind
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_profile_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::new(FileBackend::new(dir.path()).unwrap());

        let profile = sample_profile();
        store.save(&profile).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, profile);
        assert!(store.exists().unwrap());
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let store = ProfileStore::new(MemoryBackend::new());
        let err = store.load().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProfileNotFound);
        assert!(matches!(store.open().unwrap(), ProfileState::Missing));
    }

    #[test]
    fn test_save_rejects_overlap() {
        let store = ProfileStore::new(MemoryBackend::new());
        let mut profile = sample_profile();
        profile.liked.insert("nuts".into());

        let err = store.save(&profile).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProfileInvalid);
        assert!(!store.exists().unwrap());
    }

    #[test]
    fn test_load_repairs_hand_edited_overlap() {
        let backend = Arc::new(MemoryBackend::new());
        let store = ProfileStore::with_backend(backend.clone());

        let mut profile = sample_profile();
        profile.liked.insert("nuts".into());
        backend
            .write(PROFILE_KEY, &serde_json::to_string(&profile).unwrap())
            .unwrap();

        let loaded = store.load().unwrap();
        assert!(!loaded.liked.contains("nuts"));
        assert!(loaded.allergies.contains("nuts"));
    }

    #[test]
    fn test_corrupt_profile_is_quarantined() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path()).unwrap();
        std::fs::write(backend.path_for(PROFILE_KEY), "{ not json").unwrap();
        let store = ProfileStore::new(backend);

        assert_eq!(store.load().unwrap_err().kind(), ErrorKind::ProfileCorrupt);

        match store.open().unwrap() {
            ProfileState::Quarantined(to) => assert!(to.ends_with("profile.json.corrupt")),
            other => panic!("expected quarantine, got {:?}", other),
        }
        assert!(dir.path().join("profile.json.corrupt").exists());
        assert!(matches!(store.open().unwrap(), ProfileState::Missing));
    }

    #[test]
    fn test_interrupted_save_keeps_previous_profile() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path()).unwrap();
        let store = ProfileStore::new(backend.clone());

        let original = sample_profile();
        store.save(&original).unwrap();

        // Stage a new version but never persist it, as if the process died
        // between the write and the rename.
        let mut edited = original.clone();
        edited.liked.insert("tofu".into());
        let staged = backend
            .stage(PROFILE_KEY, &serde_json::to_string_pretty(&edited).unwrap())
            .unwrap();
        let staged_path = staged.path().to_path_buf();
        assert!(staged_path.exists());

        assert_eq!(store.load().unwrap(), original);

        drop(staged);
        assert!(!staged_path.exists());
        assert_eq!(store.load().unwrap(), original);
    }

    #[test]
    fn test_clear() {
        let store = ProfileStore::new(MemoryBackend::new());
        store.save(&sample_profile()).unwrap();
        store.clear().unwrap();
        assert_eq!(store.load().unwrap_err().kind(), ErrorKind::ProfileNotFound);
    }
}

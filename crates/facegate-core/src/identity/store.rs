use std::collections::HashSet;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{SecondsFormat, Utc};
use tracing::{debug, info};

use crate::errors::{AppError, AppResult, ValidationError};
use crate::identity::{IdentityPersistence, IdentityRecord, JsonFilePersistence, PasswordCredential};
use crate::images::ImageRef;

/// Username-unique identity table, persisted wholesale after every registration.
///
/// Records keep insertion order. Registration holds the write lock across
/// validate, save and commit so readers never observe a half-applied insert.
pub struct IdentityStore<P = JsonFilePersistence> {
    persistence: P,
    records: RwLock<Vec<IdentityRecord>>,
}

impl<P: IdentityPersistence> IdentityStore<P> {
    pub fn open(persistence: P) -> AppResult<Self> {
        let records = persistence.load()?;
        validate_loaded(&persistence, &records)?;
        debug!(
            target: "identity.store",
            location = %persistence.location().display(),
            identities = records.len(),
            "loaded identity table"
        );
        Ok(Self {
            persistence,
            records: RwLock::new(records),
        })
    }

    /// Surrounding whitespace is stripped from both fields before validation.
    pub fn register(
        &self,
        username: &str,
        password: &str,
        reference_image: ImageRef,
    ) -> AppResult<()> {
        let username = username.trim();
        let password = password.trim();
        if username.is_empty() {
            return Err(ValidationError::MissingField { field: "username" }.into());
        }
        if password.is_empty() {
            return Err(ValidationError::MissingField { field: "password" }.into());
        }

        let mut records = self.write();
        if records.iter().any(|record| record.username == username) {
            return Err(ValidationError::DuplicateUsername {
                username: username.to_string(),
            }
            .into());
        }

        let record = IdentityRecord {
            username: username.to_string(),
            credential: PasswordCredential::hash(password)?,
            reference_image,
            enrolled_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };

        let mut next = records.clone();
        next.push(record);
        self.persistence.save(&next)?;
        *records = next;

        info!(target: "identity.store", username, identities = records.len(), "registered identity");
        Ok(())
    }

    pub fn get(&self, username: &str) -> Option<IdentityRecord> {
        self.read()
            .iter()
            .find(|record| record.username == username)
            .cloned()
    }

    /// Snapshot of every record in insertion order.
    pub fn all(&self) -> Vec<IdentityRecord> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn contains(&self, username: &str) -> bool {
        self.read().iter().any(|record| record.username == username)
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<IdentityRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<IdentityRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn validate_loaded<P: IdentityPersistence>(
    persistence: &P,
    records: &[IdentityRecord],
) -> AppResult<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for (idx, record) in records.iter().enumerate() {
        if record.username.is_empty() {
            return Err(AppError::InvalidStore {
                path: persistence.location(),
                message: format!("identity #{idx} has an empty username"),
            });
        }
        if !seen.insert(record.username.as_str()) {
            return Err(AppError::InvalidStore {
                path: persistence.location(),
                message: format!("username '{}' appears more than once", record.username),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryPersistence {
        saved: Mutex<Vec<IdentityRecord>>,
        initial: Vec<IdentityRecord>,
        fail_saves: AtomicBool,
    }

    impl IdentityPersistence for MemoryPersistence {
        fn load(&self) -> AppResult<Vec<IdentityRecord>> {
            Ok(self.initial.clone())
        }

        fn save(&self, records: &[IdentityRecord]) -> AppResult<()> {
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(AppError::StoreWrite {
                    path: self.location(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }
            *self.saved.lock().unwrap() = records.to_vec();
            Ok(())
        }

        fn location(&self) -> PathBuf {
            PathBuf::from("memory")
        }
    }

    fn image(name: &str) -> ImageRef {
        ImageRef::new(format!("/images/{name}.png"))
    }

    #[test]
    fn register_persists_and_is_readable() {
        let store = IdentityStore::open(MemoryPersistence::default()).unwrap();
        store.register("alice", "pw1", image("alice")).unwrap();

        let record = store.get("alice").unwrap();
        assert_eq!(record.reference_image, image("alice"));
        assert!(record.credential.verify("pw1"));
        assert!(record.enrolled_at.ends_with('Z'));
        assert!(store.contains("alice"));
        assert_eq!(store.persistence().saved.lock().unwrap().len(), 1);
    }

    #[test]
    fn duplicate_username_is_rejected_without_mutation() {
        let store = IdentityStore::open(MemoryPersistence::default()).unwrap();
        store.register("alice", "pw1", image("alice")).unwrap();

        let err = store
            .register("alice", "other", image("alice-2"))
            .unwrap_err();
        match err {
            AppError::Validation(ValidationError::DuplicateUsername { username }) => {
                assert_eq!(username, "alice")
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("alice").unwrap().reference_image, image("alice"));
    }

    #[test]
    fn empty_fields_are_missing() {
        let store = IdentityStore::open(MemoryPersistence::default()).unwrap();

        let err = store.register("", "pw1", image("x")).unwrap_err();
        assert_eq!(err.tag(), "missing_field");
        assert_eq!(err.to_string(), "username is required");

        let err = store.register("alice", "", image("x")).unwrap_err();
        assert_eq!(err.to_string(), "password is required");
        assert!(store.is_empty());
    }

    #[test]
    fn blank_username_is_missing() {
        let store = IdentityStore::open(MemoryPersistence::default()).unwrap();

        let err = store.register("   ", "pw1", image("x")).unwrap_err();
        match err {
            AppError::Validation(ValidationError::MissingField { field }) => {
                assert_eq!(field, "username")
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let err = store.register("alice", " \t", image("x")).unwrap_err();
        assert_eq!(err.to_string(), "password is required");
        assert!(store.is_empty());
    }

    #[test]
    fn padded_username_is_the_same_identity() {
        let store = IdentityStore::open(MemoryPersistence::default()).unwrap();
        store.register(" alice ", " pw1 ", image("alice")).unwrap();
        assert!(store.contains("alice"));
        assert!(store.get("alice").unwrap().credential.verify("pw1"));

        let err = store.register("alice ", "pw2", image("alice-2")).unwrap_err();
        match err {
            AppError::Validation(ValidationError::DuplicateUsername { username }) => {
                assert_eq!(username, "alice")
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let names: Vec<_> = store.all().into_iter().map(|r| r.username).collect();
        assert_eq!(names, vec!["alice"]);
    }

    #[test]
    fn failed_save_keeps_memory_unchanged() {
        let persistence = MemoryPersistence::default();
        persistence.fail_saves.store(true, Ordering::SeqCst);
        let store = IdentityStore::open(persistence).unwrap();

        let err = store.register("alice", "pw1", image("alice")).unwrap_err();
        assert_eq!(err.tag(), "persistence_write");
        assert!(!store.contains("alice"));

        store.persistence().fail_saves.store(false, Ordering::SeqCst);
        store.register("alice", "pw1", image("alice")).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn all_keeps_insertion_order() {
        let store = IdentityStore::open(MemoryPersistence::default()).unwrap();
        for name in ["carol", "alice", "bob"] {
            store.register(name, "pw", image(name)).unwrap();
        }
        let names: Vec<_> = store.all().into_iter().map(|r| r.username).collect();
        assert_eq!(names, vec!["carol", "alice", "bob"]);
    }

    #[test]
    fn loading_duplicate_usernames_is_invalid() {
        let record = IdentityRecord {
            username: "alice".into(),
            credential: PasswordCredential::from_phc("x"),
            reference_image: image("alice"),
            enrolled_at: "2026-01-01T00:00:00.000Z".into(),
        };
        let persistence = MemoryPersistence {
            initial: vec![record.clone(), record],
            ..MemoryPersistence::default()
        };

        match IdentityStore::open(persistence) {
            Err(AppError::InvalidStore { message, .. }) => assert!(message.contains("alice")),
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("expected invalid store"),
        }
    }
}

//! Account directory: the single source of truth for registered users.
//! The whole directory is one JSON object keyed by normalized email and is
//! rewritten on every mutating call.

use std::collections::BTreeMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::password::CredentialScheme;
use crate::error::{Error, Result};
use crate::model::{ScanRecord, UserProfile};
use crate::store::{self, keys, KvStore};

/// Sentinel identity for guest sessions; never present in the directory.
pub const GUEST_EMAIL: &str = "guest";

/// Canonical per-account record. `profile` stays optional so records
/// written by older versions (or edited by hand) still load; restore
/// reconciliation fills the gap from the session snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub password: String,
    #[serde(default)]
    pub profile: Option<UserProfile>,
    #[serde(default)]
    pub history: Vec<ScanRecord>,
}

type Directory = BTreeMap<String, AccountRecord>;

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub struct AccountDirectory {
    store: Arc<dyn KvStore>,
    scheme: Arc<dyn CredentialScheme>,
}

impl AccountDirectory {
    pub fn new(store: Arc<dyn KvStore>, scheme: Arc<dyn CredentialScheme>) -> Self {
        Self { store, scheme }
    }

    /// A corrupt or missing blob loads as an empty directory.
    fn load(&self) -> Directory {
        store::get_json(self.store.as_ref(), keys::ACCOUNTS_DIRECTORY).unwrap_or_default()
    }

    fn save(&self, directory: &Directory) {
        store::set_json(self.store.as_ref(), keys::ACCOUNTS_DIRECTORY, directory);
    }

    /// Creates an account with a default profile and empty history.
    /// Registration is the one path that reveals whether an email is
    /// already taken; login never does.
    pub fn register(&self, email_raw: &str, password: &str) -> Result<(String, AccountRecord)> {
        let key = normalize_email(email_raw);
        if key.is_empty() || password.is_empty() {
            warn!("registration with empty email or password");
            return Err(Error::InvalidCredential);
        }
        if !is_valid_email(&key) {
            warn!(email = %key, "invalid email");
            return Err(Error::InvalidEmail);
        }

        let mut directory = self.load();
        if directory.contains_key(&key) {
            warn!(email = %key, "email already registered");
            return Err(Error::DuplicateAccount);
        }

        let record = AccountRecord {
            password: self.scheme.protect(password)?,
            profile: Some(UserProfile::default()),
            history: Vec::new(),
        };
        directory.insert(key.clone(), record.clone());
        self.save(&directory);
        info!(email = %key, "account registered");
        Ok((key, record))
    }

    /// Unknown email and wrong password both map to `InvalidCredential`.
    pub fn authenticate(&self, email_raw: &str, password: &str) -> Result<(String, AccountRecord)> {
        let key = normalize_email(email_raw);
        let directory = self.load();
        let record = match directory.get(&key) {
            Some(r) => r,
            None => {
                warn!(email = %key, "login unknown email");
                return Err(Error::InvalidCredential);
            }
        };
        if !self.scheme.verify(password, &record.password) {
            warn!(email = %key, "login invalid password");
            return Err(Error::InvalidCredential);
        }
        info!(email = %key, "user logged in");
        Ok((key, record.clone()))
    }

    pub fn contains(&self, email_raw: &str) -> bool {
        self.load().contains_key(&normalize_email(email_raw))
    }

    pub fn lookup(&self, email_key: &str) -> Option<AccountRecord> {
        self.load().get(email_key).cloned()
    }

    /// Overwrites the credential in place. Other live sessions for the
    /// account are not invalidated.
    pub fn reset_credential(&self, email_raw: &str, new_password: &str) -> Result<()> {
        let key = normalize_email(email_raw);
        let mut directory = self.load();
        let record = directory.get_mut(&key).ok_or(Error::AccountNotFound)?;
        record.password = self.scheme.protect(new_password)?;
        self.save(&directory);
        info!(email = %key, "credential reset");
        Ok(())
    }

    /// Idempotent overwrite for an existing account. Guest identity never
    /// reaches the directory.
    pub fn upsert_profile(&self, email_key: &str, profile: &UserProfile) {
        if email_key == GUEST_EMAIL {
            return;
        }
        let mut directory = self.load();
        if let Some(record) = directory.get_mut(email_key) {
            record.profile = Some(profile.clone());
            self.save(&directory);
        }
    }

    pub fn upsert_history(&self, email_key: &str, history: &[ScanRecord]) {
        if email_key == GUEST_EMAIL {
            return;
        }
        let mut directory = self.load();
        if let Some(record) = directory.get_mut(email_key) {
            record.history = history.to_vec();
            self.save(&directory);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::PlainTextScheme;
    use crate::model::ProfileUpdate;
    use crate::store::MemoryStore;

    fn directory() -> (Arc<MemoryStore>, AccountDirectory) {
        let store = Arc::new(MemoryStore::default());
        let dir = AccountDirectory::new(store.clone(), Arc::new(PlainTextScheme));
        (store, dir)
    }

    #[test]
    fn register_then_duplicate_fails() {
        let (_store, dir) = directory();
        dir.register("user@test.com", "pw123").expect("register");
        let err = dir.register("USER@test.com ", "other").unwrap_err();
        assert!(matches!(err, Error::DuplicateAccount));
    }

    #[test]
    fn register_rejects_malformed_email() {
        let (_store, dir) = directory();
        let err = dir.register("not-an-email", "pw123").unwrap_err();
        assert!(matches!(err, Error::InvalidEmail));
    }

    #[test]
    fn authenticate_is_case_insensitive_on_email() {
        let (_store, dir) = directory();
        dir.register("A@X.com", "pw123").expect("register");
        let (key, _) = dir.authenticate("a@x.com", "pw123").expect("login");
        assert_eq!(key, "a@x.com");
    }

    #[test]
    fn wrong_password_is_invalid_credential_not_duplicate() {
        let (_store, dir) = directory();
        dir.register("user@test.com", "pw123").expect("register");
        let err = dir.authenticate("user@test.com", "nope").unwrap_err();
        assert!(matches!(err, Error::InvalidCredential));
    }

    #[test]
    fn unknown_email_is_invalid_credential() {
        let (store, dir) = directory();
        let before = store.get_raw(keys::ACCOUNTS_DIRECTORY);
        let err = dir.authenticate("ghost@test.com", "pw").unwrap_err();
        assert!(matches!(err, Error::InvalidCredential));
        assert_eq!(store.get_raw(keys::ACCOUNTS_DIRECTORY), before);
    }

    #[test]
    fn reset_credential_requires_existing_account() {
        let (_store, dir) = directory();
        let err = dir.reset_credential("ghost@test.com", "new").unwrap_err();
        assert!(matches!(err, Error::AccountNotFound));
    }

    #[test]
    fn reset_credential_overwrites_in_place() {
        let (_store, dir) = directory();
        dir.register("user@test.com", "old").expect("register");
        dir.reset_credential("user@test.com", "new").expect("reset");
        assert!(dir.authenticate("user@test.com", "old").is_err());
        dir.authenticate("user@test.com", "new").expect("new password works");
    }

    #[test]
    fn corrupt_directory_loads_as_empty() {
        let (store, dir) = directory();
        store.set_raw(keys::ACCOUNTS_DIRECTORY, "{broken");
        assert!(!dir.contains("user@test.com"));
        dir.register("user@test.com", "pw123").expect("register over corrupt blob");
    }

    #[test]
    fn upsert_ignores_guest_and_unknown_accounts() {
        let (store, dir) = directory();
        dir.upsert_profile(GUEST_EMAIL, &UserProfile::default());
        dir.upsert_profile("ghost@test.com", &UserProfile::default());
        assert!(store.get_raw(keys::ACCOUNTS_DIRECTORY).is_none());
    }

    #[test]
    fn upsert_profile_persists_for_existing_account() {
        let (_store, dir) = directory();
        let (key, _) = dir.register("user@test.com", "pw123").expect("register");
        let mut profile = UserProfile::default();
        profile.apply(ProfileUpdate {
            hb_a1c: Some(7.2),
            ..Default::default()
        });
        dir.upsert_profile(&key, &profile);
        let stored = dir.lookup(&key).expect("record").profile.expect("profile");
        assert_eq!(stored.hb_a1c, 7.2);
    }
}

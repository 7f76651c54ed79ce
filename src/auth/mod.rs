pub mod directory;
pub mod password;
pub mod reset;

pub use directory::{normalize_email, AccountDirectory, AccountRecord, GUEST_EMAIL};
pub use password::{Argon2Scheme, CredentialScheme, PlainTextScheme};
pub use reset::{NoopVerifier, ResetVerifier};

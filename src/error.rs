use std::fmt;

/// Action classes that run against an external capability. Each class is
/// tracked independently so a plan refresh does not block a translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionClass {
    Analyzing,
    GeneratingPlan,
    Translating,
}

impl fmt::Display for ActionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionClass::Analyzing => write!(f, "analysis"),
            ActionClass::GeneratingPlan => write!(f, "plan generation"),
            ActionClass::Translating => write!(f, "translation"),
        }
    }
}

/// Typed failures surfaced to the caller.
///
/// Login never distinguishes an unknown email from a wrong password; both
/// are [`Error::InvalidCredential`]. Registration does expose
/// [`Error::DuplicateAccount`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("user already exists")]
    DuplicateAccount,
    #[error("invalid credentials")]
    InvalidCredential,
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("no account found for that email")]
    AccountNotFound,
    #[error("new password must not be empty")]
    EmptyCredential,
    #[error("invalid email")]
    InvalidEmail,
    #[error("{0} already in progress")]
    Busy(ActionClass),
    /// Failure of the analysis, recommendation, or translation capability.
    /// Existing local state is never altered when this is returned.
    #[error(transparent)]
    ExternalCapability(#[from] anyhow::Error),
    /// Internal only: a persisted value failed to parse. Reads substitute
    /// an empty default instead of returning this.
    #[error("persisted data corrupt")]
    PersistedDataCorrupt,
}

pub type Result<T> = std::result::Result<T, Error>;

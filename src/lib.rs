//! GlucoScan local data store.
//!
//! Client-side persistence for accounts, health profiles, scan history
//! and cached AI outputs. There is no backend server: the account
//! directory, session continuity and cache invalidation are all emulated
//! on top of a flat key-value store. The UI layer supplies captures and
//! renders state; the AI capabilities are opaque collaborators injected
//! behind traits.

pub mod ai;
pub mod auth;
pub mod config;
pub mod error;
pub mod i18n;
pub mod model;
pub mod session;
pub mod store;
pub mod telemetry;

pub use config::AppConfig;
pub use error::{ActionClass, Error, Result};
pub use session::{Session, SessionIdentity, SessionManager, SessionOptions};

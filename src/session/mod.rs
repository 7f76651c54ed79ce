pub mod history;
pub mod manager;

pub use history::{ScanSource, HISTORY_CAP};
pub use manager::{Session, SessionIdentity, SessionManager, SessionOptions};

/// Verification channel for the two-phase password reset. The shipped flow
/// never actually sends a code; the reset screen only checks that the
/// email exists. A real channel (code or link) can be substituted here
/// without touching the session manager.
pub trait ResetVerifier: Send + Sync {
    fn begin(&self, email_key: &str) -> anyhow::Result<()>;
}

/// The presentational-only verification the app shipped with.
pub struct NoopVerifier;

impl ResetVerifier for NoopVerifier {
    fn begin(&self, _email_key: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

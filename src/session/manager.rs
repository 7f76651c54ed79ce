//! Session manager: owns the active identity, keeps it consistent with
//! the account directory on every mutation, and front-ends the external
//! AI capabilities with single-flight and stale-result protection.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::ai::{AnalysisRequest, Capabilities};
use crate::auth::{normalize_email, AccountDirectory, CredentialScheme, ResetVerifier, GUEST_EMAIL};
use crate::error::{ActionClass, Error, Result};
use crate::i18n;
use crate::model::{FoodImpact, MealRecommendation, ProfileUpdate, ScanRecord, ScanType, UserProfile};
use crate::session::history::{self, ScanSource};
use crate::store::{self, keys, KvStore};

/// The currently active identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionIdentity {
    Guest,
    Registered(String),
}

impl SessionIdentity {
    pub fn email_key(&self) -> &str {
        match self {
            SessionIdentity::Guest => GUEST_EMAIL,
            SessionIdentity::Registered(key) => key,
        }
    }
}

/// Working copy of the active account (or guest). The directory is the
/// merge target: every mutation here is written back through it.
#[derive(Debug, Clone)]
pub struct Session {
    pub identity: SessionIdentity,
    pub profile: UserProfile,
    pub history: Vec<ScanRecord>,
}

/// Persisted shape of the `current-session` snapshot. Optional fields use
/// serde defaults so a partially-written snapshot still restores.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionSnapshot {
    email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(default)]
    profile: Option<UserProfile>,
    #[serde(default)]
    history: Vec<ScanRecord>,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// The login form collects "stay signed in" but the app has always
    /// persisted the session regardless. Enabling this makes the flag
    /// actually gate snapshot persistence.
    pub honor_stay_signed_in: bool,
    pub capability_timeout: Duration,
    /// Language active until a persisted preference is loaded.
    pub default_language: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            honor_stay_signed_in: false,
            capability_timeout: Duration::from_secs(30),
            default_language: i18n::DEFAULT_LANGUAGE.to_string(),
        }
    }
}

#[derive(Default)]
struct BusyFlags {
    analyzing: bool,
    generating_plan: bool,
    translating: bool,
}

struct SessionState {
    session: Option<Session>,
    /// Guest history preloaded while logged out, kept current so a
    /// logged-out scan still lands in the guest blob.
    guest_preload: Vec<ScanRecord>,
    current_result: Option<FoodImpact>,
    plan: Vec<MealRecommendation>,
    language: String,
    pending_reset: Option<String>,
    /// Cleared for the lifetime of a login where the user declined to
    /// stay signed in; every snapshot write is gated on it.
    snapshot_enabled: bool,
    busy: BusyFlags,
    /// Bumped on every session switch; in-flight capability calls capture
    /// it and discard their result if it moved.
    epoch: u64,
}

pub struct SessionManager {
    store: Arc<dyn KvStore>,
    directory: AccountDirectory,
    verifier: Arc<dyn ResetVerifier>,
    capabilities: Capabilities,
    options: SessionOptions,
    state: Mutex<SessionState>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn KvStore>,
        scheme: Arc<dyn CredentialScheme>,
        verifier: Arc<dyn ResetVerifier>,
        capabilities: Capabilities,
        options: SessionOptions,
    ) -> Self {
        let directory = AccountDirectory::new(store.clone(), scheme);
        let language = options.default_language.clone();
        Self {
            store,
            directory,
            verifier,
            capabilities,
            options,
            state: Mutex::new(SessionState {
                session: None,
                guest_preload: Vec::new(),
                current_result: None,
                plan: Vec::new(),
                language,
                pending_reset: None,
                snapshot_enabled: true,
                busy: BusyFlags::default(),
                epoch: 0,
            }),
        }
    }

    /// Startup restore. Reconciles a persisted session snapshot against
    /// the directory; the directory's credential wins, its history wins
    /// unless empty, and its profile wins when present. A snapshot whose
    /// account no longer exists, or that fails to parse, is discarded.
    pub fn restore(&self) {
        let mut st = self.state.lock();
        if let Some(lang) = self.store.get_raw(keys::PREFERRED_LANGUAGE) {
            st.language = lang;
        }

        match self.store.get_raw(keys::CURRENT_SESSION) {
            Some(raw) => match serde_json::from_str::<SessionSnapshot>(&raw) {
                Ok(snapshot) if snapshot.email == GUEST_EMAIL => {
                    st.session = Some(Session {
                        identity: SessionIdentity::Guest,
                        profile: snapshot.profile.unwrap_or_default(),
                        history: snapshot.history,
                    });
                    info!("guest session restored");
                }
                Ok(snapshot) => {
                    let key = normalize_email(&snapshot.email);
                    match self.directory.lookup(&key) {
                        Some(record) => {
                            let profile =
                                record.profile.or(snapshot.profile).unwrap_or_default();
                            let history = if record.history.is_empty() {
                                snapshot.history
                            } else {
                                record.history
                            };
                            st.plan = store::get_json(
                                self.store.as_ref(),
                                &keys::plan_cache(&key),
                            )
                            .unwrap_or_default();
                            st.session = Some(Session {
                                identity: SessionIdentity::Registered(key.clone()),
                                profile,
                                history,
                            });
                            info!(email = %key, "session restored");
                        }
                        None => {
                            warn!(email = %key, "session snapshot has no directory entry, discarding");
                            self.store.remove(keys::CURRENT_SESSION);
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "discarding corrupt session snapshot");
                    self.store.remove(keys::CURRENT_SESSION);
                }
            },
            None => {
                // Logged-out start: preload any guest history left behind.
                st.guest_preload =
                    store::get_json(self.store.as_ref(), keys::GUEST_HISTORY).unwrap_or_default();
            }
        }
    }

    /// The `stay_signed_in` flag is accepted but, matching observed
    /// behavior, only gates persistence when
    /// [`SessionOptions::honor_stay_signed_in`] is set.
    pub fn login(&self, email: &str, password: &str, stay_signed_in: bool) -> Result<Session> {
        let (key, record) = self.directory.authenticate(email, password)?;
        let session = Session {
            identity: SessionIdentity::Registered(key),
            profile: record.profile.unwrap_or_default(),
            history: record.history,
        };
        let persist = stay_signed_in || !self.options.honor_stay_signed_in;
        let mut st = self.state.lock();
        self.activate(&mut st, session.clone());
        st.snapshot_enabled = persist;
        if persist {
            self.persist_snapshot(&session, Some(record.password));
        } else {
            // A stale snapshot from a previous identity must not survive
            // a login the user chose not to persist.
            self.store.remove(keys::CURRENT_SESSION);
        }
        Ok(session)
    }

    pub fn signup(&self, email: &str, password: &str, confirm_password: &str) -> Result<Session> {
        if password != confirm_password {
            return Err(Error::PasswordMismatch);
        }
        let (key, record) = self.directory.register(email, password)?;
        let session = Session {
            identity: SessionIdentity::Registered(key),
            profile: record.profile.unwrap_or_default(),
            history: Vec::new(),
        };
        let mut st = self.state.lock();
        self.activate(&mut st, session.clone());
        self.persist_snapshot(&session, Some(record.password));
        Ok(session)
    }

    /// Guest sessions never touch the directory and never persist a
    /// session snapshot; only the guest history blob outlives them.
    pub fn guest_login(&self) -> Session {
        let history =
            store::get_json(self.store.as_ref(), keys::GUEST_HISTORY).unwrap_or_default();
        let session = Session {
            identity: SessionIdentity::Guest,
            profile: UserProfile::default(),
            history,
        };
        let mut st = self.state.lock();
        self.activate(&mut st, session.clone());
        info!("guest session started");
        session
    }

    /// Clears the in-memory session, displayed result and plan, and the
    /// persisted snapshot. The guest history blob is left alone.
    pub fn logout(&self) {
        let mut st = self.state.lock();
        st.epoch += 1;
        st.session = None;
        st.guest_preload.clear();
        st.current_result = None;
        st.plan.clear();
        st.snapshot_enabled = true;
        st.busy = BusyFlags::default();
        self.store.remove(keys::CURRENT_SESSION);
        info!("logged out");
    }

    /// Phase 1 of the password reset: checks the account exists and opens
    /// the verification channel.
    pub fn begin_password_reset(&self, email: &str) -> Result<()> {
        let key = normalize_email(email);
        if !self.directory.contains(&key) {
            warn!(email = %key, "password reset for unknown email");
            return Err(Error::AccountNotFound);
        }
        self.verifier.begin(&key)?;
        self.state.lock().pending_reset = Some(key);
        Ok(())
    }

    /// Phase 2: requires a non-empty credential and a completed phase 1.
    pub fn complete_password_reset(&self, new_password: &str) -> Result<()> {
        if new_password.is_empty() {
            return Err(Error::EmptyCredential);
        }
        let pending = self
            .state
            .lock()
            .pending_reset
            .clone()
            .ok_or(Error::AccountNotFound)?;
        self.directory.reset_credential(&pending, new_password)?;
        self.state.lock().pending_reset = None;
        Ok(())
    }

    /// Shallow merge into the active profile. Registered sessions write
    /// through to the directory and the snapshot; guest profiles live only
    /// in memory. Returns the merged profile, or `None` when logged out.
    pub fn update_profile(&self, update: ProfileUpdate) -> Option<UserProfile> {
        let mut st = self.state.lock();
        let session = st.session.as_mut()?;
        session.profile.apply(update);
        let session = session.clone();
        self.write_back_profile(&st, &session);
        Some(session.profile)
    }

    pub fn toggle_condition(&self, condition_id: &str) -> Option<UserProfile> {
        let mut st = self.state.lock();
        let session = st.session.as_mut()?;
        session.profile.toggle_condition(condition_id);
        let session = session.clone();
        self.write_back_profile(&st, &session);
        Some(session.profile)
    }

    /// Appends a scan to the active history (capped, newest first) and
    /// persists it: directory + snapshot for registered sessions, the
    /// guest blob for guest or logged-out captures.
    pub fn record_scan(&self, impact: FoodImpact, source: &ScanSource) -> ScanRecord {
        let mut st = self.state.lock();
        self.append_record(&mut st, impact, source)
    }

    /// Analyzes a captured photo.
    pub async fn analyze_image(&self, image: Bytes, mode: ScanType) -> Result<FoodImpact> {
        self.run_analysis(Some(image.clone()), None, mode, ScanSource::Photo(image))
            .await
    }

    /// Analyzes a food searched by name.
    pub async fn analyze_search(&self, term: &str) -> Result<FoodImpact> {
        let text = format!("Food Search: {term}");
        self.run_analysis(None, Some(text), ScanType::Food, ScanSource::Search)
            .await
    }

    /// Analyzes a pasted recipe.
    pub async fn analyze_recipe_text(&self, recipe: &str) -> Result<FoodImpact> {
        self.run_analysis(None, Some(recipe.to_string()), ScanType::Recipe, ScanSource::Text)
            .await
    }

    async fn run_analysis(
        &self,
        image: Option<Bytes>,
        text: Option<String>,
        mode: ScanType,
        source: ScanSource,
    ) -> Result<FoodImpact> {
        let (epoch, language, profile) = {
            let mut st = self.state.lock();
            if st.busy.analyzing {
                return Err(Error::Busy(ActionClass::Analyzing));
            }
            st.busy.analyzing = true;
            let profile = st
                .session
                .as_ref()
                .map(|s| s.profile.clone())
                .unwrap_or_default();
            (st.epoch, st.language.clone(), profile)
        };

        let request = AnalysisRequest {
            image,
            text,
            language,
            mode,
            profile,
        };
        let outcome = tokio::time::timeout(
            self.options.capability_timeout,
            self.capabilities.analysis.analyze(request),
        )
        .await;

        let mut st = self.state.lock();
        let fresh = st.epoch == epoch;
        if fresh {
            st.busy.analyzing = false;
        }
        let mut impact = match outcome {
            Ok(Ok(impact)) => impact,
            Ok(Err(e)) => {
                error!(error = %e, "analysis failed");
                return Err(Error::ExternalCapability(e));
            }
            Err(_) => {
                error!("analysis timed out");
                return Err(Error::ExternalCapability(anyhow::anyhow!(
                    "analysis timed out"
                )));
            }
        };
        impact.scan_type = Some(mode);
        if !fresh {
            // The session changed while the call was in flight; hand the
            // result back but leave the new session untouched.
            info!("discarding analysis result for a replaced session");
            return Ok(impact);
        }
        st.current_result = Some(impact.clone());
        self.append_record(&mut st, impact.clone(), &source);
        Ok(impact)
    }

    /// Regenerates the meal plan from the active profile and an optional
    /// current glucose reading. On failure the previous plan is kept.
    pub async fn refresh_plan(
        &self,
        current_glucose: Option<u32>,
    ) -> Result<Vec<MealRecommendation>> {
        let (epoch, language, profile, account_key) = {
            let mut st = self.state.lock();
            if st.busy.generating_plan {
                return Err(Error::Busy(ActionClass::GeneratingPlan));
            }
            st.busy.generating_plan = true;
            let profile = st
                .session
                .as_ref()
                .map(|s| s.profile.clone())
                .unwrap_or_default();
            let account_key = st.session.as_ref().and_then(|s| match &s.identity {
                SessionIdentity::Registered(key) => Some(key.clone()),
                SessionIdentity::Guest => None,
            });
            (st.epoch, st.language.clone(), profile, account_key)
        };

        let outcome = tokio::time::timeout(
            self.options.capability_timeout,
            self.capabilities
                .recommender
                .recommend(&profile, &language, current_glucose),
        )
        .await;

        let mut st = self.state.lock();
        let fresh = st.epoch == epoch;
        if fresh {
            st.busy.generating_plan = false;
        }
        let plan = match outcome {
            Ok(Ok(plan)) => plan,
            Ok(Err(e)) => {
                error!(error = %e, "plan generation failed");
                return Err(Error::ExternalCapability(e));
            }
            Err(_) => {
                error!("plan generation timed out");
                return Err(Error::ExternalCapability(anyhow::anyhow!(
                    "plan generation timed out"
                )));
            }
        };
        if !fresh {
            info!("discarding plan for a replaced session");
            return Ok(plan);
        }
        st.plan = plan.clone();
        if let Some(key) = account_key {
            store::set_json(self.store.as_ref(), &keys::plan_cache(&key), &plan);
        }
        Ok(plan)
    }

    /// Switches the display language. When a result is on screen its text
    /// fields are re-derived through the translation capability; a failed
    /// translation keeps the original text and is only logged. The
    /// translated copy is never written back to the history ledger.
    pub async fn set_language(&self, language: &str) -> Result<()> {
        let (changed, displayed, epoch) = {
            let mut st = self.state.lock();
            let changed = st.language != language;
            st.language = language.to_string();
            self.store.set_raw(keys::PREFERRED_LANGUAGE, language);
            (changed, st.current_result.clone(), st.epoch)
        };
        if !changed {
            return Ok(());
        }
        let Some(original) = displayed else {
            return Ok(());
        };
        {
            let mut st = self.state.lock();
            if st.busy.translating {
                // Language preference already applied; only the re-derive
                // is refused.
                return Err(Error::Busy(ActionClass::Translating));
            }
            st.busy.translating = true;
        }

        let outcome = tokio::time::timeout(
            self.options.capability_timeout,
            self.capabilities.translator.translate(&original, language),
        )
        .await;

        let mut st = self.state.lock();
        let fresh = st.epoch == epoch;
        if fresh {
            st.busy.translating = false;
        }
        match outcome {
            Ok(Ok(text)) => {
                // Apply only if the same result is still on screen.
                if fresh && st.current_result.as_ref() == Some(&original) {
                    if let Some(current) = st.current_result.as_mut() {
                        current.name = text.name;
                        current.portion = text.portion;
                        current.summary = text.summary;
                    }
                } else {
                    info!("discarding translation for a replaced result");
                }
            }
            Ok(Err(e)) => warn!(error = %e, "translation failed, keeping original text"),
            Err(_) => warn!("translation timed out, keeping original text"),
        }
        Ok(())
    }

    /// Puts a past record back on screen.
    pub fn display_record(&self, record_id: &str) -> Option<FoodImpact> {
        let mut st = self.state.lock();
        let impact = st
            .session
            .as_ref()
            .map(|s| s.history.as_slice())
            .unwrap_or(&st.guest_preload)
            .iter()
            .find(|r| r.id == record_id)
            .map(|r| r.data.clone())?;
        st.current_result = Some(impact.clone());
        Some(impact)
    }

    pub fn clear_result(&self) {
        self.state.lock().current_result = None;
    }

    pub fn session(&self) -> Option<Session> {
        self.state.lock().session.clone()
    }

    pub fn identity(&self) -> Option<SessionIdentity> {
        self.state.lock().session.as_ref().map(|s| s.identity.clone())
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.state.lock().session.as_ref().map(|s| s.profile.clone())
    }

    /// Active history; while logged out this is the preloaded guest blob.
    pub fn history(&self) -> Vec<ScanRecord> {
        let st = self.state.lock();
        match &st.session {
            Some(session) => session.history.clone(),
            None => st.guest_preload.clone(),
        }
    }

    pub fn plan(&self) -> Vec<MealRecommendation> {
        self.state.lock().plan.clone()
    }

    pub fn current_result(&self) -> Option<FoodImpact> {
        self.state.lock().current_result.clone()
    }

    pub fn language(&self) -> String {
        self.state.lock().language.clone()
    }

    pub fn is_analyzing(&self) -> bool {
        self.state.lock().busy.analyzing
    }

    pub fn is_generating_plan(&self) -> bool {
        self.state.lock().busy.generating_plan
    }

    pub fn is_translating(&self) -> bool {
        self.state.lock().busy.translating
    }

    /// Replaces the live session. Bumps the epoch so any in-flight
    /// capability call discards its result, and drops the displayed
    /// result and plan of the previous identity.
    fn activate(&self, st: &mut SessionState, session: Session) {
        st.epoch += 1;
        st.current_result = None;
        st.plan.clear();
        st.guest_preload.clear();
        st.snapshot_enabled = true;
        st.busy = BusyFlags::default();
        st.session = Some(session);
    }

    fn append_record(
        &self,
        st: &mut SessionState,
        impact: FoodImpact,
        source: &ScanSource,
    ) -> ScanRecord {
        let record = history::new_record(impact, source);
        match st.session.as_mut() {
            Some(session) => {
                history::push_capped(&mut session.history, record.clone());
                let session = session.clone();
                match &session.identity {
                    SessionIdentity::Registered(key) => {
                        self.directory.upsert_history(key, &session.history);
                        if st.snapshot_enabled {
                            self.persist_snapshot(&session, self.stored_credential(key));
                        }
                    }
                    SessionIdentity::Guest => {
                        store::set_json(self.store.as_ref(), keys::GUEST_HISTORY, &session.history);
                    }
                }
            }
            None => {
                history::push_capped(&mut st.guest_preload, record.clone());
                store::set_json(self.store.as_ref(), keys::GUEST_HISTORY, &st.guest_preload);
            }
        }
        record
    }

    fn write_back_profile(&self, st: &SessionState, session: &Session) {
        if let SessionIdentity::Registered(key) = &session.identity {
            self.directory.upsert_profile(key, &session.profile);
            if st.snapshot_enabled {
                self.persist_snapshot(session, self.stored_credential(key));
            }
        }
    }

    fn stored_credential(&self, email_key: &str) -> Option<String> {
        self.directory.lookup(email_key).map(|r| r.password)
    }

    fn persist_snapshot(&self, session: &Session, credential: Option<String>) {
        if session.identity == SessionIdentity::Guest {
            return;
        }
        let snapshot = SessionSnapshot {
            email: session.identity.email_key().to_string(),
            password: credential,
            profile: Some(session.profile.clone()),
            history: session.history.clone(),
        };
        store::set_json(self.store.as_ref(), keys::CURRENT_SESSION, &snapshot);
    }
}

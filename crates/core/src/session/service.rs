//! Auth session service: the single orchestrator and source of truth for
//! authentication state.
//!
//! The service owns the principal, the session clock, the permission tree
//! store and the live authorization channel. UI code observes only state
//! (`is_authenticated`, `is_auth_ready`, the route table); server-call
//! failures are converted into state transitions here and never propagate
//! as errors to consumers.
//!
//! Constructed once by the application root and passed by reference to
//! consumers; there are no ambient globals.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cdss_api::{AccessToken, AuthApi, ChannelTransport, TokenPair};
use cdss_types::MenuCode;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::channel::driver::{run_channel, ChannelSignal};
use crate::config::CoreConfig;
use crate::credentials::CredentialStore;
use crate::error::{CoreError, CoreResult};
use crate::menu::{build_tree, GrantPolicy, LabelOverrides, MenuNode, MenuStore};
use crate::routes::{ComponentRegistry, RouteTable};
use crate::session::clock::{ClockEvent, SessionClock};
use crate::session::principal::Principal;

struct SessionState {
    principal: Option<Principal>,
    tokens: Option<TokenPair>,
    clock: SessionClock,
    store: MenuStore,
    auth_ready: bool,
    channel_connected: bool,
    route_cache: Option<RouteTable>,
}

#[derive(Default)]
struct DriverTasks {
    clock: Option<JoinHandle<()>>,
    channel: Option<JoinHandle<()>>,
    signals: Option<JoinHandle<()>>,
}

impl DriverTasks {
    /// Abort is synchronous, which is what makes logout a reliable
    /// cancellation point: no further tick or channel callback can run to
    /// completion against cleared state.
    fn abort_all(&mut self) {
        for handle in [
            self.clock.take(),
            self.channel.take(),
            self.signals.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
    }
}

pub struct SessionService {
    cfg: Arc<CoreConfig>,
    api: Arc<dyn AuthApi>,
    transport: Arc<dyn ChannelTransport>,
    credentials: Arc<dyn CredentialStore>,
    registry: ComponentRegistry,
    state: Mutex<SessionState>,
    tasks: Mutex<DriverTasks>,
    /// Bumped on every login and logout. Asynchronous work captures the
    /// value it started under and is discarded if the session has moved on,
    /// so a late-resolving fetch can never resurrect a cleared session.
    generation: AtomicU64,
    revision_tx: watch::Sender<u64>,
}

impl SessionService {
    pub fn new(
        cfg: CoreConfig,
        api: Arc<dyn AuthApi>,
        transport: Arc<dyn ChannelTransport>,
        credentials: Arc<dyn CredentialStore>,
        overrides: LabelOverrides,
        registry: ComponentRegistry,
    ) -> Arc<Self> {
        let clock = SessionClock::new(cfg.session_duration_secs(), cfg.warning_threshold_secs());
        let (revision_tx, _) = watch::channel(0);

        Arc::new(Self {
            cfg: Arc::new(cfg),
            api,
            transport,
            credentials,
            registry,
            state: Mutex::new(SessionState {
                principal: None,
                tokens: None,
                clock,
                store: MenuStore::new(Arc::new(overrides)),
                auth_ready: false,
                channel_connected: false,
                route_cache: None,
            }),
            tasks: Mutex::new(DriverTasks::default()),
            generation: AtomicU64::new(0),
            revision_tx,
        })
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tasks(&self) -> MutexGuard<'_, DriverTasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify_changed(&self) {
        self.revision_tx.send_modify(|v| *v = v.wrapping_add(1));
    }

    /// Validates any persisted credential and populates the session from it.
    ///
    /// Auth failures degrade to the logged-out state and clear the persisted
    /// credential; this never returns an error to the caller. The service is
    /// always marked auth-ready afterwards so dependent UI can stop blocking.
    pub async fn initialize(self: &Arc<Self>) {
        let stored = self.credentials.load().unwrap_or_else(|error| {
            tracing::warn!(%error, "could not read persisted credentials");
            None
        });

        if let Some(tokens) = stored {
            if let Err(error) = self.establish(tokens).await {
                tracing::warn!(%error, "persisted credential rejected; starting logged out");
                if let Err(error) = self.credentials.clear() {
                    tracing::warn!(%error, "could not clear persisted credentials");
                }
            }
        }

        self.state().auth_ready = true;
        self.notify_changed();
    }

    /// Exchanges the user credential for a session, persists the tokens and
    /// populates the session. Failure leaves the service logged out.
    pub async fn login(self: &Arc<Self>, user_id: &str, password: &str) -> CoreResult<()> {
        self.logout();

        let tokens = self.api.login(user_id, password).await?;
        if let Err(error) = self.credentials.store(&tokens) {
            // The session still works; it just will not survive a restart.
            tracing::warn!(%error, "could not persist credentials");
        }

        match self.establish(tokens).await {
            Ok(()) => Ok(()),
            Err(error) => {
                if let Err(clear_error) = self.credentials.clear() {
                    tracing::warn!(%clear_error, "could not clear persisted credentials");
                }
                Err(error)
            }
        }
    }

    /// Fetches principal and permission tree, then brings the session up:
    /// clock started, channel connected, auth-ready set.
    async fn establish(self: &Arc<Self>, tokens: TokenPair) -> CoreResult<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let me = self.api.fetch_me(&tokens.access).await?;
        let snapshot = self.api.fetch_menu(&tokens.access).await?;
        let tree = build_tree(snapshot.menus)?;
        let policy = GrantPolicy::for_role(me.role, snapshot.granted);
        let access = tokens.access.clone();

        {
            let mut state = self.state();
            if self.generation.load(Ordering::SeqCst) != generation {
                // A newer login or logout superseded this one mid-flight.
                return Ok(());
            }

            let principal = Principal::from_info(me);
            tracing::info!(
                user = %principal.id,
                role = %principal.role,
                session = %principal.session_id,
                "session established"
            );
            state.principal = Some(principal);
            state.tokens = Some(tokens);
            state.store.replace(tree, policy);
            state.route_cache = None;
            state.clock.start(self.cfg.session_duration_secs());
            state.auth_ready = true;
            state.channel_connected = false;
        }

        self.spawn_drivers(generation, access);
        self.notify_changed();
        Ok(())
    }

    fn spawn_drivers(self: &Arc<Self>, generation: u64, access: AccessToken) {
        // Cancel any prior cadence first so two countdowns never overlap.
        self.tasks().abort_all();

        let (signal_tx, mut signal_rx) = mpsc::unbounded_channel();

        let channel = tokio::spawn(run_channel(
            Arc::clone(&self.transport),
            access,
            Arc::clone(&self.cfg),
            signal_tx,
        ));

        let svc = Arc::clone(self);
        let signals = tokio::spawn(async move {
            while let Some(signal) = signal_rx.recv().await {
                svc.handle_channel_signal(generation, signal);
            }
        });

        let svc = Arc::clone(self);
        let clock = tokio::spawn(async move {
            svc.run_clock(generation).await;
        });

        let mut tasks = self.tasks();
        tasks.clock = Some(clock);
        tasks.channel = Some(channel);
        tasks.signals = Some(signals);
    }

    fn handle_channel_signal(self: &Arc<Self>, generation: u64, signal: ChannelSignal) {
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        match signal {
            ChannelSignal::Connected => {
                self.state().channel_connected = true;
                self.notify_changed();
            }
            ChannelSignal::Disconnected => {
                self.state().channel_connected = false;
                self.notify_changed();
            }
            ChannelSignal::PermissionChanged => {
                let svc = Arc::clone(self);
                tokio::spawn(async move {
                    svc.refresh_permissions(generation).await;
                });
            }
        }
    }

    /// Re-fetches the permission tree after a change notification.
    ///
    /// Overlapping refreshes are tolerated: `replace` is total, so whichever
    /// response lands last wins. A refresh resolving after logout is
    /// discarded by the generation guard.
    async fn refresh_permissions(self: &Arc<Self>, generation: u64) {
        let access = {
            let state = self.state();
            match &state.tokens {
                Some(tokens) => tokens.access.clone(),
                None => return,
            }
        };

        let snapshot = match self.api.fetch_menu(&access).await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                tracing::warn!(%error, "permission refresh failed; keeping last known tree");
                return;
            }
        };

        let mut state = self.state();
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        let Some(role) = state.principal.as_ref().map(|p| p.role) else {
            return;
        };

        match build_tree(snapshot.menus) {
            Ok(tree) => {
                state
                    .store
                    .replace(tree, GrantPolicy::for_role(role, snapshot.granted));
                state.route_cache = None;
                drop(state);
                tracing::info!("permission tree refreshed");
                self.notify_changed();
            }
            Err(error) => {
                tracing::warn!(%error, "refreshed menu tree malformed; keeping last known tree");
            }
        }
    }

    async fn run_clock(self: &Arc<Self>, generation: u64) {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(1));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick of a tokio interval completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if self.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            let event = self.state().clock.tick();
            match event {
                Some(ClockEvent::Warning) => {
                    tracing::info!(
                        threshold_secs = self.cfg.warning_threshold_secs(),
                        "session expiry warning"
                    );
                    self.notify_changed();
                }
                Some(ClockEvent::Expired) => {
                    tracing::info!("session expired");
                    self.logout();
                    return;
                }
                None => {}
            }
        }
    }

    /// Clears the session. Idempotent, and the universal cancellation point:
    /// the clock cadence and the channel (including any pending reconnect)
    /// are stopped synchronously before state is cleared, the persisted
    /// credential is removed, and the session state returns to a clean
    /// full-duration idle value.
    pub fn logout(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.tasks().abort_all();

        {
            let mut state = self.state();
            if let Some(principal) = &state.principal {
                tracing::info!(
                    user = %principal.id,
                    session = %principal.session_id,
                    "session closed"
                );
            }
            state.principal = None;
            state.tokens = None;
            state.store.clear();
            state.route_cache = None;
            state.channel_connected = false;
            state.clock.reset(self.cfg.session_duration_secs());
        }

        if let Err(error) = self.credentials.clear() {
            tracing::warn!(%error, "could not clear persisted credentials");
        }
        self.notify_changed();
    }

    /// Extends the client-side idle window from a user-facing action.
    ///
    /// No server round trip: session lifetime here is an idle concept
    /// layered atop the server-issued credential's own lifetime.
    pub fn renew_session(&self) {
        let mut state = self.state();
        if state.principal.is_none() {
            return;
        }
        state.clock.renew(self.cfg.session_duration_secs());
        drop(state);
        self.notify_changed();
    }

    /// The single authorization check the rest of the application uses.
    pub fn has_permission(&self, code: &MenuCode) -> bool {
        let state = self.state();
        state.principal.is_some() && state.store.is_granted(code)
    }

    /// Guard-style variant of [`has_permission`](Self::has_permission):
    /// distinguishes "not logged in" from "logged in but not granted".
    pub fn require_permission(&self, code: &MenuCode) -> CoreResult<()> {
        let state = self.state();
        if state.principal.is_none() {
            return Err(CoreError::Unauthenticated);
        }
        if state.store.is_granted(code) {
            Ok(())
        } else {
            Err(CoreError::Unauthorized(code.clone()))
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().principal.is_some()
    }

    /// Whether startup validation has finished (successfully or not).
    pub fn is_auth_ready(&self) -> bool {
        self.state().auth_ready
    }

    pub fn channel_connected(&self) -> bool {
        self.state().channel_connected
    }

    pub fn principal(&self) -> Option<Principal> {
        self.state().principal.clone()
    }

    pub fn session_remaining_secs(&self) -> u32 {
        self.state().clock.remaining_secs()
    }

    /// Whether the expiry warning has fired for the current countdown.
    pub fn session_warned(&self) -> bool {
        self.state().clock.has_warned()
    }

    pub fn menu_tree(&self) -> Arc<Vec<MenuNode>> {
        self.state().store.tree()
    }

    pub fn menu_revision(&self) -> u64 {
        self.state().store.revision()
    }

    /// Resolved display label for a menu node, as seen by the current
    /// principal's role.
    pub fn menu_label(&self, code: &MenuCode) -> Option<String> {
        let state = self.state();
        let role = state.principal.as_ref()?.role;
        state.store.label_for(code, role)
    }

    /// A watch stream bumped whenever navigation-relevant state changes;
    /// the router re-queries the route table and home path on each change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision_tx.subscribe()
    }

    /// The memoized route table, rebuilt when the store revision changes.
    pub fn route_table(&self) -> RouteTable {
        let mut state = self.state();
        let revision = state.store.revision();
        if let Some(cached) = &state.route_cache {
            if cached.revision() == revision {
                return cached.clone();
            }
        }
        let table = RouteTable::build(
            revision,
            &state.store.tree(),
            state.store.policy(),
            &self.registry,
        );
        state.route_cache = Some(table.clone());
        table
    }

    /// The default landing route for the current principal. `None` means
    /// nothing is accessible: a hard stop the UI renders as a holding state
    /// rather than broken navigation.
    pub fn home_path(&self) -> Option<String> {
        let state = self.state();
        if state.principal.is_none() {
            return None;
        }
        state.store.first_accessible_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use async_trait::async_trait;
    use cdss_api::{
        ApiError, ApiResult, ChannelPair, ChannelSink, ChannelStream, LabelSet, MenuNodeDto,
        MenuSnapshot, PrincipalInfo,
    };
    use cdss_types::Role;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;
    use tokio::sync::Semaphore;
    use tokio::time::timeout;

    fn code(s: &str) -> MenuCode {
        MenuCode::new(s).expect("valid code")
    }

    fn leaf_dto(id: &str, path: &str) -> MenuNodeDto {
        MenuNodeDto {
            id: id.to_owned(),
            label: LabelSet::new().with_default(id),
            path: Some(path.to_owned()),
            ..MenuNodeDto::default()
        }
    }

    fn doctor_snapshot() -> MenuSnapshot {
        MenuSnapshot {
            menus: vec![
                leaf_dto("DASHBOARD", "/dashboard"),
                leaf_dto("PATIENT_LIST", "/patients"),
                leaf_dto("ORDER_LIST", "/orders"),
            ],
            granted: vec![code("DASHBOARD"), code("PATIENT_LIST")],
        }
    }

    struct MockApi {
        principal: PrincipalInfo,
        snapshot: Mutex<MenuSnapshot>,
        fail_login: bool,
        reject_tokens: bool,
        menu_calls: AtomicU32,
        /// Block fetch_menu calls with index >= this value until permits
        /// arrive, to orchestrate a late-resolving refresh.
        menu_block_from: Option<u32>,
        menu_gate: Semaphore,
    }

    impl MockApi {
        fn new() -> Self {
            Self {
                principal: PrincipalInfo {
                    id: "doctor1".into(),
                    display_name: "Dr. Demo".into(),
                    role: Role::Doctor,
                },
                snapshot: Mutex::new(doctor_snapshot()),
                fail_login: false,
                reject_tokens: false,
                menu_calls: AtomicU32::new(0),
                menu_block_from: None,
                menu_gate: Semaphore::new(0),
            }
        }

        fn set_snapshot(&self, snapshot: MenuSnapshot) {
            *self
                .snapshot
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = snapshot;
        }
    }

    #[async_trait]
    impl AuthApi for MockApi {
        async fn login(&self, _user_id: &str, _password: &str) -> ApiResult<TokenPair> {
            if self.fail_login {
                return Err(ApiError::InvalidCredentials);
            }
            Ok(TokenPair::new("access-token", "refresh-token"))
        }

        async fn fetch_me(&self, _access: &AccessToken) -> ApiResult<PrincipalInfo> {
            if self.reject_tokens {
                return Err(ApiError::Unauthenticated);
            }
            Ok(self.principal.clone())
        }

        async fn fetch_menu(&self, _access: &AccessToken) -> ApiResult<MenuSnapshot> {
            let call = self.menu_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(from) = self.menu_block_from {
                if call >= from {
                    let _permit = self
                        .menu_gate
                        .acquire()
                        .await
                        .map_err(|_| ApiError::Server("gate closed".into()))?;
                }
            }
            Ok(self
                .snapshot
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone())
        }
    }

    /// Transport backed by a single scripted frame stream; reconnects fail.
    struct MockTransport {
        frames: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    }

    impl MockTransport {
        fn with_script() -> (Arc<Self>, mpsc::UnboundedSender<String>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                Arc::new(Self {
                    frames: Mutex::new(Some(rx)),
                }),
                tx,
            )
        }

        /// Transport that never connects, for tests that do not exercise
        /// the channel.
        fn offline() -> Arc<Self> {
            Arc::new(Self {
                frames: Mutex::new(None),
            })
        }
    }

    struct NullSink;

    #[async_trait]
    impl ChannelSink for NullSink {
        async fn send(&mut self, _frame: &str) -> ApiResult<()> {
            Ok(())
        }
    }

    struct ScriptStream {
        frames: mpsc::UnboundedReceiver<String>,
    }

    #[async_trait]
    impl ChannelStream for ScriptStream {
        async fn next_frame(&mut self) -> ApiResult<Option<String>> {
            Ok(self.frames.recv().await)
        }
    }

    #[async_trait]
    impl ChannelTransport for MockTransport {
        async fn connect(&self, _access: &AccessToken) -> ApiResult<ChannelPair> {
            let frames = self
                .frames
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take()
                .ok_or_else(|| ApiError::Connection("refused".into()))?;
            Ok((Box::new(NullSink), Box::new(ScriptStream { frames })))
        }
    }

    fn registry() -> ComponentRegistry {
        ComponentRegistry::new([
            code("DASHBOARD"),
            code("PATIENT_LIST"),
            code("ORDER_LIST"),
        ])
    }

    fn service(
        cfg: CoreConfig,
        api: Arc<MockApi>,
        transport: Arc<MockTransport>,
        credentials: Arc<MemoryCredentialStore>,
    ) -> Arc<SessionService> {
        SessionService::new(
            cfg,
            api,
            transport,
            credentials,
            LabelOverrides::new(),
            registry(),
        )
    }

    async fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) {
        timeout(deadline, async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test(start_paused = true)]
    async fn initialize_without_credentials_marks_ready_and_logged_out() {
        let svc = service(
            CoreConfig::default(),
            Arc::new(MockApi::new()),
            MockTransport::offline(),
            Arc::new(MemoryCredentialStore::new()),
        );

        assert!(!svc.is_auth_ready());
        svc.initialize().await;

        assert!(svc.is_auth_ready());
        assert!(!svc.is_authenticated());
        assert_eq!(svc.home_path(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn initialize_restores_a_persisted_session() {
        let credentials = Arc::new(MemoryCredentialStore::with_tokens(TokenPair::new(
            "persisted-access",
            "persisted-refresh",
        )));
        let svc = service(
            CoreConfig::default(),
            Arc::new(MockApi::new()),
            MockTransport::offline(),
            credentials,
        );

        svc.initialize().await;

        assert!(svc.is_authenticated());
        let principal = svc.principal().expect("principal set");
        assert_eq!(principal.id, "doctor1");
        assert_eq!(principal.role, Role::Doctor);
        assert_eq!(svc.home_path().as_deref(), Some("/dashboard"));
        assert_eq!(svc.route_table().entries().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn initialize_clears_a_rejected_credential() {
        let mut api = MockApi::new();
        api.reject_tokens = true;
        let credentials = Arc::new(MemoryCredentialStore::with_tokens(TokenPair::new(
            "stale-access",
            "stale-refresh",
        )));
        let svc = service(
            CoreConfig::default(),
            Arc::new(api),
            MockTransport::offline(),
            Arc::clone(&credentials),
        );

        svc.initialize().await;

        assert!(svc.is_auth_ready());
        assert!(!svc.is_authenticated());
        assert_eq!(credentials.load().expect("load succeeds"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn login_failure_leaves_the_service_logged_out() {
        let mut api = MockApi::new();
        api.fail_login = true;
        let svc = service(
            CoreConfig::default(),
            Arc::new(api),
            MockTransport::offline(),
            Arc::new(MemoryCredentialStore::new()),
        );

        let err = svc.login("doctor1", "wrong").await.expect_err("rejected");
        assert!(matches!(err, CoreError::Api(ApiError::InvalidCredentials)));
        assert!(!svc.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn logout_is_idempotent_and_fully_resets() {
        let credentials = Arc::new(MemoryCredentialStore::new());
        let svc = service(
            CoreConfig::default(),
            Arc::new(MockApi::new()),
            MockTransport::offline(),
            Arc::clone(&credentials),
        );

        svc.login("doctor1", "pw").await.expect("login succeeds");
        assert!(svc.is_authenticated());
        assert!(credentials.load().expect("load succeeds").is_some());

        svc.logout();
        assert!(!svc.is_authenticated());
        assert!(svc.menu_tree().is_empty());
        assert_eq!(svc.session_remaining_secs(), 1800);
        assert!(!svc.session_warned());
        assert!(!svc.channel_connected());
        assert_eq!(credentials.load().expect("load succeeds"), None);
        assert_eq!(svc.home_path(), None);

        // A second logout changes nothing and does not panic.
        svc.logout();
        assert!(!svc.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn permission_change_notification_replaces_the_tree() {
        let api = Arc::new(MockApi::new());
        let (transport, frames) = MockTransport::with_script();
        let svc = service(
            CoreConfig::default(),
            Arc::clone(&api),
            transport,
            Arc::new(MemoryCredentialStore::new()),
        );

        svc.login("doctor1", "pw").await.expect("login succeeds");
        let before = svc.menu_tree();
        let revision = svc.menu_revision();
        assert!(svc.has_permission(&code("PATIENT_LIST")));

        // An administrator revokes the patient list grant server-side.
        api.set_snapshot(MenuSnapshot {
            menus: doctor_snapshot().menus,
            granted: vec![code("DASHBOARD"), code("ORDER_LIST")],
        });
        frames
            .send(r#"{"type":"PERMISSION_CHANGED"}"#.to_owned())
            .expect("frame delivered");

        wait_until(Duration::from_secs(5), || svc.menu_revision() > revision).await;

        let after = svc.menu_tree();
        assert!(!Arc::ptr_eq(&before, &after));
        assert!(!svc.has_permission(&code("PATIENT_LIST")));
        assert!(svc.has_permission(&code("ORDER_LIST")));

        let paths: Vec<_> = svc
            .route_table()
            .entries()
            .iter()
            .map(|e| e.path.clone())
            .collect();
        assert_eq!(paths, ["/dashboard", "/orders"]);
    }

    #[tokio::test(start_paused = true)]
    async fn late_refresh_after_logout_is_discarded() {
        let mut api = MockApi::new();
        // Call 0 is the login fetch; the refresh (call 1) blocks on the gate.
        api.menu_block_from = Some(1);
        let api = Arc::new(api);
        let (transport, frames) = MockTransport::with_script();
        let svc = service(
            CoreConfig::default(),
            Arc::clone(&api),
            transport,
            Arc::new(MemoryCredentialStore::new()),
        );

        svc.login("doctor1", "pw").await.expect("login succeeds");
        frames
            .send(r#"{"type":"PERMISSION_CHANGED"}"#.to_owned())
            .expect("frame delivered");

        wait_until(Duration::from_secs(5), || {
            api.menu_calls.load(Ordering::SeqCst) >= 2
        })
        .await;

        // Logout races ahead of the in-flight refresh.
        svc.logout();
        api.menu_gate.add_permits(1);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!svc.is_authenticated());
        assert!(svc.menu_tree().is_empty());
        assert!(!svc.has_permission(&code("DASHBOARD")));
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_triggers_the_logout_path() {
        let cfg = CoreConfig::new(
            3,
            1,
            Duration::from_secs(30),
            Duration::from_secs(3),
            0,
        )
        .expect("valid config");
        let credentials = Arc::new(MemoryCredentialStore::new());
        let svc = service(
            cfg,
            Arc::new(MockApi::new()),
            MockTransport::offline(),
            Arc::clone(&credentials),
        );

        svc.login("doctor1", "pw").await.expect("login succeeds");
        assert!(svc.is_authenticated());

        wait_until(Duration::from_secs(10), || !svc.is_authenticated()).await;

        assert!(svc.menu_tree().is_empty());
        assert_eq!(credentials.load().expect("load succeeds"), None);
        assert_eq!(svc.session_remaining_secs(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn renew_session_rearms_the_warning() {
        let cfg = CoreConfig::new(
            60,
            55,
            Duration::from_secs(30),
            Duration::from_secs(3),
            0,
        )
        .expect("valid config");
        let svc = service(
            cfg,
            Arc::new(MockApi::new()),
            MockTransport::offline(),
            Arc::new(MemoryCredentialStore::new()),
        );

        svc.login("doctor1", "pw").await.expect("login succeeds");
        wait_until(Duration::from_secs(30), || svc.session_warned()).await;

        svc.renew_session();
        assert!(!svc.session_warned());
        assert_eq!(svc.session_remaining_secs(), 60);
    }

    #[tokio::test(start_paused = true)]
    async fn require_permission_distinguishes_unauthenticated_from_unauthorized() {
        let svc = service(
            CoreConfig::default(),
            Arc::new(MockApi::new()),
            MockTransport::offline(),
            Arc::new(MemoryCredentialStore::new()),
        );

        let err = svc
            .require_permission(&code("DASHBOARD"))
            .expect_err("not logged in");
        assert!(matches!(err, CoreError::Unauthenticated));

        svc.login("doctor1", "pw").await.expect("login succeeds");
        svc.require_permission(&code("DASHBOARD"))
            .expect("granted leaf");

        let err = svc
            .require_permission(&code("ORDER_LIST"))
            .expect_err("not granted");
        assert!(matches!(err, CoreError::Unauthorized(_)));
    }
}

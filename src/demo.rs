//! In-process demo backend.
//!
//! Implements the auth endpoints and the authorization channel against local
//! state so the shell can run a full session without a hospital backend. The
//! menu catalogue and per-role grants mirror a small CDSS deployment:
//! dashboards, patient management, order workflows, imaging, lab and admin.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::broadcast;

use cdss_api::{
    AccessToken, ApiError, ApiResult, AuthApi, ChannelMessage, ChannelPair, ChannelSink,
    ChannelStream, ChannelTransport, LabelSet, MenuNodeDto, MenuSnapshot, PrincipalInfo, TokenPair,
};
use cdss_types::{MenuCode, Role};

fn code(s: &str) -> MenuCode {
    MenuCode::new(s).expect("demo menu codes are valid")
}

fn leaf(id: &str, path: &str, icon: Option<&str>, label: LabelSet) -> MenuNodeDto {
    MenuNodeDto {
        id: id.to_owned(),
        label,
        path: Some(path.to_owned()),
        icon: icon.map(str::to_owned),
        breadcrumb_only: false,
        children: Vec::new(),
    }
}

fn group(id: &str, label: LabelSet, children: Vec<MenuNodeDto>) -> MenuNodeDto {
    MenuNodeDto {
        id: id.to_owned(),
        label,
        path: None,
        icon: None,
        breadcrumb_only: false,
        children,
    }
}

/// The demo permission tree.
pub fn demo_menu() -> Vec<MenuNodeDto> {
    vec![
        leaf(
            "DASHBOARD",
            "/dashboard",
            Some("home"),
            LabelSet::new()
                .with_default("Dashboard")
                .with_role(Role::Doctor, "Doctor Dashboard")
                .with_role(Role::Nurse, "Nursing Dashboard"),
        ),
        group(
            "PATIENT",
            LabelSet::new().with_default("Patients"),
            vec![
                leaf(
                    "PATIENT_LIST",
                    "/patients",
                    Some("users"),
                    LabelSet::new().with_default("Patient Management"),
                ),
                MenuNodeDto {
                    id: "PATIENT_DETAIL".to_owned(),
                    label: LabelSet::new().with_default("Patient Detail"),
                    path: Some("/patients/detail".to_owned()),
                    icon: None,
                    breadcrumb_only: true,
                    children: Vec::new(),
                },
            ],
        ),
        group(
            "ORDER",
            LabelSet::new().with_default("Orders"),
            vec![
                leaf(
                    "ORDER_LIST",
                    "/orders",
                    Some("clipboard"),
                    LabelSet::new()
                        .with_default("Examination Orders")
                        .with_role(Role::Nurse, "Order Status"),
                ),
                leaf(
                    "ORDER_CREATE",
                    "/orders/create",
                    None,
                    LabelSet::new().with_default("Create Order"),
                ),
            ],
        ),
        group(
            "IMAGING",
            LabelSet::new().with_default("Imaging"),
            vec![
                leaf(
                    "IMAGE_VIEWER",
                    "/imaging",
                    Some("image"),
                    LabelSet::new()
                        .with_default("Image Reading (RIS)")
                        .with_role(Role::Doctor, "Image Viewer"),
                ),
                leaf(
                    "RIS_WORKLIST",
                    "/ris/worklist",
                    None,
                    LabelSet::new().with_default("Reading Worklist"),
                ),
            ],
        ),
        leaf(
            "AI_SUMMARY",
            "/ai",
            Some("brain"),
            LabelSet::new()
                .with_default("AI Analysis Summary")
                .with_role(Role::Nurse, "AI Results"),
        ),
        group(
            "LAB",
            LabelSet::new().with_default("Laboratory"),
            vec![
                leaf(
                    "LAB_RESULT_UPLOAD",
                    "/lab/upload",
                    Some("flask"),
                    LabelSet::new().with_default("Upload Lab Results"),
                ),
                leaf(
                    "LAB_RESULT_VIEW",
                    "/lab",
                    None,
                    LabelSet::new().with_default("Lab Results"),
                ),
            ],
        ),
        group(
            "ADMIN",
            LabelSet::new().with_default("Administration"),
            vec![
                leaf(
                    "ADMIN_USER",
                    "/admin/users",
                    Some("settings"),
                    LabelSet::new().with_default("User Management"),
                ),
                leaf(
                    "ADMIN_MENU_PERMISSION",
                    "/admin/permissions",
                    None,
                    LabelSet::new().with_default("Menu Permissions"),
                ),
                leaf(
                    "ADMIN_AUDIT_LOG",
                    "/admin/audit",
                    None,
                    LabelSet::new().with_role(Role::Admin, "Access Audit Log"),
                ),
                leaf(
                    "ADMIN_SYSTEM_MONITOR",
                    "/admin/monitor",
                    None,
                    LabelSet::new().with_role(Role::Admin, "System Monitoring"),
                ),
            ],
        ),
    ]
}

/// Every leaf code the demo shell can render.
pub fn demo_codes() -> Vec<MenuCode> {
    [
        "DASHBOARD",
        "PATIENT_LIST",
        "PATIENT_DETAIL",
        "ORDER_LIST",
        "ORDER_CREATE",
        "IMAGE_VIEWER",
        "RIS_WORKLIST",
        "AI_SUMMARY",
        "LAB_RESULT_UPLOAD",
        "LAB_RESULT_VIEW",
        "ADMIN_USER",
        "ADMIN_MENU_PERMISSION",
        "ADMIN_AUDIT_LOG",
        "ADMIN_SYSTEM_MONITOR",
    ]
    .into_iter()
    .map(code)
    .collect()
}

fn default_grants() -> HashMap<Role, Vec<MenuCode>> {
    let mut grants = HashMap::new();
    grants.insert(
        Role::Doctor,
        ["DASHBOARD", "PATIENT_LIST", "PATIENT_DETAIL", "ORDER_LIST", "ORDER_CREATE", "IMAGE_VIEWER", "AI_SUMMARY", "LAB_RESULT_VIEW"]
            .into_iter()
            .map(code)
            .collect(),
    );
    grants.insert(
        Role::Nurse,
        ["DASHBOARD", "PATIENT_LIST", "ORDER_LIST", "AI_SUMMARY", "LAB_RESULT_VIEW"]
            .into_iter()
            .map(code)
            .collect(),
    );
    grants.insert(
        Role::Ris,
        ["IMAGE_VIEWER", "RIS_WORKLIST"].into_iter().map(code).collect(),
    );
    grants.insert(
        Role::Lis,
        ["LAB_RESULT_UPLOAD", "LAB_RESULT_VIEW"].into_iter().map(code).collect(),
    );
    grants.insert(
        Role::Admin,
        ["ADMIN_USER", "ADMIN_MENU_PERMISSION", "ADMIN_AUDIT_LOG", "ADMIN_SYSTEM_MONITOR"]
            .into_iter()
            .map(code)
            .collect(),
    );
    grants
}

struct DemoUser {
    password: String,
    principal: PrincipalInfo,
}

/// Local stand-in for the hospital backend: auth endpoints plus the
/// authorization channel, sharing one grant table.
pub struct DemoBackend {
    users: HashMap<String, DemoUser>,
    grants: Mutex<HashMap<Role, Vec<MenuCode>>>,
    sessions: Mutex<HashMap<String, String>>,
    token_counter: AtomicU64,
    events: broadcast::Sender<String>,
}

impl DemoBackend {
    pub fn new() -> Self {
        let mut users = HashMap::new();
        users.insert(
            "doctor1".to_owned(),
            DemoUser {
                password: "demo".to_owned(),
                principal: PrincipalInfo {
                    id: "doctor1".to_owned(),
                    display_name: "Dr. Demo".to_owned(),
                    role: Role::Doctor,
                },
            },
        );
        users.insert(
            "nurse1".to_owned(),
            DemoUser {
                password: "demo".to_owned(),
                principal: PrincipalInfo {
                    id: "nurse1".to_owned(),
                    display_name: "Nurse Demo".to_owned(),
                    role: Role::Nurse,
                },
            },
        );
        users.insert(
            "sysmgr".to_owned(),
            DemoUser {
                password: "demo".to_owned(),
                principal: PrincipalInfo {
                    id: "sysmgr".to_owned(),
                    display_name: "System Manager".to_owned(),
                    role: Role::SystemManager,
                },
            },
        );

        let (events, _) = broadcast::channel(16);
        Self {
            users,
            grants: Mutex::new(default_grants()),
            sessions: Mutex::new(HashMap::new()),
            token_counter: AtomicU64::new(0),
            events,
        }
    }

    fn grants_guard(&self) -> std::sync::MutexGuard<'_, HashMap<Role, Vec<MenuCode>>> {
        self.grants
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn sessions_guard(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn role_for_token(&self, access: &AccessToken) -> ApiResult<Role> {
        let sessions = self.sessions_guard();
        let user_id = sessions
            .get(access.as_str())
            .ok_or(ApiError::Unauthenticated)?;
        self.users
            .get(user_id)
            .map(|user| user.principal.role)
            .ok_or(ApiError::Unauthenticated)
    }

    /// Rewrites a role's grant set and pushes a change notification over
    /// the channel, like an administrator editing role-menu mappings.
    pub fn update_grants(&self, role: Role, codes: Vec<MenuCode>) {
        self.grants_guard().insert(role, codes);
        let _ = self
            .events
            .send(ChannelMessage::PermissionChanged.to_frame());
    }
}

#[async_trait]
impl AuthApi for DemoBackend {
    async fn login(&self, user_id: &str, password: &str) -> ApiResult<TokenPair> {
        let user = self
            .users
            .get(user_id)
            .filter(|user| user.password == password)
            .ok_or(ApiError::InvalidCredentials)?;

        let n = self.token_counter.fetch_add(1, Ordering::SeqCst);
        let access = format!("demo-access-{n}");
        self.sessions_guard()
            .insert(access.clone(), user.principal.id.clone());
        Ok(TokenPair::new(access, format!("demo-refresh-{n}")))
    }

    async fn fetch_me(&self, access: &AccessToken) -> ApiResult<PrincipalInfo> {
        let sessions = self.sessions_guard();
        let user_id = sessions
            .get(access.as_str())
            .ok_or(ApiError::Unauthenticated)?;
        self.users
            .get(user_id)
            .map(|user| user.principal.clone())
            .ok_or(ApiError::Unauthenticated)
    }

    async fn fetch_menu(&self, access: &AccessToken) -> ApiResult<MenuSnapshot> {
        let role = self.role_for_token(access)?;
        let granted = self.grants_guard().get(&role).cloned().unwrap_or_default();
        Ok(MenuSnapshot {
            menus: demo_menu(),
            granted,
        })
    }
}

struct DemoSink {
    events: broadcast::Sender<String>,
}

#[async_trait]
impl ChannelSink for DemoSink {
    async fn send(&mut self, frame: &str) -> ApiResult<()> {
        // Acknowledge heartbeats; everything else is dropped.
        if matches!(
            serde_json::from_str::<ChannelMessage>(frame),
            Ok(ChannelMessage::Ping)
        ) {
            let _ = self.events.send(ChannelMessage::Pong.to_frame());
        }
        Ok(())
    }
}

struct DemoStream {
    events: broadcast::Receiver<String>,
}

#[async_trait]
impl ChannelStream for DemoStream {
    async fn next_frame(&mut self) -> ApiResult<Option<String>> {
        loop {
            match self.events.recv().await {
                Ok(frame) => return Ok(Some(frame)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "demo channel receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(None),
            }
        }
    }
}

#[async_trait]
impl ChannelTransport for DemoBackend {
    async fn connect(&self, access: &AccessToken) -> ApiResult<ChannelPair> {
        // The handshake carries the credential; reject unknown tokens.
        self.role_for_token(access)?;
        Ok((
            Box::new(DemoSink {
                events: self.events.clone(),
            }),
            Box::new(DemoStream {
                events: self.events.subscribe(),
            }),
        ))
    }
}

//! CDSS session core demo shell.
//!
//! Wires the session service to an in-process backend and walks through a
//! complete session: startup validation, login, route derivation, a live
//! permission change, renewal and logout. The context object is constructed
//! once here at the application root and passed by reference to consumers.
//!
//! # Environment Variables
//! - `CDSS_SESSION_DURATION`: idle session lifetime in seconds (default 1800)
//! - `CDSS_WARNING_THRESHOLD`: expiry warning threshold in seconds (default 300)

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cdss_core::config::{
    DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY,
    DEFAULT_SESSION_DURATION_SECS, DEFAULT_WARNING_THRESHOLD_SECS,
};
use cdss_core::{
    ComponentRegistry, CoreConfig, LabelOverrides, MemoryCredentialStore, SessionService,
    seconds_from_env_value,
};
use cdss_types::{MenuCode, Role};

mod demo;

use demo::{DemoBackend, demo_codes};

fn label_overrides() -> LabelOverrides {
    let mut overrides = LabelOverrides::new();
    let patient_list = MenuCode::new("PATIENT_LIST").expect("valid code");
    overrides.insert(patient_list.clone(), Role::Doctor, "Patient List");
    overrides.insert(patient_list.clone(), Role::Patient, "My Care Records");
    overrides.insert(patient_list, Role::SystemManager, "Patient Management");

    let dashboard = MenuCode::new("DASHBOARD").expect("valid code");
    overrides.insert(dashboard.clone(), Role::Lis, "Laboratory Dashboard");
    overrides.insert(dashboard.clone(), Role::Ris, "Radiology Dashboard");
    overrides.insert(dashboard, Role::SystemManager, "System Dashboard");
    overrides
}

fn print_session(svc: &SessionService) {
    match svc.principal() {
        Some(principal) => {
            tracing::info!(
                user = %principal.display_name,
                role = %principal.role.display_name(),
                "authenticated principal"
            );
            match svc.home_path() {
                Some(home) => tracing::info!(%home, "home path"),
                None => tracing::warn!("no accessible home path; routing is held"),
            }
            for entry in svc.route_table().entries() {
                let label = svc
                    .menu_label(&entry.code)
                    .unwrap_or_else(|| entry.code.to_string());
                tracing::info!(path = %entry.path, %label, "route");
            }
        }
        None => tracing::info!("no principal; logged out"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("cdss=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let session_duration = seconds_from_env_value(
        std::env::var("CDSS_SESSION_DURATION").ok(),
        DEFAULT_SESSION_DURATION_SECS,
    )?;
    let warning_threshold = seconds_from_env_value(
        std::env::var("CDSS_WARNING_THRESHOLD").ok(),
        DEFAULT_WARNING_THRESHOLD_SECS,
    )?;
    let cfg = CoreConfig::new(
        session_duration,
        warning_threshold,
        DEFAULT_HEARTBEAT_INTERVAL,
        DEFAULT_RECONNECT_DELAY,
        DEFAULT_MAX_RECONNECT_ATTEMPTS,
    )?;

    let backend = Arc::new(DemoBackend::new());
    let api: Arc<DemoBackend> = Arc::clone(&backend);
    let transport: Arc<DemoBackend> = Arc::clone(&backend);
    let svc = SessionService::new(
        cfg,
        api,
        transport,
        Arc::new(MemoryCredentialStore::new()),
        label_overrides(),
        ComponentRegistry::new(demo_codes()),
    );

    tracing::info!("-- Starting CDSS session core demo");

    // No persisted credential: validation finishes logged out but ready.
    svc.initialize().await;
    tracing::info!(
        auth_ready = svc.is_auth_ready(),
        authenticated = svc.is_authenticated(),
        "startup validation finished"
    );

    svc.login("doctor1", "demo").await?;
    print_session(&svc);

    // The handshake happens in the background; wait for it so the change
    // notification below has a live subscriber.
    tokio::time::timeout(Duration::from_secs(5), async {
        let mut changes = svc.subscribe();
        while !svc.channel_connected() {
            if changes.changed().await.is_err() {
                break;
            }
        }
    })
    .await
    .ok();

    // An administrator narrows the doctor grants server-side; the channel
    // notification re-derives routes without a reload.
    let mut changes = svc.subscribe();
    let revision = svc.menu_revision();
    backend.update_grants(
        Role::Doctor,
        ["DASHBOARD", "PATIENT_LIST"]
            .into_iter()
            .map(|c| MenuCode::new(c).expect("valid code"))
            .collect(),
    );

    tokio::time::timeout(Duration::from_secs(5), async {
        while svc.menu_revision() <= revision {
            if changes.changed().await.is_err() {
                break;
            }
        }
    })
    .await
    .ok();

    tracing::info!("permission change applied");
    print_session(&svc);

    svc.renew_session();
    tracing::info!(
        remaining_secs = svc.session_remaining_secs(),
        connected = svc.channel_connected(),
        "session renewed"
    );

    svc.logout();
    tracing::info!(
        authenticated = svc.is_authenticated(),
        remaining_secs = svc.session_remaining_secs(),
        "logged out"
    );

    Ok(())
}

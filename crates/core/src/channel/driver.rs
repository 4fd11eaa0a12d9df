//! Async driver for the live authorization channel.
//!
//! Interprets the [`ChannelMachine`] against a [`ChannelTransport`]:
//! heartbeats at a fixed interval, decodes inbound frames, reconnects after
//! a fixed delay up to the configured ceiling, and reports everything to the
//! session service through signals. Connection failures are never fatal to
//! the application; permission data simply stays at its last-known-good
//! value until the next successful fetch.

use std::sync::Arc;

use cdss_api::{AccessToken, ChannelMessage, ChannelSink, ChannelStream, ChannelTransport};
use tokio::sync::mpsc;

use crate::channel::state::{ChannelMachine, ReconnectDecision};
use crate::config::CoreConfig;

/// Signals the driver reports to the session service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChannelSignal {
    Connected,
    Disconnected,
    /// Server-side permissions changed; the service re-fetches the tree.
    PermissionChanged,
}

/// Runs the channel until the reconnect ceiling is exhausted or the owning
/// task is aborted (logout tears the driver down from outside).
pub(crate) async fn run_channel(
    transport: Arc<dyn ChannelTransport>,
    access: AccessToken,
    cfg: Arc<CoreConfig>,
    signals: mpsc::UnboundedSender<ChannelSignal>,
) {
    let mut machine = ChannelMachine::new(cfg.max_reconnect_attempts());

    loop {
        if !machine.begin_connect() {
            return;
        }

        match transport.connect(&access).await {
            Ok((sink, stream)) => {
                machine.connected();
                let _ = signals.send(ChannelSignal::Connected);
                tracing::info!("authorization channel connected");

                serve_connection(sink, stream, &cfg, &signals).await;
                let _ = signals.send(ChannelSignal::Disconnected);
            }
            Err(error) => {
                tracing::warn!(%error, "authorization channel connect failed");
            }
        }

        match machine.disconnected() {
            ReconnectDecision::Retry { attempt } => {
                tracing::info!(
                    attempt,
                    max = cfg.max_reconnect_attempts(),
                    "scheduling authorization channel reconnect"
                );
                tokio::time::sleep(cfg.reconnect_delay()).await;
            }
            ReconnectDecision::GiveUp => {
                tracing::warn!(
                    "authorization channel reconnect attempts exhausted; \
                     permissions stay at last known good"
                );
                return;
            }
        }
    }
}

/// Pumps one established connection until it drops: sends the periodic
/// heartbeat and dispatches inbound frames.
async fn serve_connection(
    mut sink: Box<dyn ChannelSink>,
    mut stream: Box<dyn ChannelStream>,
    cfg: &CoreConfig,
    signals: &mpsc::UnboundedSender<ChannelSignal>,
) {
    let period = cfg.heartbeat_interval();
    let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                tracing::debug!("sending channel heartbeat");
                if let Err(error) = sink.send(&ChannelMessage::Ping.to_frame()).await {
                    tracing::warn!(%error, "heartbeat send failed; closing channel");
                    return;
                }
            }
            frame = stream.next_frame() => match frame {
                Ok(Some(text)) => handle_frame(&text, signals),
                Ok(None) => {
                    tracing::info!("authorization channel closed by server");
                    return;
                }
                Err(error) => {
                    tracing::warn!(%error, "authorization channel read failed");
                    return;
                }
            }
        }
    }
}

fn handle_frame(text: &str, signals: &mpsc::UnboundedSender<ChannelSignal>) {
    match serde_json::from_str::<ChannelMessage>(text) {
        Ok(ChannelMessage::PermissionChanged) => {
            tracing::info!("permission change notification received");
            let _ = signals.send(ChannelSignal::PermissionChanged);
        }
        Ok(ChannelMessage::Pong) => tracing::debug!("heartbeat acknowledged"),
        Ok(ChannelMessage::Ping) => tracing::debug!("ignoring server-initiated ping"),
        Err(error) => {
            tracing::warn!(%error, frame = %text, "ignoring unrecognised channel frame");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cdss_api::{ApiError, ApiResult, ChannelPair};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn test_cfg(max_attempts: u32) -> Arc<CoreConfig> {
        Arc::new(
            CoreConfig::new(
                1800,
                300,
                Duration::from_secs(30),
                Duration::from_secs(3),
                max_attempts,
            )
            .expect("valid config"),
        )
    }

    /// Transport whose connect always fails.
    struct DeadTransport {
        connects: AtomicU32,
    }

    #[async_trait]
    impl ChannelTransport for DeadTransport {
        async fn connect(&self, _access: &AccessToken) -> ApiResult<ChannelPair> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Err(ApiError::Connection("refused".into()))
        }
    }

    /// Transport that connects once, handing out scripted frames and
    /// capturing everything sent.
    struct ScriptedTransport {
        frames: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
        sent: Arc<Mutex<Vec<String>>>,
    }

    struct ScriptedSink {
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ChannelSink for ScriptedSink {
        async fn send(&mut self, frame: &str) -> ApiResult<()> {
            self.sent
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(frame.to_owned());
            Ok(())
        }
    }

    struct ScriptedStream {
        frames: mpsc::UnboundedReceiver<String>,
    }

    #[async_trait]
    impl ChannelStream for ScriptedStream {
        async fn next_frame(&mut self) -> ApiResult<Option<String>> {
            Ok(self.frames.recv().await)
        }
    }

    #[async_trait]
    impl ChannelTransport for ScriptedTransport {
        async fn connect(&self, _access: &AccessToken) -> ApiResult<ChannelPair> {
            let frames = self
                .frames
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .take()
                .ok_or_else(|| ApiError::Connection("already consumed".into()))?;
            Ok((
                Box::new(ScriptedSink {
                    sent: Arc::clone(&self.sent),
                }),
                Box::new(ScriptedStream { frames }),
            ))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_the_attempt_ceiling() {
        let transport = Arc::new(DeadTransport {
            connects: AtomicU32::new(0),
        });
        let (tx, mut rx) = mpsc::unbounded_channel();

        run_channel(
            Arc::clone(&transport) as Arc<dyn ChannelTransport>,
            AccessToken::new("t"),
            test_cfg(2),
            tx,
        )
        .await;

        // Initial connect plus two retries.
        assert_eq!(transport.connects.load(Ordering::SeqCst), 3);
        assert_eq!(rx.try_recv().ok(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn forwards_permission_changes_and_skips_unknown_frames() {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(ScriptedTransport {
            frames: Mutex::new(Some(frame_rx)),
            sent: Arc::new(Mutex::new(Vec::new())),
        });
        let (tx, mut rx) = mpsc::unbounded_channel();

        frame_tx
            .send(r#"{"type":"OCS_CREATED","ocs_id":"x"}"#.to_owned())
            .expect("send frame");
        frame_tx
            .send(r#"{"type":"PERMISSION_CHANGED","role":"DOCTOR"}"#.to_owned())
            .expect("send frame");
        drop(frame_tx);

        run_channel(
            Arc::clone(&transport) as Arc<dyn ChannelTransport>,
            AccessToken::new("t"),
            test_cfg(0),
            tx,
        )
        .await;

        let mut signals = Vec::new();
        while let Ok(signal) = rx.try_recv() {
            signals.push(signal);
        }
        assert_eq!(
            signals,
            [
                ChannelSignal::Connected,
                ChannelSignal::PermissionChanged,
                ChannelSignal::Disconnected,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sends_heartbeats_at_the_configured_interval() {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let transport = Arc::new(ScriptedTransport {
            frames: Mutex::new(Some(frame_rx)),
            sent: Arc::clone(&sent),
        });
        let (tx, _rx) = mpsc::unbounded_channel();

        let driver = tokio::spawn(run_channel(
            transport as Arc<dyn ChannelTransport>,
            AccessToken::new("t"),
            test_cfg(0),
            tx,
        ));

        tokio::time::sleep(Duration::from_secs(61)).await;

        let pings = sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        assert_eq!(pings.len(), 2);
        assert_eq!(pings[0], r#"{"type":"ping"}"#);

        drop(frame_tx);
        driver.await.expect("driver finishes");
    }
}

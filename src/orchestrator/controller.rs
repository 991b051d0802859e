//! Alert command funnel.
//!
//! All producers converge on one queue and one loop, so the controller only
//! ever sees one caller at a time and a navigation delivery in flight is
//! observable until it completes.

use crate::alert::{AlertController, StartOutcome, StopOutcome};
use crate::model::{AlertEvent, AlertRequest, HostConfig, InfoEvent};
use crate::navigation::{self, NavOutcome, UiBridge};
use crate::storage;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Commands emitted by UI surfaces to control the alert. Classified push
/// triggers enter the same queue as `Start`.
#[derive(Debug, Clone)]
pub enum UiCommand {
    Start(AlertRequest),
    Stop,
    Status,
    /// The user opened the app from the alert (notification tap or deep
    /// link): stop ringing, then navigate to the order screen.
    Open { order_id: Option<String> },
    Quit,
}

/// Internal handle for a navigation delivery in flight.
struct NavCtx {
    path: String,
    handle: tokio::task::JoinHandle<NavOutcome>,
}

/// Stop the alert, persist the UI hints, and kick off bounded-retry delivery.
fn start_navigation(
    cfg: &HostConfig,
    controller: &AlertController,
    bridge: &Arc<dyn UiBridge>,
    event_tx: &UnboundedSender<AlertEvent>,
    order_id: Option<String>,
) -> NavCtx {
    // Opening the app always silences the alert before anything else.
    controller.stop();

    let path = navigation::build_path(&cfg.navigation_target, order_id.as_deref());

    // Hints are written before the instruction is issued so the UI can
    // suppress its default redirect. A write failure only costs the hint.
    if let Err(e) = storage::write_nav_hints(cfg.state_dir.as_deref(), &path) {
        let _ = event_tx.send(AlertEvent::Info(InfoEvent::HintWriteFailed {
            reason: format!("{e:#}"),
        }));
    }

    let bridge = bridge.clone();
    let max_attempts = cfg.nav_max_attempts;
    let retry_delay = cfg.nav_retry_delay;
    let task_path = path.clone();
    let handle = tokio::spawn(async move {
        navigation::deliver_when_ready(bridge.as_ref(), &task_path, max_attempts, retry_delay)
            .await
    });

    NavCtx { path, handle }
}

/// Drive the alert controller from the command queue until `Quit` or the
/// queue closes. Teardown stops an active alert and abandons any delivery
/// still polling for the UI.
pub async fn run_controller(
    cfg: &HostConfig,
    controller: Arc<AlertController>,
    bridge: Arc<dyn UiBridge>,
    event_tx: UnboundedSender<AlertEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let mut nav_ctx: Option<NavCtx> = None;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Start(request)) => {
                        if let StartOutcome::AlreadyActive = controller.start(request) {
                            let _ = event_tx.send(AlertEvent::Info(InfoEvent::StartIgnored));
                        }
                    }
                    Some(UiCommand::Stop) => {
                        if let StopOutcome::Idle = controller.stop() {
                            let _ = event_tx.send(AlertEvent::Info(InfoEvent::StopIgnored));
                        }
                    }
                    Some(UiCommand::Status) => {
                        let _ = event_tx.send(AlertEvent::Status {
                            snapshot: controller.snapshot(),
                        });
                    }
                    Some(UiCommand::Open { order_id }) => {
                        // A newer open supersedes a delivery still polling
                        // readiness; only one navigation is ever in flight.
                        if let Some(ctx) = nav_ctx.take() {
                            ctx.handle.abort();
                        }
                        nav_ctx = Some(start_navigation(
                            cfg,
                            &controller,
                            &bridge,
                            &event_tx,
                            order_id,
                        ));
                    }
                    Some(UiCommand::Quit) | None => {
                        controller.stop();
                        if let Some(ctx) = nav_ctx.take() {
                            ctx.handle.abort();
                        }
                        break;
                    }
                }
            }
            // Poll the delivery handle through a reference; taking it out
            // first would drop it whenever another branch wins the race.
            join_res = async {
                match nav_ctx.as_mut() {
                    Some(ctx) => (&mut ctx.handle).await,
                    None => futures::future::pending().await,
                }
            } => {
                if let Some(ctx) = nav_ctx.take() {
                    match join_res {
                        Ok(NavOutcome::Delivered { attempt }) => {
                            let _ = event_tx.send(AlertEvent::NavigationDelivered {
                                path: ctx.path,
                                attempt,
                            });
                        }
                        Ok(NavOutcome::GaveUp { attempts }) => {
                            // The navigation never happened; stale pending
                            // hints would suppress the UI's default redirect
                            // on its next launch.
                            let _ = storage::clear_nav_hints(cfg.state_dir.as_deref());
                            let _ = event_tx.send(AlertEvent::NavigationAbandoned {
                                path: ctx.path,
                                attempts,
                            });
                        }
                        // Aborted by a superseding open or by teardown.
                        Err(_) => {}
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::effects::testing::counting_channels;
    use crate::model::AlertSnapshot;
    use crate::navigation::testing::ScriptedBridge;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    fn config(state_dir: &std::path::Path) -> HostConfig {
        HostConfig {
            navigation_target: "accept-orders".to_string(),
            nav_max_attempts: 20,
            nav_retry_delay: Duration::from_millis(1),
            sound: true,
            bell_interval: Duration::from_secs(1),
            state_dir: Some(state_dir.to_path_buf()),
        }
    }

    async fn next_event(rx: &mut UnboundedReceiver<AlertEvent>) -> AlertEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn commands_drive_the_full_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let (event_tx, mut event_rx) = unbounded_channel();
        let (cmd_tx, cmd_rx) = unbounded_channel();
        let (channels, counters) = counting_channels(false);
        let controller = Arc::new(AlertController::new(channels, event_tx.clone()));
        let bridge: Arc<dyn UiBridge> = Arc::new(ScriptedBridge::new(0, 0));

        cmd_tx
            .send(UiCommand::Start(AlertRequest {
                order_id: Some("42".to_string()),
                ..Default::default()
            }))
            .unwrap();
        cmd_tx.send(UiCommand::Status).unwrap();
        cmd_tx.send(UiCommand::Stop).unwrap();
        cmd_tx.send(UiCommand::Quit).unwrap();

        run_controller(&cfg, controller.clone(), bridge, event_tx, cmd_rx)
            .await
            .unwrap();

        // Posted notification, started alert, status, stopped, withdrawn.
        let mut saw_status: Option<AlertSnapshot> = None;
        let mut saw_started = false;
        let mut saw_stopped = false;
        while let Ok(ev) = event_rx.try_recv() {
            match ev {
                AlertEvent::AlertStarted { order_id } => {
                    assert_eq!(order_id.as_deref(), Some("42"));
                    saw_started = true;
                }
                AlertEvent::Status { snapshot } => saw_status = Some(snapshot),
                AlertEvent::AlertStopped => saw_stopped = true,
                _ => {}
            }
        }
        assert!(saw_started);
        assert!(saw_stopped);
        let snapshot = saw_status.expect("no status event");
        assert!(snapshot.running);
        assert_eq!(snapshot.order_id.as_deref(), Some("42"));
        assert_eq!(counters.posted.load(Ordering::SeqCst), 1);
        assert_eq!(counters.withdrawn.load(Ordering::SeqCst), 1);
        assert!(!controller.is_running());
    }

    #[tokio::test]
    async fn open_stops_the_alert_writes_hints_and_delivers() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let (event_tx, mut event_rx) = unbounded_channel();
        let (cmd_tx, cmd_rx) = unbounded_channel();
        let (channels, _counters) = counting_channels(false);
        let controller = Arc::new(AlertController::new(channels, event_tx.clone()));
        let bridge = Arc::new(ScriptedBridge::new(3, 0));

        cmd_tx
            .send(UiCommand::Start(AlertRequest {
                order_id: Some("7".to_string()),
                ..Default::default()
            }))
            .unwrap();
        cmd_tx
            .send(UiCommand::Open {
                order_id: Some("7".to_string()),
            })
            .unwrap();

        let bridge_dyn: Arc<dyn UiBridge> = bridge.clone();
        let loop_handle = tokio::spawn({
            let controller = controller.clone();
            async move { run_controller(&cfg, controller, bridge_dyn, event_tx, cmd_rx).await }
        });

        let delivered = loop {
            match next_event(&mut event_rx).await {
                AlertEvent::NavigationDelivered { path, attempt } => break (path, attempt),
                AlertEvent::NavigationAbandoned { .. } => panic!("delivery abandoned"),
                _ => {}
            }
        };
        assert_eq!(delivered.0, "/accept-orders?orderId=7");
        assert_eq!(delivered.1, 4);
        assert!(!controller.is_running());

        let hints = storage::read_nav_hints(Some(dir.path())).unwrap();
        assert_eq!(hints.native_navigation_pending.as_deref(), Some("true"));
        assert_eq!(
            hints.native_navigation_path.as_deref(),
            Some("/accept-orders?orderId=7")
        );
        assert_eq!(
            bridge.delivered.lock().unwrap().as_slice(),
            ["/accept-orders?orderId=7"]
        );

        cmd_tx.send(UiCommand::Quit).unwrap();
        loop_handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn abandoned_delivery_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.nav_max_attempts = 3;
        let (event_tx, mut event_rx) = unbounded_channel();
        let (cmd_tx, cmd_rx) = unbounded_channel();
        let (channels, _counters) = counting_channels(false);
        let controller = Arc::new(AlertController::new(channels, event_tx.clone()));
        let bridge: Arc<dyn UiBridge> = Arc::new(ScriptedBridge::new(u32::MAX, 0));

        cmd_tx.send(UiCommand::Open { order_id: None }).unwrap();

        let loop_handle = tokio::spawn({
            let controller = controller.clone();
            async move { run_controller(&cfg, controller, bridge, event_tx, cmd_rx).await }
        });

        loop {
            if let AlertEvent::NavigationAbandoned { path, attempts } =
                next_event(&mut event_rx).await
            {
                assert_eq!(path, "/accept-orders");
                assert_eq!(attempts, 3);
                break;
            }
        }

        // Stale pending hints are cleared once delivery is abandoned.
        let hints = storage::read_nav_hints(Some(dir.path())).unwrap();
        assert_eq!(hints, storage::UiHints::default());

        cmd_tx.send(UiCommand::Quit).unwrap();
        loop_handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn queue_close_tears_down_an_active_alert() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let (event_tx, _event_rx) = unbounded_channel();
        let (cmd_tx, cmd_rx) = unbounded_channel();
        let (channels, counters) = counting_channels(false);
        let controller = Arc::new(AlertController::new(channels, event_tx.clone()));
        let bridge: Arc<dyn UiBridge> = Arc::new(ScriptedBridge::new(0, 0));

        cmd_tx
            .send(UiCommand::Start(AlertRequest::default()))
            .unwrap();
        drop(cmd_tx);

        run_controller(&cfg, controller, bridge, event_tx, cmd_rx)
            .await
            .unwrap();

        assert_eq!(counters.sound_started.load(Ordering::SeqCst), 1);
        assert_eq!(counters.sound_stopped.load(Ordering::SeqCst), 1);
    }
}

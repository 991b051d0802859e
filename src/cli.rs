use crate::alert::{effects, AlertController, EffectChannels};
use crate::classifier;
use crate::ingest::{self, CommandLine, InputLine};
use crate::model::{AlertEvent, AlertRequest, HostConfig};
use crate::navigation::StreamUiBridge;
use crate::orchestrator::{run_controller, UiCommand};
use anyhow::Result;
use clap::Parser;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc::{self, UnboundedSender};

/// Output line routing for the stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "order-alert-cli",
    version,
    about = "Order alert host: rings until a new order is acknowledged"
)]
pub struct Cli {
    /// Emit events as JSON lines instead of human-readable text
    #[arg(long)]
    pub json: bool,

    /// Suppress event output entirely (state changes still happen)
    #[arg(long)]
    pub quiet: bool,

    /// Screen the UI navigates to when an alert is opened
    #[arg(long, default_value = "accept-orders")]
    pub navigation_target: String,

    /// Maximum attempts to deliver a navigation instruction to the UI
    #[arg(long, default_value_t = 20)]
    pub nav_max_attempts: u32,

    /// Delay between navigation delivery attempts
    #[arg(long, default_value = "250ms")]
    pub nav_retry_delay: humantime::Duration,

    /// Ring the terminal bell while an alert is active
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub sound: bool,

    /// Interval between bell rings
    #[arg(long, default_value = "1s")]
    pub bell_interval: humantime::Duration,

    /// Directory for persisted UI state (defaults to the user data dir)
    #[arg(long)]
    pub state_dir: Option<std::path::PathBuf>,
}

/// Build a `HostConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> HostConfig {
    HostConfig {
        navigation_target: args.navigation_target.clone(),
        nav_max_attempts: args.nav_max_attempts,
        nav_retry_delay: Duration::from(args.nav_retry_delay),
        sound: args.sound,
        bell_interval: Duration::from(args.bell_interval),
        state_dir: args.state_dir.clone(),
    }
}

pub async fn run(args: Cli) -> Result<()> {
    if args.quiet && args.json {
        return Err(anyhow::anyhow!(
            "--quiet suppresses all output and cannot be combined with --json."
        ));
    }

    let cfg = build_config(&args);
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<AlertEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let sound: Box<dyn effects::SoundChannel> = if cfg.sound {
        Box::new(effects::TerminalBell::new(cfg.bell_interval))
    } else {
        Box::new(effects::Muted)
    };
    let controller = Arc::new(AlertController::new(
        EffectChannels {
            sound,
            haptics: Box::new(effects::NoHaptics),
            presenter: Box::new(effects::StreamPresenter::new(event_tx.clone())),
        },
        event_tx.clone(),
    ));

    // One line of stdin is one inbound payload or UI command; everything
    // funnels into the same command queue the controller loop drains.
    let reader = tokio::spawn(read_input_lines(cmd_tx.clone(), event_tx.clone()));

    // Ctrl-c goes through the queue too, so teardown takes the same stop
    // path as an explicit quit.
    let signal_cmd_tx = cmd_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = signal_cmd_tx.send(UiCommand::Quit);
        }
    });
    drop(cmd_tx);

    let (out_tx, out_handle) = spawn_output_writer();
    let renderer = {
        let json = args.json;
        let quiet = args.quiet;
        let out_tx = out_tx.clone();
        tokio::spawn(async move {
            while let Some(ev) = event_rx.recv().await {
                if !quiet {
                    render_event(&out_tx, json, &ev);
                }
            }
        })
    };

    let result = run_controller(
        &cfg,
        controller.clone(),
        Arc::new(StreamUiBridge),
        event_tx.clone(),
        cmd_rx,
    )
    .await;

    // Drop every event sender (the presenter inside the controller holds
    // one) so the renderer drains and finishes.
    reader.abort();
    drop(controller);
    drop(event_tx);
    let _ = renderer.await;
    drop(out_tx);
    let _ = out_handle.await;

    result
}

/// Map one parsed stdin line to commands and events.
fn dispatch_line(
    line: &str,
    cmd_tx: &UnboundedSender<UiCommand>,
    event_tx: &UnboundedSender<AlertEvent>,
) {
    match ingest::parse_line(line) {
        Ok(InputLine::Push(msg)) => {
            let extracted = ingest::extract(&msg);
            if classifier::is_order_alert(
                extracted.kind.as_deref(),
                extracted.request.title.as_deref(),
            ) {
                let _ = cmd_tx.send(UiCommand::Start(extracted.request));
            } else {
                let _ = event_tx.send(AlertEvent::PassedThrough {
                    kind: extracted.kind,
                    title: extracted.request.title,
                });
            }
        }
        Ok(InputLine::Command(cmd)) => {
            if let Some(cmd) = map_command(cmd, event_tx) {
                let _ = cmd_tx.send(cmd);
            }
        }
        Err(e) => {
            let _ = event_tx.send(AlertEvent::Info(crate::model::InfoEvent::Message(format!(
                "ignoring input line: {e:#}"
            ))));
        }
    }
}

fn map_command(
    cmd: CommandLine,
    event_tx: &UnboundedSender<AlertEvent>,
) -> Option<UiCommand> {
    match cmd.command.as_str() {
        "start" => Some(UiCommand::Start(AlertRequest {
            title: cmd.title,
            message: cmd.message,
            order_id: cmd.order_id,
        })),
        "stop" => Some(UiCommand::Stop),
        "status" => Some(UiCommand::Status),
        "open" => Some(UiCommand::Open {
            order_id: cmd.order_id,
        }),
        "quit" => Some(UiCommand::Quit),
        other => {
            let _ = event_tx.send(AlertEvent::Info(crate::model::InfoEvent::Message(format!(
                "unknown command: {other}"
            ))));
            None
        }
    }
}

async fn read_input_lines(
    cmd_tx: UnboundedSender<UiCommand>,
    event_tx: UnboundedSender<AlertEvent>,
) {
    let stdin = tokio::io::stdin();
    let mut lines = tokio::io::BufReader::new(stdin).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                dispatch_line(line, &cmd_tx, &event_tx);
            }
            // EOF or a broken stdin both end the session.
            Ok(None) | Err(_) => {
                let _ = cmd_tx.send(UiCommand::Quit);
                break;
            }
        }
    }
}

/// Render one event: JSON envelope on stdout, or human text with alerts on
/// stdout and progress/warnings on stderr.
fn render_event(out_tx: &mpsc::UnboundedSender<OutputLine>, json: bool, ev: &AlertEvent) {
    if json {
        let envelope = serde_json::json!({
            "timestamp_utc": now_utc_rfc3339(),
            "event": ev,
        });
        if let Ok(line) = serde_json::to_string(&envelope) {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
        return;
    }

    match ev {
        AlertEvent::AlertStarted { order_id } => {
            let suffix = order_id
                .as_deref()
                .map(|id| format!(" (order {id})"))
                .unwrap_or_default();
            let _ = out_tx.send(OutputLine::Stdout(format!("ALERT ringing{suffix}")));
        }
        AlertEvent::AlertStopped => {
            let _ = out_tx.send(OutputLine::Stdout("ALERT stopped".to_string()));
        }
        AlertEvent::NotificationPosted { notification } => {
            let actions = notification
                .actions
                .iter()
                .map(|a| format!("[{}]", a.label()))
                .collect::<Vec<_>>()
                .join(" ");
            let _ = out_tx.send(OutputLine::Stdout(format!(
                "NOTIFY {}: {} {}",
                notification.title, notification.message, actions
            )));
        }
        AlertEvent::NotificationWithdrawn => {
            let _ = out_tx.send(OutputLine::Stdout("NOTIFY withdrawn".to_string()));
        }
        AlertEvent::PassedThrough { kind, title } => {
            let _ = out_tx.send(OutputLine::Stderr(format!(
                "passed through: type={} title={}",
                kind.as_deref().unwrap_or("-"),
                title.as_deref().unwrap_or("-")
            )));
        }
        AlertEvent::Status { snapshot } => {
            let _ = out_tx.send(OutputLine::Stdout(format!(
                "STATUS running={} orderId={}",
                snapshot.running,
                snapshot.order_id.as_deref().unwrap_or("-")
            )));
        }
        AlertEvent::NavigationDelivered { path, attempt } => {
            let _ = out_tx.send(OutputLine::Stdout(format!(
                "NAVIGATE {path} (attempt {attempt})"
            )));
        }
        AlertEvent::NavigationAbandoned { path, attempts } => {
            let _ = out_tx.send(OutputLine::Stderr(format!(
                "navigation to {path} abandoned after {attempts} attempts"
            )));
        }
        AlertEvent::Info(info) => {
            let _ = out_tx.send(OutputLine::Stderr(info.to_message()));
        }
    }
}

fn now_utc_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn config_carries_cli_overrides() {
        let args = Cli::parse_from([
            "order-alert-cli",
            "--navigation-target",
            "orders",
            "--nav-max-attempts",
            "5",
            "--nav-retry-delay",
            "100ms",
            "--sound",
            "false",
        ]);
        let cfg = build_config(&args);
        assert_eq!(cfg.navigation_target, "orders");
        assert_eq!(cfg.nav_max_attempts, 5);
        assert_eq!(cfg.nav_retry_delay, Duration::from_millis(100));
        assert!(!cfg.sound);
    }

    #[tokio::test]
    async fn dispatch_routes_triggers_commands_and_noise() {
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();

        dispatch_line(
            r#"{"data":{"type":"new_order_available","orderId":"9"}}"#,
            &cmd_tx,
            &event_tx,
        );
        match cmd_rx.try_recv().unwrap() {
            UiCommand::Start(req) => assert_eq!(req.order_id.as_deref(), Some("9")),
            other => panic!("expected start, got {other:?}"),
        }

        dispatch_line(
            r#"{"data":{"type":"promo","title":"50% off"}}"#,
            &cmd_tx,
            &event_tx,
        );
        assert!(cmd_rx.try_recv().is_err());
        assert!(matches!(
            event_rx.try_recv().unwrap(),
            AlertEvent::PassedThrough { .. }
        ));

        dispatch_line(r#"{"command":"stop"}"#, &cmd_tx, &event_tx);
        assert!(matches!(cmd_rx.try_recv().unwrap(), UiCommand::Stop));

        dispatch_line("not json at all", &cmd_tx, &event_tx);
        assert!(cmd_rx.try_recv().is_err());
        assert!(matches!(
            event_rx.try_recv().unwrap(),
            AlertEvent::Info(crate::model::InfoEvent::Message(_))
        ));
    }
}

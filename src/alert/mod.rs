//! The order-alert lifecycle.
//!
//! One alert at a time: a start while alerting and a stop while idle are both
//! no-ops. Entering the alerting state acquires the notification and the
//! looped sound/haptic channels; leaving it by any path releases all of them.

pub mod effects;

use crate::model::{
    AlertEvent, AlertNotification, AlertRequest, AlertSnapshot, InfoEvent, NotificationAction,
    DEFAULT_MESSAGE, DEFAULT_TITLE, VIBRATION_PATTERN,
};
use effects::{AlertPresenter, HapticChannel, SoundChannel};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::UnboundedSender;

/// The three effect channels the controller drives.
pub struct EffectChannels {
    pub sound: Box<dyn SoundChannel>,
    pub haptics: Box<dyn HapticChannel>,
    pub presenter: Box<dyn AlertPresenter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// An alert was already active; nothing was re-acquired.
    AlreadyActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    /// No alert was active; nothing was released.
    Idle,
}

struct Inner {
    running: bool,
    order_id: Option<String>,
    title: Option<String>,
    message: Option<String>,
    effects: EffectChannels,
}

/// Owns the single current alert. State transitions and effect acquire/release
/// happen under one lock, so callers racing on start/stop can never both pass
/// a guard and double-acquire or double-release.
pub struct AlertController {
    inner: Mutex<Inner>,
    event_tx: UnboundedSender<AlertEvent>,
}

impl AlertController {
    pub fn new(effects: EffectChannels, event_tx: UnboundedSender<AlertEvent>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                running: false,
                order_id: None,
                title: None,
                message: None,
                effects,
            }),
            event_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock still holds coherent state, and release on teardown
        // matters more than the panic that poisoned it.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn info(&self, event: InfoEvent) {
        let _ = self.event_tx.send(AlertEvent::Info(event));
    }

    /// Raise the alert. Idempotent: a second start while alerting changes
    /// nothing and acquires nothing.
    ///
    /// Effect channels fail independently. A missing sound source is reported
    /// and the alert still proceeds on the notification and haptic channels.
    pub fn start(&self, request: AlertRequest) -> StartOutcome {
        let mut inner = self.lock();
        if inner.running {
            return StartOutcome::AlreadyActive;
        }

        let title = request.title.unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let message = request
            .message
            .unwrap_or_else(|| DEFAULT_MESSAGE.to_string());

        let notification = AlertNotification {
            title: title.clone(),
            message: message.clone(),
            order_id: request.order_id.clone(),
            actions: vec![NotificationAction::View, NotificationAction::Dismiss],
        };

        // Notification first: it is what keeps the host alive while ringing.
        if let Err(e) = inner.effects.presenter.post(&notification) {
            self.info(InfoEvent::NotificationFailed {
                reason: format!("{e:#}"),
            });
        }
        if let Err(e) = inner.effects.sound.start_loop() {
            self.info(InfoEvent::SoundUnavailable {
                reason: format!("{e:#}"),
            });
        }
        if let Err(e) = inner.effects.haptics.start_pattern(&VIBRATION_PATTERN) {
            self.info(InfoEvent::HapticsUnavailable {
                reason: format!("{e:#}"),
            });
        }

        inner.running = true;
        inner.order_id = request.order_id;
        inner.title = Some(title);
        inner.message = Some(message);

        let _ = self.event_tx.send(AlertEvent::AlertStarted {
            order_id: inner.order_id.clone(),
        });
        StartOutcome::Started
    }

    /// Silence the alert and release every channel. Idempotent: stopping while
    /// idle releases nothing. Release failures are reported and never leave
    /// the controller stuck in the alerting state.
    pub fn stop(&self) -> StopOutcome {
        let mut inner = self.lock();
        if !inner.running {
            return StopOutcome::Idle;
        }

        if let Err(e) = inner.effects.sound.stop() {
            self.info(InfoEvent::ReleaseFailed {
                channel: "sound".to_string(),
                reason: format!("{e:#}"),
            });
        }
        if let Err(e) = inner.effects.haptics.cancel() {
            self.info(InfoEvent::ReleaseFailed {
                channel: "haptics".to_string(),
                reason: format!("{e:#}"),
            });
        }
        if let Err(e) = inner.effects.presenter.withdraw() {
            self.info(InfoEvent::ReleaseFailed {
                channel: "notification".to_string(),
                reason: format!("{e:#}"),
            });
        }

        inner.running = false;
        inner.order_id = None;
        inner.title = None;
        inner.message = None;

        let _ = self.event_tx.send(AlertEvent::AlertStopped);
        StopOutcome::Stopped
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    pub fn snapshot(&self) -> AlertSnapshot {
        let inner = self.lock();
        AlertSnapshot {
            running: inner.running,
            order_id: inner.order_id.clone(),
            title: inner.title.clone(),
            message: inner.message.clone(),
        }
    }
}

impl Drop for AlertController {
    fn drop(&mut self) {
        // Host teardown must release the looped channels even when nothing
        // ever called stop.
        self.stop();
    }
}

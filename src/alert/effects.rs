//! Effect channels driven by the alert controller.
//!
//! Each channel fails independently: a host without an audio device or a
//! vibrator still raises the alert on the channels it does have. Partial
//! acquisition is acceptable; total silence is not an error.

use crate::model::{AlertEvent, AlertNotification};
use anyhow::{anyhow, Result};
use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// Looped audio channel. `start_loop` keeps sounding until `stop`.
pub trait SoundChannel: Send {
    fn start_loop(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
}

/// Looped haptic channel driven by a repeating waveform.
pub trait HapticChannel: Send {
    fn start_pattern(&mut self, pattern: &[u64]) -> Result<()>;
    fn cancel(&mut self) -> Result<()>;
}

/// Persistent notification surface. While a notification is posted the host
/// holds foreground priority; withdrawing it releases that too.
pub trait AlertPresenter: Send {
    fn post(&mut self, notification: &AlertNotification) -> Result<()>;
    fn withdraw(&mut self) -> Result<()>;
}

/// Rings the terminal bell on an interval from a background thread.
pub struct TerminalBell {
    interval: Duration,
    stop: Option<Arc<AtomicBool>>,
}

impl TerminalBell {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            stop: None,
        }
    }
}

impl SoundChannel for TerminalBell {
    fn start_loop(&mut self) -> Result<()> {
        if self.stop.is_some() {
            return Ok(());
        }
        // Piped stderr means there is no terminal to ring; report the channel
        // unavailable so the controller can continue on the others.
        if !std::io::stderr().is_terminal() {
            return Err(anyhow!("stderr is not a terminal, no bell device"));
        }

        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let interval = self.interval;
        thread::spawn(move || {
            let mut err = std::io::stderr();
            while !flag.load(Ordering::Relaxed) {
                let _ = err.write_all(b"\x07");
                let _ = err.flush();
                thread::sleep(interval);
            }
        });
        self.stop = Some(stop);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(flag) = self.stop.take() {
            flag.store(true, Ordering::Relaxed);
        }
        Ok(())
    }
}

/// Sound channel for `--sound false`: acquires nothing, never fails.
pub struct Muted;

impl SoundChannel for Muted {
    fn start_loop(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Haptic channel for hosts without a vibrator.
pub struct NoHaptics;

impl HapticChannel for NoHaptics {
    fn start_pattern(&mut self, _pattern: &[u64]) -> Result<()> {
        Err(anyhow!("no haptic hardware on this host"))
    }

    fn cancel(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Presents the notification on the host event stream. The downstream UI
/// consumes that stream, so posting is emitting.
pub struct StreamPresenter {
    event_tx: UnboundedSender<AlertEvent>,
}

impl StreamPresenter {
    pub fn new(event_tx: UnboundedSender<AlertEvent>) -> Self {
        Self { event_tx }
    }
}

impl AlertPresenter for StreamPresenter {
    fn post(&mut self, notification: &AlertNotification) -> Result<()> {
        self.event_tx
            .send(AlertEvent::NotificationPosted {
                notification: notification.clone(),
            })
            .map_err(|_| anyhow!("event channel closed"))
    }

    fn withdraw(&mut self) -> Result<()> {
        self.event_tx
            .send(AlertEvent::NotificationWithdrawn)
            .map_err(|_| anyhow!("event channel closed"))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::AtomicU32;

    /// Counting channels shared by controller and host-loop tests. Acquire and
    /// release counters let tests assert 1:1 pairing.
    #[derive(Default)]
    pub struct EffectCounters {
        pub sound_started: AtomicU32,
        pub sound_stopped: AtomicU32,
        pub haptics_started: AtomicU32,
        pub haptics_cancelled: AtomicU32,
        pub posted: AtomicU32,
        pub withdrawn: AtomicU32,
    }

    pub struct CountingSound {
        pub counters: Arc<EffectCounters>,
        pub fail_start: bool,
    }

    impl SoundChannel for CountingSound {
        fn start_loop(&mut self) -> Result<()> {
            if self.fail_start {
                return Err(anyhow!("no default alarm source"));
            }
            self.counters.sound_started.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&mut self) -> Result<()> {
            self.counters.sound_stopped.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    pub struct CountingHaptics {
        pub counters: Arc<EffectCounters>,
    }

    impl HapticChannel for CountingHaptics {
        fn start_pattern(&mut self, _pattern: &[u64]) -> Result<()> {
            self.counters.haptics_started.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn cancel(&mut self) -> Result<()> {
            self.counters
                .haptics_cancelled
                .fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    pub struct CountingPresenter {
        pub counters: Arc<EffectCounters>,
    }

    impl AlertPresenter for CountingPresenter {
        fn post(&mut self, _notification: &AlertNotification) -> Result<()> {
            self.counters.posted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn withdraw(&mut self) -> Result<()> {
            self.counters.withdrawn.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    pub fn counting_channels(
        fail_sound: bool,
    ) -> (crate::alert::EffectChannels, Arc<EffectCounters>) {
        let counters = Arc::new(EffectCounters::default());
        let channels = crate::alert::EffectChannels {
            sound: Box::new(CountingSound {
                counters: counters.clone(),
                fail_start: fail_sound,
            }),
            haptics: Box::new(CountingHaptics {
                counters: counters.clone(),
            }),
            presenter: Box::new(CountingPresenter {
                counters: counters.clone(),
            }),
        };
        (channels, counters)
    }
}

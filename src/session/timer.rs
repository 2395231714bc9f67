//! Cancellable phase timers
//!
//! A timer is a spawned task that only emits [`TimerEvent`]s into the owning
//! session's event channel. Every start or cancel bumps the generation, so
//! events from a superseded timer that are still queued can be told apart and
//! dropped by the session.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Event emitted by a running timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// One countdown step; `remaining` reaches zero on the final event
    Countdown { generation: u64, remaining: u64 },
    /// One period of a repeating check elapsed
    Poll { generation: u64 },
}

impl TimerEvent {
    pub fn generation(&self) -> u64 {
        match self {
            TimerEvent::Countdown { generation, .. } | TimerEvent::Poll { generation } => {
                *generation
            }
        }
    }
}

/// At most one running timer, owned by a session
#[derive(Debug)]
pub struct PhaseTimer {
    events: mpsc::UnboundedSender<TimerEvent>,
    tick: Duration,
    generation: u64,
    token: Option<CancellationToken>,
}

impl PhaseTimer {
    /// `tick` is the length of one countdown step
    pub fn new(tick: Duration, events: mpsc::UnboundedSender<TimerEvent>) -> Self {
        Self {
            events,
            tick,
            generation: 0,
            token: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether an event belongs to the timer started most recently
    pub fn is_current(&self, event: &TimerEvent) -> bool {
        self.token.is_some() && event.generation() == self.generation
    }

    pub fn is_running(&self) -> bool {
        self.token
            .as_ref()
            .map(|token| !token.is_cancelled())
            .unwrap_or(false)
    }

    /// Count down from `steps` to zero, one event per tick, the first one immediately.
    /// Replaces any running timer.
    pub fn start_countdown(&mut self, steps: u64) -> u64 {
        let (generation, token) = self.rearm();
        let events = self.events.clone();
        let tick = self.tick;

        tokio::spawn(async move {
            let mut ticker = interval(tick);
            for remaining in (0..=steps).rev() {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                if events
                    .send(TimerEvent::Countdown {
                        generation,
                        remaining,
                    })
                    .is_err()
                {
                    return;
                }
            }
        });

        generation
    }

    /// Emit a poll every `period` until cancelled, the first one immediately.
    /// Replaces any running timer.
    pub fn start_periodic(&mut self, period: Duration) -> u64 {
        let (generation, token) = self.rearm();
        let events = self.events.clone();

        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                if events.send(TimerEvent::Poll { generation }).is_err() {
                    return;
                }
            }
        });

        generation
    }

    /// Stop the running timer, if any. Queued events become stale.
    pub fn cancel(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
            debug!("Cancelled timer generation {}", self.generation);
        }
        self.generation += 1;
    }

    fn rearm(&mut self) -> (u64, CancellationToken) {
        self.cancel();
        let token = CancellationToken::new();
        self.token = Some(token.clone());
        (self.generation, token)
    }
}

impl Drop for PhaseTimer {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}

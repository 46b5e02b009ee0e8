//! Scheduler that owns the playback estimate and drives the tick, sync and watchdog timers.

use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::api::{ControlAction, ControlError, FetchError, PlaybackSnapshot, PlayerApi};
use crate::player::{Estimator, NowPlaying};

/// Receives the estimate after every change.
pub trait StatusSink {
    fn render(&mut self, view: Option<NowPlaying<'_>>);
}

/// Timer periods for the scheduler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    pub tick: Duration,
    pub sync: Duration,
    pub watchdog: Duration,
    pub stale_after: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            sync: Duration::from_secs(3),
            watchdog: Duration::from_secs(5),
            stale_after: Duration::from_secs(10),
        }
    }
}

/// Requests from the user side of the client.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Control(ControlAction),
    Quit,
}

/// Why a state fetch was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Periodic,
    Watchdog,
}

enum Completion {
    Sync(SyncTrigger, Result<PlaybackSnapshot, FetchError>),
    Control(ControlAction, Result<PlaybackSnapshot, ControlError>),
}

/// Send `action` and read back the state it produced.
pub async fn control_and_resync<A: PlayerApi>(
    api: &A,
    action: &ControlAction,
) -> Result<PlaybackSnapshot, ControlError> {
    api.send_control(action).await?;
    api.fetch_current_state().await.map_err(ControlError::Resync)
}

/// Single writer of the estimate. I/O runs in spawned tasks whose results
/// come back over a channel and are applied in arrival order.
pub struct Scheduler<A, S> {
    api: A,
    estimator: Estimator,
    sink: S,
    timing: Timing,
    sync_in_flight: bool,
    controls_in_flight: HashSet<ControlAction>,
    done_tx: mpsc::Sender<Completion>,
    done_rx: mpsc::Receiver<Completion>,
}

impl<A: PlayerApi, S: StatusSink> Scheduler<A, S> {
    pub fn new(api: A, estimator: Estimator, sink: S, timing: Timing) -> Self {
        let (done_tx, done_rx) = mpsc::channel(16);
        Self {
            api,
            estimator,
            sink,
            timing,
            sync_in_flight: false,
            controls_in_flight: HashSet::new(),
            done_tx,
            done_rx,
        }
    }

    /// Run until a `Quit` command arrives. A closed command channel only
    /// disables commands; the timers keep running.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) -> Estimator {
        let start = Instant::now();
        let mut tick = time::interval_at(start + self.timing.tick, self.timing.tick);
        let mut sync = time::interval(self.timing.sync);
        let mut watchdog = time::interval_at(start + self.timing.watchdog, self.timing.watchdog);
        for timer in [&mut tick, &mut sync, &mut watchdog] {
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        }
        let mut commands_open = true;

        self.sink.render(self.estimator.now_playing());

        loop {
            tokio::select! {
                biased;

                Some(done) = self.done_rx.recv() => self.on_completion(done),
                command = commands.recv(), if commands_open => match command {
                    Some(Command::Control(action)) => self.start_control(action),
                    Some(Command::Quit) => break,
                    None => {
                        debug!("command channel closed");
                        commands_open = false;
                    }
                },
                _ = tick.tick() => self.on_tick(),
                _ = sync.tick() => self.start_sync(SyncTrigger::Periodic),
                _ = watchdog.tick() => self.on_watchdog(),
            }
        }

        self.estimator
    }

    fn on_tick(&mut self) {
        if self.estimator.current_estimate().is_playing {
            self.estimator.tick();
            self.sink.render(self.estimator.now_playing());
        }
    }

    fn on_watchdog(&mut self) {
        let age = self.estimator.seconds_since_last_sync();
        if age > self.timing.stale_after.as_secs_f64() {
            debug!(age, "estimate is stale");
            self.start_sync(SyncTrigger::Watchdog);
        }
    }

    fn start_sync(&mut self, trigger: SyncTrigger) {
        if self.sync_in_flight {
            debug!(?trigger, "sync already in flight");
            return;
        }
        self.sync_in_flight = true;
        let api = self.api.clone();
        let done = self.done_tx.clone();
        tokio::spawn(async move {
            let result = api.fetch_current_state().await;
            if done.send(Completion::Sync(trigger, result)).await.is_err() {
                debug!(?trigger, "scheduler gone, dropping fetch result");
            }
        });
    }

    fn start_control(&mut self, action: ControlAction) {
        if !self.controls_in_flight.insert(action.clone()) {
            debug!(%action, "control already in flight");
            return;
        }
        let api = self.api.clone();
        let done = self.done_tx.clone();
        tokio::spawn(async move {
            let result = control_and_resync(&api, &action).await;
            if let Err(err) = done.send(Completion::Control(action, result)).await {
                if let Completion::Control(action, _) = err.0 {
                    debug!(%action, "scheduler gone, dropping control result");
                }
            }
        });
    }

    fn on_completion(&mut self, done: Completion) {
        let snapshot = match done {
            Completion::Sync(trigger, result) => {
                self.sync_in_flight = false;
                match result {
                    Ok(snapshot) => snapshot,
                    Err(err) => {
                        warn!(?trigger, %err, "failed to fetch current song");
                        return;
                    }
                }
            }
            Completion::Control(action, result) => {
                self.controls_in_flight.remove(&action);
                match result {
                    Ok(snapshot) => snapshot,
                    Err(err) => {
                        warn!(%action, %err, "control request failed");
                        return;
                    }
                }
            }
        };
        self.estimator.apply_snapshot(snapshot);
        self.sink.render(self.estimator.now_playing());
    }
}

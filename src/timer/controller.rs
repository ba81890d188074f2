use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono::Utc;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    engine::{CommandOutcome, Engine, EngineOptions, EngineSnapshot, Program, RunStatus, TickReport},
    models::{session::OpenSession, SessionRecord, SessionSink, SessionStatus},
    settings::PracticeSettings,
};

use super::events::EngineEvent;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

const EVENT_CAPACITY: usize = 256;
const DEFAULT_HEARTBEAT_EVERY_TICKS: u32 = 10;

struct Shared {
    engine: Engine,
    /// Bumped whenever the tick stream is replaced or cancelled.
    generation: u64,
    session: Option<OpenSession>,
    /// Instant up to which wall time has been credited to the engine.
    anchor: Option<Instant>,
}

impl Shared {
    /// Credits wall time since the last tick to a running engine. A run
    /// that finishes here is closed as completed.
    fn catch_up(&mut self, now: Instant) -> Option<(TickReport, Option<SessionRecord>)> {
        if !self.engine.is_running() {
            return None;
        }
        let anchor = self.anchor.replace(now)?;
        let report = self.engine.tick(now.saturating_duration_since(anchor));
        let record = if report.finished {
            self.close_session(SessionStatus::Completed)
        } else {
            None
        };
        Some((report, record))
    }

    fn close_session(&mut self, status: SessionStatus) -> Option<SessionRecord> {
        let open = self.session.take()?;
        let state = self.engine.state();

        Some(SessionRecord {
            id: open.id.to_string(),
            program_id: self.engine.program().id().to_string(),
            started_at: open.started_at,
            stopped_at: Utc::now(),
            status,
            active_ms: u64::try_from(state.session_elapsed_total.as_millis()).unwrap_or(u64::MAX),
            completed_cycles: self.engine.completed_cycles(),
            target_cycles: self.engine.target_cycles(),
        })
    }
}

/// The one live tick stream. Dropping it stops the task.
struct TickHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

/// Drives an [`Engine`] from a tokio interval and publishes what happens.
///
/// Clones share the same engine. The tick task is cancelled on pause,
/// reset, program change, natural completion, and when the last clone is
/// dropped.
#[derive(Clone)]
pub struct PlaybackController {
    shared: Arc<Mutex<Shared>>,
    ticker: Arc<Mutex<Option<TickHandle>>>,
    events: broadcast::Sender<EngineEvent>,
    sink: Arc<dyn SessionSink>,
    heartbeat_every_ticks: u32,
}

impl PlaybackController {
    pub fn new(program: Program, options: EngineOptions, sink: Arc<dyn SessionSink>) -> Result<Self> {
        let engine = Engine::new(program, options)?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            shared: Arc::new(Mutex::new(Shared {
                engine,
                generation: 0,
                session: None,
                anchor: None,
            })),
            ticker: Arc::new(Mutex::new(None)),
            events,
            sink,
            heartbeat_every_ticks: DEFAULT_HEARTBEAT_EVERY_TICKS,
        })
    }

    pub fn with_settings(
        program: Program,
        settings: &PracticeSettings,
        sink: Arc<dyn SessionSink>,
    ) -> Result<Self> {
        let options = settings.engine_options(&program);
        Ok(Self::new(program, options, sink)?.with_heartbeat_every(settings.heartbeat_every_ticks()))
    }

    pub fn with_heartbeat_every(mut self, ticks: u32) -> Self {
        self.heartbeat_every_ticks = ticks.max(1);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> EngineSnapshot {
        self.shared.lock().await.engine.snapshot()
    }

    pub async fn status(&self) -> RunStatus {
        self.shared.lock().await.engine.status()
    }

    pub async fn start(&self) -> CommandOutcome {
        let mut ticker = self.ticker.lock().await;
        let (outcome, snapshot) = {
            let mut shared = self.shared.lock().await;
            let outcome = self.start_locked(&mut ticker, &mut shared);
            (outcome, shared.engine.snapshot())
        };

        if outcome == CommandOutcome::Applied {
            self.emit(EngineEvent::StateChanged { snapshot });
        }
        outcome
    }

    /// Freezes the run. Time since the last tick is credited first, so a
    /// pause never loses the partial interval.
    pub async fn pause(&self) -> CommandOutcome {
        let mut ticker = self.ticker.lock().await;
        let (outcome, caught_up, snapshot) = {
            let mut shared = self.shared.lock().await;
            let caught_up = shared.catch_up(Instant::now());
            let outcome = shared.engine.pause();
            let finished = caught_up.as_ref().is_some_and(|(report, _)| report.finished);
            if outcome == CommandOutcome::Applied || finished {
                shared.generation += 1;
                *ticker = None;
            }
            (outcome, caught_up, shared.engine.snapshot())
        };

        if let Some((report, record)) = caught_up {
            self.publish_catch_up(&report, record, &snapshot);
        }
        if outcome == CommandOutcome::Applied {
            log_info!("paused {} at {:.1}s", snapshot.program_id, snapshot.session_elapsed_total);
            self.emit(EngineEvent::StateChanged { snapshot });
        }
        outcome
    }

    /// Cancels ticking and returns to idle. A run that had started is
    /// recorded as cancelled, unless the time owed since the last tick
    /// completes it.
    pub async fn reset(&self) -> CommandOutcome {
        let mut ticker = self.ticker.lock().await;
        *ticker = None;

        let (outcome, snapshot, record) = {
            let mut shared = self.shared.lock().await;
            shared.generation += 1;
            let record = match shared.catch_up(Instant::now()) {
                Some((_, Some(completed))) => Some(completed),
                _ => shared.close_session(SessionStatus::Cancelled),
            };
            let outcome = shared.engine.reset();
            (outcome, shared.engine.snapshot(), record)
        };

        if let Some(record) = record {
            self.end_session(record);
        }
        if outcome == CommandOutcome::Applied {
            self.emit(EngineEvent::StateChanged { snapshot });
        }
        outcome
    }

    /// Replaces the program. A running engine restarts on the new program;
    /// nothing of the old run carries over.
    pub async fn select_program(&self, program: Program) -> Result<()> {
        let mut ticker = self.ticker.lock().await;

        let (snapshot, record) = {
            let mut shared = self.shared.lock().await;
            shared.engine.options().validate(&program)?;

            shared.generation += 1;
            *ticker = None;
            // Decided before catching up, which may finish the old run.
            let was_running = shared.engine.is_running();
            let record = match shared.catch_up(Instant::now()) {
                Some((_, Some(completed))) => Some(completed),
                _ => shared.close_session(SessionStatus::Cancelled),
            };

            let program_id = program.id().to_string();
            let previous = shared.engine.select_program(program)?;
            log_info!("selected program {program_id} (was {})", previous.as_str());
            if was_running {
                self.start_locked(&mut ticker, &mut shared);
            }
            (shared.engine.snapshot(), record)
        };

        if let Some(record) = record {
            self.end_session(record);
        }
        self.emit(EngineEvent::StateChanged { snapshot });
        Ok(())
    }

    pub async fn set_target_cycles(&self, target: Option<u32>) -> Result<()> {
        let snapshot = {
            let mut shared = self.shared.lock().await;
            shared.engine.set_target_cycles(target)?;
            shared.engine.snapshot()
        };
        self.emit(EngineEvent::StateChanged { snapshot });
        Ok(())
    }

    /// Stops the tick stream for good; a running engine is left paused so
    /// its state stays readable.
    pub async fn shutdown(&self) {
        let mut ticker = self.ticker.lock().await;
        let (caught_up, snapshot) = {
            let mut shared = self.shared.lock().await;
            shared.generation += 1;
            let caught_up = shared.catch_up(Instant::now());
            shared.engine.pause();
            *ticker = None;
            (caught_up, shared.engine.snapshot())
        };

        if let Some((report, record)) = caught_up {
            self.publish_catch_up(&report, record, &snapshot);
        }
    }

    fn start_locked(&self, ticker: &mut Option<TickHandle>, shared: &mut Shared) -> CommandOutcome {
        let previous = shared.engine.status();
        let outcome = shared.engine.start();
        if outcome == CommandOutcome::Ignored {
            return outcome;
        }

        if matches!(previous, RunStatus::Idle | RunStatus::Finished) {
            shared.session = Some(OpenSession::begin(Utc::now()));
            log_info!(
                "starting {} ({} segments, tick {:?})",
                shared.engine.program().id(),
                shared.engine.program().len(),
                shared.engine.tick_interval()
            );
        }

        shared.generation += 1;
        shared.anchor = Some(Instant::now());
        // Drop the old stream before the new one exists.
        *ticker = None;
        *ticker = Some(self.spawn_ticker(shared.generation, shared.engine.tick_interval()));
        outcome
    }

    fn spawn_ticker(&self, generation: u64, tick_interval: Duration) -> TickHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let shared = self.shared.clone();
        let events = self.events.clone();
        let sink = self.sink.clone();
        let heartbeat_every = self.heartbeat_every_ticks;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut ticks: u32 = 0;

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = token.cancelled() => break,
                }

                let (report, snapshot, record) = {
                    let mut guard = shared.lock().await;
                    if guard.generation != generation {
                        log_warn!("discarding tick from cancelled stream {generation}");
                        break;
                    }
                    // Measured, not assumed: a late tick carries its real delta.
                    let Some((report, record)) = guard.catch_up(Instant::now()) else {
                        break;
                    };
                    (report, guard.engine.snapshot(), record)
                };

                publish_tick(&events, &report, &snapshot);

                if report.finished {
                    log_info!(
                        "{} finished after {:.1}s, {} cycles",
                        snapshot.program_id,
                        snapshot.session_elapsed_total,
                        snapshot.completed_cycles
                    );
                    let _ = events.send(EngineEvent::StateChanged { snapshot });
                    if let Some(record) = record {
                        record_session(&events, sink.as_ref(), record);
                    }
                    break;
                }

                ticks = ticks.wrapping_add(1);
                if ticks % heartbeat_every == 0 {
                    let _ = events.send(EngineEvent::Heartbeat { snapshot });
                }
            }
        });

        TickHandle { cancel, handle }
    }

    /// Events for time credited outside the tick task.
    fn publish_catch_up(&self, report: &TickReport, record: Option<SessionRecord>, snapshot: &EngineSnapshot) {
        publish_tick(&self.events, report, snapshot);
        if report.finished {
            self.emit(EngineEvent::StateChanged {
                snapshot: snapshot.clone(),
            });
        }
        if let Some(record) = record {
            self.end_session(record);
        }
    }

    fn end_session(&self, record: SessionRecord) {
        record_session(&self.events, self.sink.as_ref(), record);
    }

    fn emit(&self, event: EngineEvent) {
        // No subscribers is fine; snapshots can still be pulled.
        let _ = self.events.send(event);
    }
}

fn publish_tick(events: &broadcast::Sender<EngineEvent>, report: &TickReport, snapshot: &EngineSnapshot) {
    if report.cycles_completed > 0 {
        let _ = events.send(EngineEvent::CycleCompleted {
            completed_cycles: snapshot.completed_cycles,
            target_cycles: snapshot.target_cycles,
        });
    }
    if let Some(index) = report.entered {
        let _ = events.send(EngineEvent::SegmentEntered {
            index,
            label: snapshot.segment_label.clone(),
            instruction: snapshot.instruction.clone(),
        });
    }
}

fn record_session(events: &broadcast::Sender<EngineEvent>, sink: &dyn SessionSink, record: SessionRecord) {
    if let Err(err) = sink.append(&record) {
        log_error!("Failed to record session {}: {err:?}", record.id);
    }
    log_info!(
        "session {} {} ({} ms active)",
        record.id,
        record.status.as_str(),
        record.active_ms
    );
    let _ = events.send(EngineEvent::SessionEnded { record });
}

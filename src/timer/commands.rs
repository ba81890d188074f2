use std::{future::Future, io, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use tokio::sync::broadcast::error::RecvError;

use crate::{
    catalog::Catalog,
    engine::{format_countdown, format_elapsed, CommandOutcome},
    models::{MemorySessionLog, SessionRecord},
    settings::SettingsStore,
    timer::{EngineEvent, PlaybackController},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Overrides supplied on the command line for a single session.
#[derive(Debug, Clone, Default)]
pub struct PlayArgs {
    pub id: String,
    pub cycles: Option<u32>,
    pub unbounded: bool,
    pub tick_ms: Option<u64>,
}

pub fn list_programs(catalog: &Catalog) -> Result<()> {
    for (category, id) in catalog.ids() {
        let program = catalog.program(id)?;
        let length = match program.total_duration() {
            Some(total) => format_countdown(total),
            None => format!("{} / cycle", format_countdown(program.cycle_duration())),
        };
        println!(
            "{:<14} {:<18} {:<24} {}",
            category.as_str(),
            id,
            program.title(),
            length
        );
    }
    Ok(())
}

/// Runs one session in the foreground until it finishes or Ctrl-C resets it.
pub async fn play(catalog: &Catalog, settings: &SettingsStore, args: PlayArgs) -> Result<SessionRecord> {
    play_until(catalog, settings, args, tokio::signal::ctrl_c()).await
}

/// Like [`play`], but `interrupt` resolving resets the session instead of Ctrl-C.
pub async fn play_until<F>(
    catalog: &Catalog,
    settings: &SettingsStore,
    args: PlayArgs,
    interrupt: F,
) -> Result<SessionRecord>
where
    F: Future<Output = io::Result<()>>,
{
    let program = catalog.program(&args.id)?;

    let mut practice = settings.practice();
    if args.unbounded {
        practice.default_target_cycles = None;
    } else if let Some(cycles) = args.cycles {
        practice.default_target_cycles = Some(cycles);
    }
    if let Some(tick_ms) = args.tick_ms {
        practice.breathing_tick_ms = tick_ms;
        practice.script_tick_ms = tick_ms;
    }

    let log = Arc::new(MemorySessionLog::new());
    let controller = PlaybackController::with_settings(program, &practice, log)
        .with_context(|| format!("cannot play `{}`", args.id))?;
    let mut events = controller.subscribe();

    if controller.start().await == CommandOutcome::Ignored {
        bail!("session for `{}` did not start", args.id);
    }
    let first = controller.snapshot().await;
    announce(first.current_segment_index, &first.segment_label, first.instruction.as_deref());

    // Polled across every pass so a signal between events is not lost.
    tokio::pin!(interrupt);
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    log::debug!("{} event", event.name());
                    match event {
                        EngineEvent::SegmentEntered { index, label, instruction } => {
                            announce(index, &label, instruction.as_deref());
                        }
                        EngineEvent::CycleCompleted { completed_cycles, target_cycles } => {
                            match target_cycles {
                                Some(target) => log_info!("cycle {completed_cycles}/{target}"),
                                None => log_info!("cycle {completed_cycles}"),
                            }
                        }
                        EngineEvent::Heartbeat { snapshot } => {
                            let elapsed = Duration::try_from_secs_f64(snapshot.session_elapsed_total)
                                .unwrap_or_default();
                            log::debug!(
                                "{} elapsed, {:.0}% of segment",
                                format_elapsed(elapsed),
                                snapshot.progress_ratio * 100.0
                            );
                        }
                        EngineEvent::SessionEnded { record } => return Ok(record),
                        EngineEvent::StateChanged { .. } => {}
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log_warn!("event stream lagged, skipped {skipped} events");
                }
                Err(RecvError::Closed) => bail!("event stream closed before the session ended"),
            },
            signal = &mut interrupt, if !interrupted => {
                interrupted = true;
                signal.context("failed to listen for interrupt")?;
                log_info!("interrupted, ending session");
                controller.reset().await;
            }
        }
    }
}

fn announce(index: usize, label: &str, instruction: Option<&str>) {
    match instruction {
        Some(text) => log_info!("[{index}] {label}: {text}"),
        None => log_info!("[{index}] {label}"),
    }
}

//! TUG Pipeline: async tick loop
//!
//! Architecture:
//!   pose source (reader thread)
//!     → [flume channel] → tick loop (TugController)
//!       → phase updates → [flume channel] → display
//!       → on Complete → CSV / JSON export
//!
//! A `watch` stop signal cancels at any point; a cancelled or exhausted run
//! never exports anything.

use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::TugConfig;
use crate::controller::{TickOutcome, TugController};
use crate::error::TugError;
use crate::phase::{Phase, Step};
use crate::recorder::TugReport;
use crate::source::PoseEvent;

// ─── Updates for the display side ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PhaseUpdate {
    Prompt { phase: Phase, text: &'static str, at_ms: u64 },
    Speed { mps: f64 },
    Done { summary: String },
}

// ─── Handle ─────────────────────────────────────────────────────────────────

/// Stops a running pipeline from another task.
#[derive(Clone)]
pub struct StopHandle {
    stop_tx: watch::Sender<bool>,
}

impl StopHandle {
    pub fn channel() -> (Self, watch::Receiver<bool>) {
        let (stop_tx, stop_rx) = watch::channel(false);
        (Self { stop_tx }, stop_rx)
    }

    /// Signal the pipeline to stop.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

// ─── Pipeline ───────────────────────────────────────────────────────────────

pub struct Pipeline {
    cfg: TugConfig,
    updates: Option<flume::Sender<PhaseUpdate>>,
}

impl Pipeline {
    pub fn new(cfg: TugConfig) -> Self {
        Self { cfg, updates: None }
    }

    /// Forward prompts and significant speed changes to `tx`.
    pub fn with_updates(mut self, tx: flume::Sender<PhaseUpdate>) -> Self {
        self.updates = Some(tx);
        self
    }

    /// Run one session over `poses` until completion, stop or end of input.
    ///
    /// Returns the exported report on completion, `None` otherwise.
    pub async fn run(
        self,
        poses: flume::Receiver<PoseEvent>,
        mut stop_rx: watch::Receiver<bool>,
    ) -> Result<Option<TugReport>, TugError> {
        let mut controller = TugController::new(self.cfg.clone());
        let session_id = controller.start();
        self.notify(PhaseUpdate::Prompt {
            phase: controller.phase(),
            text: controller.prompt(),
            at_ms: 0,
        });

        if *stop_rx.borrow() {
            return Ok(cancel(&mut controller));
        }

        let mut stop_open = true;
        loop {
            let event = tokio::select! {
                // Stop wins over a pose that is ready at the same time
                biased;

                changed = stop_rx.changed(), if stop_open => {
                    match changed {
                        Ok(()) if *stop_rx.borrow() => return Ok(cancel(&mut controller)),
                        Ok(()) => continue,
                        Err(_) => {
                            stop_open = false;
                            continue;
                        }
                    }
                }
                event = poses.recv_async() => event,
            };

            let Ok(event) = event else {
                warn!(
                    "Pose stream ended in {:?} before completion, nothing exported",
                    controller.phase()
                );
                controller.stop();
                return Ok(None);
            };

            if *stop_rx.borrow() {
                return Ok(cancel(&mut controller));
            }

            match controller.tick(event)? {
                TickOutcome::Completed(report) => {
                    self.export(&report)?;
                    self.notify(PhaseUpdate::Done {
                        summary: report.summary(),
                    });
                    return Ok(Some(report));
                }
                TickOutcome::Progress { step, speed, .. } => {
                    if let Step::Advanced(t) = step {
                        self.notify(PhaseUpdate::Prompt {
                            phase: t.to,
                            text: t.prompt,
                            at_ms: t.at_ms,
                        });
                    }
                    if let Some(s) = speed.filter(|s| s.significant) {
                        self.notify(PhaseUpdate::Speed { mps: s.speed_mps });
                    }
                }
                TickOutcome::Reset(err) => {
                    warn!("Session {} restarted: {}", session_id, err);
                    self.notify(PhaseUpdate::Prompt {
                        phase: controller.phase(),
                        text: controller.prompt(),
                        at_ms: 0,
                    });
                }
                TickOutcome::Skipped(err) => debug!("Skipped tick: {}", err),
                TickOutcome::Idle => {}
            }
        }
    }

    fn export(&self, report: &TugReport) -> Result<(), TugError> {
        let csv_path = PathBuf::from(&self.cfg.export.output_path);
        report.write_csv(&csv_path)?;
        if self.cfg.export.write_json {
            report.write_json(&csv_path.with_extension("json"))?;
        }
        Ok(())
    }

    fn notify(&self, update: PhaseUpdate) {
        if let Some(tx) = &self.updates {
            // Display lag must never stall the tick loop
            let _ = tx.try_send(update);
        }
    }
}

fn cancel(controller: &mut TugController) -> Option<TugReport> {
    info!("Session {} cancelled, nothing exported", controller.session_id());
    controller.stop();
    None
}

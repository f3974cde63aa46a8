//! Post-processing of a finalized scan.
//!
//! A run is a strict chain: optional hole fill, then a fast preview
//! colorize, then the slow enhanced colorize of the preview result. Each
//! stage runs on its own worker thread and posts its result over a channel.
//! Results are only applied when the owner calls
//! [`PostProcessingPipeline::poll`] (or
//! [`PostProcessingPipeline::poll_timeout`]), so everything the pipeline
//! touches stays on the owner thread.
//!
//! Every launch gets a fresh ticket and cancel token. A result whose ticket
//! does not match the stage's running ticket, or that arrives after the
//! stage was cancelled, is dropped.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use scan_types::{Keyframe, ScanMesh};
use tracing::{debug, info, warn};

use crate::engine::{
    CancelToken, ColorizeOptions, ColorizeQuality, EngineError, HoleFillParams,
    ReconstructionEngine, TaskContext,
};
use crate::error::{SessionError, SessionResult};

/// Upper bound (exclusive) of the progress range owned by the preview pass.
pub const PREVIEW_PROGRESS_END: u8 = 20;

/// The stages of a run, in chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// Close holes before coloring.
    HoleFill,
    /// Fast per-vertex color.
    PreviewColorize,
    /// Texture-mapped color.
    EnhancedColorize,
}

impl StageKind {
    /// All stages in chain order.
    pub const ALL: [Self; 3] = [Self::HoleFill, Self::PreviewColorize, Self::EnhancedColorize];

    const fn index(self) -> usize {
        match self {
            Self::HoleFill => 0,
            Self::PreviewColorize => 1,
            Self::EnhancedColorize => 2,
        }
    }

    /// Short name, also used for worker thread names.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::HoleFill => "hole-fill",
            Self::PreviewColorize => "preview-colorize",
            Self::EnhancedColorize => "enhanced-colorize",
        }
    }
}

/// Observable status of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskStatus {
    /// Not part of the current run.
    #[default]
    Idle,
    /// Waiting for the previous stage.
    Pending,
    /// Worker thread running.
    Running,
    /// Cancelled; any late result is discarded.
    Cancelled,
    /// Finished and applied.
    Completed,
    /// Finished with an error.
    Failed,
    /// Disabled by configuration for this run.
    Skipped,
}

#[derive(Debug, Default)]
enum StageState {
    #[default]
    Idle,
    Pending,
    Running {
        ticket: u64,
        cancel: CancelToken,
    },
    Cancelled,
    Completed,
    Failed(String),
    Skipped,
}

impl StageState {
    const fn status(&self) -> TaskStatus {
        match self {
            Self::Idle => TaskStatus::Idle,
            Self::Pending => TaskStatus::Pending,
            Self::Running { .. } => TaskStatus::Running,
            Self::Cancelled => TaskStatus::Cancelled,
            Self::Completed => TaskStatus::Completed,
            Self::Failed(_) => TaskStatus::Failed,
            Self::Skipped => TaskStatus::Skipped,
        }
    }

    fn is_running(&self, expected: u64) -> bool {
        matches!(self, Self::Running { ticket, .. } if *ticket == expected)
    }
}

/// Something the owner should react to, produced by polling.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Overall progress, `0..=100`. Never decreases within a run.
    Progress {
        /// Percent complete.
        percent: u8,
    },
    /// Hole filling failed; coloring continues on the unfilled mesh.
    HoleFillFailed {
        /// Engine message.
        message: String,
    },
    /// The preview-colored mesh is ready.
    PreviewReady(ScanMesh),
    /// The enhanced-colored mesh is ready; the run is over.
    EnhancedReady(ScanMesh),
    /// A colorize stage failed; the run is over.
    StageFailed {
        /// Stage that failed.
        kind: StageKind,
        /// Engine message.
        message: String,
    },
}

#[derive(Debug)]
enum StageMessage {
    Progress {
        ticket: u64,
        kind: StageKind,
        fraction: f64,
    },
    Finished {
        ticket: u64,
        kind: StageKind,
        result: Result<ScanMesh, EngineError>,
    },
}

/// Owns the stage states of post-processing runs.
///
/// At most one run is active; [`PostProcessingPipeline::start`] while busy
/// fails with [`SessionError::Busy`]. Dropping the pipeline cancels
/// everything still running.
pub struct PostProcessingPipeline<E: ReconstructionEngine> {
    engine: Arc<E>,
    hole_fill: HoleFillParams,
    colorize: ColorizeOptions,
    stages: [StageState; 3],
    next_ticket: u64,
    tx: Sender<StageMessage>,
    rx: Receiver<StageMessage>,
    keyframes: Arc<[Keyframe]>,
    source: Option<ScanMesh>,
    percent: u8,
}

impl<E: ReconstructionEngine> std::fmt::Debug for PostProcessingPipeline<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostProcessingPipeline")
            .field("stages", &self.stages)
            .field("keyframes", &self.keyframes.len())
            .field("percent", &self.percent)
            .finish_non_exhaustive()
    }
}

impl<E: ReconstructionEngine> PostProcessingPipeline<E> {
    /// Creates an idle pipeline.
    #[must_use]
    pub fn new(engine: Arc<E>, hole_fill: HoleFillParams, colorize: ColorizeOptions) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            engine,
            hole_fill,
            colorize,
            stages: Default::default(),
            next_ticket: 0,
            tx,
            rx,
            keyframes: Arc::from(Vec::new()),
            source: None,
            percent: 0,
        }
    }

    /// Start a run on `mesh`.
    ///
    /// Releases the engine's tracking state, snapshots its keyframes and
    /// launches the first stage.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Busy`] if a run is active, or
    /// [`SessionError::Spawn`] if the first worker cannot start.
    pub fn start(&mut self, mesh: ScanMesh) -> SessionResult<()> {
        if self.is_busy() {
            return Err(SessionError::Busy);
        }

        self.engine.release_tracking();
        self.keyframes = Arc::from(self.engine.keyframes());
        self.percent = 0;

        let fill = self.hole_fill.is_enabled();
        self.stages = [
            if fill { StageState::Pending } else { StageState::Skipped },
            StageState::Pending,
            StageState::Pending,
        ];
        info!(
            faces = mesh.face_count(),
            keyframes = self.keyframes.len(),
            hole_fill = fill,
            "post-processing started"
        );

        self.source = Some(mesh.clone());
        let first = if fill {
            StageKind::HoleFill
        } else {
            StageKind::PreviewColorize
        };
        self.launch(first, mesh)
    }

    /// Whether any stage is pending or running.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.stages
            .iter()
            .any(|s| matches!(s, StageState::Pending | StageState::Running { .. }))
    }

    /// Status of one stage.
    #[must_use]
    pub fn status(&self, kind: StageKind) -> TaskStatus {
        self.stages[kind.index()].status()
    }

    /// Failure message of a failed stage.
    #[must_use]
    pub fn failure(&self, kind: StageKind) -> Option<&str> {
        match &self.stages[kind.index()] {
            StageState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// Last reported progress percent.
    #[must_use]
    pub const fn progress_percent(&self) -> u8 {
        self.percent
    }

    /// Cancel `kind` and every stage after it that has not finished.
    ///
    /// Returns `true` if anything was pending or running.
    pub fn cancel(&mut self, kind: StageKind) -> bool {
        let mut cancelled = false;
        for stage in &mut self.stages[kind.index()..] {
            match stage {
                StageState::Running { cancel, ticket } => {
                    cancel.cancel();
                    debug!(ticket = *ticket, "stage cancelled while running");
                    *stage = StageState::Cancelled;
                    cancelled = true;
                }
                StageState::Pending => {
                    *stage = StageState::Cancelled;
                    cancelled = true;
                }
                _ => {}
            }
        }
        if cancelled {
            info!(from = kind.label(), "post-processing cancelled");
        }
        cancelled
    }

    /// Cancel the whole run.
    pub fn cancel_all(&mut self) -> bool {
        self.cancel(StageKind::HoleFill)
    }

    /// Apply every message that has arrived, without blocking.
    pub fn poll(&mut self) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            self.apply(msg, &mut events);
        }
        events
    }

    /// Wait up to `timeout` for the next message, then apply everything
    /// that has arrived.
    pub fn poll_timeout(&mut self, timeout: Duration) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        match self.rx.recv_timeout(timeout) {
            Ok(msg) => self.apply(msg, &mut events),
            // The pipeline keeps its own sender, so the channel never closes.
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return events,
        }
        while let Ok(msg) = self.rx.try_recv() {
            self.apply(msg, &mut events);
        }
        events
    }

    fn launch(&mut self, kind: StageKind, input: ScanMesh) -> SessionResult<()> {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let cancel = CancelToken::new();

        let engine = Arc::clone(&self.engine);
        let keyframes = Arc::clone(&self.keyframes);
        let hole_fill = self.hole_fill;
        let options = self.colorize;
        let tx = self.tx.clone();
        let progress_tx = self.tx.clone();
        let ctx = TaskContext::new(cancel.clone()).with_progress(move |fraction| {
            let _ = progress_tx.send(StageMessage::Progress {
                ticket,
                kind,
                fraction,
            });
        });

        let spawned = thread::Builder::new()
            .name(format!("scan-{}", kind.label()))
            .spawn(move || {
                let result = match kind {
                    StageKind::HoleFill => engine.fill_holes(&input, &hole_fill, &ctx),
                    StageKind::PreviewColorize => engine.colorize(
                        &input,
                        &keyframes,
                        ColorizeQuality::Preview,
                        &options,
                        &ctx,
                    ),
                    StageKind::EnhancedColorize => engine.colorize(
                        &input,
                        &keyframes,
                        ColorizeQuality::Enhanced,
                        &options,
                        &ctx,
                    ),
                };
                // The receiver lives as long as the pipeline; a send error
                // means nobody is left to care about the result.
                let _ = tx.send(StageMessage::Finished {
                    ticket,
                    kind,
                    result,
                });
            });

        match spawned {
            Ok(_) => {
                debug!(stage = kind.label(), ticket, "stage launched");
                self.stages[kind.index()] = StageState::Running { ticket, cancel };
                Ok(())
            }
            Err(e) => {
                warn!(stage = kind.label(), error = %e, "cannot spawn stage worker");
                self.stages[kind.index()] = StageState::Failed(e.to_string());
                self.idle_pending();
                Err(SessionError::Spawn(e))
            }
        }
    }

    fn apply(&mut self, msg: StageMessage, events: &mut Vec<PipelineEvent>) {
        match msg {
            StageMessage::Progress {
                ticket,
                kind,
                fraction,
            } => {
                if self.stages[kind.index()].is_running(ticket) {
                    self.report(kind, fraction, events);
                }
            }
            StageMessage::Finished {
                ticket,
                kind,
                result,
            } => {
                if !self.stages[kind.index()].is_running(ticket) {
                    debug!(stage = kind.label(), ticket, "discarding stale stage result");
                    return;
                }
                self.finish(kind, result, events);
            }
        }
    }

    fn report(&mut self, kind: StageKind, fraction: f64, events: &mut Vec<PipelineEvent>) {
        let percent = match kind {
            StageKind::HoleFill => return,
            StageKind::PreviewColorize => preview_percent(fraction),
            StageKind::EnhancedColorize => enhanced_percent(fraction),
        };
        if percent > self.percent {
            self.percent = percent;
            events.push(PipelineEvent::Progress { percent });
        }
    }

    fn finish(
        &mut self,
        kind: StageKind,
        result: Result<ScanMesh, EngineError>,
        events: &mut Vec<PipelineEvent>,
    ) {
        match (kind, result) {
            (_, Err(EngineError::Cancelled)) => {
                info!(stage = kind.label(), "stage stopped on cancellation");
                self.stages[kind.index()] = StageState::Cancelled;
                self.idle_pending();
            }
            (StageKind::HoleFill, Ok(filled)) => {
                info!(faces = filled.face_count(), "hole fill finished");
                self.stages[kind.index()] = StageState::Completed;
                self.source = Some(filled.clone());
                self.chain(StageKind::PreviewColorize, filled, events);
            }
            (StageKind::HoleFill, Err(e)) => {
                warn!(error = %e, "hole fill failed, coloring the unfilled mesh");
                self.stages[kind.index()] = StageState::Failed(e.to_string());
                events.push(PipelineEvent::HoleFillFailed {
                    message: e.to_string(),
                });
                self.chain_from_source(StageKind::PreviewColorize, events);
            }
            (StageKind::PreviewColorize, Ok(colored)) => {
                info!(faces = colored.face_count(), "preview colorize finished");
                self.stages[kind.index()] = StageState::Completed;
                self.report(kind, 1.0, events);
                events.push(PipelineEvent::PreviewReady(colored.clone()));
                self.chain(StageKind::EnhancedColorize, colored, events);
            }
            (StageKind::EnhancedColorize, Ok(colored)) => {
                info!(faces = colored.face_count(), "enhanced colorize finished");
                self.stages[kind.index()] = StageState::Completed;
                self.report(kind, 1.0, events);
                events.push(PipelineEvent::EnhancedReady(colored));
            }
            (StageKind::PreviewColorize | StageKind::EnhancedColorize, Err(e)) => {
                warn!(stage = kind.label(), error = %e, "colorize failed");
                self.stages[kind.index()] = StageState::Failed(e.to_string());
                self.idle_pending();
                events.push(PipelineEvent::StageFailed {
                    kind,
                    message: e.to_string(),
                });
            }
        }
    }

    fn chain(&mut self, kind: StageKind, input: ScanMesh, events: &mut Vec<PipelineEvent>) {
        if !matches!(self.stages[kind.index()], StageState::Pending) {
            return;
        }
        if let Err(e) = self.launch(kind, input) {
            events.push(PipelineEvent::StageFailed {
                kind,
                message: e.to_string(),
            });
        }
    }

    fn chain_from_source(&mut self, kind: StageKind, events: &mut Vec<PipelineEvent>) {
        match self.source.clone() {
            Some(source) => self.chain(kind, source, events),
            None => self.idle_pending(),
        }
    }

    fn idle_pending(&mut self) {
        for stage in &mut self.stages {
            if matches!(stage, StageState::Pending) {
                *stage = StageState::Idle;
            }
        }
    }
}

impl<E: ReconstructionEngine> Drop for PostProcessingPipeline<E> {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn preview_percent(fraction: f64) -> u8 {
    let scaled = (fraction.clamp(0.0, 1.0) * f64::from(PREVIEW_PROGRESS_END)) as u8;
    scaled.min(PREVIEW_PROGRESS_END - 1)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn enhanced_percent(fraction: f64) -> u8 {
    let span = f64::from(100 - PREVIEW_PROGRESS_END);
    let scaled = (fraction.clamp(0.0, 1.0) * span) as u8;
    (PREVIEW_PROGRESS_END + scaled).min(100)
}

//! Detection Loop Implementation

use crate::{LoopConfig, LoopError, Publisher};
use frame_source::{FrameSource, SourceError, VideoFrame};
use occupancy::{DetectionEvent, OccupancyPipeline};
use region_store::RegionStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Externally visible loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopState {
    /// No source bound
    Idle,
    /// Source bound, not running
    Ready,
    /// Producing events
    Running,
}

/// Loop state plus the failure that ended the last run, if any
#[derive(Debug, Clone, Serialize)]
pub struct LoopStatus {
    pub state: LoopState,
    pub last_error: Option<String>,
}

/// Result of a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

/// Everything the background cycle needs, immutable once built
struct Shared {
    pipeline: OccupancyPipeline,
    regions: Arc<RegionStore>,
    publisher: Arc<dyn Publisher>,
    config: LoopConfig,
}

/// State behind the gate
#[derive(Default)]
struct Control {
    /// Bound source while not running; the cycle owns it while running
    source: Option<Box<dyn FrameSource>>,
    cycle: Option<RunningCycle>,
    last_error: Option<String>,
}

struct RunningCycle {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<CycleExit>,
}

/// What the cycle hands back when it ends
struct CycleExit {
    /// `None` when the source had to be abandoned
    source: Option<Box<dyn FrameSource>>,
    result: Result<(), LoopError>,
}

/// Handle to the detection loop; clones share the same loop
#[derive(Clone)]
pub struct DetectionLoop {
    gate: Arc<Mutex<Control>>,
    shared: Arc<Shared>,
}

impl DetectionLoop {
    pub fn new(
        pipeline: OccupancyPipeline,
        regions: Arc<RegionStore>,
        publisher: Arc<dyn Publisher>,
        config: LoopConfig,
    ) -> Self {
        info!(
            "Creating detection loop: pacing={}ms, read_timeout={}ms, looping={}",
            config.pacing_ms, config.read_timeout_ms, config.looping
        );
        Self {
            gate: Arc::new(Mutex::new(Control::default())),
            shared: Arc::new(Shared {
                pipeline,
                regions,
                publisher,
                config,
            }),
        }
    }

    /// Bind a new source, stopping the loop and releasing any previous source
    pub async fn bind_source(&self, source: Box<dyn FrameSource>) {
        let mut control = self.gate.lock().await;
        halt(&mut control).await;
        if control.source.take().is_some() {
            debug!("Released previous source");
        }

        info!("Bound source {}", source.describe());
        control.source = Some(source);
        control.last_error = None;
    }

    /// Stop the loop and drop the bound source
    pub async fn release_source(&self) {
        let mut control = self.gate.lock().await;
        halt(&mut control).await;
        if control.source.take().is_some() {
            info!("Source released");
        }
    }

    /// Start producing events on a background task
    pub async fn start(&self) -> Result<StartOutcome, LoopError> {
        let mut control = self.gate.lock().await;
        reap_finished(&mut control).await;

        if control.cycle.is_some() {
            return Ok(StartOutcome::AlreadyRunning);
        }
        if control.source.is_none() {
            return Err(LoopError::NoSource);
        }
        if self.shared.regions.is_empty() {
            return Err(LoopError::NoRegions);
        }
        let Some(source) = control.source.take() else {
            return Err(LoopError::NoSource);
        };

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_cycles(self.shared.clone(), source, stop_rx));
        control.cycle = Some(RunningCycle { stop_tx, handle });
        control.last_error = None;

        info!("Detection started");
        Ok(StartOutcome::Started)
    }

    /// Stop the loop at its next cycle boundary; a no-op when not running
    pub async fn stop(&self) {
        let mut control = self.gate.lock().await;
        halt(&mut control).await;
    }

    pub async fn state(&self) -> LoopState {
        self.status().await.state
    }

    /// Why the last run ended, if it failed
    pub async fn last_error(&self) -> Option<String> {
        self.status().await.last_error
    }

    pub async fn status(&self) -> LoopStatus {
        let mut control = self.gate.lock().await;
        reap_finished(&mut control).await;

        let state = if control.cycle.is_some() {
            LoopState::Running
        } else if control.source.is_some() {
            LoopState::Ready
        } else {
            LoopState::Idle
        };
        LoopStatus {
            state,
            last_error: control.last_error.clone(),
        }
    }

    /// Classify one frame against the current regions without touching loop state
    pub fn process_once(&self, frame: &VideoFrame) -> Result<DetectionEvent, LoopError> {
        let regions = self.shared.regions.snapshot();
        Ok(self.shared.pipeline.process(frame, &regions)?)
    }

    /// Decode and classify one encoded image on the blocking pool
    pub async fn process_bytes(&self, bytes: Vec<u8>) -> Result<DetectionEvent, LoopError> {
        let shared = self.shared.clone();
        let result = tokio::task::spawn_blocking(move || {
            let regions = shared.regions.snapshot();
            shared.pipeline.process_bytes(&bytes, &regions)
        })
        .await
        .map_err(|e| LoopError::Task(e.to_string()))?;
        Ok(result?)
    }

    pub fn regions(&self) -> &Arc<RegionStore> {
        &self.shared.regions
    }
}

/// Signal the running cycle, wait for it to reach its boundary and take the source back
async fn halt(control: &mut Control) {
    if let Some(cycle) = control.cycle.take() {
        let _ = cycle.stop_tx.send(true);
        join_cycle(control, cycle).await;
        info!("Detection stopped");
    }
}

/// Collect a cycle that ended on its own
async fn reap_finished(control: &mut Control) {
    let finished = control
        .cycle
        .as_ref()
        .map(|c| c.handle.is_finished())
        .unwrap_or(false);
    if finished {
        if let Some(cycle) = control.cycle.take() {
            join_cycle(control, cycle).await;
        }
    }
}

async fn join_cycle(control: &mut Control, cycle: RunningCycle) {
    match cycle.handle.await {
        Ok(exit) => {
            control.source = exit.source;
            if let Err(e) = exit.result {
                control.last_error = Some(e.to_string());
            }
        }
        Err(e) => {
            error!("Detection task aborted: {}", e);
            control.source = None;
            control.last_error = Some(LoopError::Task(e.to_string()).to_string());
        }
    }
}

/// Read one frame on the blocking pool, bounded by `limit`.
///
/// On expiry the source stays with the stuck reader and is lost.
async fn read_frame(
    mut source: Box<dyn FrameSource>,
    limit: Duration,
) -> Result<(Box<dyn FrameSource>, Result<Option<VideoFrame>, SourceError>), LoopError> {
    let read = tokio::task::spawn_blocking(move || {
        let frame = source.read_frame();
        (source, frame)
    });

    match tokio::time::timeout(limit, read).await {
        Ok(Ok(pair)) => Ok(pair),
        Ok(Err(e)) => Err(LoopError::Task(e.to_string())),
        Err(_) => Err(LoopError::SourceTimeout(limit)),
    }
}

/// The background cycle: read, process, publish, pace
async fn run_cycles(
    shared: Arc<Shared>,
    mut source: Box<dyn FrameSource>,
    mut stop_rx: watch::Receiver<bool>,
) -> CycleExit {
    let config = &shared.config;
    info!("Detection loop running on {}", source.describe());

    // Set after a rewind, cleared by any frame; a second end of stream in a row
    // means the source is empty
    let mut rewound = false;

    let result = loop {
        if *stop_rx.borrow() {
            break Ok(());
        }

        let (returned, read) = match read_frame(source, config.read_timeout()).await {
            Ok(pair) => pair,
            Err(e) => {
                error!("Abandoning source: {}", e);
                return CycleExit {
                    source: None,
                    result: Err(e),
                };
            }
        };
        source = returned;

        match read {
            Ok(Some(frame)) => {
                rewound = false;
                process_and_publish(&shared, frame).await;
            }
            Ok(None) if !config.looping => {
                info!("End of stream reached");
                break Ok(());
            }
            Ok(None) if rewound => {
                break Err(LoopError::SourceRead("source produced no frames".to_string()));
            }
            Ok(None) => {
                debug!("End of stream, rewinding");
                if let Err(e) = source.rewind() {
                    break Err(LoopError::SourceRead(e.to_string()));
                }
                rewound = true;
                continue;
            }
            Err(SourceError::Decode(msg)) => {
                rewound = false;
                warn!("Skipping undecodable frame: {}", msg);
                metrics::counter!("detection_cycle_failures_total").increment(1);
            }
            Err(e) => break Err(LoopError::SourceRead(e.to_string())),
        }

        let closed = tokio::select! {
            _ = tokio::time::sleep(config.pacing()) => false,
            changed = stop_rx.changed() => changed.is_err(),
        };
        if closed {
            break Ok(());
        }
    };

    match &result {
        Ok(()) => info!("Detection loop finished"),
        Err(e) => error!("Detection loop stopped: {}", e),
    }
    CycleExit {
        source: Some(source),
        result,
    }
}

/// One frame through the pipeline; failures are contained to this cycle
async fn process_and_publish(shared: &Arc<Shared>, frame: VideoFrame) {
    let worker = shared.clone();
    let processed = tokio::task::spawn_blocking(move || {
        let regions = worker.regions.snapshot();
        worker.pipeline.process(&frame, &regions)
    })
    .await;

    match processed {
        Ok(Ok(event)) => {
            metrics::counter!("detection_cycles_total").increment(1);
            metrics::gauge!("parking_free_spaces").set(event.free_spaces as f64);
            metrics::gauge!("parking_total_spaces").set(event.total_spaces as f64);
            shared.publisher.publish(event);
        }
        Ok(Err(e)) => {
            warn!("Frame skipped: {}", e);
            metrics::counter!("detection_cycle_failures_total").increment(1);
        }
        Err(e) => {
            warn!("Frame processing task failed: {}", e);
            metrics::counter!("detection_cycle_failures_total").increment(1);
        }
    }
}

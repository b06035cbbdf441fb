/// Interchangeable reading sources and the plumbing they report through
pub mod simulation;
pub mod telemetry;

use log::debug;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::DashboardConfig;
use crate::models::{Mode, ReadingUpdate};
use crate::pipeline::Event;

pub use simulation::SimulationSource;
pub use telemetry::TelemetrySource;

/// What a running source reports to the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// Explicit liveness flag from the device
    Status(bool),
    /// New (possibly partial) reading
    Data(ReadingUpdate),
    /// Time to compare the last-seen timestamp against the timeout
    WatchdogTick,
}

/// Handle a source task uses to push events, stamped with the epoch it was started under
#[derive(Debug, Clone)]
pub struct SourceSink {
    epoch: u64,
    tx: UnboundedSender<Event>,
}

impl SourceSink {
    pub fn new(epoch: u64, tx: UnboundedSender<Event>) -> Self {
        Self { epoch, tx }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns false once the pipeline is gone and the source should stop
    pub fn send(&self, event: SourceEvent) -> bool {
        let sent = self
            .tx
            .send(Event::Source {
                epoch: self.epoch,
                event,
            })
            .is_ok();
        if !sent {
            debug!("Pipeline closed, epoch {} source stopping", self.epoch);
        }
        sent
    }
}

/// Outbound publish channel towards the actuator controller
pub trait CommandSink: Send + Sync {
    fn publish(&self, topic: &str, payload: String) -> Result<(), String>;
}

/// A producer of readings with a start/stop lifecycle
pub trait IngestionSource: Send {
    fn mode(&self) -> Mode;

    /// Publisher sharing this source's connection, if it has one
    fn command_sink(&self) -> Option<Arc<dyn CommandSink>> {
        None
    }

    /// Start producing events. The task must return promptly once `cancel` fires
    /// and must not send anything after observing it.
    fn spawn(self: Box<Self>, sink: SourceSink, cancel: CancellationToken) -> JoinHandle<()>;
}

pub trait SourceFactory: Send {
    fn build(&self, mode: Mode) -> Box<dyn IngestionSource>;
}

/// Builds the real MQTT and random-generator sources from configuration
pub struct DefaultSources {
    config: DashboardConfig,
}

impl DefaultSources {
    pub fn new(config: DashboardConfig) -> Self {
        Self { config }
    }
}

impl SourceFactory for DefaultSources {
    fn build(&self, mode: Mode) -> Box<dyn IngestionSource> {
        match mode {
            Mode::Telemetry => Box::new(TelemetrySource::new(&self.config)),
            Mode::Simulation => Box::new(SimulationSource::new(self.config.simulation)),
        }
    }
}

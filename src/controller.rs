/// Keeps exactly one ingestion source running at a time
use log::{error, info};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;

use crate::error::DashboardError;
use crate::models::Mode;
use crate::pipeline::Event;
use crate::sources::{CommandSink, SourceFactory, SourceSink};

const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

struct ActiveSource {
    mode: Mode,
    epoch: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    commands: Option<Arc<dyn CommandSink>>,
}

pub struct ModeController<F: SourceFactory> {
    factory: F,
    events: UnboundedSender<Event>,
    active: Option<ActiveSource>,
    epoch: u64,
}

impl<F: SourceFactory> ModeController<F> {
    pub fn new(factory: F, events: UnboundedSender<Event>) -> Self {
        Self {
            factory,
            events,
            active: None,
            epoch: 0,
        }
    }

    pub fn mode(&self) -> Option<Mode> {
        self.active.as_ref().map(|a| a.mode)
    }

    /// Whether an event stamped with `epoch` comes from the running source
    pub fn is_current(&self, epoch: u64) -> bool {
        self.active.as_ref().map_or(false, |a| a.epoch == epoch)
    }

    pub fn command_sink(&self) -> Option<&Arc<dyn CommandSink>> {
        self.active.as_ref().and_then(|a| a.commands.as_ref())
    }

    /// Start the source for `mode` under a fresh epoch
    pub fn start(&mut self, mode: Mode) -> Result<(), DashboardError> {
        if let Some(active) = &self.active {
            return Err(DashboardError::SourceActive {
                active: active.mode,
                requested: mode,
            });
        }

        self.epoch += 1;
        let source = self.factory.build(mode);
        let commands = source.command_sink();
        let cancel = CancellationToken::new();
        let sink = SourceSink::new(self.epoch, self.events.clone());
        let handle = source.spawn(sink, cancel.clone());

        info!("Started {} source (epoch {})", mode, self.epoch);
        self.active = Some(ActiveSource {
            mode,
            epoch: self.epoch,
            cancel,
            handle,
            commands,
        });
        Ok(())
    }

    /// Cancel the running source and wait for its task to finish
    ///
    /// Once this returns Ok the old task is gone, and anything it queued
    /// carries an epoch that no longer matches.
    pub async fn stop(&mut self) -> Result<(), DashboardError> {
        let Some(mut active) = self.active.take() else {
            return Ok(());
        };

        active.cancel.cancel();
        match timeout(TEARDOWN_TIMEOUT, &mut active.handle).await {
            Ok(Ok(())) => {
                info!("Stopped {} source (epoch {})", active.mode, active.epoch);
                Ok(())
            }
            Ok(Err(e)) => {
                error!("{} source task failed: {}", active.mode, e);
                Err(DashboardError::Teardown {
                    mode: active.mode,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                active.handle.abort();
                error!(
                    "{} source ignored cancellation for {}s",
                    active.mode,
                    TEARDOWN_TIMEOUT.as_secs()
                );
                Err(DashboardError::Teardown {
                    mode: active.mode,
                    reason: "did not stop after cancellation".into(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{IngestionSource, SourceEvent};
    use tokio::sync::mpsc;

    /// Sends one status event per second until cancelled, or panics on request
    struct PingSource {
        mode: Mode,
        panic_on_stop: bool,
    }

    impl IngestionSource for PingSource {
        fn mode(&self) -> Mode {
            self.mode
        }

        fn spawn(self: Box<Self>, sink: SourceSink, cancel: CancellationToken) -> JoinHandle<()> {
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {
                            sink.send(SourceEvent::Status(true));
                        }
                    }
                }
                if self.panic_on_stop {
                    panic!("source failed during teardown");
                }
            })
        }
    }

    struct PingFactory {
        panic_on_stop: bool,
    }

    impl SourceFactory for PingFactory {
        fn build(&self, mode: Mode) -> Box<dyn IngestionSource> {
            Box::new(PingSource {
                mode,
                panic_on_stop: self.panic_on_stop,
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn only_one_source_at_a_time() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut controller = ModeController::new(PingFactory { panic_on_stop: false }, tx);

        controller.start(Mode::Simulation).unwrap();
        assert!(matches!(
            controller.start(Mode::Telemetry),
            Err(DashboardError::SourceActive { .. })
        ));

        controller.stop().await.unwrap();
        controller.start(Mode::Telemetry).unwrap();
        assert_eq!(controller.mode(), Some(Mode::Telemetry));
        assert!(controller.command_sink().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_arrives_after_stop() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut controller = ModeController::new(PingFactory { panic_on_stop: false }, tx);

        controller.start(Mode::Telemetry).unwrap();
        tokio::time::sleep(Duration::from_millis(3500)).await;
        controller.stop().await.unwrap();

        let mut before = 0;
        while let Ok(Event::Source { epoch, .. }) = rx.try_recv() {
            assert_eq!(epoch, 1);
            assert!(!controller.is_current(epoch));
            before += 1;
        }
        assert_eq!(before, 3);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_teardown_is_an_error() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut controller = ModeController::new(PingFactory { panic_on_stop: true }, tx);

        controller.start(Mode::Simulation).unwrap();
        let result = controller.stop().await;
        assert!(matches!(
            result,
            Err(DashboardError::Teardown {
                mode: Mode::Simulation,
                ..
            })
        ));
    }
}

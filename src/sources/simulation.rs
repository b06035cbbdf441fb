/// Synthetic readings for running without the station
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{IngestionSource, SourceEvent, SourceSink};
use crate::config::SimulationVariant;
use crate::models::{Mode, ReadingUpdate};
use crate::utils::round_to;

const UNIFORM_PERIOD: Duration = Duration::from_secs(3);
const DRIFT_PERIOD: Duration = Duration::from_secs(2);

// Drift starts from a mild spring day
const DRIFT_START: (f64, f64, f64) = (25.0, 60.0, 101.3);

/// One independent sample over the uniform generator's ranges
pub fn uniform_sample<R: Rng>(rng: &mut R) -> ReadingUpdate {
    ReadingUpdate::core(
        round_to(rng.gen_range(20.0..=35.0), 1),
        round_to(rng.gen_range(40.0..=100.0), 0),
        round_to(rng.gen_range(100.0..=105.0), 1),
    )
}

pub struct SimulationSource {
    variant: SimulationVariant,
    period: Duration,
    rng: StdRng,
    last: (f64, f64, f64),
}

impl SimulationSource {
    pub fn new(variant: SimulationVariant) -> Self {
        Self::with_rng(variant, StdRng::from_entropy())
    }

    pub fn with_rng(variant: SimulationVariant, rng: StdRng) -> Self {
        let period = match variant {
            SimulationVariant::Uniform => UNIFORM_PERIOD,
            SimulationVariant::Drift => DRIFT_PERIOD,
        };
        Self {
            variant,
            period,
            rng,
            last: DRIFT_START,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Produce the next synthetic reading
    pub fn next_reading(&mut self) -> ReadingUpdate {
        match self.variant {
            SimulationVariant::Uniform => uniform_sample(&mut self.rng),
            SimulationVariant::Drift => {
                let (t, h, p) = self.last;
                let next = (
                    round_to((t + self.rng.gen_range(-1.0..=1.0)).clamp(0.0, 50.0), 1),
                    round_to((h + self.rng.gen_range(-1.5..=1.5)).clamp(0.0, 100.0), 0),
                    round_to((p + self.rng.gen_range(-0.25..=0.25)).clamp(95.0, 110.0), 2),
                );
                self.last = next;
                ReadingUpdate::core(next.0, next.1, next.2)
            }
        }
    }
}

impl IngestionSource for SimulationSource {
    fn mode(&self) -> Mode {
        Mode::Simulation
    }

    fn spawn(mut self: Box<Self>, sink: SourceSink, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Simulation started ({:?}, every {}s, epoch {})",
                self.variant,
                self.period().as_secs(),
                sink.epoch()
            );

            // First reading one period after start
            let period = self.period();
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let reading = self.next_reading();
                        debug!("Simulated reading: {:?}", reading);
                        if !sink.send(SourceEvent::Data(reading)) {
                            break;
                        }
                    }
                }
            }

            info!("Simulation stopped (epoch {})", sink.epoch());
        })
    }
}

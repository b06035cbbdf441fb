/// Single serialized event loop that owns all dashboard state
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;

use crate::actuator::{ActuatorTopics, Control, OverrideTimer};
use crate::commands::UserCommand;
use crate::config::DashboardConfig;
use crate::controller::ModeController;
use crate::error::DashboardError;
use crate::history::HistoryBuffer;
use crate::metrics::{derive_from_optional, dew_point_linear};
use crate::models::{ChartPoint, ConnectionState, DerivedMetrics, Mode, RawReading, ReadingUpdate};
use crate::sources::simulation::uniform_sample;
use crate::sources::{SourceEvent, SourceFactory};
use crate::utils::{chart_label, now_local};
use crate::watchdog::Watchdog;
use crate::weather::{classify, OverrideCode, WeatherDescriptor, WeatherState};

/// Everything that can wake the pipeline
#[derive(Debug)]
pub enum Event {
    Source { epoch: u64, event: SourceEvent },
    Command(UserCommand),
    OverrideExpired { generation: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// The dashboard's view of the world
#[derive(Debug, Clone)]
pub struct DashboardState {
    pub mode: Mode,
    pub reading: RawReading,
    pub derived: DerivedMetrics,
    pub weather: WeatherState,
    pub weather_override: Option<WeatherDescriptor>,
    pub history: HistoryBuffer,
    pub watchdog: Watchdog,
}

impl DashboardState {
    pub fn new(mode: Mode, history_capacity: usize) -> Self {
        Self {
            mode,
            reading: RawReading::default(),
            derived: DerivedMetrics::default(),
            weather: WeatherState::default(),
            weather_override: None,
            history: HistoryBuffer::new(history_capacity),
            watchdog: Watchdog::new(Instant::now()),
        }
    }

    /// Merge an update, recompute everything derived and append a chart point
    pub fn apply_reading(&mut self, update: &ReadingUpdate, label: String) {
        self.reading.merge(update);
        self.derived = derive_from_optional(
            self.reading.temperature,
            self.reading.humidity,
            self.reading.pressure,
        );
        self.reclassify();
        self.history.append(ChartPoint {
            label,
            temp: self.reading.temperature,
            hum: self.reading.humidity,
            pres: self.reading.pressure,
        });
    }

    /// Connection status as shown to the user. Simulation has none.
    pub fn connection(&self) -> Option<ConnectionState> {
        match self.mode {
            Mode::Telemetry => Some(self.watchdog.state()),
            Mode::Simulation => None,
        }
    }

    pub fn set_override(&mut self, descriptor: Option<WeatherDescriptor>) {
        self.weather_override = descriptor;
        self.reclassify();
    }

    fn reclassify(&mut self) {
        let next = match self.weather_override {
            Some(descriptor) => descriptor.into(),
            None => classify(&self.reading),
        };
        if next.descriptor != self.weather.descriptor {
            info!(
                "Weather changed: {} -> {}{}",
                self.weather.descriptor,
                next.descriptor,
                if self.weather_override.is_some() { " (manual)" } else { "" }
            );
        }
        self.weather = next;
    }

    pub fn log_summary(&self) {
        let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{:.1}", v));

        info!("Summary ({} mode):", self.mode);
        match self.connection() {
            Some(state) => info!("  Device: {}", state),
            None => info!("  Device: simulated"),
        }
        info!("  Temperature: {}°C", fmt(self.reading.temperature));
        info!("  Humidity: {}%", fmt(self.reading.humidity));
        info!("  Pressure: {} kPa", fmt(self.reading.pressure));
        if let Some(lux) = self.reading.luminosity {
            info!("  Luminosity: {:.0} lx", lux);
        }
        if let Some(rain) = self.reading.rain_level {
            info!("  Rain sensor: {:.0}", rain);
        }
        if let Some(wind) = self.reading.wind_speed {
            info!(
                "  Wind: {:.1} km/h {}",
                wind,
                self.reading.wind_direction.as_deref().unwrap_or("")
            );
        }
        info!(
            "  Heat index: {:.1}°C, dew point: {:.1}°C, absolute humidity: {:.1} g/m³",
            self.derived.heat_index, self.derived.dew_point, self.derived.absolute_humidity
        );
        if let (Some(t), Some(h)) = (self.reading.temperature, self.reading.humidity) {
            info!("  Dew point (linear estimate): {:.1}°C", dew_point_linear(t, h));
        }
        info!(
            "  Weather: {} ({}){}",
            self.weather.descriptor,
            self.weather.effect,
            if self.weather_override.is_some() { ", manual override" } else { "" }
        );
        info!(
            "  History: {}/{} points, last at {}",
            self.history.len(),
            self.history.capacity(),
            self.history.last().map_or("-", |p| p.label.as_str())
        );
        let temps = self.history.iter().filter_map(|p| p.temp);
        let (min, max) = temps.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| {
            (lo.min(t), hi.max(t))
        });
        if min <= max {
            info!("  Temperature range in history: {:.1}..{:.1}°C", min, max);
        }
    }
}

pub struct Dashboard<F: SourceFactory> {
    state: DashboardState,
    controller: ModeController<F>,
    override_timer: OverrideTimer,
    topics: ActuatorTopics,
    label_seconds: bool,
    rng: StdRng,
    sender: UnboundedSender<Event>,
    events: UnboundedReceiver<Event>,
}

impl<F: SourceFactory> Dashboard<F> {
    pub fn new(config: &DashboardConfig, factory: F) -> Self {
        let (sender, events) = mpsc::unbounded_channel();
        Self {
            state: DashboardState::new(config.initial_mode, config.simulation.history_capacity()),
            controller: ModeController::new(factory, sender.clone()),
            override_timer: OverrideTimer::new(),
            topics: ActuatorTopics::from_config(config),
            label_seconds: config.label_seconds,
            rng: StdRng::from_entropy(),
            sender,
            events,
        }
    }

    /// Channel for feeding operator commands into the loop
    pub fn sender(&self) -> UnboundedSender<Event> {
        self.sender.clone()
    }

    #[cfg(test)]
    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    /// Enter `initial` mode and process events until a quit command
    pub async fn run(mut self, initial: Mode) -> Result<(), DashboardError> {
        self.switch_mode(initial).await?;

        while let Some(event) = self.events.recv().await {
            if self.handle(event).await? == Flow::Stop {
                break;
            }
        }

        self.override_timer.cancel();
        self.controller.stop().await?;
        self.state.log_summary();
        Ok(())
    }

    /// Tear down the active source, then start the one for `mode`
    pub async fn switch_mode(&mut self, mode: Mode) -> Result<(), DashboardError> {
        let previous = self.controller.mode();
        if previous == Some(mode) {
            info!("Already in {} mode", mode);
            return Ok(());
        }

        self.controller.stop().await?;
        if previous == Some(Mode::Telemetry) && self.state.watchdog.force_offline() {
            info!("Device marked offline after leaving telemetry mode");
        }

        self.state.mode = mode;
        self.controller.start(mode)?;
        if mode == Mode::Telemetry {
            self.state.watchdog.arm(Instant::now());
        }
        info!("Switched to {} mode", mode);
        Ok(())
    }

    pub async fn handle(&mut self, event: Event) -> Result<Flow, DashboardError> {
        match event {
            Event::Source { epoch, event } => {
                if self.controller.is_current(epoch) {
                    self.handle_source(event);
                } else {
                    debug!("Dropping stale event from epoch {}: {:?}", epoch, event);
                }
            }
            Event::Command(command) => return self.handle_command(command).await,
            Event::OverrideExpired { generation } => {
                if self.override_timer.take_expiry(generation) {
                    info!("No manual weather selection for a while, back to automatic");
                    self.publish(Control::Weather(OverrideCode::Auto));
                    self.state.set_override(None);
                }
            }
        }
        Ok(Flow::Continue)
    }

    fn handle_source(&mut self, event: SourceEvent) {
        let telemetry = self.state.mode == Mode::Telemetry;

        match event {
            SourceEvent::Status(online) => {
                if telemetry && self.state.watchdog.apply_status(online) {
                    info!("Device reported {}", self.state.watchdog.state());
                }
            }
            SourceEvent::Data(update) => {
                if telemetry && self.state.watchdog.record_data(Instant::now()) {
                    info!("Device online");
                }
                let label = chart_label(&now_local(), self.label_seconds);
                self.state.apply_reading(&update, label);
                debug!(
                    "Reading applied: {:?}, derived {:?}, weather {}",
                    self.state.reading, self.state.derived, self.state.weather.descriptor
                );
            }
            SourceEvent::WatchdogTick => {
                if telemetry && self.state.watchdog.check(Instant::now()) {
                    warn!("No telemetry data received recently, device marked offline");
                }
            }
        }
    }

    async fn handle_command(&mut self, command: UserCommand) -> Result<Flow, DashboardError> {
        match command {
            UserCommand::SwitchMode(mode) => self.switch_mode(mode).await?,
            UserCommand::Control(control) => self.apply_control(control),
            UserCommand::SetReading(channel, value) => {
                self.apply_manual(channel.update(value));
            }
            UserCommand::Generate => {
                let update = uniform_sample(&mut self.rng);
                self.apply_manual(update);
            }
            UserCommand::Status => self.state.log_summary(),
            UserCommand::Quit => {
                info!("Shutting down");
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }

    /// Operator-entered values; the next generator tick replaces them
    fn apply_manual(&mut self, update: ReadingUpdate) {
        if self.state.mode != Mode::Simulation {
            warn!("Manual readings only apply in simulation mode, ignoring {:?}", update);
            return;
        }
        let label = chart_label(&now_local(), self.label_seconds);
        self.state.apply_reading(&update, label);
        info!(
            "Manual reading applied: {:?}, weather {}",
            self.state.reading, self.state.weather.descriptor
        );
    }

    fn apply_control(&mut self, control: Control) {
        self.publish(control);

        match control {
            Control::Weather(OverrideCode::Manual(descriptor)) => {
                self.state.set_override(Some(descriptor));
                self.override_timer.restart(&self.sender);
            }
            Control::Weather(OverrideCode::Auto) => {
                self.override_timer.cancel();
                self.state.set_override(None);
            }
            // Any other manual interaction keeps an active override alive
            _ if self.override_timer.is_armed() => self.override_timer.restart(&self.sender),
            _ => {}
        }
    }

    fn publish(&self, control: Control) {
        let (topic, payload) = control.message(&self.topics);
        match self.controller.command_sink() {
            Some(sink) => match sink.publish(&topic, payload.clone()) {
                Ok(()) => debug!("Published {} to {}", payload, topic),
                Err(e) => warn!("Failed to publish {} to {}: {}", payload, topic, e),
            },
            None => warn!(
                "Not connected to the broker in {} mode, dropping {} for {}",
                self.state.mode, payload, topic
            ),
        }
    }

    /// Handle everything already queued without waiting for more
    #[cfg(test)]
    pub async fn process_pending(&mut self) -> Result<usize, DashboardError> {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            self.handle(event).await?;
            handled += 1;
        }
        Ok(handled)
    }
}

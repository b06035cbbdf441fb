/// Outbound commands for the LED matrix / servo controller
use log::debug;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use crate::config::DashboardConfig;
use crate::pipeline::Event;
use crate::weather::OverrideCode;

pub const BRIGHTNESS_LEVELS: [u16; 3] = [50, 128, 255];
// Index 0 is the slowest animation
pub const SPEED_LEVELS: [u16; 3] = [100, 50, 20];
pub const SERVO_POSITIONS: [u16; 2] = [0, 90];
pub const SERVO_SPEED_LEVELS: [u16; 3] = [20, 50, 80];

/// Manual weather override falls back to automatic after this much inactivity
pub const OVERRIDE_IDLE_RESET: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuatorTopics {
    pub brightness: String,
    pub speed: String,
    pub weather: String,
    pub servo_position: String,
    pub servo_speed: String,
}

impl ActuatorTopics {
    pub fn from_config(config: &DashboardConfig) -> Self {
        Self {
            brightness: config.topic("led/brightness"),
            speed: config.topic("led/speed"),
            weather: config.topic("led/weather"),
            servo_position: config.topic("servo/position"),
            servo_speed: config.topic("servo/movement"),
        }
    }
}

/// A control selection. Level variants hold an index into the matching level table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Brightness(usize),
    Speed(usize),
    ServoPosition(usize),
    ServoSpeed(usize),
    Weather(OverrideCode),
}

impl Control {
    /// Build a level control, rejecting indexes outside its table
    pub fn level(kind: &str, index: usize) -> Option<Control> {
        let (control, levels) = match kind {
            "brightness" => (Control::Brightness(index), BRIGHTNESS_LEVELS.len()),
            "speed" => (Control::Speed(index), SPEED_LEVELS.len()),
            "servo" => (Control::ServoPosition(index), SERVO_POSITIONS.len()),
            "servo-speed" => (Control::ServoSpeed(index), SERVO_SPEED_LEVELS.len()),
            _ => return None,
        };
        (index < levels).then_some(control)
    }

    /// Topic and payload to publish
    pub fn message(&self, topics: &ActuatorTopics) -> (String, String) {
        match *self {
            Control::Brightness(i) => {
                (topics.brightness.clone(), level_payload(&BRIGHTNESS_LEVELS, i))
            }
            Control::Speed(i) => (topics.speed.clone(), level_payload(&SPEED_LEVELS, i)),
            Control::ServoPosition(i) => {
                (topics.servo_position.clone(), level_payload(&SERVO_POSITIONS, i))
            }
            Control::ServoSpeed(i) => {
                (topics.servo_speed.clone(), level_payload(&SERVO_SPEED_LEVELS, i))
            }
            Control::Weather(code) => (topics.weather.clone(), code.as_str().to_string()),
        }
    }
}

fn level_payload(levels: &[u16], index: usize) -> String {
    // Out-of-range indexes cannot be built through Control::level
    levels[index.min(levels.len() - 1)].to_string()
}

/// Cancellable delayed task that hands weather authority back to the classifier
///
/// Each restart bumps the generation, so an expiry that was already queued
/// when the timer was restarted or cancelled is recognised as stale.
#[derive(Debug, Default)]
pub struct OverrideTimer {
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl OverrideTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restart(&mut self, events: &UnboundedSender<Event>) {
        self.cancel();
        let generation = self.generation;
        let events = events.clone();
        self.pending = Some(tokio::spawn(async move {
            sleep(OVERRIDE_IDLE_RESET).await;
            let _ = events.send(Event::OverrideExpired { generation });
        }));
        debug!("Override timer armed (generation {})", generation);
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        self.generation += 1;
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Accept an expiry only if it belongs to the latest restart
    pub fn take_expiry(&mut self, generation: u64) -> bool {
        if self.pending.is_some() && generation == self.generation {
            self.pending = None;
            true
        } else {
            false
        }
    }
}

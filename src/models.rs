use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Latest known values of the physical sensor channels.
///
/// A channel stays `None` until the active source reports it for the first
/// time; after that, a payload that omits it leaves the previous value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawReading {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub luminosity: Option<f64>,
    pub rain_level: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<String>,
}

impl RawReading {
    /// Merge a partial update into the reading
    pub fn merge(&mut self, update: &ReadingUpdate) {
        if let Some(temp) = update.temperature {
            self.temperature = Some(temp);
        }
        if let Some(hum) = update.humidity {
            // Relative humidity is a percentage, never outside 0-100
            self.humidity = Some(hum.clamp(0.0, 100.0));
        }
        if let Some(pres) = update.pressure {
            self.pressure = Some(pres);
        }
        if let Some(lux) = update.luminosity {
            self.luminosity = Some(lux);
        }
        if let Some(rain) = update.rain_level {
            self.rain_level = Some(rain);
        }
        if let Some(wind) = update.wind_speed {
            self.wind_speed = Some(wind);
        }
        if let Some(dir) = &update.wind_direction {
            self.wind_direction = Some(dir.clone());
        }
    }
}

/// Partial reading as carried by a data message. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingUpdate {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub luminosity: Option<f64>,
    /// Raw rain sensor level. Firmware sends it as an integer or a float.
    pub rain_level: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<String>,
}

impl ReadingUpdate {
    /// Update carrying only the three core channels, as produced by the simulator.
    pub fn core(temperature: f64, humidity: f64, pressure: f64) -> Self {
        ReadingUpdate {
            temperature: Some(temperature),
            humidity: Some(humidity),
            pressure: Some(pressure),
            ..Default::default()
        }
    }
}

/// Status channel payload: `{"online": true}`
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StatusMessage {
    pub online: bool,
}

/// Quantities computed from temperature and humidity.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DerivedMetrics {
    pub heat_index: f64,
    pub dew_point: f64,
    pub absolute_humidity: f64,
}

/// One point of the time-series chart. Never modified after it is appended.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub label: String,
    pub temp: Option<f64>,
    pub hum: Option<f64>,
    pub pres: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Online,
    Offline,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Online => write!(f, "online"),
            ConnectionState::Offline => write!(f, "offline"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Telemetry,
    Simulation,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Telemetry => write!(f, "telemetry"),
            Mode::Simulation => write!(f, "simulation"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telemetry" | "sensor" => Ok(Mode::Telemetry),
            "simulation" | "sim" => Ok(Mode::Simulation),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_with_subset_of_keys() {
        let update: ReadingUpdate =
            serde_json::from_str(r#"{"temperature": 21.5, "rainLevel": 320, "extra": "x"}"#)
                .unwrap();
        assert_eq!(update.temperature, Some(21.5));
        assert_eq!(update.rain_level, Some(320.0));
        assert_eq!(update.humidity, None);
    }

    #[test]
    fn fractional_rain_level_keeps_other_fields() {
        let update: ReadingUpdate =
            serde_json::from_str(r#"{"temperature": 21, "rainLevel": 512.0}"#).unwrap();
        assert_eq!(update.temperature, Some(21.0));
        assert_eq!(update.rain_level, Some(512.0));
    }

    #[test]
    fn null_fields_count_as_absent() {
        let update: ReadingUpdate =
            serde_json::from_str(r#"{"humidity": null, "windDirection": "NE"}"#).unwrap();
        assert_eq!(update.humidity, None);
        assert_eq!(update.wind_direction.as_deref(), Some("NE"));
    }

    #[test]
    fn merge_keeps_absent_fields() {
        let mut reading = RawReading::default();
        reading.merge(&ReadingUpdate::core(25.0, 60.0, 101.3));

        reading.merge(&ReadingUpdate {
            temperature: Some(26.0),
            ..Default::default()
        });

        assert_eq!(reading.temperature, Some(26.0));
        assert_eq!(reading.humidity, Some(60.0));
        assert_eq!(reading.pressure, Some(101.3));
    }

    #[test]
    fn merge_clamps_humidity() {
        let mut reading = RawReading::default();
        reading.merge(&ReadingUpdate {
            humidity: Some(104.2),
            ..Default::default()
        });
        assert_eq!(reading.humidity, Some(100.0));
    }

    #[test]
    fn status_requires_boolean() {
        assert!(serde_json::from_str::<StatusMessage>(r#"{"online": false}"#).is_ok());
        assert!(serde_json::from_str::<StatusMessage>(r#"{"online": "yes"}"#).is_err());
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("Telemetry".parse::<Mode>(), Ok(Mode::Telemetry));
        assert_eq!("sim".parse::<Mode>(), Ok(Mode::Simulation));
        assert!("radio".parse::<Mode>().is_err());
    }
}

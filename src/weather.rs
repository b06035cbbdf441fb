/// Rule-based weather classification and manual override codes
use std::fmt;
use std::str::FromStr;

use crate::models::RawReading;

// Classification thresholds, evaluated in rule order
const STORM_MAX_PRESSURE: f64 = 101.0; // kPa, exclusive
const STORM_MIN_HUMIDITY: f64 = 80.0; // %, exclusive
const STORM_MAX_TEMPERATURE: f64 = 20.0; // °C, exclusive
const RAIN_SENSOR_WET_BELOW: f64 = 500.0; // raw ADC, lower = wetter
const RAIN_MIN_HUMIDITY_WITH_SENSOR: f64 = 70.0;
const RAIN_MIN_HUMIDITY_WITHOUT_SENSOR: f64 = 85.0;
const CHILLY_MAX_TEMPERATURE: f64 = 5.0;
const COOL_MAX_TEMPERATURE: f64 = 10.0;
const COOL_MAX_HUMIDITY: f64 = 60.0;
const COOL_MIN_PRESSURE: f64 = 102.0;
const HOT_MIN_TEMPERATURE: f64 = 32.0;
const HOT_MAX_HUMIDITY: f64 = 60.0;
const CLOUDY_MIN_HUMIDITY: f64 = 60.0;
const CLOUDY_MAX_PRESSURE: f64 = 101.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeatherDescriptor {
    Loading,
    Sunny,
    Cloudy,
    Rainy,
    Stormy,
    Hot,
    Chilly,
}

impl WeatherDescriptor {
    /// Key used by consumers to pick a background effect
    pub fn effect_key(self) -> &'static str {
        match self {
            WeatherDescriptor::Loading | WeatherDescriptor::Cloudy => "clouds",
            WeatherDescriptor::Sunny => "sunny",
            WeatherDescriptor::Rainy => "rain",
            WeatherDescriptor::Stormy => "storm",
            WeatherDescriptor::Hot => "heat",
            WeatherDescriptor::Chilly => "snow",
        }
    }
}

impl fmt::Display for WeatherDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WeatherDescriptor::Loading => "Loading",
            WeatherDescriptor::Sunny => "Sunny",
            WeatherDescriptor::Cloudy => "Cloudy",
            WeatherDescriptor::Rainy => "Rainy",
            WeatherDescriptor::Stormy => "Stormy",
            WeatherDescriptor::Hot => "Hot",
            WeatherDescriptor::Chilly => "Chilly",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeatherState {
    pub descriptor: WeatherDescriptor,
    pub effect: &'static str,
}

impl From<WeatherDescriptor> for WeatherState {
    fn from(descriptor: WeatherDescriptor) -> Self {
        WeatherState {
            descriptor,
            effect: descriptor.effect_key(),
        }
    }
}

impl Default for WeatherState {
    fn default() -> Self {
        WeatherDescriptor::Loading.into()
    }
}

/// Classify a reading. The first matching rule wins.
///
/// Missing temperature or humidity yields the `Loading` placeholder. A missing
/// pressure never satisfies a pressure condition.
pub fn classify(reading: &RawReading) -> WeatherState {
    let (temp, hum) = match (reading.temperature, reading.humidity) {
        (Some(t), Some(h)) if t.is_finite() && h.is_finite() => (t, h),
        _ => return WeatherDescriptor::Loading.into(),
    };
    let pres = reading.pressure.filter(|p| p.is_finite());
    let pres_below = |limit: f64| pres.map_or(false, |p| p < limit);
    let pres_above = |limit: f64| pres.map_or(false, |p| p > limit);

    let descriptor = if pres_below(STORM_MAX_PRESSURE)
        && hum > STORM_MIN_HUMIDITY
        && temp < STORM_MAX_TEMPERATURE
    {
        WeatherDescriptor::Stormy
    } else if is_raining(reading.rain_level, hum) {
        WeatherDescriptor::Rainy
    } else if temp <= CHILLY_MAX_TEMPERATURE
        || (temp <= COOL_MAX_TEMPERATURE
            && hum < COOL_MAX_HUMIDITY
            && pres_above(COOL_MIN_PRESSURE))
    {
        WeatherDescriptor::Chilly
    } else if temp >= HOT_MIN_TEMPERATURE && hum < HOT_MAX_HUMIDITY {
        WeatherDescriptor::Hot
    } else if hum >= CLOUDY_MIN_HUMIDITY && pres.map_or(false, |p| p <= CLOUDY_MAX_PRESSURE) {
        WeatherDescriptor::Cloudy
    } else {
        WeatherDescriptor::Sunny
    };

    descriptor.into()
}

fn is_raining(rain_level: Option<f64>, hum: f64) -> bool {
    match rain_level {
        Some(level) if level.is_finite() => {
            level < RAIN_SENSOR_WET_BELOW && hum > RAIN_MIN_HUMIDITY_WITH_SENSOR
        }
        _ => hum > RAIN_MIN_HUMIDITY_WITHOUT_SENSOR,
    }
}

/// Weather code understood by the actuator controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideCode {
    Manual(WeatherDescriptor),
    Auto,
}

impl OverrideCode {
    pub fn as_str(self) -> &'static str {
        match self {
            OverrideCode::Auto => "auto",
            OverrideCode::Manual(WeatherDescriptor::Sunny) => "sunny",
            OverrideCode::Manual(WeatherDescriptor::Rainy) => "rain",
            OverrideCode::Manual(WeatherDescriptor::Chilly) => "snow",
            OverrideCode::Manual(WeatherDescriptor::Hot) => "hot",
            OverrideCode::Manual(WeatherDescriptor::Stormy) => "storm",
            OverrideCode::Manual(WeatherDescriptor::Cloudy | WeatherDescriptor::Loading) => {
                "clouds"
            }
        }
    }
}

impl FromStr for OverrideCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let descriptor = match s.trim().to_ascii_lowercase().as_str() {
            "auto" => return Ok(OverrideCode::Auto),
            "sunny" => WeatherDescriptor::Sunny,
            "rain" => WeatherDescriptor::Rainy,
            "snow" => WeatherDescriptor::Chilly,
            "clouds" => WeatherDescriptor::Cloudy,
            "hot" => WeatherDescriptor::Hot,
            "storm" => WeatherDescriptor::Stormy,
            other => return Err(format!("unknown weather code '{}'", other)),
        };
        Ok(OverrideCode::Manual(descriptor))
    }
}

impl fmt::Display for OverrideCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(t: f64, h: f64, p: f64) -> RawReading {
        RawReading {
            temperature: Some(t),
            humidity: Some(h),
            pressure: Some(p),
            ..Default::default()
        }
    }

    fn descriptor(r: &RawReading) -> WeatherDescriptor {
        classify(r).descriptor
    }

    #[test]
    fn loading_when_core_channels_missing() {
        let state = classify(&RawReading::default());
        assert_eq!(state.descriptor, WeatherDescriptor::Loading);
        assert_eq!(state.effect, "clouds");

        let mut r = reading(20.0, 50.0, 101.0);
        r.temperature = Some(f64::NAN);
        assert_eq!(descriptor(&r), WeatherDescriptor::Loading);
    }

    #[test]
    fn stormy_takes_precedence_over_rainy() {
        // Matches both the storm rule and the sensorless rain rule
        assert_eq!(descriptor(&reading(15.0, 90.0, 100.2)), WeatherDescriptor::Stormy);
        assert_eq!(descriptor(&reading(22.0, 90.0, 100.2)), WeatherDescriptor::Rainy);
    }

    #[test]
    fn rain_threshold_depends_on_sensor() {
        let mut r = reading(24.0, 75.0, 101.8);
        assert_eq!(descriptor(&r), WeatherDescriptor::Sunny);

        r.rain_level = Some(300.0);
        assert_eq!(descriptor(&r), WeatherDescriptor::Rainy);

        r.rain_level = Some(900.0);
        assert_eq!(descriptor(&r), WeatherDescriptor::Sunny);
    }

    #[test]
    fn chilly_rules() {
        assert_eq!(descriptor(&reading(4.0, 70.0, 101.8)), WeatherDescriptor::Chilly);
        assert_eq!(descriptor(&reading(9.0, 50.0, 102.5)), WeatherDescriptor::Chilly);
        assert_eq!(descriptor(&reading(9.0, 50.0, 101.5)), WeatherDescriptor::Sunny);
    }

    #[test]
    fn hot_and_cloudy() {
        assert_eq!(descriptor(&reading(33.0, 40.0, 101.3)), WeatherDescriptor::Hot);
        assert_eq!(descriptor(&reading(33.0, 65.0, 101.3)), WeatherDescriptor::Cloudy);
        assert_eq!(descriptor(&reading(25.0, 65.0, 102.0)), WeatherDescriptor::Sunny);
    }

    #[test]
    fn missing_pressure_skips_pressure_rules() {
        let mut r = reading(15.0, 82.0, 0.0);
        r.pressure = None;
        assert_eq!(descriptor(&r), WeatherDescriptor::Sunny);
    }

    #[test]
    fn effect_keys() {
        assert_eq!(classify(&reading(33.0, 40.0, 101.3)).effect, "heat");
        assert_eq!(classify(&reading(15.0, 90.0, 100.2)).effect, "storm");
        assert_eq!(classify(&reading(4.0, 70.0, 101.8)).effect, "snow");
    }

    #[test]
    fn override_codes() {
        assert_eq!("auto".parse::<OverrideCode>(), Ok(OverrideCode::Auto));
        assert_eq!(
            "storm".parse::<OverrideCode>(),
            Ok(OverrideCode::Manual(WeatherDescriptor::Stormy))
        );
        for code in ["sunny", "rain", "snow", "clouds", "hot", "storm"] {
            assert_eq!(code.parse::<OverrideCode>().unwrap().as_str(), code);
        }
        assert!("fog".parse::<OverrideCode>().is_err());
    }
}

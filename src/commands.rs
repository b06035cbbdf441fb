/// Operator commands read line by line from stdin
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::actuator::Control;
use crate::models::{Mode, ReadingUpdate};
use crate::utils::round_to;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UserCommand {
    SwitchMode(Mode),
    Control(Control),
    /// Hand-set one core channel while simulating
    SetReading(ManualChannel, f64),
    /// Draw one random sample for all core channels while simulating
    Generate,
    Status,
    Quit,
}

/// Core channel the operator can set by hand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualChannel {
    Temperature,
    Humidity,
    Pressure,
}

impl ManualChannel {
    /// Accepted range and decimals, as on the dashboard sliders
    fn bounds(self) -> (f64, f64, i32) {
        match self {
            ManualChannel::Temperature => (0.0, 50.0, 1),
            ManualChannel::Humidity => (0.0, 100.0, 0),
            ManualChannel::Pressure => (95.0, 110.0, 1),
        }
    }

    /// Check and round an operator-supplied value
    pub fn value(self, raw: &str) -> Result<f64, CommandParseError> {
        let (min, max, decimals) = self.bounds();
        raw.parse::<f64>()
            .ok()
            .filter(|v| (min..=max).contains(v))
            .map(|v| round_to(v, decimals))
            .ok_or_else(|| {
                CommandParseError::InvalidArgument(format!(
                    "{} must be a number between {} and {}",
                    self, min, max
                ))
            })
    }

    /// Partial update carrying only this channel
    pub fn update(self, value: f64) -> ReadingUpdate {
        let mut update = ReadingUpdate::default();
        match self {
            ManualChannel::Temperature => update.temperature = Some(value),
            ManualChannel::Humidity => update.humidity = Some(value),
            ManualChannel::Pressure => update.pressure = Some(value),
        }
        update
    }
}

impl fmt::Display for ManualChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManualChannel::Temperature => write!(f, "temperature"),
            ManualChannel::Humidity => write!(f, "humidity"),
            ManualChannel::Pressure => write!(f, "pressure"),
        }
    }
}

impl FromStr for ManualChannel {
    type Err = CommandParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "temperature" | "temp" => Ok(ManualChannel::Temperature),
            "humidity" | "hum" => Ok(ManualChannel::Humidity),
            "pressure" | "pres" => Ok(ManualChannel::Pressure),
            other => Err(CommandParseError::InvalidArgument(format!(
                "unknown channel '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(String),
    #[error("{0}")]
    InvalidArgument(String),
}

fn require<'a>(arg: Option<&'a str>, command: &str) -> Result<&'a str, CommandParseError> {
    arg.ok_or_else(|| CommandParseError::MissingArgument(command.to_string()))
}

impl FromStr for UserCommand {
    type Err = CommandParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = words
            .next()
            .ok_or(CommandParseError::Empty)?
            .to_ascii_lowercase();
        let argument = words.next();

        match command.as_str() {
            "status" => Ok(UserCommand::Status),
            "generate" => Ok(UserCommand::Generate),
            "set" => {
                let channel = require(argument, &command)?.parse::<ManualChannel>()?;
                let raw = require(words.next(), &command)?;
                Ok(UserCommand::SetReading(channel, channel.value(raw)?))
            }
            "quit" | "exit" => Ok(UserCommand::Quit),
            "mode" => require(argument, &command)?
                .parse()
                .map(UserCommand::SwitchMode)
                .map_err(CommandParseError::InvalidArgument),
            "weather" => require(argument, &command)?
                .parse()
                .map(|code| UserCommand::Control(Control::Weather(code)))
                .map_err(CommandParseError::InvalidArgument),
            "brightness" | "speed" | "servo" | "servo-speed" => {
                let raw = require(argument, &command)?;
                raw.parse::<usize>()
                    .ok()
                    .and_then(|index| Control::level(&command, index))
                    .map(UserCommand::Control)
                    .ok_or_else(|| {
                        CommandParseError::InvalidArgument(format!(
                            "'{}' is not a valid {} level",
                            raw, command
                        ))
                    })
            }
            _ => Err(CommandParseError::Unknown(command.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::{OverrideCode, WeatherDescriptor};

    #[test]
    fn parses_commands() {
        assert_eq!(
            "mode telemetry".parse::<UserCommand>(),
            Ok(UserCommand::SwitchMode(Mode::Telemetry))
        );
        assert_eq!(
            "  Brightness 1 ".parse::<UserCommand>(),
            Ok(UserCommand::Control(Control::Brightness(1)))
        );
        assert_eq!(
            "servo-speed 2".parse::<UserCommand>(),
            Ok(UserCommand::Control(Control::ServoSpeed(2)))
        );
        assert_eq!(
            "weather snow".parse::<UserCommand>(),
            Ok(UserCommand::Control(Control::Weather(OverrideCode::Manual(
                WeatherDescriptor::Chilly
            ))))
        );
        assert_eq!("status".parse::<UserCommand>(), Ok(UserCommand::Status));
        assert_eq!("quit".parse::<UserCommand>(), Ok(UserCommand::Quit));
    }

    #[test]
    fn parses_manual_readings() {
        assert_eq!(
            "set temperature 23.46".parse::<UserCommand>(),
            Ok(UserCommand::SetReading(ManualChannel::Temperature, 23.5))
        );
        assert_eq!(
            "set hum 61.6".parse::<UserCommand>(),
            Ok(UserCommand::SetReading(ManualChannel::Humidity, 62.0))
        );
        assert_eq!(
            "SET Pressure 95".parse::<UserCommand>(),
            Ok(UserCommand::SetReading(ManualChannel::Pressure, 95.0))
        );
        assert_eq!("generate".parse::<UserCommand>(), Ok(UserCommand::Generate));

        assert!(matches!(
            "set pressure 120".parse::<UserCommand>(),
            Err(CommandParseError::InvalidArgument(_))
        ));
        assert!(matches!(
            "set temperature NaN".parse::<UserCommand>(),
            Err(CommandParseError::InvalidArgument(_))
        ));
        assert!(matches!(
            "set wind 3".parse::<UserCommand>(),
            Err(CommandParseError::InvalidArgument(_))
        ));
        assert_eq!(
            "set humidity".parse::<UserCommand>(),
            Err(CommandParseError::MissingArgument("set".into()))
        );
    }

    #[test]
    fn manual_update_touches_one_channel() {
        let update = ManualChannel::Humidity.update(70.0);
        assert_eq!(update.humidity, Some(70.0));
        assert_eq!(update.temperature, None);
        assert_eq!(update.pressure, None);
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!("".parse::<UserCommand>(), Err(CommandParseError::Empty));
        assert_eq!(
            "mode".parse::<UserCommand>(),
            Err(CommandParseError::MissingArgument("mode".into()))
        );
        assert!(matches!(
            "speed 7".parse::<UserCommand>(),
            Err(CommandParseError::InvalidArgument(_))
        ));
        assert!(matches!(
            "weather fog".parse::<UserCommand>(),
            Err(CommandParseError::InvalidArgument(_))
        ));
        assert_eq!(
            "dance".parse::<UserCommand>(),
            Err(CommandParseError::Unknown("dance".into()))
        );
    }
}

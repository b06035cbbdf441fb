use std::env;
use thiserror::Error;
use url::Url;

use crate::history::{DEFAULT_CAPACITY, DRIFT_CAPACITY};
use crate::models::Mode;

const DEFAULT_BROKER_URL: &str = "mqtt://broker.hivemq.com:1883";
const DEFAULT_TOPIC_PREFIX: &str = "nes/finalsproject/g1weatherstation";
const DEFAULT_MQTT_PORT: u16 = 1883;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid MQTT_BROKER_URL '{0}': {1}")]
    BrokerUrl(String, url::ParseError),
    #[error("unsupported broker scheme '{0}', expected mqtt:// or tcp://")]
    BrokerScheme(String),
    #[error("broker URL '{0}' has no host")]
    BrokerHost(String),
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationVariant {
    /// Independent uniform samples every 3 s
    Uniform,
    /// Small random walk from the previous values every 2 s
    Drift,
}

impl SimulationVariant {
    pub fn history_capacity(self) -> usize {
        match self {
            SimulationVariant::Uniform => DEFAULT_CAPACITY,
            SimulationVariant::Drift => DRIFT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub topic_prefix: String,
    pub initial_mode: Mode,
    pub simulation: SimulationVariant,
    pub label_seconds: bool,
}

impl DashboardConfig {
    pub fn new() -> Result<Self, ConfigError> {
        // Load environment variables
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let broker_url = lookup("MQTT_BROKER_URL").unwrap_or_else(|| DEFAULT_BROKER_URL.into());
        let (broker_host, broker_port) = parse_broker_url(&broker_url)?;

        let client_id = lookup("MQTT_CLIENT_ID")
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("weather-dashboard-{:08x}", rand::random::<u32>()));

        let topic_prefix = lookup("MQTT_TOPIC_PREFIX")
            .map(|p| p.trim().trim_end_matches('/').to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_TOPIC_PREFIX.into());

        let initial_mode = match lookup("INITIAL_MODE") {
            Some(value) => value.parse().map_err(|reason| ConfigError::Invalid {
                key: "INITIAL_MODE",
                reason,
            })?,
            None => Mode::Simulation,
        };

        let simulation = match lookup("SIMULATION_VARIANT").as_deref().map(str::trim) {
            None | Some("uniform") => SimulationVariant::Uniform,
            Some("drift") => SimulationVariant::Drift,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "SIMULATION_VARIANT",
                    reason: format!("'{}' is neither 'uniform' nor 'drift'", other),
                })
            }
        };

        let label_seconds = match lookup("CHART_LABEL_SECONDS") {
            Some(value) => parse_bool(&value).ok_or_else(|| ConfigError::Invalid {
                key: "CHART_LABEL_SECONDS",
                reason: format!("'{}' is not a boolean", value),
            })?,
            None => false,
        };

        Ok(DashboardConfig {
            broker_host,
            broker_port,
            client_id,
            topic_prefix,
            initial_mode,
            simulation,
            label_seconds,
        })
    }

    pub fn topic(&self, suffix: &str) -> String {
        format!("{}/{}", self.topic_prefix, suffix)
    }
}

fn parse_broker_url(raw: &str) -> Result<(String, u16), ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::BrokerUrl(raw.to_string(), e))?;

    if url.scheme() != "mqtt" && url.scheme() != "tcp" {
        return Err(ConfigError::BrokerScheme(url.scheme().to_string()));
    }

    let host = match url.host_str() {
        Some(host) if !host.is_empty() => host.to_string(),
        _ => return Err(ConfigError::BrokerHost(raw.to_string())),
    };

    Ok((host, url.port().unwrap_or(DEFAULT_MQTT_PORT)))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

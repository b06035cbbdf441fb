/// MQTT telemetry feed from the weather station
use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, Event as MqttEvent, EventLoop, MqttOptions, Packet, QoS};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{CommandSink, IngestionSource, SourceEvent, SourceSink};
use crate::config::DashboardConfig;
use crate::models::{Mode, ReadingUpdate, StatusMessage};
use crate::watchdog;

const RECONNECT_BACKOFF: Duration = Duration::from_secs(2);
const KEEP_ALIVE: Duration = Duration::from_secs(30);
const REQUEST_CAPACITY: usize = 16;

/// Topics the source listens on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryTopics {
    pub status: String,
    pub data: String,
}

impl TelemetryTopics {
    pub fn from_config(config: &DashboardConfig) -> Self {
        Self {
            status: config.topic("status"),
            data: config.topic("data"),
        }
    }

    /// Turn an incoming publish into a source event
    ///
    /// Malformed payloads and unknown topics are logged and dropped.
    pub fn decode(&self, topic: &str, payload: &[u8]) -> Option<SourceEvent> {
        if topic == self.status {
            match serde_json::from_slice::<StatusMessage>(payload) {
                Ok(status) => Some(SourceEvent::Status(status.online)),
                Err(e) => {
                    warn!(
                        "Ignoring status message without boolean 'online' ({}): {}",
                        e,
                        String::from_utf8_lossy(payload)
                    );
                    None
                }
            }
        } else if topic == self.data {
            match serde_json::from_slice::<ReadingUpdate>(payload) {
                Ok(update) => Some(SourceEvent::Data(update)),
                Err(e) => {
                    warn!(
                        "Discarding malformed data payload ({}): {}",
                        e,
                        String::from_utf8_lossy(payload)
                    );
                    None
                }
            }
        } else {
            debug!("Ignoring message on unexpected topic {}", topic);
            None
        }
    }
}

pub struct TelemetrySource {
    client: AsyncClient,
    eventloop: EventLoop,
    topics: TelemetryTopics,
}

impl TelemetrySource {
    /// Prepare the broker client. Nothing touches the network until the source is spawned.
    pub fn new(config: &DashboardConfig) -> Self {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(KEEP_ALIVE);
        // No replay of queued messages across reconnects
        options.set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        Self {
            client,
            eventloop,
            topics: TelemetryTopics::from_config(config),
        }
    }
}

impl CommandSink for AsyncClient {
    fn publish(&self, topic: &str, payload: String) -> Result<(), String> {
        self.try_publish(topic, QoS::AtMostOnce, false, payload)
            .map_err(|e| e.to_string())
    }
}

impl IngestionSource for TelemetrySource {
    fn mode(&self) -> Mode {
        Mode::Telemetry
    }

    fn command_sink(&self) -> Option<Arc<dyn CommandSink>> {
        Some(Arc::new(self.client.clone()))
    }

    fn spawn(self: Box<Self>, sink: SourceSink, cancel: CancellationToken) -> JoinHandle<()> {
        let TelemetrySource {
            client,
            eventloop,
            topics,
        } = *self;
        tokio::spawn(run(client, eventloop, topics, sink, cancel))
    }
}

async fn run(
    client: AsyncClient,
    mut eventloop: EventLoop,
    topics: TelemetryTopics,
    sink: SourceSink,
    cancel: CancellationToken,
) {
    info!("Connecting to MQTT broker (epoch {})", sink.epoch());

    let mut ticker = tokio::time::interval(watchdog::CHECK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            _ = ticker.tick() => {
                if !sink.send(SourceEvent::WatchdogTick) {
                    break;
                }
            }

            event = eventloop.poll() => match event {
                Ok(MqttEvent::Incoming(Packet::ConnAck(_))) => {
                    info!("MQTT connected, subscribing to {} and {}", topics.status, topics.data);
                    // Clean session: subscriptions must be renewed on every connect
                    for topic in [&topics.status, &topics.data] {
                        if let Err(e) = client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
                            error!("Failed to subscribe to {}: {}", topic, e);
                        }
                    }
                }
                Ok(MqttEvent::Incoming(Packet::Publish(publish))) => {
                    if let Some(event) = topics.decode(&publish.topic, &publish.payload) {
                        if !sink.send(event) {
                            break;
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    // Not authoritative for liveness, the watchdog decides that
                    warn!(
                        "MQTT connection error: {}. Retrying in {}s",
                        e,
                        RECONNECT_BACKOFF.as_secs()
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = sleep(RECONNECT_BACKOFF) => {}
                    }
                }
            },
        }
    }

    // Dropping the event loop closes the socket without waiting for acks
    drop(eventloop);
    info!("Telemetry source stopped (epoch {})", sink.epoch());
}

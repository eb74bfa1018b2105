//! Broker seam: connection traits and the rumqttc implementation.

use std::time::Duration;

use log::{debug, trace};
use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{InboundMessage, Result, SessionError};
use crate::topic::AVAILABILITY_OFFLINE;

/// Requests buffered between the client handle and the event loop.
const REQUEST_CAPACITY: usize = 64;

/// How long [`BrokerSource::close`] keeps flushing before giving up.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Outbound half of a connected session.
#[allow(async_fn_in_trait)]
pub trait BrokerSink {
    async fn subscribe(&self, topic: &str) -> Result<()>;
    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS, retain: bool) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
}

/// Inbound half of a connected session.
#[allow(async_fn_in_trait)]
pub trait BrokerSource {
    /// Next application message. `Ok(None)` means the stream has ended.
    async fn next_message(&mut self) -> Result<Option<InboundMessage>>;
    /// Flush pending requests after a disconnect.
    async fn close(&mut self);
}

/// Opens a fresh session on every call.
#[allow(async_fn_in_trait)]
pub trait Connector {
    type Sink: BrokerSink;
    type Source: BrokerSource;

    async fn connect(&mut self) -> Result<(Self::Sink, Self::Source)>;
}

// ── rumqttc ──

/// Everything needed to reach the broker.
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive: Duration,
}

pub struct RumqttConnector {
    options: MqttOptions,
}

impl RumqttConnector {
    /// `will_topic` receives a retained `offline` if the connection drops.
    pub fn new(settings: BrokerSettings, will_topic: &str) -> Self {
        let mut options = MqttOptions::new(settings.client_id, settings.host, settings.port);
        options.set_keep_alive(settings.keep_alive);
        options.set_clean_session(true);
        match settings.username {
            Some(user) => {
                options.set_credentials(user, settings.password.unwrap_or_default());
            }
            None if settings.password.is_some() => {
                log::warn!("broker password given without a user name; ignoring it");
            }
            None => {}
        }
        options.set_last_will(LastWill::new(
            will_topic,
            AVAILABILITY_OFFLINE,
            QoS::ExactlyOnce,
            true,
        ));
        RumqttConnector { options }
    }
}

impl Connector for RumqttConnector {
    type Sink = RumqttSink;
    type Source = RumqttSource;

    async fn connect(&mut self) -> Result<(RumqttSink, RumqttSource)> {
        // New client per session: requests queued on a dead session are dropped.
        let (client, mut eventloop) = AsyncClient::new(self.options.clone(), REQUEST_CAPACITY);
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    debug!("connack: {ack:?}");
                    break;
                }
                Ok(_) => {}
                Err(e) => return Err(SessionError::Connect(e.to_string())),
            }
        }
        let (tx, inbound) = mpsc::unbounded_channel();
        let driver = tokio::spawn(drive(eventloop, tx));
        Ok((RumqttSink { client }, RumqttSource { inbound, driver }))
    }
}

/// Poll the event loop until the connection ends or a disconnect goes out.
///
/// Runs beside the listener so pings, acknowledgements and queued publishes
/// keep moving while a command is still being applied to the light.
async fn drive(mut eventloop: EventLoop, inbound: mpsc::UnboundedSender<Result<InboundMessage>>) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = InboundMessage {
                    topic: publish.topic,
                    payload: publish.payload.to_vec(),
                };
                // A closed receiver means the session is being torn down.
                let _ = inbound.send(Ok(message));
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("disconnect sent");
                break;
            }
            Ok(event) => trace!("mqtt event: {event:?}"),
            Err(e) => {
                let _ = inbound.send(Err(SessionError::ConnectionLost(e.to_string())));
                break;
            }
        }
    }
}

pub struct RumqttSink {
    client: AsyncClient,
}

impl BrokerSink for RumqttSink {
    async fn subscribe(&self, topic: &str) -> Result<()> {
        self.client
            .subscribe(topic, QoS::ExactlyOnce)
            .await
            .map_err(|e| SessionError::Subscribe(e.to_string()))
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS, retain: bool) -> Result<()> {
        self.client
            .publish(topic, qos, retain, payload)
            .await
            .map_err(|e| SessionError::Publish(e.to_string()))
    }

    async fn disconnect(&self) -> Result<()> {
        self.client
            .disconnect()
            .await
            .map_err(|e| SessionError::ConnectionLost(e.to_string()))
    }
}

/// Messages forwarded by the session's event loop task. Dropping the source
/// stops that task.
pub struct RumqttSource {
    inbound: mpsc::UnboundedReceiver<Result<InboundMessage>>,
    driver: JoinHandle<()>,
}

impl BrokerSource for RumqttSource {
    async fn next_message(&mut self) -> Result<Option<InboundMessage>> {
        self.inbound.recv().await.transpose()
    }

    async fn close(&mut self) {
        if tokio::time::timeout(CLOSE_TIMEOUT, &mut self.driver)
            .await
            .is_err()
        {
            debug!("broker did not confirm disconnect within {CLOSE_TIMEOUT:?}");
            self.driver.abort();
        }
    }
}

impl Drop for RumqttSource {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> BrokerSettings {
        BrokerSettings {
            host: "127.0.0.1".into(),
            port: 1,
            client_id: "testbusylighthass".into(),
            username: Some("user".into()),
            password: Some("pw".into()),
            keep_alive: Duration::from_secs(30),
        }
    }

    #[test]
    fn connector_options() {
        let connector = RumqttConnector::new(settings(), "t/availability");
        assert_eq!(connector.options.client_id(), "testbusylighthass");
        assert_eq!(
            connector.options.broker_address(),
            ("127.0.0.1".to_string(), 1)
        );
        assert_eq!(connector.options.keep_alive(), Duration::from_secs(30));
        let will = connector.options.last_will().unwrap();
        assert_eq!(will.topic, "t/availability");
        assert_eq!(&will.message[..], b"offline");
        assert!(will.retain);
        assert_eq!(
            connector.options.credentials(),
            Some(("user".to_string(), "pw".to_string()))
        );
    }

    #[test]
    fn password_without_user_is_ignored() {
        let connector = RumqttConnector::new(
            BrokerSettings {
                username: None,
                ..settings()
            },
            "t/availability",
        );
        assert!(connector.options.credentials().is_none());
    }

    #[tokio::test]
    async fn connect_refused_is_connect_error() {
        // Port 1 on loopback has nothing listening.
        let mut connector = RumqttConnector::new(settings(), "t/availability");
        let err = connector.connect().await.err().unwrap();
        assert!(matches!(err, SessionError::Connect(_)));
    }
}

//! Broker session: announce the light, then run listener and publisher until
//! the connection drops.
//!
//! One [`Bridge`] lives for the whole process and carries the light state
//! across sessions. The [`Supervisor`] owns the reconnect loop.

mod broker;
mod listener;
#[doc(hidden)]
pub mod mock;
mod publisher;
mod supervisor;

use std::fmt;

use log::{debug, info, warn};
use rumqttc::QoS;
use tokio::sync::{mpsc, watch};

pub use broker::{
    BrokerSettings, BrokerSink, BrokerSource, Connector, RumqttConnector, RumqttSink,
    RumqttSource,
};
pub use listener::handle_message;
pub use supervisor::Supervisor;

use crate::device::BusyLight;
use crate::discovery::{DiscoveryDescriptor, build_discovery};
use crate::state::LightState;
use crate::topic::{AVAILABILITY_OFFLINE, AVAILABILITY_ONLINE, TopicSet};

// ── Error type ──

/// Broker session errors. Every variant ends the current session.
#[derive(Debug)]
pub enum SessionError {
    Connect(String),
    Subscribe(String),
    Publish(String),
    ConnectionLost(String),
    /// The named loop ran out of input.
    StreamClosed(&'static str),
    Encode(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Connect(e) => write!(f, "connect failed: {e}"),
            SessionError::Subscribe(e) => write!(f, "subscribe failed: {e}"),
            SessionError::Publish(e) => write!(f, "publish failed: {e}"),
            SessionError::ConnectionLost(e) => write!(f, "connection lost: {e}"),
            SessionError::StreamClosed(name) => write!(f, "{name} stream closed"),
            SessionError::Encode(e) => write!(f, "could not encode discovery document: {e}"),
        }
    }
}

impl std::error::Error for SessionError {}

pub type Result<T> = std::result::Result<T, SessionError>;

/// A message received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Connection lifecycle as seen by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Disconnected,
    Connecting,
    Connected,
}

/// Resolve once `true` has been sent on the shutdown channel.
///
/// If the sender is gone no shutdown can arrive, so this never resolves.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

// ── Bridge ──

/// Process-wide bridge state: the light, its topics and its last known state.
pub struct Bridge<'a, D: BusyLight> {
    device: &'a D,
    topics: TopicSet,
    discovery: DiscoveryDescriptor,
    state: LightState,
    announced: bool,
    republish_discovery: bool,
}

impl<'a, D: BusyLight> Bridge<'a, D> {
    pub fn new(device: &'a D, tag: &str, state: LightState, republish_discovery: bool) -> Self {
        Bridge {
            device,
            topics: TopicSet::new(device.identity(), tag),
            discovery: build_discovery(device.identity(), tag),
            state,
            announced: false,
            republish_discovery,
        }
    }

    pub fn topics(&self) -> &TopicSet {
        &self.topics
    }

    pub fn discovery(&self) -> &DiscoveryDescriptor {
        &self.discovery
    }

    pub fn state(&self) -> LightState {
        self.state
    }

    /// Run one connected session.
    ///
    /// Returns `Ok(())` when shutdown was requested (after announcing
    /// `offline` and disconnecting) and `Err` when the session was lost.
    pub async fn run_session<S: BrokerSink, R: BrokerSource>(
        &mut self,
        sink: &S,
        source: &mut R,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        sink.subscribe(&self.topics.command).await?;

        if !self.announced || self.republish_discovery {
            let json = self
                .discovery
                .to_json()
                .map_err(|e| SessionError::Encode(e.to_string()))?;
            info!(
                "publishing discovery on {} for {}",
                self.discovery.topic, self.topics.availability
            );
            sink.publish(&self.discovery.topic, json.into_bytes(), QoS::ExactlyOnce, true)
                .await?;
        }
        // The broker fires the `offline` will after every unclean drop.
        sink.publish(
            &self.topics.availability,
            AVAILABILITY_ONLINE.into(),
            QoS::ExactlyOnce,
            true,
        )
        .await?;

        if !self.announced {
            self.announced = true;
            let rgb = self.state.target_rgb();
            if let Err(e) = self.device.set_color(rgb, None) {
                warn!("could not set initial colour {rgb}: {e}");
            }
            debug!("initial colour {rgb} read back as {}", self.device.color());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(self.state.to_message(&self.topics.state))
            .map_err(|_| SessionError::StreamClosed("publisher"))?;

        let device = self.device;
        let topics = &self.topics;
        let state = &mut self.state;
        let stopped = tokio::select! {
            biased;
            _ = shutdown_requested(shutdown) => true,
            result = async {
                tokio::try_join!(
                    listener::listen(device, topics, state, source, &tx),
                    publisher::publish(sink, rx),
                )
            } => {
                result?;
                false
            }
        };

        if !stopped {
            // Both loops only end on error.
            return Err(SessionError::StreamClosed("session"));
        }

        info!("shutting down, marking {} offline", self.topics.availability);
        if let Err(e) = sink
            .publish(
                &self.topics.availability,
                AVAILABILITY_OFFLINE.into(),
                QoS::ExactlyOnce,
                true,
            )
            .await
        {
            warn!("could not publish offline: {e}");
        }
        if let Err(e) = sink.disconnect().await {
            warn!("disconnect failed: {e}");
        }
        source.close().await;
        Ok(())
    }
}

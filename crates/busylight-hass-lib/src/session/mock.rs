//! Scripted in-memory broker for unit and integration tests.
//!
//! Always compiled (zero runtime cost), hidden from public docs.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use rumqttc::QoS;
use tokio::sync::watch;
use tokio::time::Instant;

use super::{BrokerSink, BrokerSource, Connector, InboundMessage, Result, SessionError};

/// Something the mock broker saw or did.
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerEvent {
    Connected,
    Refused,
    Subscribed(String),
    Published {
        topic: String,
        payload: String,
        qos: QoS,
        retain: bool,
    },
    /// A scripted message was handed to the bridge.
    Delivered { topic: String, payload: String },
    /// A scripted connection drop was reported.
    Dropped,
    Disconnected,
    Closed,
}

/// Shared, timestamped record of broker events across sessions.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<(Instant, BrokerEvent)>>>);

impl EventLog {
    pub fn record(&self, event: BrokerEvent) {
        self.0.borrow_mut().push((Instant::now(), event));
    }

    pub fn events(&self) -> Vec<BrokerEvent> {
        self.0.borrow().iter().map(|(_, e)| e.clone()).collect()
    }

    pub fn timed(&self) -> Vec<(Instant, BrokerEvent)> {
        self.0.borrow().clone()
    }

    /// `(topic, payload, retain)` of every publish, oldest first.
    pub fn published(&self) -> Vec<(String, String, bool)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                BrokerEvent::Published {
                    topic,
                    payload,
                    retain,
                    ..
                } => Some((topic, payload, retain)),
                _ => None,
            })
            .collect()
    }

    /// Payloads published to `topic`, oldest first.
    pub fn payloads_on(&self, topic: &str) -> Vec<String> {
        self.published()
            .into_iter()
            .filter(|(t, _, _)| t == topic)
            .map(|(_, p, _)| p)
            .collect()
    }

    pub fn count(&self, event: &BrokerEvent) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }
}

// ── Sink ──

#[derive(Debug, Default)]
pub struct MockSink {
    log: EventLog,
    fail_publish: bool,
}

impl MockSink {
    /// A sink whose publishes all fail.
    pub fn failing() -> Self {
        MockSink {
            log: EventLog::default(),
            fail_publish: true,
        }
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }
}

impl BrokerSink for MockSink {
    async fn subscribe(&self, topic: &str) -> Result<()> {
        self.log.record(BrokerEvent::Subscribed(topic.to_string()));
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS, retain: bool) -> Result<()> {
        if self.fail_publish {
            return Err(SessionError::Publish("mock: publish failure injected".into()));
        }
        self.log.record(BrokerEvent::Published {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(&payload).into_owned(),
            qos,
            retain,
        });
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.log.record(BrokerEvent::Disconnected);
        Ok(())
    }
}

// ── Source ──

/// One step of a scripted session.
#[derive(Debug, Clone)]
pub enum ScriptItem {
    Message { topic: String, payload: String },
    Wait(Duration),
    /// Report the connection as lost.
    Drop,
}

impl ScriptItem {
    pub fn message(topic: &str, payload: &str) -> Self {
        ScriptItem::Message {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Inbound half of a scripted session. When the script runs out it requests
/// shutdown and then waits forever.
pub struct MockSource {
    log: EventLog,
    items: VecDeque<ScriptItem>,
    shutdown: Rc<watch::Sender<bool>>,
}

impl BrokerSource for MockSource {
    async fn next_message(&mut self) -> Result<Option<InboundMessage>> {
        loop {
            // Let the publisher drain between deliveries.
            tokio::task::yield_now().await;
            match self.items.pop_front() {
                Some(ScriptItem::Message { topic, payload }) => {
                    self.log.record(BrokerEvent::Delivered {
                        topic: topic.clone(),
                        payload: payload.clone(),
                    });
                    return Ok(Some(InboundMessage {
                        topic,
                        payload: payload.into_bytes(),
                    }));
                }
                Some(ScriptItem::Wait(duration)) => tokio::time::sleep(duration).await,
                Some(ScriptItem::Drop) => {
                    self.log.record(BrokerEvent::Dropped);
                    return Err(SessionError::ConnectionLost("mock: connection dropped".into()));
                }
                None => {
                    self.shutdown.send_replace(true);
                    std::future::pending::<()>().await;
                }
            }
        }
    }

    async fn close(&mut self) {
        self.log.record(BrokerEvent::Closed);
    }
}

// ── Connector ──

/// What the mock broker does on one connection attempt.
#[derive(Debug, Clone)]
pub struct SessionScript {
    accept: bool,
    fail_publish: bool,
    items: Vec<ScriptItem>,
}

impl SessionScript {
    pub fn accept(items: Vec<ScriptItem>) -> Self {
        SessionScript {
            accept: true,
            fail_publish: false,
            items,
        }
    }

    pub fn refuse() -> Self {
        SessionScript {
            accept: false,
            fail_publish: false,
            items: Vec::new(),
        }
    }

    /// Every publish in this session fails.
    pub fn failing_publishes(mut self) -> Self {
        self.fail_publish = true;
        self
    }
}

/// Plays one [`SessionScript`] per connection attempt. Requests shutdown once
/// the scripts are used up.
pub struct MockConnector {
    log: EventLog,
    sessions: VecDeque<SessionScript>,
    shutdown: Rc<watch::Sender<bool>>,
}

impl MockConnector {
    pub fn new(sessions: Vec<SessionScript>, shutdown: watch::Sender<bool>) -> Self {
        MockConnector {
            log: EventLog::default(),
            sessions: sessions.into(),
            shutdown: Rc::new(shutdown),
        }
    }

    pub fn log(&self) -> EventLog {
        self.log.clone()
    }
}

impl Connector for MockConnector {
    type Sink = MockSink;
    type Source = MockSource;

    async fn connect(&mut self) -> Result<(MockSink, MockSource)> {
        match self.sessions.pop_front() {
            Some(script) if script.accept => {
                self.log.record(BrokerEvent::Connected);
                Ok((
                    MockSink {
                        log: self.log.clone(),
                        fail_publish: script.fail_publish,
                    },
                    MockSource {
                        log: self.log.clone(),
                        items: script.items.into(),
                        shutdown: Rc::clone(&self.shutdown),
                    },
                ))
            }
            Some(_) => {
                self.log.record(BrokerEvent::Refused);
                Err(SessionError::Connect("mock: connection refused".into()))
            }
            None => {
                self.log.record(BrokerEvent::Refused);
                self.shutdown.send_replace(true);
                Err(SessionError::Connect("mock: no more sessions".into()))
            }
        }
    }
}

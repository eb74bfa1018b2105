//! Reconnect loop: DISCONNECTED → CONNECTING → CONNECTED → DISCONNECTED …

use std::time::Duration;

use log::{info, warn};
use tokio::sync::watch;
use tokio::time::Instant;

use super::{Bridge, Connector, SessionPhase, shutdown_requested};
use crate::device::BusyLight;
use crate::reconnect::ReconnectPolicy;

/// A session that stays up this long resets the reconnect policy.
const STABLE_SESSION: Duration = Duration::from_secs(30);

pub struct Supervisor<'a, D: BusyLight, C: Connector, P: ReconnectPolicy> {
    bridge: Bridge<'a, D>,
    connector: C,
    policy: P,
    /// Broker name for log messages.
    broker: String,
    phase: SessionPhase,
    connects: u32,
}

impl<'a, D: BusyLight, C: Connector, P: ReconnectPolicy> Supervisor<'a, D, C, P> {
    pub fn new(bridge: Bridge<'a, D>, connector: C, policy: P, broker: impl Into<String>) -> Self {
        Supervisor {
            bridge,
            connector,
            policy,
            broker: broker.into(),
            phase: SessionPhase::Disconnected,
            connects: 0,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Successful connections so far.
    pub fn connect_count(&self) -> u32 {
        self.connects
    }

    pub fn bridge(&self) -> &Bridge<'a, D> {
        &self.bridge
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Keep a session up until `true` arrives on `shutdown`.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            self.phase = SessionPhase::Connecting;
            let connected = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                result = self.connector.connect() => result,
            };

            let error = match connected {
                Ok((sink, mut source)) => {
                    self.phase = SessionPhase::Connected;
                    self.connects += 1;
                    info!("connected to {}", self.broker);
                    let started = Instant::now();
                    let result = self
                        .bridge
                        .run_session(&sink, &mut source, &mut shutdown)
                        .await;
                    if started.elapsed() >= STABLE_SESSION {
                        self.policy.reset();
                    }
                    match result {
                        Ok(()) => break,
                        Err(e) => e,
                    }
                }
                Err(e) => e,
            };

            self.phase = SessionPhase::Disconnected;
            let delay = self.policy.next_delay();
            warn!(
                "Connection lost to {} ({error}); Reconnecting in {:.2} seconds ...",
                self.broker,
                delay.as_secs_f64()
            );
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        self.phase = SessionPhase::Disconnected;
        info!("disconnected from {}", self.broker);
    }
}

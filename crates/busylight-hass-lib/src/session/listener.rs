//! Inbound loop: apply commands to the light and queue the new state.

use log::{debug, error, info, warn};
use tokio::sync::mpsc::UnboundedSender;

use super::{BrokerSource, InboundMessage, Result, SessionError};
use crate::command;
use crate::device::BusyLight;
use crate::led;
use crate::state::{LightState, OutgoingMessage};
use crate::topic::TopicSet;

/// Handle one broker message.
///
/// Command-topic messages update `state` and the light and yield the state
/// message to publish. Bad payloads and light write failures are logged, and
/// the (unchanged) state is still published. Other topics are ignored.
pub async fn handle_message(
    device: &impl BusyLight,
    topics: &TopicSet,
    state: &mut LightState,
    message: &InboundMessage,
) -> Option<OutgoingMessage> {
    let payload = String::from_utf8_lossy(&message.payload);
    debug!("got message {} {payload}", message.topic);

    if message.topic != topics.command {
        info!(
            "message on unexpected topic from client: {} {payload}",
            message.topic
        );
        return None;
    }

    match command::decode(&payload) {
        Ok(cmd) => {
            let rgb = state.apply(&cmd);
            if let Err(e) = led::apply_colour(device, rgb, cmd.transition()).await {
                warn!("could not set light to {rgb}: {e}");
            }
            debug!("after {payload} light reads back {}", device.color());
        }
        Err(e) => info!("bad message from client: {} {payload} ({e})", message.topic),
    }

    Some(state.to_message(&topics.state))
}

pub(super) async fn listen<D: BusyLight, R: BrokerSource>(
    device: &D,
    topics: &TopicSet,
    state: &mut LightState,
    source: &mut R,
    outgoing: &UnboundedSender<OutgoingMessage>,
) -> Result<()> {
    while let Some(message) = source.next_message().await? {
        if let Some(reply) = handle_message(device, topics, state, &message).await {
            outgoing
                .send(reply)
                .map_err(|_| SessionError::StreamClosed("publisher"))?;
        }
    }
    error!("end of listener");
    Err(SessionError::StreamClosed("listener"))
}

//! Outbound loop: drain the session queue onto the broker, retained.

use log::{debug, error};
use rumqttc::QoS;
use tokio::sync::mpsc::UnboundedReceiver;

use super::{BrokerSink, Result, SessionError};
use crate::state::OutgoingMessage;

pub(super) async fn publish<S: BrokerSink>(
    sink: &S,
    mut queue: UnboundedReceiver<OutgoingMessage>,
) -> Result<()> {
    while let Some(message) = queue.recv().await {
        debug!(
            "sending {} {} ({} remaining)",
            message.topic,
            message.payload,
            queue.len()
        );
        sink.publish(
            &message.topic,
            message.payload.into_bytes(),
            QoS::AtLeastOnce,
            true,
        )
        .await?;
    }
    error!("end of publisher");
    Err(SessionError::StreamClosed("publisher"))
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::session::mock::{BrokerEvent, MockSink};

    fn message(payload: &str) -> OutgoingMessage {
        OutgoingMessage {
            topic: "t/state".into(),
            payload: payload.into(),
        }
    }

    #[tokio::test]
    async fn publishes_in_order_retained_then_reports_closed() {
        let sink = MockSink::default();
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(message("on,1,2,3,4")).unwrap();
        tx.send(message("off,1,2,3,4")).unwrap();
        drop(tx);

        let err = publish(&sink, rx).await.unwrap_err();
        assert!(matches!(err, SessionError::StreamClosed("publisher")));

        let published = sink.log().published();
        assert_eq!(
            published,
            vec![
                ("t/state".to_string(), "on,1,2,3,4".to_string(), true),
                ("t/state".to_string(), "off,1,2,3,4".to_string(), true),
            ]
        );
    }

    #[tokio::test]
    async fn publish_failure_ends_loop() {
        let sink = MockSink::failing();
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(message("on,1,2,3,4")).unwrap();

        let err = publish(&sink, rx).await.unwrap_err();
        assert!(matches!(err, SessionError::Publish(_)));
        assert!(
            !sink
                .log()
                .events()
                .iter()
                .any(|e| matches!(e, BrokerEvent::Published { .. }))
        );
    }
}

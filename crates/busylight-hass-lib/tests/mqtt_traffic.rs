//! The rumqttc session against a minimal in-process MQTT 3.1.1 broker.

use std::time::Duration;

use busylight_hass_lib::device::mock::MockLight;
use busylight_hass_lib::led::Rgb;
use busylight_hass_lib::reconnect::FixedDelay;
use busylight_hass_lib::session::{Bridge, BrokerSettings, RumqttConnector, Supervisor};
use busylight_hass_lib::state::LightState;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::Instant;

const PINGREQ: u8 = 0xc0;
const DISCONNECT: u8 = 0xe0;

/// A control packet sent by the client.
struct ClientPacket {
    at: Instant,
    header: u8,
    body: Vec<u8>,
}

impl ClientPacket {
    fn kind(&self) -> u8 {
        self.header >> 4
    }

    /// `(topic, payload)` of a PUBLISH.
    fn publish(&self) -> Option<(String, String)> {
        if self.kind() != 3 {
            return None;
        }
        let topic_len = usize::from(u16::from_be_bytes([self.body[0], self.body[1]]));
        let topic = String::from_utf8_lossy(&self.body[2..2 + topic_len]).into_owned();
        let qos = (self.header >> 1) & 0x03;
        let start = 2 + topic_len + if qos > 0 { 2 } else { 0 };
        let payload = String::from_utf8_lossy(&self.body[start..]).into_owned();
        Some((topic, payload))
    }
}

fn encode(header: u8, body: &[u8]) -> Vec<u8> {
    let mut out = vec![header];
    let mut len = body.len();
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if len == 0 {
            break;
        }
    }
    out.extend_from_slice(body);
    out
}

fn publish_qos0(topic: &str, payload: &str) -> Vec<u8> {
    let mut body = (topic.len() as u16).to_be_bytes().to_vec();
    body.extend_from_slice(topic.as_bytes());
    body.extend_from_slice(payload.as_bytes());
    encode(0x30, &body)
}

async fn read_packet(stream: &mut TcpStream) -> Option<(u8, Vec<u8>)> {
    let header = stream.read_u8().await.ok()?;
    let mut len = 0usize;
    let mut shift = 0;
    loop {
        let byte = stream.read_u8().await.ok()?;
        len |= usize::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    let mut body = vec![0; len];
    stream.read_exact(&mut body).await.ok()?;
    Some((header, body))
}

/// Serve one client until it disconnects. Every packet is acknowledged, and
/// `command` is sent on `command_topic` right after the subscription.
async fn serve_one(listener: TcpListener, command_topic: String, command: String) -> Vec<ClientPacket> {
    let (mut stream, _) = listener.accept().await.unwrap();
    let mut seen = Vec::new();
    while let Some((header, body)) = read_packet(&mut stream).await {
        let replies = match header >> 4 {
            // CONNECT -> CONNACK
            1 => vec![encode(0x20, &[0, 0])],
            // SUBSCRIBE -> SUBACK (QoS 2 granted), then the command
            8 => vec![
                encode(0x90, &[body[0], body[1], 2]),
                publish_qos0(&command_topic, &command),
            ],
            // PUBLISH -> PUBACK / PUBREC
            3 => {
                let qos = (header >> 1) & 0x03;
                let topic_len = usize::from(u16::from_be_bytes([body[0], body[1]]));
                let pid = [body[2 + topic_len], body[3 + topic_len]];
                match qos {
                    1 => vec![encode(0x40, &pid)],
                    2 => vec![encode(0x50, &pid)],
                    _ => vec![],
                }
            }
            // PUBREL -> PUBCOMP
            6 => vec![encode(0x70, &body[..2])],
            // PINGREQ -> PINGRESP
            12 => vec![encode(0xd0, &[])],
            _ => vec![],
        };
        seen.push(ClientPacket {
            at: Instant::now(),
            header,
            body,
        });
        for bytes in replies {
            stream.write_all(&bytes).await.unwrap();
        }
        if header == DISCONNECT {
            break;
        }
    }
    seen
}

#[tokio::test]
async fn broker_traffic_continues_during_transition() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let dev = MockLight::new();
    let bridge = Bridge::new(&dev, "busylight_hass", LightState::default(), false);
    let topics = bridge.topics().clone();
    let broker = tokio::spawn(serve_one(listener, topics.command.clone(), "off,3".into()));

    let settings = BrokerSettings {
        host: "127.0.0.1".into(),
        port,
        client_id: "testbusylighthass".into(),
        username: None,
        password: None,
        keep_alive: Duration::from_secs(1),
    };
    let connector = RumqttConnector::new(settings, &topics.availability);
    let mut supervisor =
        Supervisor::new(bridge, connector, FixedDelay(Duration::from_secs(1)), "local");

    let (tx, rx) = watch::channel(false);
    let stop = async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        tx.send_replace(true);
    };
    tokio::join!(supervisor.run(rx), stop);
    assert_eq!(supervisor.connect_count(), 1);

    let packets = broker.await.unwrap();
    assert_eq!(packets.last().map(|p| p.header), Some(DISCONNECT));

    // Initial colour, then the six-step sweep to dark over three seconds.
    let writes = dev.writes.borrow().clone();
    assert_eq!(writes.len(), 7);
    let sweep = &writes[1..];
    assert!(sweep.iter().all(|w| w.rgb == Rgb::OFF));
    let (started, finished) = (sweep[0].at, sweep[5].at);
    assert!(finished - started >= Duration::from_millis(2900));

    // The client kept pinging while the light was still changing.
    let pings_during_sweep = packets
        .iter()
        .filter(|p| p.header == PINGREQ && p.at > started && p.at < finished)
        .count();
    assert!(pings_during_sweep >= 2, "only {pings_during_sweep} pings during the sweep");

    let max_silence = packets
        .windows(2)
        .map(|pair| pair[1].at - pair[0].at)
        .max()
        .unwrap();
    assert!(
        max_silence < Duration::from_millis(1900),
        "client silent for {max_silence:?} with keep-alive 1s"
    );

    // The new state went out once the sweep was done.
    let states: Vec<String> = packets
        .iter()
        .filter_map(ClientPacket::publish)
        .filter(|(topic, _)| *topic == topics.state)
        .map(|(_, payload)| payload)
        .collect();
    assert_eq!(states, vec!["on,255,0,0,255", "off,255,0,0,255"]);
}

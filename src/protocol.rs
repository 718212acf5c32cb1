/// JSON messages the gateway hands to the backend publisher.
///
/// Serialized with `serde_json_core` into fixed buffers; the publisher
/// (HTTP client, serial bridge, ...) only ever sees finished bytes.
use heapless::Vec;
use serde::Serialize;

use crate::dot11::MacAddr;
use crate::packet::Measurement;

/// Messages sent from the gateway to the backend
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum GatewayMessage<'a> {
    /// Addresses carried by one received radio packet
    #[serde(rename = "measurements")]
    Measurements {
        sender: MacAddr,
        receiver: MacAddr,
        /// Batch identifier shared by every packet of a chain
        id: u32,
        chain: u8,
        chained: bool,
        macs: &'a [Measurement],
        /// Packet RSSI at the gateway
        rssi: i16,
        /// Receive time in milliseconds since gateway boot
        ts: u64,
    },
    /// Periodic gateway health report
    #[serde(rename = "status")]
    Status {
        /// Uptime in seconds
        uptime: u32,
        received: u32,
        delivered: u32,
        rejected: u32,
        foreign: u32,
        version: &'static str,
    },
}

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of a serialized JSON message (42 addresses plus envelope)
pub const MAX_MSG_LEN: usize = 1024;

/// Buffer type for serialized JSON messages
pub type MsgBuffer = Vec<u8, MAX_MSG_LEN>;

/// Serialize a message into a fresh buffer, `None` if it does not fit.
pub fn to_json(msg: &GatewayMessage<'_>) -> Option<MsgBuffer> {
    to_json_in::<MAX_MSG_LEN>(msg)
}

/// Serialize into an `N`-byte buffer.
pub fn to_json_in<const N: usize>(msg: &GatewayMessage<'_>) -> Option<Vec<u8, N>> {
    let mut buf = Vec::new();
    buf.resize_default(N).ok()?;
    let len = serde_json_core::to_slice(msg, &mut buf).ok()?;
    buf.truncate(len);
    Some(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json(msg: &GatewayMessage<'_>) -> std::string::String {
        let buf = to_json(msg).unwrap();
        std::string::String::from_utf8(buf.to_vec()).unwrap()
    }

    #[test]
    fn serialize_measurements_message() {
        let macs = [
            Measurement::new([0xb4, 0x1e, 0x52, 0xab, 0xcd, 0xef]),
            Measurement::new([0x58, 0x8e, 0x81, 0x00, 0x00, 0x01]),
        ];
        let msg = GatewayMessage::Measurements {
            sender: MacAddr([1, 2, 3, 4, 5, 6]),
            receiver: MacAddr([0x12, 4, 2, 8, 7, 5]),
            id: 3,
            chain: 1,
            chained: true,
            macs: &macs,
            rssi: -97,
            ts: 120_000,
        };
        let json = json(&msg);
        assert!(json.contains(r#""type":"measurements""#));
        assert!(json.contains(r#""sender":"01:02:03:04:05:06""#));
        assert!(json.contains(r#""receiver":"12:04:02:08:07:05""#));
        assert!(json.contains(r#""chain":1"#));
        assert!(json.contains(r#""chained":true"#));
        assert!(json.contains(r#""macs":["b4:1e:52:ab:cd:ef","58:8e:81:00:00:01"]"#));
        assert!(json.contains(r#""rssi":-97"#));
        assert!(json.contains(r#""ts":120000"#));
    }

    #[test]
    fn largest_packet_fits() {
        let macs = [Measurement::new([0xff; 6]); crate::packet::MAX_RECORDS];
        let msg = GatewayMessage::Measurements {
            sender: MacAddr([0xff; 6]),
            receiver: MacAddr([0xff; 6]),
            id: u32::MAX,
            chain: u8::MAX,
            chained: true,
            macs: &macs,
            rssi: i16::MIN,
            ts: u64::MAX,
        };
        assert!(to_json(&msg).is_some());
    }

    #[test]
    fn small_buffer_overflows() {
        let msg = GatewayMessage::Status {
            uptime: 1,
            received: 0,
            delivered: 0,
            rejected: 0,
            foreign: 0,
            version: VERSION,
        };
        assert!(to_json_in::<16>(&msg).is_none());
        assert!(to_json_in::<256>(&msg).is_some());
    }

    #[test]
    fn serialize_status_message() {
        let msg = GatewayMessage::Status {
            uptime: 120,
            received: 10,
            delivered: 8,
            rejected: 1,
            foreign: 1,
            version: "0.1.0",
        };
        let json = json(&msg);
        assert!(json.contains(r#""type":"status""#));
        assert!(json.contains(r#""uptime":120"#));
        assert!(json.contains(r#""delivered":8"#));
    }

    #[test]
    fn version_is_semver() {
        let parts: heapless::Vec<&str, 4> = VERSION.split('.').collect();
        assert_eq!(
            parts.len(),
            3,
            "VERSION should be semver (major.minor.patch)"
        );
        for part in &parts {
            assert!(part.parse::<u32>().is_ok(), "'{part}' is not a number");
        }
    }
}

/// Receive-side decoder for CBXL packets.
///
/// Validates a raw radio buffer before touching it, parses the fixed
/// prefix, and slices the measurement records out of the payload. Each
/// physical packet is decoded on its own; chains are not reassembled and
/// `chain_no` / `chained` are passed through as metadata.
use heapless::Vec;
use thiserror::Error;

use crate::defaults::MAX_RX_LEN;
use crate::packet::{
    CapturePacket, Measurement, PacketHeader, HEADER_LEN, MAX_RECORDS, PREFIX_LEN, RECORD_LEN,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("packet of {len} bytes exceeds the {limit}-byte receive limit")]
    OversizedPacket { len: usize, limit: usize },
    #[error("packet truncated: {len} bytes received, {needed} needed")]
    TruncatedPacket { len: usize, needed: usize },
    #[error("foreign packet label {label:02x?}")]
    ForeignPacket { label: [u8; 4] },
}

impl DecodeError {
    /// Foreign packets are someone else's traffic, not a fault.
    pub fn is_foreign(&self) -> bool {
        matches!(self, DecodeError::ForeignPacket { .. })
    }
}

/// A validated packet together with its records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPacket {
    pub packet: CapturePacket,
    pub measurements: Vec<Measurement, MAX_RECORDS>,
}

impl DecodedPacket {
    /// Payload bytes left over after the last whole record.
    pub fn trailing_bytes(&self) -> usize {
        usize::from(self.packet.size()) % RECORD_LEN
    }
}

/// Decode one received buffer with the default receive limit.
pub fn decode(buf: &[u8]) -> Result<DecodedPacket, DecodeError> {
    decode_with_limit(buf, MAX_RX_LEN)
}

/// Decode one received buffer, rejecting anything longer than `limit`.
pub fn decode_with_limit(buf: &[u8], limit: usize) -> Result<DecodedPacket, DecodeError> {
    let len = buf.len();
    if len > limit {
        return Err(DecodeError::OversizedPacket { len, limit });
    }
    let Some((prefix, rest)) = buf.split_first_chunk::<PREFIX_LEN>() else {
        return Err(DecodeError::TruncatedPacket {
            len,
            needed: PREFIX_LEN,
        });
    };

    let (header_bytes, body_prefix) = prefix.split_at(HEADER_LEN);
    let mut header_raw = [0u8; HEADER_LEN];
    header_raw.copy_from_slice(header_bytes);
    let header = PacketHeader::from_bytes(&header_raw);
    let unique_id = u32::from_le_bytes([body_prefix[0], body_prefix[1], body_prefix[2], body_prefix[3]]);
    let size = usize::from(body_prefix[4]);

    let Some(payload) = rest.get(..size) else {
        return Err(DecodeError::TruncatedPacket {
            len,
            needed: PREFIX_LEN + size,
        });
    };
    if !header.is_ours() {
        return Err(DecodeError::ForeignPacket {
            label: header.label,
        });
    }

    let mut measurements = Vec::new();
    for record in payload.chunks_exact(RECORD_LEN) {
        if let Some(m) = Measurement::from_record(record) {
            // 255 / RECORD_LEN records always fit
            let _ = measurements.push(m);
        }
    }

    // Payload length was bounded by the one-byte size field above
    let packet = CapturePacket::new(header, unique_id, payload).map_err(|_| {
        DecodeError::TruncatedPacket {
            len,
            needed: PREFIX_LEN + size,
        }
    })?;

    Ok(DecodedPacket {
        packet,
        measurements,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dot11::MacAddr;
    use crate::packet::encode;
    use proptest::prelude::*;

    const SENDER: MacAddr = MacAddr([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
    const RECEIVER: MacAddr = MacAddr([0x12, 0x04, 0x02, 0x08, 0x07, 0x05]);

    fn addrs(n: usize) -> std::vec::Vec<Measurement> {
        (0..n)
            .map(|i| Measurement::new([0x3C, 0x91, 0x80, 0, (i >> 8) as u8, i as u8]))
            .collect()
    }

    fn raw(label: &[u8; 4], size: u8, payload: &[u8]) -> std::vec::Vec<u8> {
        let mut buf = std::vec::Vec::new();
        buf.extend_from_slice(label);
        buf.extend_from_slice(&SENDER.octets());
        buf.extend_from_slice(&RECEIVER.octets());
        buf.push(0);
        buf.push(0x01);
        buf.extend_from_slice(&7u32.to_le_bytes());
        buf.push(size);
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn decodes_encoded_packet() {
        let input = addrs(5);
        let pkt = encode(&input, SENDER, RECEIVER, 128).unwrap().next().unwrap();
        let decoded = decode(&pkt.to_bytes()).unwrap();
        assert_eq!(decoded.packet, pkt);
        assert_eq!(decoded.measurements.as_slice(), input.as_slice());
        assert_eq!(decoded.packet.header.sender, SENDER);
        assert_eq!(decoded.packet.header.receiver, RECEIVER);
    }

    #[test]
    fn declared_size_beyond_buffer_is_truncated() {
        let buf = raw(b"CBXL", 250, &[0u8; 17]);
        assert_eq!(buf.len(), 40);
        assert_eq!(
            decode(&buf),
            Err(DecodeError::TruncatedPacket {
                len: 40,
                needed: PREFIX_LEN + 250,
            })
        );
    }

    #[test]
    fn short_prefix_is_truncated() {
        assert_eq!(
            decode(&[0u8; PREFIX_LEN - 1]),
            Err(DecodeError::TruncatedPacket {
                len: PREFIX_LEN - 1,
                needed: PREFIX_LEN,
            })
        );
        assert!(decode(&[]).is_err());
    }

    #[test]
    fn oversized_buffer_rejected_before_parsing() {
        // Valid-looking prefix, but too long overall
        let mut buf = raw(b"CBXL", 6, &[1, 2, 3, 4, 5, 6]);
        buf.resize(3000, 0);
        assert_eq!(
            decode(&buf),
            Err(DecodeError::OversizedPacket {
                len: 3000,
                limit: MAX_RX_LEN,
            })
        );
    }

    #[test]
    fn foreign_label_rejected() {
        let buf = raw(b"XXXX", 6, &[1, 2, 3, 4, 5, 6]);
        let err = decode(&buf).unwrap_err();
        assert_eq!(err, DecodeError::ForeignPacket { label: *b"XXXX" });
        assert!(err.is_foreign());
    }

    #[test]
    fn partial_record_is_ignored() {
        let buf = raw(b"CBXL", 14, &[0xAB; 14]);
        let decoded = decode(&buf).unwrap();
        assert_eq!(decoded.measurements.len(), 2);
        assert_eq!(decoded.trailing_bytes(), 2);
        assert_eq!(decoded.packet.size(), 14);
    }

    #[test]
    fn empty_payload_decodes() {
        let decoded = decode(&raw(b"CBXL", 0, &[])).unwrap();
        assert!(decoded.measurements.is_empty());
        assert_eq!(decoded.packet.unique_id, 7);
    }

    #[test]
    fn trailing_bytes_after_payload_are_ignored() {
        let mut buf = raw(b"CBXL", 6, &[9; 6]);
        buf.extend_from_slice(&[0xEE; 10]);
        let decoded = decode(&buf).unwrap();
        assert_eq!(decoded.measurements.as_slice(), &[Measurement::new([9; 6])]);
    }

    #[test]
    fn custom_limit() {
        let buf = raw(b"CBXL", 6, &[9; 6]);
        assert!(matches!(
            decode_with_limit(&buf, 20),
            Err(DecodeError::OversizedPacket { len: 29, limit: 20 })
        ));
    }

    #[test]
    fn chain_metadata_is_surfaced() {
        let input = addrs(25);
        let packets: std::vec::Vec<_> = encode(&input, SENDER, RECEIVER, 128).unwrap().collect();
        let second = decode(&packets[1].to_bytes()).unwrap();
        assert_eq!(second.packet.header.chain_no, 1);
        assert!(second.packet.header.flags.chained);
        assert_eq!(second.measurements.len(), 4);
    }

    proptest! {
        #[test]
        fn prop_round_trip_through_wire(n in 0usize..=500) {
            let input = addrs(n);
            let mut back = std::vec::Vec::new();
            for pkt in encode(&input, SENDER, RECEIVER, 128).unwrap() {
                let decoded = decode(&pkt.to_bytes()).unwrap();
                back.extend_from_slice(&decoded.measurements);
            }
            prop_assert_eq!(back, input);
        }

        #[test]
        fn prop_arbitrary_bytes_never_panic(buf in prop::collection::vec(any::<u8>(), 0..600)) {
            match decode(&buf) {
                Ok(decoded) => {
                    prop_assert!(decoded.packet.wire_len() <= buf.len());
                    prop_assert_eq!(decoded.measurements.len(), decoded.packet.record_count());
                }
                Err(DecodeError::OversizedPacket { .. }) => prop_assert!(false, "under the limit"),
                Err(_) => {}
            }
        }
    }
}

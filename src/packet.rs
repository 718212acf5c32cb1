/// CBXL packet codec: the chained radio protocol between sensor and gateway.
///
/// All structures are packed, multi-byte integers little-endian:
///
/// ```text
/// header   label[4] sender[6] receiver[6] chain_no[1] flags[1]   18 bytes
/// body     unique_id[4] size[1]                                   5 bytes
/// payload  size bytes of 6-byte measurement records
/// ```
///
/// A batch larger than one packet's payload ceiling is split into a chain:
/// packet 0 has `chained = 0`, every later packet has `chained = 1` and a
/// `chain_no` one higher than its predecessor.
use core::fmt;

use heapless::Vec;
use serde::Serialize;
use thiserror::Error;

use crate::dot11::{MacAddr, MAC_LEN};

/// Protocol tag carried in every packet.
pub const LABEL: [u8; 4] = *b"CBXL";

pub const HEADER_LEN: usize = 18;
pub const BODY_PREFIX_LEN: usize = 5;

/// Bytes before the payload starts.
pub const PREFIX_LEN: usize = HEADER_LEN + BODY_PREFIX_LEN;

/// One measurement record on the wire.
pub const RECORD_LEN: usize = MAC_LEN;

/// Largest payload the 8-bit size field can describe.
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;

/// Most records a single packet can hold.
pub const MAX_RECORDS: usize = MAX_PAYLOAD_LEN / RECORD_LEN;

pub const MAX_PACKET_LEN: usize = PREFIX_LEN + MAX_PAYLOAD_LEN;

pub type Payload = Vec<u8, MAX_PAYLOAD_LEN>;

/// Buffer holding one serialized packet
pub type PacketBuffer = Vec<u8, MAX_PACKET_LEN>;

/// The unit of relayed information: one captured hardware address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Measurement(pub MacAddr);

impl Measurement {
    pub const fn new(octets: [u8; MAC_LEN]) -> Self {
        Self(MacAddr::new(octets))
    }

    pub const fn addr(&self) -> MacAddr {
        self.0
    }

    pub const fn to_record(self) -> [u8; RECORD_LEN] {
        self.0.octets()
    }

    pub fn from_record(record: &[u8]) -> Option<Self> {
        MacAddr::from_slice(record).map(Self)
    }
}

impl From<MacAddr> for Measurement {
    fn from(addr: MacAddr) -> Self {
        Self(addr)
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Measurement({})", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("payload ceiling {ceiling} must lie in 6..=255")]
    InvalidCeiling { ceiling: usize },
    #[error("payload of {len} bytes exceeds the 255-byte size field")]
    PayloadTooLarge { len: usize },
    #[error("output buffer holds {len} bytes, packet needs {needed}")]
    BufferTooSmall { len: usize, needed: usize },
}

// ── Header ────────────────────────────────────────────────────────────

/// The packed flags byte.
///
/// Bit 0 encrypted, bit 1 relayed, bit 2 chained. Bits 3-7 are reserved:
/// ignored on read and written as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketFlags {
    /// Declared only; no cipher is applied to the payload
    pub encrypted: bool,
    pub relayed: bool,
    pub chained: bool,
}

impl PacketFlags {
    const ENCRYPTED: u8 = 1 << 0;
    const RELAYED: u8 = 1 << 1;
    const CHAINED: u8 = 1 << 2;

    pub const fn from_byte(byte: u8) -> Self {
        Self {
            encrypted: byte & Self::ENCRYPTED != 0,
            relayed: byte & Self::RELAYED != 0,
            chained: byte & Self::CHAINED != 0,
        }
    }

    pub const fn to_byte(self) -> u8 {
        let mut byte = 0;
        if self.encrypted {
            byte |= Self::ENCRYPTED;
        }
        if self.relayed {
            byte |= Self::RELAYED;
        }
        if self.chained {
            byte |= Self::CHAINED;
        }
        byte
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub label: [u8; 4],
    pub sender: MacAddr,
    pub receiver: MacAddr,
    pub chain_no: u8,
    pub flags: PacketFlags,
}

impl PacketHeader {
    /// Header for the first packet of a chain.
    pub const fn new(sender: MacAddr, receiver: MacAddr) -> Self {
        Self {
            label: LABEL,
            sender,
            receiver,
            chain_no: 0,
            flags: PacketFlags {
                encrypted: true,
                relayed: false,
                chained: false,
            },
        }
    }

    pub fn is_ours(&self) -> bool {
        self.label == LABEL
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.label);
        out[4..10].copy_from_slice(&self.sender.octets());
        out[10..16].copy_from_slice(&self.receiver.octets());
        out[16] = self.chain_no;
        out[17] = self.flags.to_byte();
        out
    }

    pub fn from_bytes(bytes: &[u8; HEADER_LEN]) -> Self {
        let mut label = [0u8; 4];
        label.copy_from_slice(&bytes[0..4]);
        let mut sender = [0u8; MAC_LEN];
        sender.copy_from_slice(&bytes[4..10]);
        let mut receiver = [0u8; MAC_LEN];
        receiver.copy_from_slice(&bytes[10..16]);
        Self {
            label,
            sender: MacAddr(sender),
            receiver: MacAddr(receiver),
            chain_no: bytes[16],
            flags: PacketFlags::from_byte(bytes[17]),
        }
    }
}

// ── Packet ────────────────────────────────────────────────────────────

/// One radio packet: header, unique id and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturePacket {
    pub header: PacketHeader,
    pub unique_id: u32,
    payload: Payload,
}

impl CapturePacket {
    pub fn new(header: PacketHeader, unique_id: u32, payload: &[u8]) -> Result<Self, CodecError> {
        let payload = Payload::from_slice(payload)
            .map_err(|_| CodecError::PayloadTooLarge { len: payload.len() })?;
        Ok(Self {
            header,
            unique_id,
            payload,
        })
    }

    /// Value of the body `size` field.
    pub fn size(&self) -> u8 {
        // Payload capacity equals u8::MAX
        self.payload.len() as u8
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Whole records in the payload; a trailing partial record is ignored.
    pub fn measurements(&self) -> impl Iterator<Item = Measurement> + '_ {
        self.payload
            .chunks_exact(RECORD_LEN)
            .filter_map(Measurement::from_record)
    }

    pub fn record_count(&self) -> usize {
        self.payload.len() / RECORD_LEN
    }

    pub fn wire_len(&self) -> usize {
        PREFIX_LEN + self.payload.len()
    }

    /// Serialize into `buf`, returning the number of bytes written.
    pub fn write_to(&self, buf: &mut [u8]) -> Result<usize, CodecError> {
        let needed = self.wire_len();
        let len = buf.len();
        let out = buf
            .get_mut(..needed)
            .ok_or(CodecError::BufferTooSmall { len, needed })?;
        out[..HEADER_LEN].copy_from_slice(&self.header.to_bytes());
        out[HEADER_LEN..HEADER_LEN + 4].copy_from_slice(&self.unique_id.to_le_bytes());
        out[HEADER_LEN + 4] = self.size();
        out[PREFIX_LEN..].copy_from_slice(&self.payload);
        Ok(needed)
    }

    /// Serialize into an owned buffer sized for the largest packet.
    pub fn to_bytes(&self) -> PacketBuffer {
        let mut buf = PacketBuffer::new();
        let _ = buf.resize_default(self.wire_len());
        let _ = self.write_to(&mut buf);
        buf
    }
}

impl fmt::Display for CapturePacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "cbx_pkt {{")?;
        writeln!(f, "  Header {{")?;
        writeln!(f, "    Label: {}", self.header.label.escape_ascii())?;
        writeln!(f, "    Sender: {}", self.header.sender)?;
        writeln!(f, "    Receiver: {}", self.header.receiver)?;
        writeln!(f, "    Chain no: {}", self.header.chain_no)?;
        writeln!(f, "    Flags: {:02X}", self.header.flags.to_byte())?;
        writeln!(f, "  }}")?;
        writeln!(f, "  Body {{")?;
        writeln!(f, "    Unique id: {:08X}", self.unique_id)?;
        writeln!(f, "    Size: {}", self.size())?;
        writeln!(f, "  }}")?;
        write!(f, "}}")
    }
}

// ── Chain encoder ─────────────────────────────────────────────────────

/// Split `measurements` into a chain of packets whose payloads hold at most
/// `ceiling` bytes each.
///
/// Every packet carries the largest whole number of records that fits the
/// ceiling except the last, which holds the remainder. An empty input
/// yields no packets.
pub fn encode(
    measurements: &[Measurement],
    sender: MacAddr,
    receiver: MacAddr,
    ceiling: usize,
) -> Result<ChainEncoder<'_>, CodecError> {
    if !(RECORD_LEN..=MAX_PAYLOAD_LEN).contains(&ceiling) {
        return Err(CodecError::InvalidCeiling { ceiling });
    }
    Ok(ChainEncoder {
        remaining: measurements,
        per_packet: ceiling / RECORD_LEN,
        header: PacketHeader::new(sender, receiver),
        unique_id: 0,
        index: 0,
    })
}

/// Iterator over the packets of one chain, built lazily so a long batch
/// never needs more than one packet in memory.
#[derive(Debug, Clone)]
pub struct ChainEncoder<'a> {
    remaining: &'a [Measurement],
    per_packet: usize,
    header: PacketHeader,
    unique_id: u32,
    index: usize,
}

impl ChainEncoder<'_> {
    /// Stamp every packet of the chain with `id`.
    pub fn with_unique_id(mut self, id: u32) -> Self {
        self.unique_id = id;
        self
    }

    pub fn records_per_packet(&self) -> usize {
        self.per_packet
    }
}

impl Iterator for ChainEncoder<'_> {
    type Item = CapturePacket;

    fn next(&mut self) -> Option<CapturePacket> {
        if self.remaining.is_empty() {
            return None;
        }
        let take = self.per_packet.min(self.remaining.len());
        let (records, rest) = self.remaining.split_at(take);
        self.remaining = rest;

        let mut payload = Payload::new();
        for record in records {
            // take * RECORD_LEN <= ceiling <= MAX_PAYLOAD_LEN
            let _ = payload.extend_from_slice(&record.to_record());
        }

        let mut header = self.header;
        // chain_no is one byte on the wire and wraps past 255
        header.chain_no = self.index as u8;
        header.flags.chained = self.index > 0;
        self.index += 1;

        Some(CapturePacket {
            header,
            unique_id: self.unique_id,
            payload,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining.len().div_ceil(self.per_packet);
        (n, Some(n))
    }
}

impl ExactSizeIterator for ChainEncoder<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SENDER: MacAddr = MacAddr([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
    const RECEIVER: MacAddr = MacAddr([0x12, 0x04, 0x02, 0x08, 0x07, 0x05]);

    fn addrs(n: usize) -> std::vec::Vec<Measurement> {
        (0..n)
            .map(|i| Measurement::new([0xAA, 0xBB, 0, (i >> 16) as u8, (i >> 8) as u8, i as u8]))
            .collect()
    }

    fn chain(n: usize) -> std::vec::Vec<CapturePacket> {
        encode(&addrs(n), SENDER, RECEIVER, 128).unwrap().collect()
    }

    // ── Flags ───────────────────────────────────────────────────────

    #[test]
    fn flag_bit_positions() {
        let flags = PacketFlags {
            encrypted: true,
            relayed: false,
            chained: true,
        };
        assert_eq!(flags.to_byte(), 0b101);
        assert!(PacketFlags::from_byte(0b010).relayed);
    }

    #[test]
    fn reserved_flag_bits_read_as_zero() {
        let flags = PacketFlags::from_byte(0xF9);
        assert!(flags.encrypted);
        assert!(!flags.relayed);
        assert!(!flags.chained);
        assert_eq!(flags.to_byte(), 0x01);
    }

    // ── Serialization ───────────────────────────────────────────────

    #[test]
    fn wire_layout() {
        let mut header = PacketHeader::new(SENDER, RECEIVER);
        header.chain_no = 3;
        header.flags.chained = true;
        let payload = [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];
        let pkt = CapturePacket::new(header, 0x1122_3344, &payload).unwrap();

        let bytes = pkt.to_bytes();
        assert_eq!(bytes.len(), PREFIX_LEN + 6);
        assert_eq!(&bytes[0..4], b"CBXL");
        assert_eq!(&bytes[4..10], &SENDER.octets());
        assert_eq!(&bytes[10..16], &RECEIVER.octets());
        assert_eq!(bytes[16], 3);
        assert_eq!(bytes[17], 0b101);
        assert_eq!(&bytes[18..22], &[0x44, 0x33, 0x22, 0x11]);
        assert_eq!(bytes[22], 6);
        assert_eq!(&bytes[23..], &payload);
    }

    #[test]
    fn write_to_short_buffer_fails() {
        let pkt = chain(2).remove(0);
        let mut buf = [0u8; PREFIX_LEN + 11];
        assert_eq!(
            pkt.write_to(&mut buf),
            Err(CodecError::BufferTooSmall {
                len: PREFIX_LEN + 11,
                needed: PREFIX_LEN + 12,
            })
        );
    }

    #[test]
    fn header_bytes_round_trip() {
        let mut header = PacketHeader::new(SENDER, RECEIVER);
        header.chain_no = 7;
        header.flags.relayed = true;
        assert_eq!(PacketHeader::from_bytes(&header.to_bytes()), header);
    }

    #[test]
    fn oversized_payload_rejected() {
        let header = PacketHeader::new(SENDER, RECEIVER);
        assert_eq!(
            CapturePacket::new(header, 0, &[0u8; 256]),
            Err(CodecError::PayloadTooLarge { len: 256 })
        );
    }

    #[test]
    fn diagnostic_block() {
        let pkt = chain(1).remove(0);
        let text = std::format!("{pkt}");
        assert!(text.contains("Label: CBXL"));
        assert!(text.contains("Sender: 01:02:03:04:05:06"));
        assert!(text.contains("Receiver: 12:04:02:08:07:05"));
        assert!(text.contains("Chain no: 0"));
        assert!(text.contains("Flags: 01"));
        assert!(text.contains("Size: 6"));
    }

    // ── Chaining ────────────────────────────────────────────────────

    #[test]
    fn empty_input_emits_nothing() {
        let encoder = encode(&[], SENDER, RECEIVER, 128).unwrap();
        assert_eq!(encoder.len(), 0);
        assert_eq!(encoder.count(), 0);
    }

    #[test]
    fn twenty_five_records_make_two_packets() {
        let input = addrs(25);
        let packets: std::vec::Vec<_> = encode(&input, SENDER, RECEIVER, 128).unwrap().collect();
        assert_eq!(packets.len(), 2);

        assert_eq!(packets[0].record_count(), 21);
        assert_eq!(packets[0].size(), 126);
        assert_eq!(packets[0].header.chain_no, 0);
        assert!(!packets[0].header.flags.chained);

        assert_eq!(packets[1].record_count(), 4);
        assert_eq!(packets[1].size(), 24);
        assert_eq!(packets[1].header.chain_no, 1);
        assert!(packets[1].header.flags.chained);

        let back: std::vec::Vec<_> = packets.iter().flat_map(|p| p.measurements()).collect();
        assert_eq!(back, input);
    }

    #[test]
    fn exact_multiple_has_no_short_tail() {
        let packets = chain(42);
        assert_eq!(packets.len(), 2);
        assert!(packets.iter().all(|p| p.size() == 126));
    }

    #[test]
    fn every_packet_declares_encryption() {
        assert!(chain(50).iter().all(|p| p.header.flags.encrypted));
    }

    #[test]
    fn unique_id_stamped_on_whole_chain() {
        let input = addrs(30);
        let packets: std::vec::Vec<_> = encode(&input, SENDER, RECEIVER, 128)
            .unwrap()
            .with_unique_id(9)
            .collect();
        assert!(packets.iter().all(|p| p.unique_id == 9));
    }

    #[test]
    fn ceiling_bounds() {
        assert_eq!(
            encode(&[], SENDER, RECEIVER, 5).unwrap_err(),
            CodecError::InvalidCeiling { ceiling: 5 }
        );
        assert!(encode(&[], SENDER, RECEIVER, 256).is_err());
        let one_per_packet: std::vec::Vec<_> =
            encode(&addrs(3), SENDER, RECEIVER, 11).unwrap().collect();
        assert_eq!(one_per_packet.len(), 3);
        assert_eq!(one_per_packet[2].header.chain_no, 2);
    }

    proptest! {
        #[test]
        fn prop_chain_is_well_formed(n in 0usize..=500) {
            let input = addrs(n);
            let packets: std::vec::Vec<_> = encode(&input, SENDER, RECEIVER, 128).unwrap().collect();

            prop_assert_eq!(packets.len(), n.div_ceil(21));
            for (i, p) in packets.iter().enumerate() {
                prop_assert_eq!(usize::from(p.header.chain_no), i);
                prop_assert_eq!(p.header.flags.chained, i > 0);
                prop_assert!(usize::from(p.size()) <= 128);
                prop_assert_eq!(usize::from(p.size()) % RECORD_LEN, 0);
                if i + 1 < packets.len() {
                    prop_assert_eq!(p.size(), 126);
                }
            }
            let total: usize = packets.iter().map(|p| usize::from(p.size())).sum();
            prop_assert_eq!(total, RECORD_LEN * n);

            let back: std::vec::Vec<_> = packets.iter().flat_map(|p| p.measurements()).collect();
            prop_assert_eq!(back, input);
        }
    }
}

/// IEEE 802.11 frame dissection for promiscuous-mode captures.
///
/// Classifies a raw link-layer frame, extracts the originator address and,
/// for beacons and probe responses, the advertised network name.
///
/// Every field is read through a slice checked against the captured length,
/// so a short or lying frame yields `TruncatedFrame` instead of a bad read.
/// Safe to call from the sniffer callback (no allocation, no blocking).
use core::fmt::{self, Write};

use heapless::Vec;
use ieee80211::common::{
    ControlFrameSubtype, DataFrameSubtype, FrameControlField, FrameType, ManagementFrameSubtype,
};
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Length of a hardware address in bytes.
pub const MAC_LEN: usize = 6;

/// Length of the `aa:bb:cc:dd:ee:ff` text form.
pub const MAC_TEXT_LEN: usize = 17;

/// Maximum number of advertised-name bytes kept from a frame.
pub const MAX_NAME_LEN: usize = 31;

/// Management header: fc(2) duration(2) destination(6) transmitter(6) bssid(6) seq(2)
pub const MGMT_HEADER_LEN: usize = 24;

/// Control header: fc(2) duration(2) destination(6) transmitter(6)
pub const CTRL_HEADER_LEN: usize = 16;

/// Data header: fc(2) duration(2) addr1(6) addr2(6) addr3(6) seq(2) addr4(6)
pub const DATA_HEADER_LEN: usize = 30;

/// Beacon / probe response fixed fields before the first tag:
/// timestamp(8) interval(2) capability(2) tag number(1)
const BEACON_FIXED_LEN: usize = 13;

/// Offsets of the addresses within the MAC header.
const ADDR1_OFFSET: usize = 4;
const ADDR2_OFFSET: usize = 10;
const ADDR3_OFFSET: usize = 16;
const ADDR4_OFFSET: usize = 24;

/// Text buffer for a formatted MAC address
pub type MacString = heapless::String<MAC_TEXT_LEN>;

// ── Addresses ─────────────────────────────────────────────────────────

/// A 6-byte hardware address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; MAC_LEN]);

impl MacAddr {
    pub const fn new(octets: [u8; MAC_LEN]) -> Self {
        Self(octets)
    }

    pub const fn octets(&self) -> [u8; MAC_LEN] {
        self.0
    }

    /// Build an address from exactly six bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let octets: [u8; MAC_LEN] = bytes.try_into().ok()?;
        Some(Self(octets))
    }

    /// Render as lowercase colon-separated hex, always 17 characters.
    pub fn to_text(&self) -> MacString {
        let mut buf = MacString::new();
        let _ = write!(buf, "{self}");
        buf
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddr({self})")
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_text())
    }
}

// ── Frame control ─────────────────────────────────────────────────────

/// Top-level 802.11 frame class (the 2-bit type field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameClass {
    Management,
    Control,
    Data,
    Extension,
}

impl FrameClass {
    pub const fn of(frame_type: FrameType) -> Self {
        match frame_type {
            FrameType::Management(_) => FrameClass::Management,
            FrameType::Control(_) => FrameClass::Control,
            FrameType::Data(_) => FrameClass::Data,
            FrameType::Unknown(_) => FrameClass::Extension,
        }
    }

    /// Fixed MAC header length for this class, `None` for extension frames.
    pub const fn header_len(self) -> Option<usize> {
        match self {
            FrameClass::Management => Some(MGMT_HEADER_LEN),
            FrameClass::Control => Some(CTRL_HEADER_LEN),
            FrameClass::Data => Some(DATA_HEADER_LEN),
            FrameClass::Extension => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FrameClass::Management => "MGMT",
            FrameClass::Control => "CTRL",
            FrameClass::Data => "DATA",
            FrameClass::Extension => "EXT",
        }
    }
}

/// Read the little-endian frame control field from the start of a frame.
pub fn frame_control(frame: &[u8]) -> Option<FrameControlField> {
    let bytes: [u8; 2] = frame.get(..2)?.try_into().ok()?;
    Some(FrameControlField::from_bits(u16::from_le_bytes(bytes)))
}

/// The 4-bit subtype, whatever the class.
pub const fn subtype_code(fcf: FrameControlField) -> u8 {
    fcf.frame_type().into_bits() >> 2
}

// ── Subtypes ──────────────────────────────────────────────────────────

/// Frame class together with its class-relative subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Management(ManagementFrameSubtype),
    Control(ControlFrameSubtype),
    Data(DataFrameSubtype),
    Extension { subtype: u8 },
}

impl FrameKind {
    pub const fn new(class: FrameClass, subtype: u8) -> Self {
        let subtype = subtype & 0x0F;
        match class {
            FrameClass::Management => FrameKind::Management(ManagementFrameSubtype::from_bits(subtype)),
            FrameClass::Control => FrameKind::Control(ControlFrameSubtype::from_bits(subtype)),
            FrameClass::Data => FrameKind::Data(DataFrameSubtype::from_bits(subtype)),
            FrameClass::Extension => FrameKind::Extension { subtype },
        }
    }

    pub const fn class(&self) -> FrameClass {
        match self {
            FrameKind::Management(_) => FrameClass::Management,
            FrameKind::Control(_) => FrameClass::Control,
            FrameKind::Data(_) => FrameClass::Data,
            FrameKind::Extension { .. } => FrameClass::Extension,
        }
    }

    /// Beacons and probe responses start their body with fixed fields and
    /// an SSID tag.
    pub const fn carries_name(&self) -> bool {
        matches!(
            self,
            FrameKind::Management(ManagementFrameSubtype::Beacon | ManagementFrameSubtype::ProbeResponse)
        )
    }

    /// Subtype label for management and control frames, class name otherwise.
    pub fn label(&self) -> &'static str {
        match self {
            FrameKind::Management(sub) => management_label(*sub),
            FrameKind::Control(sub) => control_label(*sub),
            FrameKind::Data(_) | FrameKind::Extension { .. } => self.class().as_str(),
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Management(_) | FrameKind::Control(_) => {
                write!(f, "{}: {}", self.class().as_str(), self.label())
            }
            _ => f.write_str(self.label()),
        }
    }
}

/// Reassociation and timing advertisement have no variant of their own,
/// codes 7 and 15 are reserved.
fn management_label(sub: ManagementFrameSubtype) -> &'static str {
    use ManagementFrameSubtype::*;
    match sub {
        AssociationRequest => "AssocReq",
        AssociationResponse => "AssocRes",
        Unknown(2) => "ReassocReq",
        Unknown(3) => "ReassocRes",
        ProbeRequest => "ProbeReq",
        ProbeResponse => "ProbeRes",
        Unknown(6) => "TimingAdv",
        Beacon => "Beacon",
        ATIM => "ATIM",
        Disassociation => "DisAssoc",
        Authentication => "Auth",
        Deauthentication => "DeAuth",
        Action => "Action",
        ActionNoACK => "Action NoAck",
        Unknown(_) => "Reserved",
    }
}

/// Trigger (2) has no variant of its own; 0 and 1 are reserved.
fn control_label(sub: ControlFrameSubtype) -> &'static str {
    use ControlFrameSubtype::*;
    match sub {
        Unknown(2) => "Trigger",
        TACK => "TACK",
        BeamformingReportPoll => "ReportPoll",
        VHTNDPAnnouncement => "Announce",
        ControlFrameExtension => "CTRLExt",
        ControlWrapper => "CTRLWrapper",
        BlockAckRequest => "BlockAckReq",
        BlockAck => "BlockAck",
        PSPoll => "PSPoll",
        RTS => "RTS",
        CTS => "CTS",
        Ack => "ACK",
        CFEnd => "CFEnd",
        CFEndAck => "CFEnd&CFAck",
        Unknown(_) => "Reserved",
    }
}

// ── Captured frames ───────────────────────────────────────────────────

/// Receive metadata reported by the sniffer alongside each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureMeta {
    pub channel: u8,
    /// Declared frame length in bytes
    pub sig_len: u16,
    pub rssi: i8,
}

/// A frame handed to the sniffer callback. Borrowed for the duration of
/// one callback invocation only.
#[derive(Debug, Clone, Copy)]
pub struct LinkFrame<'a> {
    data: &'a [u8],
    /// Frame class as classified by the capture subsystem
    pub class: FrameClass,
    pub meta: CaptureMeta,
}

impl<'a> LinkFrame<'a> {
    pub fn new(data: &'a [u8], class: FrameClass, meta: CaptureMeta) -> Self {
        Self { data, class, meta }
    }

    /// Captured bytes, clipped to the declared signal length.
    pub fn bytes(&self) -> &'a [u8] {
        let declared = usize::from(self.meta.sig_len);
        &self.data[..declared.min(self.data.len())]
    }
}

/// Advertised network name, at most [`MAX_NAME_LEN`] raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NetworkName(Vec<u8, MAX_NAME_LEN>);

impl NetworkName {
    /// Copy up to [`MAX_NAME_LEN`] bytes, dropping anything beyond.
    pub fn truncated(bytes: &[u8]) -> Self {
        let mut name = Vec::new();
        let _ = name.extend_from_slice(&bytes[..bytes.len().min(MAX_NAME_LEN)]);
        Self(name)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.0).ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NetworkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.escape_ascii())
    }
}

/// What the dissector pulls out of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DissectedIdentity {
    pub kind: FrameKind,
    /// Transmitter of the frame
    pub originator: MacAddr,
    pub destination: MacAddr,
    /// Only present for beacons and probe responses
    pub name: Option<NetworkName>,
}

impl DissectedIdentity {
    /// One-line capture summary for serial diagnostics.
    pub fn summary(&self, meta: CaptureMeta) -> FrameSummary<'_> {
        FrameSummary {
            meta,
            identity: self,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DissectError {
    #[error("{class:?} frame truncated: {len} bytes, header needs {needed}")]
    TruncatedFrame {
        class: FrameClass,
        len: usize,
        needed: usize,
    },
}

/// Dissect one captured frame.
///
/// The class tag on the [`LinkFrame`] selects the header layout; the
/// subtype comes from the frame control field. Extension frames never
/// carry an identity and yield `Ok(None)`.
pub fn dissect(frame: &LinkFrame<'_>) -> Result<Option<DissectedIdentity>, DissectError> {
    let bytes = frame.bytes();
    let Some(needed) = frame.class.header_len() else {
        return Ok(None);
    };
    if bytes.len() < needed {
        return Err(DissectError::TruncatedFrame {
            class: frame.class,
            len: bytes.len(),
            needed,
        });
    }

    let (header, body) = bytes.split_at(needed);
    let truncated = DissectError::TruncatedFrame {
        class: frame.class,
        len: bytes.len(),
        needed,
    };
    let fcf = frame_control(header).ok_or(truncated)?;
    let kind = FrameKind::new(frame.class, subtype_code(fcf));
    let addr = |offset: usize| {
        header
            .get(offset..offset + MAC_LEN)
            .and_then(MacAddr::from_slice)
            .ok_or(truncated)
    };

    let identity = match kind {
        FrameKind::Extension { .. } => return Ok(None),
        // Management, control and data all carry the transmitter in address 2
        _ => DissectedIdentity {
            kind,
            originator: addr(ADDR2_OFFSET)?,
            destination: addr(ADDR1_OFFSET)?,
            name: if kind.carries_name() { read_name(body) } else { None },
        },
    };

    Ok(Some(identity))
}

/// Read the first tag of a beacon / probe response body as the network name.
///
/// Stops at the declared tag length, [`MAX_NAME_LEN`], the end of the
/// capture or a NUL byte, whichever comes first.
fn read_name(body: &[u8]) -> Option<NetworkName> {
    let declared = usize::from(*body.get(BEACON_FIXED_LEN)?);
    let text = body.get(BEACON_FIXED_LEN + 1..)?;
    let text = &text[..declared.min(MAX_NAME_LEN).min(text.len())];
    let end = text.iter().position(|&b| b == 0).unwrap_or(text.len());
    Some(NetworkName::truncated(&text[..end]))
}

/// Third and fourth data-frame addresses, for callers that want the BSSID
/// or the WDS source.
pub fn data_addresses(header: &[u8]) -> Option<(MacAddr, MacAddr)> {
    let addr3 = MacAddr::from_slice(header.get(ADDR3_OFFSET..ADDR3_OFFSET + MAC_LEN)?)?;
    let addr4 = MacAddr::from_slice(header.get(ADDR4_OFFSET..ADDR4_OFFSET + MAC_LEN)?)?;
    Some((addr3, addr4))
}

/// Capture log line: channel | length | transmitter | destination | label | rssi | name
pub struct FrameSummary<'a> {
    meta: CaptureMeta,
    identity: &'a DissectedIdentity,
}

impl fmt::Display for FrameSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut label = heapless::String::<32>::new();
        let _ = write!(label, "{}", self.identity.kind);
        write!(
            f,
            "{:<2} | {:<5} | {} | {} | {:<20} | {:<3} DBM | '",
            self.meta.channel,
            self.meta.sig_len,
            self.identity.originator,
            self.identity.destination,
            label.as_str(),
            self.meta.rssi,
        )?;
        if let Some(name) = &self.identity.name {
            write!(f, "{name}")?;
        }
        f.write_str("'")
    }
}

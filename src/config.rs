/// Runtime relay configuration.
///
/// Starts from the compiled-in [`defaults`](crate::defaults); platform code
/// overrides fields (e.g. addresses from NVS) before building the nodes.
use core::cell::Cell;

use critical_section::Mutex;

use crate::defaults;
use crate::dot11::{FrameClass, MacAddr};

/// Which frame classes the sniffer callback passes on for dissection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFilter {
    pub management: bool,
    pub control: bool,
    pub data: bool,
}

impl CaptureFilter {
    /// Beacons, probes and the rest of the management traffic.
    pub const MANAGEMENT_ONLY: Self = Self {
        management: true,
        control: false,
        data: false,
    };

    pub const ALL: Self = Self {
        management: true,
        control: true,
        data: true,
    };

    /// Extension frames are always let through; the dissector ignores them.
    pub const fn allows(&self, class: FrameClass) -> bool {
        match class {
            FrameClass::Management => self.management,
            FrameClass::Control => self.control,
            FrameClass::Data => self.data,
            FrameClass::Extension => true,
        }
    }
}

impl Default for CaptureFilter {
    fn default() -> Self {
        Self::MANAGEMENT_ONLY
    }
}

/// Capture filter shared between the main loop and the sniffer callback.
///
/// The critical section only guards against the callback running in
/// interrupt context; reads and writes are single `Copy` values.
pub struct SharedFilter(Mutex<Cell<CaptureFilter>>);

impl SharedFilter {
    pub const fn new(filter: CaptureFilter) -> Self {
        Self(Mutex::new(Cell::new(filter)))
    }

    /// Snapshot of the current filter.
    pub fn get(&self) -> CaptureFilter {
        critical_section::with(|cs| self.0.borrow(cs).get())
    }

    pub fn set(&self, filter: CaptureFilter) {
        critical_section::with(|cs| self.0.borrow(cs).set(filter));
    }
}

impl Default for SharedFilter {
    fn default() -> Self {
        Self::new(CaptureFilter::MANAGEMENT_ONLY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    /// Sender address written into every packet
    pub device: MacAddr,
    /// Receiver address written into every packet
    pub gateway: MacAddr,
    pub batch_capacity: usize,
    /// Maximum payload bytes per packet
    pub payload_ceiling: usize,
    pub flush_interval_ms: u64,
    pub channel_dwell_ms: u64,
    /// Gateway receive limit in bytes
    pub max_rx_len: usize,
    pub band_hz: u32,
    pub init_attempts: u8,
    pub capture: CaptureFilter,
}

impl RelayConfig {
    pub const fn new() -> Self {
        Self {
            device: defaults::DEVICE_MAC,
            gateway: defaults::GATEWAY_MAC,
            batch_capacity: defaults::BATCH_CAPACITY,
            payload_ceiling: defaults::PAYLOAD_CEILING,
            flush_interval_ms: defaults::FLUSH_INTERVAL_MS,
            channel_dwell_ms: defaults::CHANNEL_DWELL_MS,
            max_rx_len: defaults::MAX_RX_LEN,
            band_hz: defaults::LORA_BAND_HZ,
            init_attempts: defaults::RADIO_INIT_ATTEMPTS,
            capture: CaptureFilter::MANAGEMENT_ONLY,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::new()
    }
}

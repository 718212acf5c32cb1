/// Compiled-in defaults for the sensor and gateway nodes.
///
/// Development addresses match the bench pair; production builds set their
/// own through [`RelayConfig`](crate::config::RelayConfig).
use crate::dot11::MacAddr;

/// Address this sensor writes into the `sender` header field.
pub const DEVICE_MAC: MacAddr = MacAddr([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);

/// Address of the gateway, written into the `receiver` header field.
pub const GATEWAY_MAC: MacAddr = MacAddr([0x12, 0x04, 0x02, 0x08, 0x07, 0x05]);

/// LoRa carrier frequency (EU 868 MHz band).
pub const LORA_BAND_HZ: u32 = 868_000_000;

/// Attempts at radio bring-up before the node gives up and halts.
pub const RADIO_INIT_ATTEMPTS: u8 = 3;

/// Unique addresses collected before a batch is flushed.
pub const BATCH_CAPACITY: usize = 32;

/// Maximum payload bytes per radio packet (21 records).
pub const PAYLOAD_CEILING: usize = 128;

/// A batch is forced out if nothing was flushed for this long.
pub const FLUSH_INTERVAL_MS: u64 = 60_000;

/// WiFi channels to hop through (2.4 GHz, channels 1-12).
pub const WIFI_CHANNELS: &[u8] = &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];

/// Dwell time per channel in milliseconds.
pub const CHANNEL_DWELL_MS: u64 = 10;

/// Largest raw radio buffer the gateway will read.
pub const MAX_RX_LEN: usize = 2048;

/// Measurements the capture mailbox can hold between two polls.
pub const MAILBOX_DEPTH: usize = 16;

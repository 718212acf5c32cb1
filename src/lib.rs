//! cbxrelay library: portable core of a two-node WiFi-to-LoRa relay.
//!
//! A sensor node sniffs 802.11 traffic, keeps the set of unique transmitter
//! addresses it has seen, and periodically ships them to a gateway node as
//! CBXL packets over a long-range radio link. The gateway decodes each
//! packet and forwards its addresses to a backend as JSON.
//!
//! Everything here is `no_std` with no allocator and testable on the host
//! with `cargo test`. Platform binaries provide the radio driver, the WiFi
//! promiscuous callback, the channel tuner and the backend publisher
//! through the traits in [`radio`], [`sensor`] and [`gateway`].
//!
//! - `dot11`: frame dissection (class, subtype, addresses, SSID)
//! - `packet`: CBXL wire format and the chain encoder
//! - `batch`: bounded deduplicating batch of measurements
//! - `capture`: sniffer-callback hand-off and flush guard
//! - `decoder`: receive-side validation and decoding
//! - `sensor` / `gateway`: the two node loops
//! - `protocol`: JSON messages for the backend

#![cfg_attr(not(test), no_std)]

pub mod batch;
pub mod capture;
pub mod config;
pub mod decoder;
pub mod defaults;
pub mod dot11;
pub mod gateway;
pub mod packet;
pub mod protocol;
pub mod radio;
pub mod sensor;

/// Gateway node: receives CBXL packets and forwards their contents.
///
/// Each poll checks the radio for one packet, rejects it by size before
/// reading, decodes it, and hands a JSON body to the [`Publisher`].
use core::convert::Infallible;
use core::fmt::Debug;

use crate::config::RelayConfig;
use crate::decoder::{decode_with_limit, DecodeError};
use crate::defaults::MAX_RX_LEN;
use crate::protocol::{to_json_in, GatewayMessage, MAX_MSG_LEN, VERSION};
use crate::radio::{RadioRx, RelayError};

/// Backend sink for gateway messages (HTTP POST, serial bridge, ...).
pub trait Publisher {
    type Error: Debug;

    fn publish(&mut self, body: &[u8]) -> Result<(), Self::Error>;
}

/// Packet counters since boot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayStats {
    pub received: u32,
    pub delivered: u32,
    pub rejected: u32,
    pub foreign: u32,
}

/// What one poll did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reception {
    /// No packet waiting
    Idle,
    /// Oversized or truncated; nothing published
    Rejected(DecodeError),
    /// Another network's packet; ignored
    Foreign,
    Delivered { records: usize, chain_no: u8 },
}

pub struct Gateway {
    buf: [u8; MAX_RX_LEN],
    limit: usize,
    stats: GatewayStats,
}

impl Gateway {
    pub const fn new() -> Self {
        Self {
            buf: [0; MAX_RX_LEN],
            limit: MAX_RX_LEN,
            stats: GatewayStats {
                received: 0,
                delivered: 0,
                rejected: 0,
                foreign: 0,
            },
        }
    }

    /// Receive limit from `config`, capped at the buffer size.
    pub fn with_config(config: &RelayConfig) -> Self {
        Self {
            limit: config.max_rx_len.min(MAX_RX_LEN),
            ..Self::new()
        }
    }

    pub fn stats(&self) -> GatewayStats {
        self.stats
    }

    pub fn poll<R: RadioRx, P: Publisher>(
        &mut self,
        radio: &mut R,
        publisher: &mut P,
        now_ms: u64,
    ) -> Result<Reception, RelayError<R::Error, P::Error>> {
        let info = match radio.parse_packet() {
            Ok(Some(info)) => info,
            Ok(None) => return Ok(Reception::Idle),
            Err(e) => return Err(RelayError::Radio(e)),
        };
        self.stats.received += 1;

        if info.size > self.limit {
            log::warn!("Ignoring packet, due to extreme size of {} bytes", info.size);
            self.stats.rejected += 1;
            return Ok(Reception::Rejected(DecodeError::OversizedPacket {
                len: info.size,
                limit: self.limit,
            }));
        }

        let n = match radio.read(&mut self.buf[..info.size]) {
            Ok(n) => n,
            Err(e) => return Err(RelayError::Radio(e)),
        };
        let decoded = match decode_with_limit(&self.buf[..n], self.limit) {
            Ok(decoded) => decoded,
            Err(e) if e.is_foreign() => {
                log::debug!("{}", e);
                self.stats.foreign += 1;
                return Ok(Reception::Foreign);
            }
            Err(e) => {
                log::warn!("Dropping packet: {}", e);
                self.stats.rejected += 1;
                return Ok(Reception::Rejected(e));
            }
        };

        let packet = &decoded.packet;
        log::debug!("{}", packet);
        log::debug!("RSSI {} dBm, SNR {}", info.rssi, info.snr);
        if decoded.trailing_bytes() > 0 {
            log::warn!("Ignoring {} trailing payload bytes", decoded.trailing_bytes());
        }
        for measurement in &decoded.measurements {
            log::info!("MAC Received: {}", measurement);
        }

        let msg = GatewayMessage::Measurements {
            sender: packet.header.sender,
            receiver: packet.header.receiver,
            id: packet.unique_id,
            chain: packet.header.chain_no,
            chained: packet.header.flags.chained,
            macs: &decoded.measurements,
            rssi: info.rssi,
            ts: now_ms,
        };
        publish::<MAX_MSG_LEN, R::Error, _>(publisher, &msg)?;
        self.stats.delivered += 1;

        Ok(Reception::Delivered {
            records: decoded.measurements.len(),
            chain_no: packet.header.chain_no,
        })
    }

    /// Publish a status report with the counters so far.
    ///
    /// Uptime saturates at `u32::MAX` seconds.
    pub fn report_status<P: Publisher>(
        &self,
        publisher: &mut P,
        now_ms: u64,
    ) -> Result<(), RelayError<Infallible, P::Error>> {
        let msg = GatewayMessage::Status {
            uptime: u32::try_from(now_ms / 1000).unwrap_or(u32::MAX),
            received: self.stats.received,
            delivered: self.stats.delivered,
            rejected: self.stats.rejected,
            foreign: self.stats.foreign,
            version: VERSION,
        };
        publish::<MAX_MSG_LEN, _, _>(publisher, &msg)
    }
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize `msg` into an `N`-byte buffer and hand it to the publisher.
fn publish<const N: usize, E: Debug, P: Publisher>(
    publisher: &mut P,
    msg: &GatewayMessage<'_>,
) -> Result<(), RelayError<E, P::Error>> {
    let Some(body) = to_json_in::<N>(msg) else {
        log::error!("Message does not fit {} bytes", N);
        return Err(RelayError::MessageTooLarge { limit: N });
    };
    if let Err(e) = publisher.publish(&body) {
        log::warn!("Publish failed: {:?}", e);
        return Err(RelayError::Publish(e));
    }
    Ok(())
}

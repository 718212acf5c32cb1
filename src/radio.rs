/// Long-range radio link: the narrow interface both nodes drive.
///
/// SPI wiring, pin setup and register programming stay in platform code;
/// the library only needs to start the radio, send a packet, and poll for
/// and read a received packet.
use core::convert::Infallible;
use core::fmt::Debug;

use thiserror::Error;

use crate::config::RelayConfig;
use crate::packet::CodecError;

pub trait Radio {
    type Error: Debug;

    /// Bring the radio up on the given carrier frequency.
    fn begin(&mut self, band_hz: u32) -> Result<(), Self::Error>;
}

pub trait RadioTx: Radio {
    /// Send one packet; returns once the radio has finished transmitting.
    fn transmit(&mut self, packet: &[u8]) -> Result<(), Self::Error>;
}

/// Signal report for a packet waiting in the radio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketInfo {
    pub size: usize,
    pub rssi: i16,
    pub snr: f32,
}

pub trait RadioRx: Radio {
    /// Check for a received packet without reading it.
    fn parse_packet(&mut self) -> Result<Option<PacketInfo>, Self::Error>;

    /// Read the pending packet into `buf`, returning the bytes read.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Node-level failure. `E` is the radio's error type, `P` the publisher's
/// (gateway only).
#[derive(Debug, Error)]
pub enum RelayError<E: Debug, P: Debug = Infallible> {
    /// Fatal: the node must stop capturing, sending and receiving
    #[error("radio failed to initialize after {attempts} attempts: {last:?}")]
    RadioInitFailure { attempts: u8, last: E },
    #[error("radio error: {0:?}")]
    Radio(E),
    #[error("publish failed: {0:?}")]
    Publish(P),
    #[error("message does not fit the {limit}-byte publish buffer")]
    MessageTooLarge { limit: usize },
    #[error("encode failed: {0}")]
    Encode(#[from] CodecError),
}

/// Start the radio on `config.band_hz`, trying up to `config.init_attempts`
/// times.
///
/// Exhausting the attempts is the one fatal condition in the relay; the
/// caller is expected to halt on `RadioInitFailure`.
pub fn bring_up<R: Radio>(
    radio: &mut R,
    config: &RelayConfig,
) -> Result<(), RelayError<R::Error>> {
    let band_hz = config.band_hz;
    let attempts = config.init_attempts.max(1);
    let mut tries = 0;
    loop {
        tries += 1;
        match radio.begin(band_hz) {
            Ok(()) => {
                log::info!("Radio up at {} Hz after {} attempt(s)", band_hz, tries);
                return Ok(());
            }
            Err(e) if tries >= attempts => {
                log::error!("Radio init failed: {:?}", e);
                return Err(RelayError::RadioInitFailure { attempts, last: e });
            }
            Err(e) => log::warn!("Radio init attempt {} failed: {:?}", tries, e),
        }
    }
}

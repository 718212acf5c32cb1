/// Sensor node: collects captured addresses and relays them over the radio.
///
/// The sniffer callback feeds a [`CaptureMailbox`] through
/// [`capture_frame`](crate::capture::capture_frame). The platform main loop
/// calls [`SensorNode::poll`] which moves queued addresses into the batch,
/// flushes when the batch fills, and forces a flush once the flush interval
/// has passed without one.
use core::fmt::Debug;

use crate::batch::{BatchBuffer, Insert};
use crate::capture::CaptureMailbox;
use crate::config::RelayConfig;
use crate::defaults::{BATCH_CAPACITY, WIFI_CHANNELS};
use crate::packet::encode;
use crate::radio::{RadioTx, RelayError};

// ── Channel hopping ──────────────────────────────────────────────────

/// Sets the WiFi channel the sniffer listens on.
pub trait ChannelTuner {
    type Error: Debug;

    fn set_channel(&mut self, channel: u8) -> Result<(), Self::Error>;
}

/// Cycles through a channel list, moving on once the dwell time is up.
#[derive(Debug, Clone)]
pub struct ChannelHopper {
    channels: &'static [u8],
    index: usize,
    dwell_ms: u64,
    last_hop_ms: u64,
}

impl ChannelHopper {
    pub const fn new(channels: &'static [u8], dwell_ms: u64) -> Self {
        Self {
            channels,
            index: 0,
            dwell_ms,
            last_hop_ms: 0,
        }
    }

    /// Channel currently tuned, `None` for an empty channel list.
    pub fn current(&self) -> Option<u8> {
        self.channels.get(self.index).copied()
    }

    /// Advance to the next channel unconditionally, wrapping at the end.
    pub fn advance<T: ChannelTuner>(
        &mut self,
        tuner: &mut T,
        now_ms: u64,
    ) -> Result<Option<u8>, T::Error> {
        if self.channels.is_empty() {
            return Ok(None);
        }
        self.index = (self.index + 1) % self.channels.len();
        let channel = self.channels[self.index];
        tuner.set_channel(channel)?;
        self.last_hop_ms = now_ms;
        Ok(Some(channel))
    }

    /// Advance if the dwell time has elapsed; returns the new channel.
    pub fn tick<T: ChannelTuner>(
        &mut self,
        tuner: &mut T,
        now_ms: u64,
    ) -> Result<Option<u8>, T::Error> {
        if now_ms.saturating_sub(self.last_hop_ms) < self.dwell_ms {
            return Ok(None);
        }
        self.advance(tuner, now_ms)
    }
}

impl Default for ChannelHopper {
    fn default() -> Self {
        Self::new(WIFI_CHANNELS, crate::defaults::CHANNEL_DWELL_MS)
    }
}

// ── Sensor node ──────────────────────────────────────────────────────

/// What one flush sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    pub records: usize,
    pub packets: usize,
    /// Identifier stamped on every packet of the chain
    pub unique_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing to send yet
    Idle,
    Flushed(FlushReport),
    /// Watchdog expired on an empty batch; timer reset, nothing sent
    Quiet,
    /// Another flush holds the guard
    Busy,
}

pub struct SensorNode<const N: usize = BATCH_CAPACITY> {
    config: RelayConfig,
    batch: BatchBuffer<N>,
    next_id: u32,
    last_flush_ms: u64,
    hopper: ChannelHopper,
}

impl<const N: usize> SensorNode<N> {
    pub fn new(config: RelayConfig, now_ms: u64) -> Self {
        Self {
            batch: BatchBuffer::with_capacity(config.batch_capacity),
            hopper: ChannelHopper::new(WIFI_CHANNELS, config.channel_dwell_ms),
            config,
            next_id: 0,
            last_flush_ms: now_ms,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn batch(&self) -> &BatchBuffer<N> {
        &self.batch
    }

    pub fn last_flush_ms(&self) -> u64 {
        self.last_flush_ms
    }

    /// Move queued addresses into the batch and flush if it filled up or
    /// the flush interval expired.
    ///
    /// Takes at most `Q` addresses per call so a busy callback cannot hold
    /// off the interval check.
    pub fn poll<R: RadioTx, const Q: usize>(
        &mut self,
        mailbox: &CaptureMailbox<Q>,
        radio: &mut R,
        now_ms: u64,
    ) -> Result<PollOutcome, RelayError<R::Error>> {
        for _ in 0..Q {
            let Some(measurement) = mailbox.take() else {
                break;
            };
            match self.batch.try_insert(measurement) {
                Insert::Stored => log::debug!("Unique mac: {}", measurement),
                Insert::Full => {
                    log::debug!("Unique mac: {}", measurement);
                    // Anything still queued waits for the next poll
                    return self.flush(mailbox, radio, now_ms);
                }
                Insert::Duplicate => {}
                Insert::Rejected => log::warn!("Batch full, dropping {}", measurement),
            }
        }

        if now_ms.saturating_sub(self.last_flush_ms) >= self.config.flush_interval_ms {
            log::debug!("Flush interval expired with {} buffered", self.batch.len());
            return self.flush(mailbox, radio, now_ms);
        }
        Ok(PollOutcome::Idle)
    }

    /// Send the whole batch as one chain and reset the flush timer.
    ///
    /// Captures arriving while this runs are dropped by the mailbox. An
    /// encode error leaves the batch in place. On a transmit failure the
    /// rest of the chain is abandoned and the batch is cleared.
    pub fn flush<R: RadioTx, const Q: usize>(
        &mut self,
        mailbox: &CaptureMailbox<Q>,
        radio: &mut R,
        now_ms: u64,
    ) -> Result<PollOutcome, RelayError<R::Error>> {
        let Some(_guard) = mailbox.begin_flush() else {
            return Ok(PollOutcome::Busy);
        };
        self.last_flush_ms = now_ms;

        if self.batch.is_empty() {
            return Ok(PollOutcome::Quiet);
        }

        let unique_id = self.next_id;
        let chain = encode(
            self.batch.as_slice(),
            self.config.device,
            self.config.gateway,
            self.config.payload_ceiling,
        )?
        .with_unique_id(unique_id);

        let packets = chain.len();
        let mut failed = None;
        for packet in chain {
            if packet.header.flags.chained {
                log::info!("Writing chained packet, with payload size of {}", packet.size());
            } else {
                log::info!("Writing non-chained packet, with payload size of {}", packet.size());
            }
            log::debug!("{}", packet);
            if let Err(e) = radio.transmit(&packet.to_bytes()) {
                log::error!("Transmit failed on chain packet {}: {:?}", packet.header.chain_no, e);
                failed = Some(e);
                break;
            }
        }

        let records = self.batch.drain().len();
        self.next_id = self.next_id.wrapping_add(1);
        if let Some(e) = failed {
            return Err(RelayError::Radio(e));
        }

        Ok(PollOutcome::Flushed(FlushReport {
            records,
            packets,
            unique_id,
        }))
    }

    /// Hop to the next WiFi channel once the dwell time is up.
    pub fn hop<T: ChannelTuner>(
        &mut self,
        tuner: &mut T,
        now_ms: u64,
    ) -> Result<Option<u8>, T::Error> {
        self.hopper.tick(tuner, now_ms)
    }

    pub fn channel(&self) -> Option<u8> {
        self.hopper.current()
    }
}

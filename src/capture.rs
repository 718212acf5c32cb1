/// Hand-off between the sniffer callback and the flush routine.
///
/// The callback never touches the batch buffer. It dissects the frame and
/// offers the originator address to a bounded mailbox with `try_send`;
/// the sensor loop drains the mailbox into its [`BatchBuffer`]. While a
/// flush holds the [`FlushGuard`], offers are dropped rather than queued.
///
/// [`BatchBuffer`]: crate::batch::BatchBuffer
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::config::{CaptureFilter, SharedFilter};
use crate::defaults::MAILBOX_DEPTH;
use crate::dot11::{dissect, LinkFrame};
use crate::packet::Measurement;

/// What happened to one captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// Address queued for the next poll
    Queued(Measurement),
    /// Dropped: a flush is in progress
    Flushing,
    /// Dropped: mailbox full
    Overflow,
    /// Frame class excluded by the capture filter
    Filtered,
    /// Frame carries no identity (extension frames)
    NoIdentity,
    /// Frame shorter than its class header
    Truncated,
}

/// Bounded single-consumer queue of captured addresses, the
/// flush-in-progress flag and the capture filter the callback applies.
pub struct CaptureMailbox<const Q: usize = MAILBOX_DEPTH> {
    queue: Channel<CriticalSectionRawMutex, Measurement, Q>,
    flushing: AtomicBool,
    dropped: AtomicU32,
    filter: SharedFilter,
}

impl<const Q: usize> CaptureMailbox<Q> {
    /// Mailbox passing management frames only.
    pub const fn new() -> Self {
        Self::with_filter(CaptureFilter::MANAGEMENT_ONLY)
    }

    /// Usable in a `static`, e.g. with `RelayConfig::new().capture`.
    pub const fn with_filter(filter: CaptureFilter) -> Self {
        Self {
            queue: Channel::new(),
            flushing: AtomicBool::new(false),
            dropped: AtomicU32::new(0),
            filter: SharedFilter::new(filter),
        }
    }

    pub fn filter(&self) -> CaptureFilter {
        self.filter.get()
    }

    /// Change which frame classes the callback forwards from now on.
    pub fn set_filter(&self, filter: CaptureFilter) {
        self.filter.set(filter);
    }

    /// Queue a measurement unless a flush is running or the queue is full.
    ///
    /// Non-blocking; safe from the sniffer callback.
    pub fn offer(&self, measurement: Measurement) -> Capture {
        if self.is_flushing() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return Capture::Flushing;
        }
        match self.queue.try_send(measurement) {
            Ok(()) => Capture::Queued(measurement),
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Capture::Overflow
            }
        }
    }

    /// Next queued measurement, if any.
    pub fn take(&self) -> Option<Measurement> {
        self.queue.try_receive().ok()
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::Acquire)
    }

    /// Mark a flush as running until the returned guard is dropped.
    ///
    /// Returns `None` if another flush already holds the guard.
    pub fn begin_flush(&self) -> Option<FlushGuard<'_, Q>> {
        self.flushing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlushGuard { mailbox: self })
    }

    /// Measurements discarded since boot (flushing or overflow).
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<const Q: usize> Default for CaptureMailbox<Q> {
    fn default() -> Self {
        Self::new()
    }
}

/// Held for the duration of one flush; releases the flag on drop.
pub struct FlushGuard<'a, const Q: usize> {
    mailbox: &'a CaptureMailbox<Q>,
}

impl<const Q: usize> Drop for FlushGuard<'_, Q> {
    fn drop(&mut self) {
        self.mailbox.flushing.store(false, Ordering::Release);
    }
}

/// Sniffer callback body: filter, dissect, offer.
///
/// Checks the flush flag first so frames arriving mid-flush cost nothing.
pub fn capture_frame<const Q: usize>(
    mailbox: &CaptureMailbox<Q>,
    frame: &LinkFrame<'_>,
) -> Capture {
    if mailbox.is_flushing() {
        mailbox.dropped.fetch_add(1, Ordering::Relaxed);
        return Capture::Flushing;
    }
    if !mailbox.filter().allows(frame.class) {
        return Capture::Filtered;
    }
    match dissect(frame) {
        Ok(Some(identity)) => mailbox.offer(Measurement(identity.originator)),
        Ok(None) => Capture::NoIdentity,
        Err(_) => Capture::Truncated,
    }
}

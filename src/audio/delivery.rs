//! Bounded FIFO hand-off of processed windows from the capture thread to
//! the playback thread.
//!
//! Neither side is allowed to block on the other: a stalled playback side
//! drops windows rather than stalling capture, and an empty queue is an
//! underrun that plays as silence.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

/// Create the delivery queue for `window`-sample buffers.
///
/// `underruns` is bumped once for every consumer-side empty read; sharing
/// the counter lets the pipeline report the session total after shutdown.
pub fn window_queue(
    window: usize,
    capacity: usize,
    underruns: Arc<AtomicU64>,
) -> (WindowSender, OutputTap) {
    let (tx, rx) = mpsc::channel(capacity);
    let tap = OutputTap {
        rx,
        silence: vec![0i16; window],
        current: Vec::new(),
        underruns,
    };
    (WindowSender { tx }, tap)
}

/// Producer side, owned by the capture thread.
pub struct WindowSender {
    tx: mpsc::Sender<Vec<i16>>,
}

impl WindowSender {
    /// Queue one processed window for playback without blocking.
    ///
    /// A full queue means the playback side has stalled; the window is
    /// dropped with a warning so capture keeps its cadence. Returns false
    /// once the playback side has gone away.
    pub fn send(&self, window: Vec<i16>) -> bool {
        match self.tx.try_send(window) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!("Delivery queue full, dropping a window");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// One playback period's worth of samples, or what stands in for it.
pub enum Feed<'a> {
    /// The next processed window, in capture order.
    Window(&'a [i16]),
    /// Queue was empty (underrun); play this pre-built silence instead.
    Silence(&'a [i16]),
    /// The capture side has shut down.
    Closed,
}

/// Consumer side, owned by the playback thread.
///
/// `next_window` sits on the device-paced path, so it never blocks,
/// allocates, or logs; underruns are only counted here and reported by the
/// caller off the hand-off itself.
pub struct OutputTap {
    rx: mpsc::Receiver<Vec<i16>>,
    silence: Vec<i16>,
    current: Vec<i16>,
    underruns: Arc<AtomicU64>,
}

impl OutputTap {
    /// Pull the next window for a period of `frames` samples.
    ///
    /// `frames` must equal the configured window size. The device period is
    /// negotiated to match at open, so a mismatch here is a configuration
    /// error and fatal.
    pub fn next_window(&mut self, frames: usize) -> Result<Feed<'_>> {
        anyhow::ensure!(
            frames == self.silence.len(),
            "Device requested {} frames per period, configured window is {}",
            frames,
            self.silence.len(),
        );
        match self.rx.try_recv() {
            Ok(window) => {
                self.current = window;
                Ok(Feed::Window(&self.current))
            }
            Err(TryRecvError::Empty) => {
                self.underruns.fetch_add(1, Ordering::Relaxed);
                Ok(Feed::Silence(&self.silence))
            }
            Err(TryRecvError::Disconnected) => Ok(Feed::Closed),
        }
    }
}

//! audio - Real-time microphone dynamic-range compression
//!
//! Captures mono S16LE from an ALSA device and plays it back compressed,
//! window by window, through a second ALSA device. Capture and playback run
//! on their own threads, joined by a bounded delivery queue that trades
//! dropped or silent windows for glitch-free cadence.

mod alsa_device;
mod codec;
mod compressor;
mod delivery;
mod pipeline;

pub use pipeline::Pipeline;

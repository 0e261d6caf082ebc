//! The processing pipeline: capture, compression, and playback threads.
//!
//! Real-time audio I/O runs on dedicated std::thread workers, not tokio
//! tasks; the async runtime only supervises startup, shutdown, and fault
//! reporting.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, SendError, SyncSender};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use super::alsa_device;
use super::codec;
use super::compressor::Compressor;
use super::delivery::{self, Feed, OutputTap, WindowSender};
use crate::config::Config;

// Steady state holds one window; the extra slots absorb scheduling jitter
// without adding audible latency.
const QUEUE_WINDOWS: usize = 4;

/// The running audio pipeline.
///
/// Owns two threads:
/// - "audio-capture": reads windows from the capture PCM, compresses them,
///   and queues the result for playback
/// - "audio-playback": writes queued windows to the playback PCM, playing
///   silence when the queue runs dry
pub struct Pipeline {
    running: Arc<AtomicBool>,
    capture_handle: Option<JoinHandle<()>>,
    play_handle: Option<JoinHandle<()>>,
    underruns: Arc<AtomicU64>,
    fault_rx: mpsc::Receiver<()>,
    _fault_tx: mpsc::Sender<()>,
}

impl Pipeline {
    /// Start both audio threads.
    ///
    /// Does not return until the capture side has queued its first
    /// processed window and the playback device is open, so by the time
    /// this resolves the pipeline is actually flowing.
    pub fn start(config: Config) -> Result<Self> {
        anyhow::ensure!(config.window > 0, "window size must be non-zero");

        let running = Arc::new(AtomicBool::new(true));
        let underruns = Arc::new(AtomicU64::new(0));
        let (window_tx, tap) = delivery::window_queue(config.window, QUEUE_WINDOWS, underruns.clone());
        let (fault_tx, fault_rx) = mpsc::channel(1);

        log::info!(
            "Pipeline starting: capture=\"{}\", playback=\"{}\", rate={}Hz, window={} samples",
            config.capture_device,
            config.playback_device,
            config.sample_rate,
            config.window,
        );

        // The capture thread reports readiness only after its first window
        // is queued, which primes the playback side against an immediate
        // underrun.
        let (primed_tx, primed_rx) = std::sync::mpsc::sync_channel::<Result<()>>(1);
        let capture_handle = {
            let config = config.clone();
            let running = running.clone();
            let fault_tx = fault_tx.clone();
            thread::Builder::new()
                .name("audio-capture".to_string())
                .spawn(move || {
                    if let Err(e) = capture_loop(&config, &window_tx, &primed_tx, &running) {
                        running.store(false, Ordering::SeqCst);
                        let _ = fault_tx.try_send(());
                        report_thread_error("Capture", e, &primed_tx);
                    }
                })
                .context("Failed to spawn capture thread")?
        };

        if let Err(e) = wait_ready(&primed_rx) {
            running.store(false, Ordering::SeqCst);
            let _ = capture_handle.join();
            return Err(e.context("capture thread failed to start"));
        }

        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel::<Result<()>>(1);
        let play_handle = {
            let config = config.clone();
            let running = running.clone();
            let fault_tx = fault_tx.clone();
            thread::Builder::new()
                .name("audio-playback".to_string())
                .spawn(move || {
                    if let Err(e) = playback_loop(&config, tap, &ready_tx, &running) {
                        running.store(false, Ordering::SeqCst);
                        let _ = fault_tx.try_send(());
                        report_thread_error("Playback", e, &ready_tx);
                    }
                })
                .context("Failed to spawn playback thread")?
        };

        if let Err(e) = wait_ready(&ready_rx) {
            running.store(false, Ordering::SeqCst);
            let _ = capture_handle.join();
            let _ = play_handle.join();
            return Err(e.context("playback thread failed to start"));
        }

        Ok(Self {
            running,
            capture_handle: Some(capture_handle),
            play_handle: Some(play_handle),
            underruns,
            fault_rx,
            _fault_tx: fault_tx,
        })
    }

    /// Stop both threads and wait for them to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_handle.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.play_handle.take() {
            let _ = handle.join();
        }
    }

    /// Resolves if either audio thread dies unexpectedly.
    ///
    /// Stays pending for as long as the pipeline is healthy; the sender
    /// half held by `self` keeps the channel open.
    pub async fn failed(&mut self) {
        let _ = self.fault_rx.recv().await;
    }

    /// Total playback underruns observed so far.
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

fn wait_ready(rx: &Receiver<Result<()>>) -> Result<()> {
    match rx.recv() {
        Ok(result) => result,
        Err(_) => anyhow::bail!("thread exited before reporting readiness"),
    }
}

/// Hand a thread's error to start() while it is still waiting on the
/// readiness handshake; after that the receiver is gone and the error is
/// logged here instead.
fn report_thread_error(side: &str, err: anyhow::Error, handshake: &SyncSender<Result<()>>) {
    if let Err(SendError(result)) = handshake.send(Err(err)) {
        if let Err(err) = result {
            log::error!("{} thread error: {:#}", side, err);
        }
    }
}

// ======================== Capture thread ========================

fn capture_loop(
    config: &Config,
    windows: &WindowSender,
    primed: &SyncSender<Result<()>>,
    running: &AtomicBool,
) -> Result<()> {
    // 1. Open ALSA capture device
    let (pcm, params) =
        alsa_device::open_capture(config.capture_device, config.sample_rate, config.window)?;
    let io = pcm.io_i16()?;

    // 2. Build the compressor from the configured tuning
    let mut compressor = Compressor::new(
        config.threshold_db,
        config.ratio,
        config.postgain_db,
        config.smooth,
        config.limit_db,
    );
    compressor.set_enabled(config.compressor_enabled);

    // ALSA may hand back less than a full period per read, so reads are
    // accumulated until a whole window is available.
    let window = config.window;
    let mut accum_buf: Vec<i16> = Vec::with_capacity(window * 2);
    let mut read_buf = vec![0i16; window];
    let mut primed_sent = false;

    log::info!(
        "Capture started: rate={}, window={}, compressor={}",
        params.sample_rate,
        window,
        if compressor.is_enabled() { "on" } else { "bypass" },
    );

    while running.load(Ordering::Relaxed) {
        match io.readi(&mut read_buf) {
            Ok(frames) => {
                accum_buf.extend_from_slice(&read_buf[..frames]);
                while accum_buf.len() >= window {
                    let mut samples = codec::decode(&accum_buf[..window]);
                    compressor.process(&mut samples);
                    if !windows.send(codec::encode(&samples)) {
                        log::info!("Playback side closed, stopping capture");
                        return Ok(());
                    }
                    accum_buf.drain(..window);
                    if !primed_sent {
                        // First window is queued; let start() release playback.
                        let _ = primed.send(Ok(()));
                        primed_sent = true;
                    }
                }
            }
            Err(e) => {
                log::warn!("ALSA capture error: {}, recovering...", e);
                pcm.prepare().context("Failed to recover PCM capture")?;
            }
        }
    }

    log::info!("Capture stopped");
    Ok(())
}

// ======================== Playback thread ========================

fn playback_loop(
    config: &Config,
    mut tap: OutputTap,
    ready: &SyncSender<Result<()>>,
    running: &AtomicBool,
) -> Result<()> {
    // 1. Open ALSA playback device
    let (pcm, params) =
        alsa_device::open_playback(config.playback_device, config.sample_rate, config.window)?;
    let io = pcm.io_i16()?;
    let period = params.period_size;

    // Device is up; report readiness so start() can return.
    let _ = ready.send(Ok(()));
    log::info!("Playback started: rate={}, period={}", params.sample_rate, period);

    while running.load(Ordering::Relaxed) {
        // 2. Take the next window, or silence on underrun
        let window: &[i16] = match tap.next_window(period)? {
            Feed::Window(w) => w,
            Feed::Silence(w) => {
                log::warn!("Underrun: no processed window ready, playing silence");
                w
            }
            Feed::Closed => {
                log::info!("Capture side closed, stopping playback");
                break;
            }
        };

        // 3. Write the full window, retrying across short writes
        let mut written = 0;
        while written < window.len() {
            match io.writei(&window[written..]) {
                Ok(frames) => written += frames,
                Err(e) => {
                    log::warn!("ALSA playback error: {}, recovering...", e);
                    pcm.prepare().context("Failed to recover PCM playback")?;
                }
            }
        }
    }

    log::info!("Playback stopped");
    Ok(())
}

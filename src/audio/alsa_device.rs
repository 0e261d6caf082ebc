//! ALSA PCM device wrappers for audio capture and playback.
//!
//! The stream format is pinned: S16LE, mono, interleaved access, with the
//! device period matched to the processing window. Negotiation results are
//! verified rather than silently accepted, since the rest of the pipeline
//! assumes exactly one window per period.

use alsa::pcm::{Access, Format, Frames, HwParams, PCM};
use alsa::{Direction, ValueOr};
use anyhow::{Context, Result};

/// Parameters negotiated with the ALSA hardware.
#[derive(Debug, Clone)]
pub struct AlsaParams {
    /// Actual sample rate after negotiation
    pub sample_rate: u32,
    /// Period size in frames (mono, so one frame = one sample)
    pub period_size: usize,
}

/// Open a PCM device for capture (recording).
pub fn open_capture(device: &str, sample_rate: u32, window: usize) -> Result<(PCM, AlsaParams)> {
    open_pcm(device, Direction::Capture, sample_rate, window, "Capture")
}

/// Open a PCM device for playback.
///
/// The playback buffer is sized to two periods and the start threshold to
/// one, so output begins as soon as the first processed window is written.
pub fn open_playback(device: &str, sample_rate: u32, window: usize) -> Result<(PCM, AlsaParams)> {
    open_pcm(device, Direction::Playback, sample_rate, window, "Playback")
}

fn open_pcm(
    device: &str,
    direction: Direction,
    sample_rate: u32,
    window: usize,
    dir_name: &str,
) -> Result<(PCM, AlsaParams)> {
    let pcm = PCM::new(device, direction, false)
        .with_context(|| format!("Failed to open PCM device '{}' for {}", device, dir_name))?;

    // Configure hardware parameters
    {
        let hwp = HwParams::any(&pcm).with_context(|| "Failed to initialize HwParams")?;
        hwp.set_access(Access::RWInterleaved)?;
        hwp.set_format(Format::S16LE)?;
        hwp.set_channels(1)?;
        hwp.set_rate_near(sample_rate, ValueOr::Nearest)?;
        hwp.set_period_size_near(window as Frames, ValueOr::Nearest)?;
        if matches!(direction, Direction::Playback) {
            hwp.set_buffer_size_near((window * 2) as Frames)?;
        }
        pcm.hw_params(&hwp)?;
    }

    // Read back actual negotiated parameters
    let (actual_rate, actual_period, actual_buffer) = {
        let hwp = pcm.hw_params_current()?;
        let rate = hwp.get_rate()?;
        let ps = hwp.get_period_size()? as usize;
        let bs = hwp.get_buffer_size()? as usize;
        (rate, ps, bs)
    };

    anyhow::ensure!(
        actual_rate == sample_rate,
        "{} device '{}' negotiated {}Hz instead of the required {}Hz",
        dir_name,
        device,
        actual_rate,
        sample_rate,
    );
    anyhow::ensure!(
        actual_period == window,
        "{} device '{}' negotiated a period of {} frames instead of the required {}",
        dir_name,
        device,
        actual_period,
        window,
    );

    if matches!(direction, Direction::Playback) {
        // Start as soon as the first period is queued.
        let swp = pcm.sw_params_current()?;
        swp.set_start_threshold(window as Frames)?;
        pcm.sw_params(&swp)?;
    }

    let params = AlsaParams {
        sample_rate: actual_rate,
        period_size: actual_period,
    };

    log::info!(
        "ALSA {}: device={}, rate={}, mono S16LE, period={}, buffer={}",
        dir_name,
        device,
        actual_rate,
        actual_period,
        actual_buffer,
    );

    Ok((pcm, params))
}

mod audio;
mod config;

use anyhow::Result;
use audio::Pipeline;
use config::Config;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    // Default to info so underruns and lifecycle lines show without RUST_LOG
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::new().unwrap_or_default();

    let mut pipeline = Pipeline::start(config)?;

    let failed = tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Received Ctrl+C, shutting down...");
            false
        }
        _ = pipeline.failed() => true,
    };

    pipeline.stop();
    let underruns = pipeline.underruns();
    if underruns > 0 {
        log::info!("Session finished with {} underrun(s)", underruns);
    }

    if failed {
        anyhow::bail!("audio pipeline stopped unexpectedly");
    }
    Ok(())
}

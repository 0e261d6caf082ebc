use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    // Audio device configuration
    pub capture_device: &'static str,
    pub playback_device: &'static str,
    pub sample_rate: u32,
    pub window: usize,

    // Compressor tuning
    pub compressor_enabled: bool,
    pub threshold_db: f64,
    pub ratio: f64,
    pub postgain_db: f64,
    pub smooth: f64,
    pub limit_db: f64,
}

impl Config {
    /// Build the configuration from environment variables set at compile time.
    /// All values come from config.toml, read by build.rs.
    pub fn new() -> Result<Self, &'static str> {
        Ok(Self {
            // Audio device configuration
            capture_device: env!("CAPTURE_DEVICE"),
            playback_device: env!("PLAYBACK_DEVICE"),
            sample_rate: env!("SAMPLE_RATE").parse()
                .map_err(|_| "Failed to parse SAMPLE_RATE")?,
            window: env!("WINDOW_SIZE").parse()
                .map_err(|_| "Failed to parse WINDOW_SIZE")?,

            // Compressor tuning
            compressor_enabled: env!("COMPRESSOR_ENABLED").parse()
                .map_err(|_| "Failed to parse COMPRESSOR_ENABLED")?,
            threshold_db: env!("COMPRESSOR_THRESHOLD_DB").parse()
                .map_err(|_| "Failed to parse COMPRESSOR_THRESHOLD_DB")?,
            ratio: env!("COMPRESSOR_RATIO").parse()
                .map_err(|_| "Failed to parse COMPRESSOR_RATIO")?,
            postgain_db: env!("COMPRESSOR_POSTGAIN_DB").parse()
                .map_err(|_| "Failed to parse COMPRESSOR_POSTGAIN_DB")?,
            smooth: env!("COMPRESSOR_SMOOTH").parse()
                .map_err(|_| "Failed to parse COMPRESSOR_SMOOTH")?,
            limit_db: env!("COMPRESSOR_LIMIT_DB").parse()
                .map_err(|_| "Failed to parse COMPRESSOR_LIMIT_DB")?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new().expect("Failed to create default Config from build-time environment variables")
    }
}

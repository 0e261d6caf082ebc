use std::fs;
use std::path::Path;
use serde::Deserialize;

#[derive(Deserialize)]
struct Config {
    audio: Audio,
    compressor: Compressor,
}

#[derive(Deserialize)]
struct Audio {
    capture_device: String,
    playback_device: String,
    sample_rate: u32,
    window: usize,
}

#[derive(Deserialize)]
struct Compressor {
    enabled: bool,
    threshold_db: f64,
    ratio: f64,
    postgain_db: f64,
    smooth: f64,
    limit_db: f64,
}

// Read config.toml at compile time and bake the values in as env vars
fn main() {
    println!("cargo:rerun-if-changed=config.toml");

    let config_path = Path::new("config.toml");
    if !config_path.exists() {
        panic!("config.toml not found!");
    }

    let config_str = fs::read_to_string(config_path).expect("Failed to read config.toml");
    let config: Config = toml::from_str(&config_str).expect("Failed to parse config.toml");

    // Audio device configuration
    println!("cargo:rustc-env=CAPTURE_DEVICE={}", config.audio.capture_device);
    println!("cargo:rustc-env=PLAYBACK_DEVICE={}", config.audio.playback_device);
    println!("cargo:rustc-env=SAMPLE_RATE={}", config.audio.sample_rate);
    println!("cargo:rustc-env=WINDOW_SIZE={}", config.audio.window);

    // Compressor tuning
    println!("cargo:rustc-env=COMPRESSOR_ENABLED={}", config.compressor.enabled);
    println!("cargo:rustc-env=COMPRESSOR_THRESHOLD_DB={}", config.compressor.threshold_db);
    println!("cargo:rustc-env=COMPRESSOR_RATIO={}", config.compressor.ratio);
    println!("cargo:rustc-env=COMPRESSOR_POSTGAIN_DB={}", config.compressor.postgain_db);
    println!("cargo:rustc-env=COMPRESSOR_SMOOTH={}", config.compressor.smooth);
    println!("cargo:rustc-env=COMPRESSOR_LIMIT_DB={}", config.compressor.limit_db);
}

//! Raw S16LE ↔ normalized float sample conversion.

/// Decode raw signed 16-bit samples to normalized floats in [-1.0, 1.0).
pub fn decode(raw: &[i16]) -> Vec<f32> {
    raw.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// Encode normalized floats back to signed 16-bit samples.
///
/// Each sample is rounded, then clamped to the i16 range. The scaling is
/// asymmetric with `decode` (/32768 in, *32767 out), so a round trip may
/// land one LSB low in magnitude. Makeup gain can push samples slightly
/// past full scale; narrowing without the clamp would wrap.
pub fn encode(normalized: &[f32]) -> Vec<i16> {
    normalized
        .iter()
        .map(|&s| {
            (s as f64 * 32767.0)
                .round()
                .clamp(i16::MIN as f64, i16::MAX as f64) as i16
        })
        .collect()
}

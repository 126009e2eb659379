use crate::config::Settings;
use crate::decode::COLOR_SUBCARRIER_MHZ;
use crate::error::DecodeError;

/// Every timing base the decoder needs, derived from the sampling interval
/// and the crop settings. Recomputed as a whole whenever either changes;
/// there is no valid partially-updated state.
///
/// Rough scanline timings from hsync start:
/// sync length 4.3 us, colorburst area ends 9.0 us, visible area ends
/// 61.9 us, scanline ends 63.5556 us.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeParameters {
    /// Sampling interval in nanoseconds.
    pub interval_ns: i64,
    /// Scanline length in samples, approximate. 1s / 29.97 / 525 = 63.5556 us.
    pub scanline_w: usize,
    /// A pulse run longer than this belongs to a normal active scanline.
    pub screen_width: usize,
    /// Run length separating the long vertical-blanking pulses from short ones.
    pub long_pulse: usize,
    /// Color burst window, as offsets from hsync start.
    pub burst_start: usize,
    pub burst_len: usize,
    /// Length of a single color subcarrier period in samples.
    pub f_wavelength: f32,
    pub i_wavelength: usize,
    /// Running-average window sizes; before + after = i_wavelength - 1.
    pub wave_before: usize,
    pub wave_after: usize,
    /// Horizontal crop in samples and vertical crop in scanlines.
    pub crop_left: usize,
    pub copy_width: usize,
    pub crop_top: usize,
    pub crop_bottom: usize,
}

fn ns_to_samples(ns: f64, interval_ns: i64) -> usize {
    (ns / interval_ns as f64).round() as usize
}

impl DecodeParameters {
    /// Derive all decode parameters for a sampling interval and crop
    /// configuration. Fails fast on a non-positive interval, since every
    /// timing base divides by it.
    pub fn derive(interval_ns: i64, settings: &Settings) -> Result<Self, DecodeError> {
        if interval_ns <= 0 {
            return Err(DecodeError::InvalidInterval(interval_ns));
        }

        let scanline_w = ns_to_samples(63556.0, interval_ns);
        if scanline_w == 0 {
            return Err(DecodeError::InvalidInterval(interval_ns));
        }

        let f_wavelength = 1000.0 / COLOR_SUBCARRIER_MHZ / interval_ns as f32;
        let i_wavelength = (f_wavelength + 0.5) as usize;
        if i_wavelength < 2 {
            // The subcarrier is unresolvable at this interval.
            return Err(DecodeError::InvalidInterval(interval_ns));
        }
        let wave_before = i_wavelength / 2;
        let wave_after = i_wavelength - wave_before - 1;

        let crop_left = scanline_w * settings.crop_left as usize / 100;
        let crop_right = scanline_w * settings.crop_right as usize / 100;
        let copy_width = scanline_w.saturating_sub(crop_left + crop_right);

        Ok(Self {
            interval_ns,
            scanline_w,
            screen_width: ns_to_samples(58000.0, interval_ns),
            long_pulse: ns_to_samples(15000.0, interval_ns),
            burst_start: ns_to_samples(5300.0, interval_ns),
            burst_len: ns_to_samples(2500.0, interval_ns),
            f_wavelength,
            i_wavelength,
            wave_before,
            wave_after,
            crop_left,
            copy_width,
            crop_top: settings.crop_top as usize,
            crop_bottom: settings.crop_bottom as usize,
        })
    }
}

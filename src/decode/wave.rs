use crate::decode::{DecodeParameters, WAVE_SCALE};
use crate::types::PI;

/// Precomputed reference subcarrier waveforms in .8 fixed point: one at 0°
/// phase and one shifted by 90°, both sampled at the configured interval.
/// Immutable once built; only a sampling-interval change invalidates them.
///
/// The demodulator indexes these relative to a scanline start minus the
/// best-fit phase shift, which can reach slightly negative offsets during
/// running-average seeding, so both tables carry one extra wavelength of
/// lead-in below index zero.
pub struct ReferenceWaveform {
    in_phase: Vec<i32>,
    quadrature: Vec<i32>,
    lead_in: usize,
}

impl ReferenceWaveform {
    pub fn new(params: &DecodeParameters) -> Self {
        let lead_in = params.i_wavelength;
        let len = 2 * params.scanline_w + lead_in;
        let mut in_phase = Vec::with_capacity(len);
        let mut quadrature = Vec::with_capacity(len);

        for i in 0..len {
            let t = (i as f32 - lead_in as f32) * 2.0 * PI / params.f_wavelength;
            in_phase.push((WAVE_SCALE as f32 * t.sin()) as i32);
            quadrature.push((WAVE_SCALE as f32 * (t - PI / 2.0).sin()) as i32);
        }

        Self {
            in_phase,
            quadrature,
            lead_in,
        }
    }

    /// 0° reference value at a (possibly slightly negative) sample offset.
    #[inline]
    pub fn i_at(&self, idx: isize) -> i32 {
        self.in_phase[(idx + self.lead_in as isize) as usize]
    }

    /// 90° reference value at a (possibly slightly negative) sample offset.
    #[inline]
    pub fn q_at(&self, idx: isize) -> i32 {
        self.quadrature[(idx + self.lead_in as isize) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    #[test]
    fn waveforms_are_quadrature_shifted() {
        let params = DecodeParameters::derive(8, &Settings::default()).unwrap();
        let waves = ReferenceWaveform::new(&params);
        let quarter = (params.f_wavelength / 4.0).round() as isize;

        // sin(t - pi/2) lags the 0-degree wave by a quarter period.
        for idx in 0..200 {
            let diff = (waves.q_at(idx + quarter) - waves.i_at(idx)).abs();
            assert!(diff <= 24, "offset {idx}: diff {diff}");
        }
    }

    #[test]
    fn lead_in_covers_negative_offsets() {
        let params = DecodeParameters::derive(64, &Settings::default()).unwrap();
        let waves = ReferenceWaveform::new(&params);
        let _ = waves.i_at(-(params.i_wavelength as isize));
        let _ = waves.q_at(2 * params.scanline_w as isize - 1);
    }
}

use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::Settings;
use crate::decode::COLOR_SUBCARRIER_MHZ;
use crate::error::DecodeError;
use crate::types::{Sample, PI};

/// One acquisition: the captured samples plus the device's overflow flag.
/// An overflowed capture invalidates the whole batch.
pub struct Capture {
    pub samples: Vec<Sample>,
    pub overflow: bool,
}

/// Anything that can deliver a buffer of composite-video voltage samples at
/// the session's sampling interval.
pub trait SampleSource {
    fn capture(&mut self) -> Result<Capture, DecodeError>;
}

// Signal levels for the synthesized composite waveform, roughly matching an
// amplified capture: sync tips well below everything else, blanking below
// the darkest active video.
const SYNC_LEVEL: i32 = -12000;
const BLANK_LEVEL: i32 = -2000;
const BURST_AMP: f32 = 2000.0;
const LUMA_SWING: f32 = 10000.0;
const CHROMA_SWING: f32 = 6000.0;

// Scanline timing in nanoseconds from hsync start.
const SYNC_END_NS: f64 = 4700.0;
const BURST_START_NS: f64 = 5300.0;
const BURST_END_NS: f64 = 7800.0;
const ACTIVE_START_NS: f64 = 9000.0;
const ACTIVE_END_NS: f64 = 61900.0;
const LINE_NS: f64 = 63556.0;

/// A [`SampleSource`] that synthesizes the composite signal for an RGB
/// image: hsync and vertical-blanking structure, color burst, and
/// quadrature-modulated chroma, 1.5 frames worth per capture so two whole
/// fields always fit. Stands in for the acquisition device and doubles as
/// the test harness input.
pub struct SyntheticSource {
    base: Vec<Sample>,
    noise: f32,
    rng: StdRng,
}

impl SyntheticSource {
    /// Build a source from the session settings: the configured image file,
    /// or built-in color bars when none is set.
    pub fn new(interval_ns: i64, settings: &Settings) -> Result<Self, DecodeError> {
        let (width, height, rgb) = match &settings.source_image {
            Some(path) => load_image(path)?,
            None => color_bars(),
        };
        Self::from_rgb(interval_ns, settings.noise, width, height, &rgb)
    }

    pub fn from_rgb(
        interval_ns: i64,
        noise: f32,
        width: usize,
        height: usize,
        rgb: &[u8],
    ) -> Result<Self, DecodeError> {
        if interval_ns <= 0 {
            return Err(DecodeError::InvalidInterval(interval_ns));
        }

        let mut enc = Encoder {
            samples: Vec::new(),
            interval_ns: interval_ns as f64,
            wavelength: 1000.0 / COLOR_SUBCARRIER_MHZ / interval_ns as f32,
            line_len: (LINE_NS / interval_ns as f64).round() as usize,
            width,
            height,
            rgb,
        };

        // Lead-in so the scanner sees a normal line before the first
        // vertical blanking interval, then two fields and a trailing
        // blanking interval that terminates the second one.
        enc.blank_lines(2);
        enc.vblank(7);
        enc.active_field(0);
        enc.vblank(6);
        enc.active_field(1);
        enc.vblank(7);
        enc.blank_lines(2);

        Ok(Self {
            base: enc.samples,
            noise,
            rng: StdRng::seed_from_u64(0xC0FFEE),
        })
    }
}

impl SampleSource for SyntheticSource {
    fn capture(&mut self) -> Result<Capture, DecodeError> {
        let mut samples = self.base.clone();
        if self.noise > 0.0 {
            let amp = self.noise * LUMA_SWING;
            for s in &mut samples {
                let jitter = (self.rng.gen_range(-1.0f32..1.0) * amp) as i32;
                *s = (*s as i32 + jitter).clamp(i16::MIN as i32, i16::MAX as i32) as Sample;
            }
        }
        Ok(Capture {
            samples,
            overflow: false,
        })
    }
}

struct Encoder<'a> {
    samples: Vec<Sample>,
    interval_ns: f64,
    wavelength: f32,
    line_len: usize,
    width: usize,
    height: usize,
    rgb: &'a [u8],
}

impl Encoder<'_> {
    fn push_run(&mut self, level: i32, duration_ns: f64) {
        let n = (duration_ns / self.interval_ns).round() as usize;
        let start = self.samples.len();
        for k in 0..n {
            // One code of dither on sync tips keeps the data-driven
            // threshold estimate just above the tip level.
            let value = if level == SYNC_LEVEL {
                level + ((start + k) & 1) as i32
            } else {
                level
            };
            self.samples.push(value as Sample);
        }
    }

    fn blank_lines(&mut self, n: usize) {
        for _ in 0..n {
            self.push_run(SYNC_LEVEL, SYNC_END_NS);
            self.push_run(BLANK_LEVEL, LINE_NS - SYNC_END_NS);
        }
    }

    /// One vertical blanking interval producing `longs` long pulses, the
    /// short pulse that ends the count, and a blank line that resumes
    /// normal scanning.
    fn vblank(&mut self, longs: usize) {
        for _ in 0..longs {
            self.push_run(SYNC_LEVEL, SYNC_END_NS);
            self.push_run(BLANK_LEVEL, LINE_NS / 2.0 - SYNC_END_NS);
        }
        self.push_run(SYNC_LEVEL, SYNC_END_NS);
        self.push_run(BLANK_LEVEL, 7000.0);
        self.blank_lines(1);
    }

    /// 253 active lines; one more than the field minimum, since the line
    /// that trips the scanner into its draw state is never emitted.
    fn active_field(&mut self, parity: usize) {
        for line in 0..253 {
            self.active_line(2 * line + parity);
        }
    }

    fn active_line(&mut self, frame_row: usize) {
        let base = self.samples.len();
        for s in 0..self.line_len {
            let t = s as f64 * self.interval_ns;
            let value = if t < SYNC_END_NS {
                SYNC_LEVEL + ((base + s) & 1) as i32
            } else if (BURST_START_NS..BURST_END_NS).contains(&t) {
                let phase = 2.0 * PI * s as f32 / self.wavelength;
                BLANK_LEVEL + (BURST_AMP * phase.sin()) as i32
            } else if (ACTIVE_START_NS..ACTIVE_END_NS).contains(&t) {
                let frac = (t - ACTIVE_START_NS) / (ACTIVE_END_NS - ACTIVE_START_NS);
                let (y, i, q) = self.pixel_yiq(frac, frame_row);
                let phase = 2.0 * PI * s as f32 / self.wavelength;
                (y * LUMA_SWING
                    + i * CHROMA_SWING * phase.sin()
                    + q * CHROMA_SWING * phase.cos()) as i32
            } else {
                BLANK_LEVEL
            };
            self.samples.push(value.clamp(i16::MIN as i32, i16::MAX as i32) as Sample);
        }
    }

    fn pixel_yiq(&self, frac: f64, frame_row: usize) -> (f32, f32, f32) {
        let x = ((frac * self.width as f64) as usize).min(self.width - 1);
        let y = (frame_row * self.height / 504).min(self.height - 1);
        let idx = (y * self.width + x) * 3;
        let r = self.rgb[idx] as f32 / 255.0;
        let g = self.rgb[idx + 1] as f32 / 255.0;
        let b = self.rgb[idx + 2] as f32 / 255.0;

        // https://en.wikipedia.org/wiki/YIQ
        let luma = 0.299 * r + 0.587 * g + 0.114 * b;
        let i = 0.596 * r - 0.274 * g - 0.322 * b;
        let q = 0.211 * r - 0.523 * g + 0.311 * b;
        (luma, i, q)
    }
}

fn load_image(path: &Path) -> Result<(usize, usize, Vec<u8>), DecodeError> {
    let img = image::open(path)
        .map_err(|e| DecodeError::Acquisition(format!("source image {}: {e}", path.display())))?
        .into_rgb8();
    let (w, h) = (img.width() as usize, img.height() as usize);
    Ok((w, h, img.into_raw()))
}

/// Classic eight-bar test pattern.
fn color_bars() -> (usize, usize, Vec<u8>) {
    const BARS: [[u8; 3]; 8] = [
        [235, 235, 235],
        [235, 235, 16],
        [16, 235, 235],
        [16, 235, 16],
        [235, 16, 235],
        [235, 16, 16],
        [16, 16, 235],
        [16, 16, 16],
    ];
    let (width, height) = (640, 480);
    let mut rgb = Vec::with_capacity(width * height * 3);
    for _ in 0..height {
        for x in 0..width {
            let bar = BARS[x * BARS.len() / width];
            rgb.extend_from_slice(&bar);
        }
    }
    (width, height, rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_interval() {
        let (w, h, rgb) = color_bars();
        assert!(SyntheticSource::from_rgb(0, 0.0, w, h, &rgb).is_err());
    }

    #[test]
    fn sync_tips_are_the_lowest_codes() {
        let mut source = SyntheticSource::new(64, &Settings::default()).unwrap();
        let capture = source.capture().unwrap();
        assert!(!capture.overflow);

        let min = capture.samples.iter().copied().min().unwrap() as i32;
        assert_eq!(min, SYNC_LEVEL);
        // The dither guarantees the next distinct code is one above the tip.
        let next = capture
            .samples
            .iter()
            .copied()
            .filter(|&s| (s as i32) > min)
            .min()
            .unwrap() as i32;
        assert_eq!(next, SYNC_LEVEL + 1);
    }

    #[test]
    fn noiseless_captures_are_deterministic() {
        let mut a = SyntheticSource::new(64, &Settings::default()).unwrap();
        let mut b = SyntheticSource::new(64, &Settings::default()).unwrap();
        assert_eq!(a.capture().unwrap().samples, b.capture().unwrap().samples);
    }
}

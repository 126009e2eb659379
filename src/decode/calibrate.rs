use log::{debug, info};

use crate::config::Settings;
use crate::decode::{
    burst_phase, DecodeParameters, ReferenceWaveform, MAX_TABLE_LEN, SHIFT_I, SHIFT_Q, SHIFT_Y,
};
use crate::error::DecodeError;
use crate::types::Sample;

/// User-configurable 0.0-1.0 bounds on the dynamic range fed into the
/// lookup tables, plus the optional burst-amplitude luma compensation
/// strength (0 disables it).
#[derive(Debug, Clone, Copy)]
pub struct RangeKnobs {
    pub y_min: f32,
    pub y_max: f32,
    pub i_min: f32,
    pub i_max: f32,
    pub q_min: f32,
    pub q_max: f32,
    pub color_compensation: i32,
}

impl RangeKnobs {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            y_min: settings.y_min as f32 / 100.0,
            y_max: settings.y_max as f32 / 100.0,
            i_min: settings.i_min as f32 / 100.0,
            i_max: settings.i_max as f32 / 100.0,
            q_min: settings.q_min as f32 / 100.0,
            q_max: settings.q_max as f32 / 100.0,
            color_compensation: settings.color_compensation,
        }
    }
}

/// Observed min/max of luma and the running I/Q sums across one analysis
/// pass. `max >= min` holds for each channel once a pass has accepted at
/// least one scanline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationRanges {
    pub min_y: i32,
    pub max_y: i32,
    pub min_i: i64,
    pub max_i: i64,
    pub min_q: i64,
    pub max_q: i64,
}

impl CalibrationRanges {
    /// True when either chroma channel shows no variance at all, in which
    /// case color demodulation has to fall back to monochrome.
    pub fn chroma_degenerate(&self) -> bool {
        self.min_i == self.max_i || self.min_q == self.max_q
    }
}

/// The YIQ -> RGB conversion tables, sized from the observed ranges and the
/// fixed per-channel downshifts. Replaced wholesale on recalibration, never
/// patched in place.
pub struct LookupTables {
    /// Luma index -> 0-255 intensity.
    pub luma: Vec<i32>,
    /// Shifted running-I index -> per-channel RGB contribution.
    pub in_phase: Vec<[i32; 3]>,
    /// Shifted running-Q index -> per-channel RGB contribution.
    pub quadrature: Vec<[i32; 3]>,
    /// Luma compensation per I/Q index, present only when the capability is
    /// enabled and a dominant burst amplitude was found.
    pub comp_i: Option<Vec<i32>>,
    pub comp_q: Option<Vec<i32>>,
}

/// Everything one calibration pass produces: the estimated sync threshold,
/// the observed channel ranges, and the derived lookup tables.
pub struct Calibration {
    pub threshold: i32,
    pub ranges: CalibrationRanges,
    pub tables: LookupTables,
}

struct Accum {
    min_y: i32,
    max_y: i32,
    min_i: i64,
    max_i: i64,
    min_q: i64,
    max_q: i64,
    accepted: usize,
    /// Burst peak-amplitude histogram, only kept for color compensation.
    burst_amps: Option<Vec<u32>>,
}

/// One-pass statistical scan over a representative capture buffer. Runs a
/// relaxed scanline detector over every candidate hsync, accumulates the
/// channel ranges, and derives the lookup tables from them.
pub struct LevelCalibrator<'a> {
    params: &'a DecodeParameters,
    waves: &'a ReferenceWaveform,
    knobs: RangeKnobs,
}

impl<'a> LevelCalibrator<'a> {
    pub fn new(params: &'a DecodeParameters, waves: &'a ReferenceWaveform, knobs: RangeKnobs) -> Self {
        Self {
            params,
            waves,
            knobs,
        }
    }

    pub fn analyze(&self, samples: &[Sample]) -> Result<Calibration, DecodeError> {
        let threshold = estimate_threshold(samples);

        let mut acc = Accum {
            min_y: i32::MAX,
            max_y: i32::MIN,
            min_i: i64::MAX,
            max_i: i64::MIN,
            min_q: i64::MAX,
            max_q: i64::MIN,
            accepted: 0,
            burst_amps: (self.knobs.color_compensation > 0).then(|| vec![0u32; 1 << 15]),
        };

        let mut is_sync = true;
        for (offset, &sample) in samples.iter().enumerate() {
            let low = (sample as i32) <= threshold;
            let falling = low && !is_sync;
            is_sync = low;

            if falling && offset + self.params.scanline_w < samples.len() {
                self.analyze_scanline(samples, offset, threshold, &mut acc);
            }
        }

        if acc.accepted == 0 {
            return Err(DecodeError::NoScanlines(samples.len()));
        }

        info!(
            "calibrated over {} scanlines: Y {} - {} ({})  I {} - {} ({})  Q {} - {} ({})",
            acc.accepted,
            acc.min_y,
            acc.max_y,
            acc.max_y - acc.min_y,
            acc.min_i,
            acc.max_i,
            acc.max_i - acc.min_i,
            acc.min_q,
            acc.max_q,
            acc.max_q - acc.min_q,
        );

        let ranges = CalibrationRanges {
            min_y: acc.min_y,
            max_y: acc.max_y,
            min_i: acc.min_i,
            max_i: acc.max_i,
            min_q: acc.min_q,
            max_q: acc.max_q,
        };
        let tables = self.build_tables(&ranges, acc.burst_amps.as_deref())?;

        Ok(Calibration {
            threshold,
            ranges,
            tables,
        })
    }

    /// Test one candidate scanline start. Rejects runs that are implausibly
    /// short or long for a sync pulse, and post-sync runs too short to be a
    /// real active line (those are vertical sync). Accepted lines feed the
    /// channel min/max accumulators.
    fn analyze_scanline(&self, samples: &[Sample], start: usize, threshold: i32, acc: &mut Accum) {
        let p = self.params;

        let mut sync_end = 0;
        while sync_end < p.scanline_w && (samples[start + sync_end] as i32) <= threshold {
            sync_end += 1;
        }
        if sync_end < 1 || sync_end > p.burst_start {
            return;
        }

        let mut next_sync = sync_end;
        while next_sync < p.scanline_w && (samples[start + next_sync] as i32) > threshold {
            next_sync += 1;
        }
        if next_sync < 9 * p.scanline_w / 10 {
            return;
        }

        if let Some(hist) = acc.burst_amps.as_mut() {
            let window = &samples[start + p.burst_start..start + p.burst_start + p.burst_len];
            let min = window.iter().copied().min().unwrap_or(0) as i32;
            let max = window.iter().copied().max().unwrap_or(0) as i32;
            hist[((max - min) / 2) as usize] += 1;
        }

        let best = burst_phase(p, self.waves, &samples[start..]) as isize;

        // Seed the running sums a window-width before the burst end so the
        // per-sample slide never reads outside the scanline.
        let mut run_i: i64 = 0;
        let mut run_q: i64 = 0;
        for count in (p.burst_start - p.wave_before)..(p.burst_start + p.wave_after) {
            let s = samples[start + count] as i64;
            run_i += s * self.waves.i_at(count as isize - best) as i64;
            run_q += s * self.waves.q_at(count as isize - best) as i64;
        }

        let mut count = p.burst_start;
        while count + p.wave_after < p.scanline_w {
            let lead = count + p.wave_after;
            let s = samples[start + lead] as i64;
            run_i += s * self.waves.i_at(lead as isize - best) as i64;
            run_q += s * self.waves.q_at(lead as isize - best) as i64;

            let y = samples[start + count] as i32;
            acc.min_y = acc.min_y.min(y);
            acc.max_y = acc.max_y.max(y);
            acc.min_i = acc.min_i.min(run_i);
            acc.max_i = acc.max_i.max(run_i);
            acc.min_q = acc.min_q.min(run_q);
            acc.max_q = acc.max_q.max(run_q);

            let trail = count - p.wave_before;
            let s = samples[start + trail] as i64;
            run_i -= s * self.waves.i_at(trail as isize - best) as i64;
            run_q -= s * self.waves.q_at(trail as isize - best) as i64;

            count += 1;
        }

        acc.accepted += 1;
    }

    fn build_tables(
        &self,
        ranges: &CalibrationRanges,
        burst_amps: Option<&[u32]>,
    ) -> Result<LookupTables, DecodeError> {
        let k = self.knobs;

        let y_range = ((ranges.max_y - ranges.min_y) >> SHIFT_Y) as usize;
        let i_range = ((ranges.max_i - ranges.min_i) >> SHIFT_I) as usize;
        let q_range = ((ranges.max_q - ranges.min_q) >> SHIFT_Q) as usize;
        check_len("luma", y_range + 1)?;
        check_len("in-phase", i_range + 1)?;
        check_len("quadrature", q_range + 1)?;

        let luma = (0..=y_range)
            .map(|idx| (255.0 * scale(normalized(idx, y_range), k.y_min, k.y_max)) as i32)
            .collect();

        let in_phase = (0..=i_range)
            .map(|idx| {
                let swing = 0.437 * (2.0 * scale(normalized(idx, i_range), k.i_min, k.i_max) - 1.0);
                [0, (255.0 * -0.394 * swing) as i32, (255.0 * -2.028 * swing) as i32]
            })
            .collect();

        let quadrature = (0..=q_range)
            .map(|idx| {
                let swing = 0.615 * (2.0 * scale(normalized(idx, q_range), k.q_min, k.q_max) - 1.0);
                [(255.0 * 1.140 * swing) as i32, (255.0 * -0.581 * swing) as i32, 0]
            })
            .collect();

        let (comp_i, comp_q) = match burst_amps.and_then(dominant_amplitude) {
            Some(amp) => {
                let strength = (amp * self.knobs.color_compensation) as f32;
                let comp_i = (0..=i_range)
                    .map(|idx| {
                        let c = scale(normalized(idx, i_range), k.i_min, k.i_max);
                        (strength * (2.0 * c - 1.0)) as i32
                    })
                    .collect();
                let comp_q = (0..=q_range)
                    .map(|idx| {
                        let c = scale(normalized(idx, q_range), k.q_min, k.q_max);
                        (strength * (2.0 * c - 1.0)) as i32
                    })
                    .collect();
                (Some(comp_i), Some(comp_q))
            }
            None => (None, None),
        };

        Ok(LookupTables {
            luma,
            in_phase,
            quadrature,
            comp_i,
            comp_q,
        })
    }
}

/// Guess the sync threshold from the data itself: the smallest value
/// strictly above the global minimum, so the flat sync tips (which share the
/// lowest couple of codes) classify as sync and nothing else does.
fn estimate_threshold(samples: &[Sample]) -> i32 {
    let min = samples.iter().copied().min().unwrap_or(0);
    samples
        .iter()
        .copied()
        .filter(|&s| s > min)
        .min()
        .unwrap_or(min) as i32
}

fn normalized(idx: usize, range: usize) -> f32 {
    if range == 0 {
        0.0
    } else {
        idx as f32 / range as f32
    }
}

/// Clamp `c` into the user-selected [min, max] window and renormalize.
fn scale(c: f32, min: f32, max: f32) -> f32 {
    if max <= min {
        return 0.0;
    }
    ((c - min) / (max - min)).clamp(0.0, 1.0)
}

fn check_len(channel: &'static str, entries: usize) -> Result<(), DecodeError> {
    if entries > MAX_TABLE_LEN {
        Err(DecodeError::TableAllocation { channel, entries })
    } else {
        Ok(())
    }
}

/// Most common burst peak amplitude seen during analysis.
fn dominant_amplitude(hist: &[u32]) -> Option<i32> {
    let (amp, &count) = hist
        .iter()
        .enumerate()
        .max_by_key(|&(amp, &count)| (count, std::cmp::Reverse(amp)))?;
    if count == 0 {
        return None;
    }
    debug!("dominant color burst amplitude {amp} ({count} scanlines)");
    Some(amp as i32)
}

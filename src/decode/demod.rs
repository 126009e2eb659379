use crate::decode::{
    Calibration, DecodeParameters, ReferenceWaveform, SHIFT_BURST, SHIFT_I, SHIFT_Q, SHIFT_WAVE,
    SHIFT_Y,
};
use crate::error::DecodeError;
use crate::types::{pack_rgb, Rgb, Sample};

/// Which demodulation strategy to run over a scanline. Both share the same
/// scanline-iteration contract; monochrome skips chroma entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    Color,
    Monochrome,
}

/// One per-sample diagnostic record emitted during color extraction.
#[derive(Debug, Clone, Copy)]
pub struct ScanlineRecord {
    pub offset: usize,
    pub sample: Sample,
    pub run_i: i64,
    pub run_q: i64,
    pub y_index: usize,
    pub i_index: usize,
    pub q_index: usize,
    pub r: i32,
    pub g: i32,
    pub b: i32,
}

/// Receives per-sample diagnostic records when a dump is requested.
pub trait ScanlineSink {
    fn record(&mut self, rec: &ScanlineRecord);
}

/// Best-fit phase shift of the 0° reference waveform against the color
/// burst, by maximum-correlation search over one subcarrier wavelength.
/// Ties favor the earliest shift tested.
pub fn burst_phase(params: &DecodeParameters, waves: &ReferenceWaveform, scanline: &[Sample]) -> usize {
    let mut best = 0;
    let mut best_sum = i64::MIN;

    for adj in 0..params.i_wavelength {
        let mut sum: i64 = 0;
        for count in params.burst_start..params.burst_start + params.burst_len {
            let product = waves.i_at(count as isize - adj as isize) * scanline[count] as i32;
            sum += (product >> SHIFT_BURST) as i64;
        }
        if sum > best_sum {
            best = adj;
            best_sum = sum;
        }
    }

    best
}

/// Recovers luma and chrominance from one scanline and writes RGB pixels
/// into a field row. Chroma comes from running-average I/Q sums against the
/// phase-aligned reference waveforms: O(window) seeding, then O(1) per
/// sample as the window slides.
pub struct Demodulator<'a> {
    params: &'a DecodeParameters,
    waves: &'a ReferenceWaveform,
    cal: &'a Calibration,
}

impl<'a> Demodulator<'a> {
    pub fn new(params: &'a DecodeParameters, waves: &'a ReferenceWaveform, cal: &'a Calibration) -> Self {
        Self { params, waves, cal }
    }

    /// Active-sample bounds for pixel output: start as late and end as
    /// early as every constraint allows.
    fn active_bounds(&self) -> (usize, usize) {
        let p = self.params;
        let start = p.burst_start.max(p.crop_left).max(p.wave_before);
        let end = (p.scanline_w - p.wave_after).min(p.crop_left + p.copy_width);
        (start, end)
    }

    pub fn extract(
        &self,
        mode: Extraction,
        scanline: &[Sample],
        row: &mut [Rgb],
        sink: Option<&mut (dyn ScanlineSink + '_)>,
    ) -> Result<(), DecodeError> {
        match mode {
            Extraction::Color => self.extract_color(scanline, row, sink),
            Extraction::Monochrome => {
                self.extract_monochrome(scanline, row);
                Ok(())
            }
        }
    }

    fn extract_color(
        &self,
        scanline: &[Sample],
        row: &mut [Rgb],
        mut sink: Option<&mut (dyn ScanlineSink + '_)>,
    ) -> Result<(), DecodeError> {
        let p = self.params;
        let ranges = &self.cal.ranges;
        let tables = &self.cal.tables;

        if ranges.chroma_degenerate() {
            return Err(DecodeError::DegenerateCalibration {
                i_range: ranges.max_i - ranges.min_i,
                q_range: ranges.max_q - ranges.min_q,
            });
        }

        let best = burst_phase(p, self.waves, scanline) as isize;
        let (start, end) = self.active_bounds();
        if end <= start {
            return Ok(());
        }

        let mut run_i: i64 = 0;
        let mut run_q: i64 = 0;
        for count in (start - p.wave_before)..(start + p.wave_after) {
            let s = scanline[count] as i64;
            run_i += s * self.waves.i_at(count as isize - best) as i64;
            run_q += s * self.waves.q_at(count as isize - best) as i64;
        }

        for count in start..end {
            let lead = count + p.wave_after;
            let s = scanline[lead] as i64;
            run_i += s * self.waves.i_at(lead as isize - best) as i64;
            run_q += s * self.waves.q_at(lead as isize - best) as i64;

            let mut y = scanline[count] as i32;
            let i_index =
                ((run_i.clamp(ranges.min_i, ranges.max_i) - ranges.min_i) >> SHIFT_I) as usize;
            let q_index =
                ((run_q.clamp(ranges.min_q, ranges.max_q) - ranges.min_q) >> SHIFT_Q) as usize;

            if let (Some(comp_i), Some(comp_q)) = (&tables.comp_i, &tables.comp_q) {
                let correction = self.waves.i_at(count as isize - best) * comp_i[i_index]
                    + self.waves.q_at(count as isize - best) * comp_q[q_index];
                y -= correction >> SHIFT_WAVE;
            }

            let y_index =
                ((y.clamp(ranges.min_y, ranges.max_y) - ranges.min_y) >> SHIFT_Y) as usize;

            let luma = tables.luma[y_index];
            let i_rgb = tables.in_phase[i_index];
            let q_rgb = tables.quadrature[q_index];
            let r = luma + i_rgb[0] + q_rgb[0];
            let g = luma + i_rgb[1] + q_rgb[1];
            let b = luma + i_rgb[2] + q_rgb[2];
            row[count] = pack_rgb(r, g, b);

            if let Some(sink) = sink.as_deref_mut() {
                sink.record(&ScanlineRecord {
                    offset: count,
                    sample: scanline[count],
                    run_i,
                    run_q,
                    y_index,
                    i_index,
                    q_index,
                    r,
                    g,
                    b,
                });
            }

            let trail = count - p.wave_before;
            let s = scanline[trail] as i64;
            run_i -= s * self.waves.i_at(trail as isize - best) as i64;
            run_q -= s * self.waves.q_at(trail as isize - best) as i64;
        }

        Ok(())
    }

    fn extract_monochrome(&self, scanline: &[Sample], row: &mut [Rgb]) {
        let ranges = &self.cal.ranges;
        let tables = &self.cal.tables;
        let (start, end) = self.active_bounds();

        for count in start..end {
            let y = scanline[count] as i32;
            let y_index =
                ((y.clamp(ranges.min_y, ranges.max_y) - ranges.min_y) >> SHIFT_Y) as usize;
            let luma = tables.luma[y_index].clamp(0, 255);
            row[count] = pack_rgb(luma, luma, luma);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::decode::{CalibrationRanges, LookupTables};

    fn parts(interval: i64) -> (DecodeParameters, ReferenceWaveform) {
        let params = DecodeParameters::derive(interval, &Settings::default()).unwrap();
        let waves = ReferenceWaveform::new(&params);
        (params, waves)
    }

    fn manual_calibration(degenerate_chroma: bool) -> Calibration {
        let (max_i, max_q) = if degenerate_chroma { (0, 0) } else { (1 << 17, 1 << 17) };
        let ranges = CalibrationRanges {
            min_y: 0,
            max_y: 1 << 10,
            min_i: 0,
            max_i,
            min_q: 0,
            max_q,
        };
        let y_len = ((ranges.max_y - ranges.min_y) >> SHIFT_Y) as usize + 1;
        let i_len = ((ranges.max_i - ranges.min_i) >> SHIFT_I) as usize + 1;
        let q_len = ((ranges.max_q - ranges.min_q) >> SHIFT_Q) as usize + 1;
        Calibration {
            threshold: -99,
            ranges,
            tables: LookupTables {
                luma: (0..y_len).map(|i| (i * 255 / (y_len - 1).max(1)) as i32).collect(),
                in_phase: vec![[0, -10, -20]; i_len],
                quadrature: vec![[30, -15, 0]; q_len],
                comp_i: None,
                comp_q: None,
            },
        }
    }

    /// A noiseless scanline whose burst window replays the 0° reference
    /// waveform at a known lag.
    fn scanline_with_burst_at(params: &DecodeParameters, waves: &ReferenceWaveform, k: usize) -> Vec<Sample> {
        let mut scanline = vec![0 as Sample; params.scanline_w];
        for count in params.burst_start..params.burst_start + params.burst_len {
            scanline[count] = waves.i_at(count as isize - k as isize) as Sample;
        }
        scanline
    }

    #[test]
    fn phase_search_finds_exact_shift() {
        // 8 ns gives a ~35 sample wavelength, so neighbouring shifts are
        // clearly separated in correlation.
        let (params, waves) = parts(8);
        for k in [0, 1, 5, params.i_wavelength - 1] {
            let scanline = scanline_with_burst_at(&params, &waves, k);
            assert_eq!(burst_phase(&params, &waves, &scanline), k, "lag {k}");
        }
    }

    #[test]
    fn phase_search_ties_favor_earliest_shift() {
        let (params, waves) = parts(8);
        let scanline = vec![0 as Sample; params.scanline_w];
        assert_eq!(burst_phase(&params, &waves, &scanline), 0);
    }

    #[test]
    fn degenerate_chroma_rejects_color_extraction() {
        let (params, waves) = parts(64);
        let cal = manual_calibration(true);
        let demod = Demodulator::new(&params, &waves, &cal);
        let scanline = vec![0 as Sample; params.scanline_w];
        let mut row = vec![0 as Rgb; params.scanline_w];

        let err = demod
            .extract(Extraction::Color, &scanline, &mut row, None)
            .unwrap_err();
        assert!(matches!(err, DecodeError::DegenerateCalibration { .. }));

        // The monochrome strategy still works on the same calibration.
        demod
            .extract(Extraction::Monochrome, &scanline, &mut row, None)
            .unwrap();
    }

    #[test]
    fn monochrome_maps_luma_to_gray() {
        let (params, waves) = parts(64);
        let cal = manual_calibration(false);
        let demod = Demodulator::new(&params, &waves, &cal);

        let scanline = vec![1024 as Sample; params.scanline_w];
        let mut row = vec![0 as Rgb; params.scanline_w];
        demod
            .extract(Extraction::Monochrome, &scanline, &mut row, None)
            .unwrap();

        let (start, _) = demod.active_bounds();
        assert_eq!(row[start], 0x00FFFFFF);
        assert_eq!(row[0], 0);
    }

    #[test]
    fn color_extraction_records_to_sink() {
        struct Collect(Vec<ScanlineRecord>);
        impl ScanlineSink for Collect {
            fn record(&mut self, rec: &ScanlineRecord) {
                self.0.push(*rec);
            }
        }

        let (params, waves) = parts(64);
        let cal = manual_calibration(false);
        let demod = Demodulator::new(&params, &waves, &cal);
        let scanline = scanline_with_burst_at(&params, &waves, 1);
        let mut row = vec![0 as Rgb; params.scanline_w];

        let mut sink = Collect(Vec::new());
        demod
            .extract(Extraction::Color, &scanline, &mut row, Some(&mut sink))
            .unwrap();

        let (start, end) = demod.active_bounds();
        assert_eq!(sink.0.len(), end - start);
        assert_eq!(sink.0[0].offset, start);
    }
}

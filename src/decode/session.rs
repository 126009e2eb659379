use log::warn;

use crate::config::Settings;
use crate::decode::{
    Calibration, DecodeParameters, Demodulator, Extraction, Field, FieldScanner, LevelCalibrator,
    RangeKnobs, ReferenceWaveform, ScanOutcome, ScanlineSink,
};
use crate::error::DecodeError;
use crate::types::Sample;

/// Owns all decode state for one capture session: timing parameters,
/// reference waveforms, and (once computed) the calibration. The pipeline
/// stages borrow from here; nothing lives in globals, so independent
/// sessions can coexist.
pub struct DecoderSession {
    params: DecodeParameters,
    waves: ReferenceWaveform,
    knobs: RangeKnobs,
    calibration: Option<Calibration>,
    monochrome: bool,
    interval_ns: i64,
}

impl DecoderSession {
    pub fn new(interval_ns: i64, settings: &Settings) -> Result<Self, DecodeError> {
        let params = DecodeParameters::derive(interval_ns, settings)?;
        let waves = ReferenceWaveform::new(&params);
        Ok(Self {
            params,
            waves,
            knobs: RangeKnobs::from_settings(settings),
            calibration: None,
            monochrome: settings.monochrome,
            interval_ns,
        })
    }

    pub fn params(&self) -> &DecodeParameters {
        &self.params
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }

    pub fn monochrome(&self) -> bool {
        self.monochrome
    }

    pub fn set_monochrome(&mut self, monochrome: bool) {
        self.monochrome = monochrome;
    }

    /// Re-derive parameters after a crop change. The reference waveforms
    /// depend only on the interval and the calibration only on the signal
    /// statistics, so both survive; range-knob changes additionally need
    /// [`DecoderSession::invalidate_calibration`] to rebuild the tables.
    pub fn reconfigure(&mut self, settings: &Settings) -> Result<(), DecodeError> {
        self.params = DecodeParameters::derive(self.interval_ns, settings)?;
        self.knobs = RangeKnobs::from_settings(settings);
        Ok(())
    }

    /// Drop the current calibration so the next cycle re-runs the analysis
    /// pass.
    pub fn invalidate_calibration(&mut self) {
        self.calibration = None;
    }

    /// Run the level-calibration pass over a representative buffer and swap
    /// the resulting tables in atomically. On error the previous
    /// calibration is kept untouched.
    pub fn calibrate(&mut self, samples: &[Sample]) -> Result<(), DecodeError> {
        let calibrator = LevelCalibrator::new(&self.params, &self.waves, self.knobs);
        let calibration = calibrator.analyze(samples)?;
        if calibration.ranges.chroma_degenerate() && !self.monochrome {
            warn!("chroma calibration is degenerate; color frames will fall back to monochrome");
        }
        self.calibration = Some(calibration);
        Ok(())
    }

    /// Extract one field from `samples` into `field`. Returns the scan
    /// outcome so the caller can resume after the consumed samples (minus a
    /// rewind margin) and decide whether the field is presentable.
    pub fn extract_field(
        &self,
        samples: &[Sample],
        field: &mut Field,
        mut sink: Option<&mut dyn ScanlineSink>,
    ) -> Result<ScanOutcome, DecodeError> {
        let cal = self.calibration.as_ref().ok_or(DecodeError::Uncalibrated)?;

        let mode = if self.monochrome {
            Extraction::Monochrome
        } else if cal.ranges.chroma_degenerate() {
            Extraction::Monochrome
        } else {
            Extraction::Color
        };

        let demod = Demodulator::new(&self.params, &self.waves, cal);
        let scanner = FieldScanner::new(&self.params, cal.threshold);
        let scanline_w = self.params.scanline_w;

        let mut emit_err = None;
        let outcome = scanner.scan(samples, |line, start| {
            let scanline = &samples[start..start + scanline_w];
            let result = demod.extract(mode, scanline, field.row_mut(line), sink.as_deref_mut());
            if let Err(e) = result {
                emit_err.get_or_insert(e);
            }
        });

        match emit_err {
            Some(e) => Err(e),
            None => Ok(outcome),
        }
    }
}

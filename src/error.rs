use thiserror::Error;

/// Errors produced by the decode pipeline.
///
/// Fatal kinds (`InvalidInterval`, `TableAllocation`, `NoScanlines`) should
/// terminate the session; the rest are per-cycle conditions the capture loop
/// recovers from by skipping to the next buffer.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The sampling interval makes no sense; every timing base is derived
    /// from it, so nothing downstream is defined.
    #[error("invalid sampling interval: {0} ns")]
    InvalidInterval(i64),

    /// The acquisition device failed or reported an overflowed capture.
    #[error("capture failed: {0}")]
    Acquisition(String),

    /// A calibration lookup table would be absurdly large, which means the
    /// analyzed buffer was garbage. No meaningful decode table exists.
    #[error("refusing to build a {channel} lookup table with {entries} entries")]
    TableAllocation { channel: &'static str, entries: usize },

    /// The calibration pass did not find a single plausible scanline.
    #[error("calibration found no usable scanlines in {0} samples")]
    NoScanlines(usize),

    /// Field extraction was requested before any calibration pass ran.
    #[error("decoder session is not calibrated")]
    Uncalibrated,

    /// The observed I or Q range collapsed to a single value, so color
    /// demodulation has nothing to work with.
    #[error("degenerate chroma calibration (I range {i_range}, Q range {q_range})")]
    DegenerateCalibration { i_range: i64, q_range: i64 },

    /// A settings file could not be read or parsed.
    #[error("failed to load settings: {0}")]
    Settings(String),
}

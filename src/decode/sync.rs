use crate::decode::{DecodeParameters, FIELD_LINES};
use crate::types::Sample;

/// Which interlaced half-frame a scan produced. The first field carries the
/// even display rows, the second the odd ones. `Partial` means data ran out
/// (or vertical blanking returned) before [`FIELD_LINES`] scanlines were
/// recovered; partial fields are never presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTag {
    First,
    Second,
    Partial,
}

/// Result of one field scan: how far into the buffer the scan got (the
/// caller resumes there, minus a rewind margin), what kind of field came
/// out, and how many scanlines were seen.
#[derive(Debug, Clone, Copy)]
pub struct ScanOutcome {
    pub consumed: usize,
    pub tag: FieldTag,
    pub lines: usize,
}

/// Progress through one vertical-blanking handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Skip until a run longer than `screen_width` ends in sync: the last
    /// scanline was a normal active line.
    WaitNormal,
    /// Wait for a short run ending in sync: entry into vertical blanking.
    WaitBlank,
    /// Count consecutive long pulses; their number distinguishes the fields.
    CountLongs,
    /// Wait for normal active lines to resume.
    WaitNonBlank,
    /// Emit a scanline per hsync until vertical blanking reappears.
    Draw,
}

/// Classifies a raw sample stream into scanlines and field boundaries.
///
/// Samples at or below the sync threshold are sync level; on every
/// transition the run length since the previous transition drives a five
/// state machine through the vertical-blanking handshake. A run that never
/// transitions (including a zero-length one at the very first sample) is
/// simply absorbed into the current count.
pub struct FieldScanner<'a> {
    params: &'a DecodeParameters,
    threshold: i32,
}

impl<'a> FieldScanner<'a> {
    pub fn new(params: &'a DecodeParameters, threshold: i32) -> Self {
        Self { params, threshold }
    }

    /// Scan `samples` for one field, calling `emit(line, scanline_start)`
    /// for every active scanline that survives the vertical crop and fits
    /// fully inside the buffer.
    pub fn scan<F>(&self, samples: &[Sample], mut emit: F) -> ScanOutcome
    where
        F: FnMut(usize, usize),
    {
        let p = self.params;
        let mut state = State::WaitNormal;
        let mut is_sync = false;
        let mut count = 0usize;
        let mut line = 0usize;
        let mut longs = 0usize;
        let mut scanline_start: Option<usize> = None;

        for (offset, &sample) in samples.iter().enumerate() {
            let low = (sample as i32) <= self.threshold;
            let transition = low != is_sync;
            is_sync = low;

            if !transition {
                count += 1;
                continue;
            }

            match state {
                State::WaitNormal => {
                    if is_sync && count > p.screen_width {
                        state = State::WaitBlank;
                    }
                }
                State::WaitBlank => {
                    if is_sync && count < p.screen_width {
                        state = State::CountLongs;
                        // Should always be 1: the first blanking pulse is long.
                        longs = usize::from(count > p.long_pulse);
                    }
                }
                State::CountLongs => {
                    if is_sync {
                        if count > p.long_pulse {
                            longs += 1;
                        } else {
                            state = State::WaitNonBlank;
                        }
                    }
                }
                State::WaitNonBlank => {
                    if is_sync && count > p.screen_width {
                        state = State::Draw;
                    }
                }
                State::Draw => {
                    if is_sync {
                        if count < p.screen_width {
                            // Vertical blanking resumed: the field is done.
                            let tag = if line < FIELD_LINES {
                                FieldTag::Partial
                            } else if longs == 7 {
                                FieldTag::First
                            } else {
                                FieldTag::Second
                            };
                            return ScanOutcome {
                                consumed: offset,
                                tag,
                                lines: line,
                            };
                        }
                        line += 1;
                        scanline_start = Some(offset);
                    } else if let Some(start) = scanline_start {
                        if line >= p.crop_top
                            && line < FIELD_LINES.saturating_sub(p.crop_bottom)
                            && start + p.scanline_w < samples.len()
                        {
                            emit(line, start);
                        }
                    }
                }
            }
            count = 0;
        }

        // Data ran out mid-field.
        ScanOutcome {
            consumed: samples.len(),
            tag: FieldTag::Partial,
            lines: line,
        }
    }
}

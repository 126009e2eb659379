mod calibrate;
mod demod;
mod field;
mod params;
mod session;
mod sync;
mod wave;

pub use calibrate::*;
pub use demod::*;
pub use field::*;
pub use params::*;
pub use session::*;
pub use sync::*;
pub use wave::*;

/// NTSC color subcarrier frequency in MHz.
pub const COLOR_SUBCARRIER_MHZ: f32 = 3.579545;

/// Visible scanlines per interlaced field. A field that yields fewer lines
/// than this before the next vertical blanking interval is partial.
pub const FIELD_LINES: usize = 252;

/// Reference waveforms use .8 fixed point.
pub const WAVE_SCALE: i32 = 256;
pub const SHIFT_WAVE: u32 = 8;

/// Downshifts applied to raw decoded values before lookup-table indexing,
/// keeping the tables reasonably short.
pub const SHIFT_Y: u32 = 5;
pub const SHIFT_I: u32 = 16;
pub const SHIFT_Q: u32 = 16;

/// Burst correlation drops this many bits per product for headroom.
pub const SHIFT_BURST: u32 = 4;

/// Upper bound on lookup-table length; anything bigger means the analyzed
/// capture was garbage.
pub const MAX_TABLE_LEN: usize = 1 << 20;

//! Software decoder for digitized NTSC composite video: takes raw voltage
//! samples from an analog capture device and reconstructs interlaced video
//! fields (luma + chroma) entirely in software.

pub mod config;
pub mod decode;
pub mod error;
pub mod source;
pub mod types;

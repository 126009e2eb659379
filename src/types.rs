/// A single digitized composite-video voltage sample. The acquisition device
/// delivers signed 16-bit values at a fixed sampling interval, and the whole
/// decode pipeline stays in this representation until pixels come out the
/// other end.
pub type Sample = i16;

/// The PI constant at the precision the waveform math runs at.
pub const PI: f32 = std::f32::consts::PI;

/// A decoded pixel, packed as 0x00RRGGBB. Field buffers hold these; the
/// frame assembler unpacks them into the RGBA bytes the display wants.
pub type Rgb = u32;

/// Pack clamped 0-255 channel values into an [`Rgb`] pixel.
pub fn pack_rgb(r: i32, g: i32, b: i32) -> Rgb {
    let r = r.clamp(0, 255) as u32;
    let g = g.clamp(0, 255) as u32;
    let b = b.clamp(0, 255) as u32;
    (r << 16) | (g << 8) | b
}

/// Unpack an [`Rgb`] pixel into its channel bytes.
pub fn unpack_rgb(px: Rgb) -> (u8, u8, u8) {
    ((px >> 16) as u8, (px >> 8) as u8, px as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_clamps_out_of_range_channels() {
        assert_eq!(pack_rgb(300, -5, 128), 0x00FF0080);
        assert_eq!(unpack_rgb(0x00123456), (0x12, 0x34, 0x56));
    }
}

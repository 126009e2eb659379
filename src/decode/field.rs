use crate::decode::{DecodeParameters, FieldTag, FIELD_LINES};
use crate::types::{unpack_rgb, Rgb};

/// One decoded half-frame: [`FIELD_LINES`] rows of full-scanline width.
/// The demodulator only fills the active window of each row; the assembler
/// decides which part of it reaches the screen.
pub struct Field {
    width: usize,
    data: Vec<Rgb>,
}

impl Field {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            data: vec![0; width * FIELD_LINES],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn row(&self, line: usize) -> &[Rgb] {
        &self.data[line * self.width..(line + 1) * self.width]
    }

    pub fn row_mut(&mut self, line: usize) -> &mut [Rgb] {
        &mut self.data[line * self.width..(line + 1) * self.width]
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }
}

/// Interlaces decoded fields into a frame buffer: the first field lands on
/// even output rows, the second on odd rows. Horizontal and vertical scale
/// are independent binary shifts (0 = native, negative = shrink), and the
/// crop window only changes where rendering reads from the field buffer.
pub struct FrameAssembler {
    crop_left: usize,
    crop_top: usize,
    visible_lines: usize,
    shift_x: u32,
    shift_y: u32,
    width: usize,
    height: usize,
    frame: Vec<Rgb>,
}

impl FrameAssembler {
    pub fn new(params: &DecodeParameters, scale_x: i32, scale_y: i32) -> Self {
        let shift_x = (-scale_x.min(0)) as u32;
        let shift_y = (-scale_y.min(0)) as u32;
        let visible_lines =
            FIELD_LINES.saturating_sub(params.crop_top + params.crop_bottom);
        let width = (params.copy_width >> shift_x).max(1);
        let height = ((2 * visible_lines) >> shift_y).max(1);

        Self {
            crop_left: params.crop_left,
            crop_top: params.crop_top,
            visible_lines,
            shift_x,
            shift_y,
            width,
            height,
            frame: vec![0; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Write one field's visible rows into the interlaced frame. Partial
    /// fields are the caller's problem; this only accepts real parities.
    pub fn blit(&mut self, field: &Field, parity: FieldTag) {
        let row_offset = match parity {
            FieldTag::First => 0,
            FieldTag::Second => 1,
            FieldTag::Partial => return,
        };

        for out_y in 0..self.height {
            let full_y = out_y << self.shift_y;
            if full_y % 2 != row_offset {
                continue;
            }
            let line = self.crop_top + full_y / 2;
            if line >= self.crop_top + self.visible_lines || line >= FIELD_LINES {
                continue;
            }

            let src = field.row(line);
            let dst = &mut self.frame[out_y * self.width..(out_y + 1) * self.width];
            for (out_x, px) in dst.iter_mut().enumerate() {
                let src_x = self.crop_left + (out_x << self.shift_x);
                if src_x < src.len() {
                    *px = src[src_x];
                }
            }
        }
    }

    /// Copy the assembled frame into an RGBA byte buffer for presentation.
    pub fn present(&self, rgba: &mut [u8]) {
        for (px, out) in self.frame.iter().zip(rgba.chunks_exact_mut(4)) {
            let (r, g, b) = unpack_rgb(*px);
            out[0] = r;
            out[1] = g;
            out[2] = b;
            out[3] = 0xFF;
        }
    }

    pub fn clear(&mut self) {
        self.frame.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::decode::DecodeParameters;

    fn params() -> DecodeParameters {
        DecodeParameters::derive(64, &Settings::default()).unwrap()
    }

    fn painted_field(width: usize, value: Rgb) -> Field {
        let mut field = Field::new(width);
        for line in 0..FIELD_LINES {
            field.row_mut(line).fill(value);
        }
        field
    }

    #[test]
    fn fields_interleave_by_parity() {
        let p = params();
        let mut assembler = FrameAssembler::new(&p, 0, 0);
        assert_eq!(assembler.width(), p.copy_width);
        assert_eq!(assembler.height(), 2 * FIELD_LINES);

        assembler.blit(&painted_field(p.scanline_w, 0x111111), FieldTag::First);
        assembler.blit(&painted_field(p.scanline_w, 0x222222), FieldTag::Second);

        assert_eq!(assembler.frame[0], 0x111111);
        assert_eq!(assembler.frame[assembler.width], 0x222222);
        assert_eq!(assembler.frame[2 * assembler.width], 0x111111);
    }

    #[test]
    fn partial_fields_are_never_blitted() {
        let p = params();
        let mut assembler = FrameAssembler::new(&p, 0, 0);
        assembler.blit(&painted_field(p.scanline_w, 0xABCDEF), FieldTag::Partial);
        assert!(assembler.frame.iter().all(|&px| px == 0));
    }

    #[test]
    fn negative_scale_shrinks_output() {
        let p = params();
        let assembler = FrameAssembler::new(&p, -1, -2);
        assert_eq!(assembler.width(), p.copy_width >> 1);
        assert_eq!(assembler.height(), (2 * FIELD_LINES) >> 2);
    }

    #[test]
    fn crop_offsets_where_rendering_reads() {
        let settings = Settings {
            crop_left: 10,
            ..Settings::default()
        };
        let p = DecodeParameters::derive(64, &settings).unwrap();
        let mut field = Field::new(p.scanline_w);
        // Mark exactly the first cropped-in pixel of row 0.
        field.row_mut(0)[p.crop_left] = 0x00FF00;

        let mut assembler = FrameAssembler::new(&p, 0, 0);
        assembler.blit(&field, FieldTag::First);
        assert_eq!(assembler.frame[0], 0x00FF00);
    }
}

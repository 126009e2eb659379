//! End-to-end decode of a synthetic composite capture: signal generation,
//! calibration, field extraction, and frame assembly working together.

use composite_video::config::Settings;
use composite_video::decode::{DecoderSession, Field, FieldTag, FrameAssembler, FIELD_LINES};
use composite_video::source::{SampleSource, SyntheticSource};

fn extract_fields(
    session: &DecoderSession,
    samples: &[i16],
    assembler: &mut FrameAssembler,
) -> Vec<FieldTag> {
    let scanline_w = session.params().scanline_w;
    let mut field = Field::new(scanline_w);
    let mut tags = Vec::new();
    let mut offset = 0usize;
    let mut passes = 0;

    while offset < samples.len() && tags.len() < 2 && passes < 8 {
        if offset > 2 * scanline_w {
            offset -= 2 * scanline_w;
        }
        let outcome = session
            .extract_field(&samples[offset..], &mut field, None)
            .unwrap();
        if outcome.consumed == 0 {
            break;
        }
        offset += outcome.consumed;
        passes += 1;

        if outcome.tag != FieldTag::Partial {
            assert!(outcome.lines >= FIELD_LINES);
            assembler.blit(&field, outcome.tag);
            tags.push(outcome.tag);
        }
    }

    tags
}

#[test]
fn decodes_two_interlaced_fields_from_color_bars() {
    let settings = Settings::default();
    let interval = settings.interval_ns();

    let mut session = DecoderSession::new(interval, &settings).unwrap();
    let mut source = SyntheticSource::new(interval, &settings).unwrap();
    let capture = source.capture().unwrap();
    assert!(!capture.overflow);

    session.calibrate(&capture.samples).unwrap();
    let cal = session.calibration().unwrap();
    assert!(
        !cal.ranges.chroma_degenerate(),
        "color bars must produce chroma variance"
    );
    assert!(cal.ranges.max_y > cal.ranges.min_y);

    let mut assembler = FrameAssembler::new(session.params(), 0, 0);
    let tags = extract_fields(&session, &capture.samples, &mut assembler);
    assert_eq!(tags, vec![FieldTag::First, FieldTag::Second]);

    // The assembled frame must actually contain picture content: a middle
    // row crossing the bars shows several distinct colors.
    let (w, h) = (assembler.width(), assembler.height());
    let mut rgba = vec![0u8; w * h * 4];
    assembler.present(&mut rgba);

    let row = h / 2;
    let mut colors = std::collections::BTreeSet::new();
    for x in 0..w {
        let idx = (row * w + x) * 4;
        colors.insert((rgba[idx], rgba[idx + 1], rgba[idx + 2]));
    }
    assert!(
        colors.len() >= 4,
        "expected several distinct bar colors, got {}",
        colors.len()
    );
    assert!(rgba.iter().skip(3).step_by(4).all(|&a| a == 0xFF));
}

#[test]
fn monochrome_session_decodes_the_same_capture() {
    let settings = Settings {
        monochrome: true,
        ..Settings::default()
    };
    let interval = settings.interval_ns();

    let mut session = DecoderSession::new(interval, &settings).unwrap();
    let mut source = SyntheticSource::new(interval, &settings).unwrap();
    let capture = source.capture().unwrap();
    session.calibrate(&capture.samples).unwrap();

    let mut assembler = FrameAssembler::new(session.params(), 0, 0);
    let tags = extract_fields(&session, &capture.samples, &mut assembler);
    assert_eq!(tags, vec![FieldTag::First, FieldTag::Second]);

    // Every decoded pixel is gray in monochrome mode.
    let (w, h) = (assembler.width(), assembler.height());
    let mut rgba = vec![0u8; w * h * 4];
    assembler.present(&mut rgba);
    for px in rgba.chunks_exact(4) {
        assert_eq!(px[0], px[1]);
        assert_eq!(px[1], px[2]);
    }
}

#[test]
fn cropped_session_produces_narrower_frames() {
    let settings = Settings {
        crop_left: 10,
        crop_right: 5,
        crop_top: 8,
        crop_bottom: 8,
        ..Settings::default()
    };
    let interval = settings.interval_ns();

    let mut session = DecoderSession::new(interval, &settings).unwrap();
    let mut source = SyntheticSource::new(interval, &settings).unwrap();
    let capture = source.capture().unwrap();
    session.calibrate(&capture.samples).unwrap();

    let params = session.params();
    assert_eq!(params.crop_left, params.scanline_w * 10 / 100);
    let mut assembler = FrameAssembler::new(params, 0, 0);
    assert_eq!(assembler.width(), params.copy_width);
    assert_eq!(assembler.height(), 2 * (FIELD_LINES - 16));

    let tags = extract_fields(&session, &capture.samples, &mut assembler);
    assert_eq!(tags, vec![FieldTag::First, FieldTag::Second]);
}

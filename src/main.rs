use std::error::Error;
use std::path::Path;

use log::{error, info, warn};
use pixels::{Pixels, SurfaceTexture};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, KeyboardInput, ModifiersState, VirtualKeyCode, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

use composite_video::config::Settings;
use composite_video::decode::{DecoderSession, Field, FieldTag, FrameAssembler};
use composite_video::error::DecodeError;
use composite_video::source::{SampleSource, SyntheticSource};

const MIN_SCALE: i32 = -3;
const MAX_SCALE: i32 = 0;

/// Capture, decode, and blit up to two fields into the assembler. Resumes
/// scanning a couple of scanlines before the previous field ended so a
/// vertical sync spanning the boundary is re-detected.
fn decode_cycle(
    source: &mut dyn SampleSource,
    session: &mut DecoderSession,
    field: &mut Field,
    assembler: &mut FrameAssembler,
) -> Result<(), DecodeError> {
    let capture = source.capture()?;
    if capture.overflow {
        return Err(DecodeError::Acquisition("device reported overflow".into()));
    }

    if !session.is_calibrated() {
        session.calibrate(&capture.samples)?;
    }

    let samples = &capture.samples;
    let scanline_w = session.params().scanline_w;
    let mut offset = 0usize;
    let mut fields_drawn = 0;
    let mut passes = 0;

    while offset < samples.len() && fields_drawn < 2 && passes < 8 {
        if offset > 2 * scanline_w {
            offset -= 2 * scanline_w;
        }
        let outcome = session.extract_field(&samples[offset..], field, None)?;
        if outcome.consumed == 0 {
            break;
        }
        offset += outcome.consumed;
        passes += 1;

        match outcome.tag {
            FieldTag::Partial => {}
            tag => {
                assembler.blit(field, tag);
                fields_drawn += 1;
            }
        }
    }

    Ok(())
}

fn is_fatal(err: &DecodeError) -> bool {
    !matches!(
        err,
        DecodeError::Acquisition(_) | DecodeError::DegenerateCalibration { .. }
    )
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logging.
    env_logger::init();

    // Load settings: first argument is a JSON settings file path.
    let mut settings = match std::env::args().nth(1) {
        Some(path) => Settings::load(Path::new(&path))?,
        None => {
            let default_path = Path::new("composite.json");
            if default_path.exists() {
                Settings::load(default_path)?
            } else {
                Settings::default()
            }
        }
    };

    let interval_ns = settings.interval_ns();
    info!("sampling interval {interval_ns} ns");

    let mut session = DecoderSession::new(interval_ns, &settings)?;
    let mut source = SyntheticSource::new(interval_ns, &settings)?;
    let mut field = Field::new(session.params().scanline_w);
    let mut assembler = FrameAssembler::new(session.params(), settings.scale_x, settings.scale_y);

    // Create event loop.
    let event_loop = EventLoop::new();

    // Create window.
    let window = {
        let size = PhysicalSize::new(assembler.width() as u32, assembler.height() as u32);
        WindowBuilder::new()
            .with_title("Composite Video Decoder")
            .with_inner_size(size)
            .with_min_inner_size(size)
            .build(&event_loop)?
    };
    window.set_resizable(false);
    info!("window size {} x {}", assembler.width(), assembler.height());

    // Create pixel buffer.
    let mut pixels = {
        let window_size = window.inner_size();
        let surface_texture = SurfaceTexture::new(window_size.width, window_size.height, &window);
        Pixels::new(assembler.width() as u32, assembler.height() as u32, surface_texture)?
    };

    let mut modifiers = ModifiersState::empty();

    event_loop.run(move |event, _, control_flow| {
        match event {
            Event::RedrawRequested(_) => {
                match decode_cycle(&mut source, &mut session, &mut field, &mut assembler) {
                    Ok(()) => {}
                    Err(err) if is_fatal(&err) => {
                        error!("fatal decode error: {err}");
                        *control_flow = ControlFlow::Exit;
                        return;
                    }
                    Err(err) => {
                        warn!("skipping capture cycle: {err}");
                        return;
                    }
                }

                assembler.present(pixels.get_frame_mut());
                if let Err(err) = pixels.render() {
                    error!("render failed: {err}");
                    *control_flow = ControlFlow::Exit;
                }
            }
            Event::MainEventsCleared => {
                window.request_redraw();
            }
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => {
                    *control_flow = ControlFlow::Exit;
                }
                WindowEvent::Resized(size) => {
                    if let Err(err) = pixels.resize_surface(size.width, size.height) {
                        error!("surface resize failed: {err}");
                        *control_flow = ControlFlow::Exit;
                    }
                }
                WindowEvent::ModifiersChanged(state) => {
                    modifiers = state;
                }
                WindowEvent::KeyboardInput {
                    input:
                        KeyboardInput {
                            state: ElementState::Pressed,
                            virtual_keycode: Some(key),
                            ..
                        },
                    ..
                } => {
                    let mut layout_changed = false;
                    match key {
                        VirtualKeyCode::Space => {
                            let mono = !session.monochrome();
                            info!("{} mode", if mono { "monochrome" } else { "color" });
                            session.set_monochrome(mono);
                        }
                        VirtualKeyCode::Return => {
                            info!("forcing recalibration");
                            session.invalidate_calibration();
                        }
                        VirtualKeyCode::Left => {
                            settings.scale_x = (settings.scale_x - 1).max(MIN_SCALE);
                            layout_changed = true;
                        }
                        VirtualKeyCode::Right => {
                            settings.scale_x = (settings.scale_x + 1).min(MAX_SCALE);
                            layout_changed = true;
                        }
                        VirtualKeyCode::Up => {
                            settings.scale_y = (settings.scale_y - 1).max(MIN_SCALE);
                            layout_changed = true;
                        }
                        VirtualKeyCode::Down => {
                            settings.scale_y = (settings.scale_y + 1).min(MAX_SCALE);
                            layout_changed = true;
                        }
                        VirtualKeyCode::Equals => {
                            if modifiers.shift() {
                                settings.crop_right += 1;
                            } else {
                                settings.crop_left += 1;
                            }
                            layout_changed = true;
                        }
                        VirtualKeyCode::Minus => {
                            if modifiers.shift() {
                                settings.crop_right = settings.crop_right.saturating_sub(1);
                            } else {
                                settings.crop_left = settings.crop_left.saturating_sub(1);
                            }
                            layout_changed = true;
                        }
                        other => {
                            info!("no function bound to {other:?}");
                        }
                    }

                    if layout_changed {
                        if let Err(err) = session.reconfigure(&settings) {
                            error!("reconfiguration failed: {err}");
                            *control_flow = ControlFlow::Exit;
                            return;
                        }
                        field.clear();
                        assembler =
                            FrameAssembler::new(session.params(), settings.scale_x, settings.scale_y);
                        window.set_inner_size(PhysicalSize::new(
                            assembler.width() as u32,
                            assembler.height() as u32,
                        ));
                        if let Err(err) = pixels
                            .resize_buffer(assembler.width() as u32, assembler.height() as u32)
                        {
                            error!("buffer resize failed: {err}");
                            *control_flow = ControlFlow::Exit;
                        }
                    }
                }
                _ => {}
            },
            _ => {}
        }
    });
}

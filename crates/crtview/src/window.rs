use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use compositor::{
    FadeCurve, FrameDriver, GpuBackend, GpuSettings, LatestField, ShaderOptions, SurfaceError,
    TextureLayout,
};
use tracing::{error, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder};
use winit::window::WindowBuilder;

use crate::bindings::{action_for_key, Controls};
use crate::pattern::{PatternKind, PatternProducer};

/// Frames between two frame-rate reports in the window title.
const TITLE_INTERVAL: u64 = 120;

pub struct WindowConfig {
    pub size: (u32, u32),
    pub field_size: (u32, u32),
    pub pattern: PatternKind,
    pub field_rate: f32,
    pub options: ShaderOptions,
    pub gpu: GpuSettings,
    pub fade_frames: u32,
    pub fade_curve: FadeCurve,
    pub powered_off: bool,
}

pub fn run_window(config: WindowConfig) -> Result<()> {
    let event_loop = EventLoopBuilder::new()
        .build()
        .map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let window = WindowBuilder::new()
        .with_title("crtview")
        .with_inner_size(PhysicalSize::new(config.size.0, config.size.1))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = Arc::new(window);

    let (field_width, field_height) = config.field_size;
    let layout = TextureLayout::new(field_width, field_height).context("invalid field size")?;
    let backend = GpuBackend::new(window.as_ref(), window.inner_size(), layout, config.gpu)
        .context("failed to initialise gpu backend")?;
    let mut driver = FrameDriver::new(backend).with_fade(config.fade_frames, config.fade_curve);

    let source = Arc::new(LatestField::new());
    source.set_powered_off(config.powered_off);
    let _producer = PatternProducer::spawn(
        source.clone(),
        config.pattern,
        config.field_size,
        config.field_rate,
    )?;
    let mut controls = Controls::new(config.options);

    tracing::info!(
        field_width,
        field_height,
        "viewer running (space: pause, p: power, b: bloom, c: cube, m: dot mask, s: scanlines, w: white)"
    );
    window.request_redraw();

    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
                WindowEvent::KeyboardInput { event, .. } => {
                    if event.state == ElementState::Pressed && !event.repeat {
                        if let Some(action) = action_for_key(&event.logical_key) {
                            if !controls.apply(action, &source) {
                                elwt.exit();
                            }
                        }
                    }
                }
                WindowEvent::Resized(new_size) => driver.backend_mut().resize(new_size),
                WindowEvent::RedrawRequested => {
                    let view = controls.view();
                    match driver.render_frame(source.as_ref(), &controls.options, &view) {
                        Ok(_) => {
                            controls.step();
                            if driver.frames() % TITLE_INTERVAL == 0 {
                                let fps = driver.backend().frames_per_second();
                                window.set_title(&format!("crtview ({fps:.1} fps)"));
                            }
                        }
                        Err(SurfaceError::Lost | SurfaceError::Outdated) => {
                            let size = driver.backend().size();
                            driver.backend_mut().resize(size);
                        }
                        Err(SurfaceError::OutOfMemory) => {
                            error!("surface out of memory; exiting");
                            elwt.exit();
                        }
                        Err(SurfaceError::Timeout) => {
                            warn!("surface timeout; retrying next frame");
                        }
                        Err(other) => {
                            warn!("surface error: {other:?}; retrying next frame");
                        }
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                window.request_redraw();
                elwt.set_control_flow(ControlFlow::Wait);
            }
            _ => {}
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))
}

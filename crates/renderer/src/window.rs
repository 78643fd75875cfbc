use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use theme::ThemeCell;
use tracing::{debug, error, info, warn};
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::backend::FrameError;
use crate::controller::{FrameOutcome, ParticleController};
use crate::gpu::GpuBackend;
use crate::scene::Viewport;
use crate::sprite::Waker;
use crate::types::RendererConfig;

#[derive(Debug, Clone, Copy)]
enum RuntimeEvent {
    /// Background work finished; the controller has something to pump.
    Wake,
}

/// Opens the window and drives the controller until it is closed.
pub(crate) fn run_window(config: RendererConfig, theme: ThemeCell) -> Result<()> {
    let event_loop = EventLoopBuilder::<RuntimeEvent>::with_user_event()
        .build()
        .map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let window = WindowBuilder::new()
        .with_title(config.title.clone())
        .with_inner_size(LogicalSize::new(config.surface_size.0, config.surface_size.1))
        .with_transparent(true)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = Arc::new(window);

    let viewport = viewport_for(&window, window.inner_size());
    let backend = GpuBackend::new(
        window.as_ref(),
        window.inner_size(),
        viewport.buffer_size(config.field.max_pixel_ratio),
        config.antialiasing,
        config.power,
        config.field.bloom,
    )
    .map_err(|err| anyhow!("failed to initialise renderer: {err:#}"))?;

    let proxy: Mutex<EventLoopProxy<RuntimeEvent>> = Mutex::new(event_loop.create_proxy());
    let waker: Waker = Arc::new(move || {
        let proxy = proxy.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let _ = proxy.send_event(RuntimeEvent::Wake);
    });

    let mut controller = ParticleController::new(
        backend,
        viewport,
        config.field.clone(),
        &theme,
        Box::new(config.sprite.clone()),
        waker,
    );
    let mut stats = FrameStats::new(config.field.stats_interval, Instant::now());
    info!("press `t` to toggle the theme, Escape to quit");

    let run_result = event_loop.run(move |event, elwt| match event {
        Event::UserEvent(RuntimeEvent::Wake) => {
            if controller.pump() && controller.wants_frames() {
                window.request_redraw();
            }
        }
        Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                controller.teardown();
                elwt.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                match event.logical_key {
                    Key::Named(NamedKey::Escape) => {
                        controller.teardown();
                        elwt.exit();
                    }
                    Key::Character(ref value) if value.as_str().eq_ignore_ascii_case("t") => {
                        let mode = theme.toggle();
                        info!(theme = %mode, "theme toggled from keyboard");
                    }
                    _ => {}
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let logical = position.to_logical::<f64>(window.scale_factor());
                controller.handle_pointer_moved(logical.x, logical.y);
            }
            WindowEvent::Resized(new_size) => {
                controller.handle_resize(viewport_for(&window, new_size));
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                controller.handle_resize(viewport_for(&window, window.inner_size()));
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                match controller.frame(now) {
                    Ok(FrameOutcome::Rendered) => {
                        stats.record(now, controller.frames_rendered());
                    }
                    Ok(FrameOutcome::Idle | FrameOutcome::Stopped) => {}
                    Err(FrameError::SurfaceLost) => controller.reconfigure(),
                    Err(FrameError::OutOfMemory) => {
                        error!("surface out of memory; exiting");
                        controller.teardown();
                        elwt.exit();
                    }
                    Err(FrameError::Timeout) => {
                        warn!("surface timeout; retrying next frame");
                    }
                    Err(err) => {
                        warn!(error = %err, "frame failed; retrying next frame");
                    }
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            controller.pump();
            if controller.wants_frames() {
                window.request_redraw();
            }
            elwt.set_control_flow(ControlFlow::Wait);
        }
        Event::LoopExiting => {
            controller.teardown();
        }
        _ => {}
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}

fn viewport_for(window: &Window, size: PhysicalSize<u32>) -> Viewport {
    let scale_factor = window.scale_factor();
    let logical: LogicalSize<f64> = size.to_logical(scale_factor);
    Viewport::new(
        logical.width.round() as u32,
        logical.height.round() as u32,
        scale_factor,
    )
}

/// Rolling frame counter logged at debug level.
#[derive(Debug)]
struct FrameStats {
    interval: Duration,
    window_start: Instant,
    frames_at_start: u64,
}

impl FrameStats {
    fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            window_start: now,
            frames_at_start: 0,
        }
    }

    /// Returns the frames-per-second figure when a report was due.
    fn record(&mut self, now: Instant, total_frames: u64) -> Option<f32> {
        let elapsed = now.saturating_duration_since(self.window_start);
        if self.interval.is_zero() || elapsed < self.interval {
            return None;
        }
        let frames = total_frames.saturating_sub(self.frames_at_start);
        let fps = frames as f32 / elapsed.as_secs_f32();
        debug!(fps = fps.round(), frames = total_frames, "render stats");
        self.window_start = now;
        self.frames_at_start = total_frames;
        Some(fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_report_once_per_interval() {
        let start = Instant::now();
        let mut stats = FrameStats::new(Duration::from_secs(1), start);
        assert_eq!(stats.record(start + Duration::from_millis(500), 30), None);
        let fps = stats
            .record(start + Duration::from_secs(2), 120)
            .expect("report due");
        assert!((fps - 60.0).abs() < 0.01);
        assert_eq!(stats.record(start + Duration::from_millis(2500), 150), None);
    }

    #[test]
    fn zero_interval_disables_stats() {
        let start = Instant::now();
        let mut stats = FrameStats::new(Duration::ZERO, start);
        assert_eq!(stats.record(start + Duration::from_secs(10), 600), None);
    }
}

mod animator;
mod config;
mod error;
mod graphics;
mod lorenz;
mod raster;
mod surface;
mod trail;
mod viewport;

use animator::{Animator, FrameScheduler};
use config::AppConfig;
use graphics::{scene_vertices, Graphics};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use surface::Scene;
use winit::{
    event::{ElementState, Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::WindowBuilder,
};

/// Frame scheduler backed by the window's redraw requests. A request is held
/// until the frame interval has elapsed, so at most one redraw is pending.
struct RedrawScheduler {
    pending: bool,
    interval: Duration,
    last_frame: Instant,
}

impl RedrawScheduler {
    fn new(interval: Duration) -> Self {
        RedrawScheduler {
            pending: false,
            interval,
            last_frame: Instant::now(),
        }
    }

    /// True when a requested frame is due now.
    fn take_due(&mut self, now: Instant) -> bool {
        if self.pending && now.duration_since(self.last_frame) >= self.interval {
            self.pending = false;
            self.last_frame = now;
            true
        } else {
            false
        }
    }

    fn next_due(&self) -> Option<Instant> {
        self.pending.then(|| self.last_frame + self.interval)
    }
}

impl FrameScheduler for RedrawScheduler {
    fn request_frame(&mut self) {
        self.pending = true;
    }
}

fn save_snapshot(animator: &Animator<Scene>, config: &AppConfig) {
    let viewport = &animator.config().viewport;
    let img = raster::render_scene(animator.surface(), viewport, config.snapshot.scale);
    let path = PathBuf::from(&config.snapshot.directory)
        .join(format!("lorenz-frame-{}.png", animator.frame_count()));
    match img.save(&path) {
        Ok(()) => log::info!("saved snapshot to {}", path.display()),
        Err(e) => log::error!("snapshot {} failed: {e}", path.display()),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    println!("Lorenz Attractor Viewer - Rust");
    println!("==============================");
    println!("S: save snapshot   R: restart   Esc: quit");

    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            log::error!("config: {e}");
            return;
        }
    };

    let event_loop = match EventLoop::new() {
        Ok(el) => el,
        Err(e) => {
            log::error!("event loop: {e}");
            return;
        }
    };
    let window = match WindowBuilder::new()
        .with_title(config.window.title.as_str())
        .with_inner_size(winit::dpi::LogicalSize::new(
            config.window.width,
            config.window.height,
        ))
        .build(&event_loop)
    {
        Ok(w) => Arc::new(w),
        Err(e) => {
            log::error!("window: {e}");
            return;
        }
    };

    // Without a drawable surface the viewer does not animate at all
    let mut graphics = match pollster::block_on(Graphics::new(window.clone())) {
        Ok(g) => g,
        Err(e) => {
            log::error!("rendering surface unavailable, animation disabled: {e}");
            return;
        }
    };

    let mut scheduler =
        RedrawScheduler::new(Duration::from_millis(config.window.frame_interval_ms));
    let mut animator = Animator::new(config.animator, Scene::new());
    if let Err(e) = animator.start(&mut scheduler) {
        log::error!("animator failed to start: {e}");
        return;
    }

    let result = event_loop.run(move |event, target| match event {
        Event::WindowEvent {
            ref event,
            window_id,
        } if window_id == window.id() => match event {
            WindowEvent::CloseRequested => target.exit(),
            WindowEvent::Resized(physical_size) => graphics.resize(*physical_size),
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                match event.logical_key.as_ref() {
                    Key::Character("s" | "S") => save_snapshot(&animator, &config),
                    Key::Character("r" | "R") => {
                        animator.reset();
                        log::info!("restarted from seed");
                    }
                    Key::Named(NamedKey::Escape) => target.exit(),
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => {
                animator.frame(&mut scheduler);

                let (w, h) = graphics.size();
                let vertices = scene_vertices(
                    animator.surface(),
                    &animator.config().viewport,
                    w as f64,
                    h as f64,
                );
                graphics.update_vertices(&vertices);

                match graphics.render() {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        graphics.reconfigure()
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("GPU out of memory");
                        target.exit();
                    }
                    Err(e) => log::warn!("render error: {e:?}"),
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            if scheduler.take_due(Instant::now()) {
                window.request_redraw();
            } else if let Some(due) = scheduler.next_due() {
                target.set_control_flow(ControlFlow::WaitUntil(due));
            }
        }
        _ => {}
    });

    if let Err(e) = result {
        log::error!("event loop terminated: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redraw_waits_for_request_and_interval() {
        let mut s = RedrawScheduler::new(Duration::from_millis(16));
        let t0 = s.last_frame;
        assert!(!s.take_due(t0 + Duration::from_millis(100)));

        s.request_frame();
        assert!(!s.take_due(t0 + Duration::from_millis(5)));
        assert!(s.take_due(t0 + Duration::from_millis(20)));
        // consumed: one pending frame at a time
        assert!(!s.take_due(t0 + Duration::from_millis(60)));
    }
}

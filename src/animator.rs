//! Frame driver for the Lorenz trajectory animation.
//!
//! One [`Animator`] owns one trajectory point, its trail and the surface they
//! are drawn on. The host calls [`Animator::start`] once and then
//! [`Animator::frame`] whenever the scheduler it was handed fires. Every frame
//! integrates, projects, colors, emits a marker on even ages, fades and culls
//! the trail, and asks for the next frame.

use serde::{Deserialize, Serialize};

use crate::error::AnimatorError;
use crate::lorenz::{euler_step, LorenzParams, TrajectoryPoint};
use crate::surface::{ElementHandle, ElementKind, RenderSurface};
use crate::trail::{TrailPolicy, Trails};
use crate::viewport::{spectrum_color, Rgb, ScreenPos, Viewport, GLOW_ALPHA, GLOW_RADIUS};

/// Immutable settings handed to the animator at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimatorConfig {
    pub simulation: LorenzParams,
    pub seed: [f64; 3],
    pub viewport: Viewport,
    pub trail: TrailPolicy,
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        AnimatorConfig {
            simulation: LorenzParams::default(),
            seed: [0.1, 0.1, 0.1],
            viewport: Viewport::default(),
            trail: TrailPolicy::default(),
        }
    }
}

/// "Give me another frame." Implemented by the window (request_redraw) or
/// by the web viewer's tick loop.
pub trait FrameScheduler {
    fn request_frame(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DriverState {
    Uninitialized,
    Running,
}

const BOUNDARY_COLOR: Rgb = Rgb(0x66, 0x7E, 0xEA);

pub struct Animator<S: RenderSurface> {
    config: AnimatorConfig,
    surface: S,
    state: DriverState,
    point: TrajectoryPoint,
    point_handle: Option<ElementHandle>,
    boundary_handle: Option<ElementHandle>,
    last_screen: ScreenPos,
    trails: Trails,
    frames: u64,
}

impl<S: RenderSurface> Animator<S> {
    pub fn new(config: AnimatorConfig, surface: S) -> Self {
        Animator {
            config,
            surface,
            state: DriverState::Uninitialized,
            point: TrajectoryPoint::from_array(config.seed),
            point_handle: None,
            boundary_handle: None,
            last_screen: config.viewport.center(),
            trails: Trails::new(config.trail),
            frames: 0,
        }
    }

    pub fn config(&self) -> &AnimatorConfig {
        &self.config
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn point(&self) -> &TrajectoryPoint {
        &self.point
    }

    /// Clamped screen position of the point after the last frame.
    pub fn screen_position(&self) -> ScreenPos {
        self.last_screen
    }

    pub fn trails(&self) -> &Trails {
        &self.trails
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Create the boundary and the point, then schedule the first frame.
    /// On a missing surface nothing is scheduled and the animator stays
    /// uninitialized.
    pub fn start<F: FrameScheduler>(&mut self, scheduler: &mut F) -> Result<(), AnimatorError> {
        if self.state == DriverState::Running {
            return Err(AnimatorError::AlreadyRunning);
        }

        let vp = self.config.viewport;
        let boundary = self.surface.create(ElementKind::Boundary)?;
        self.surface.set_position(boundary, 0.0, 0.0);
        self.surface.set_color(boundary, BOUNDARY_COLOR);

        let point = match self.surface.create(ElementKind::Point) {
            Ok(h) => h,
            Err(e) => {
                if let Err(e) = self.surface.destroy(boundary) {
                    log::warn!("boundary release failed: {e}");
                }
                return Err(e.into());
            }
        };
        let center = vp.center();
        self.surface.set_position(point, center.x, center.y);
        self.surface.set_color(point, spectrum_color(center.x, vp.width));

        self.boundary_handle = Some(boundary);
        self.point_handle = Some(point);
        self.state = DriverState::Running;
        log::info!(
            "lorenz animator running: seed=({}, {}, {}) viewport={}x{}",
            self.point.x,
            self.point.y,
            self.point.z,
            vp.width,
            vp.height
        );

        scheduler.request_frame();
        Ok(())
    }

    /// One animation frame. Ignored until [`Animator::start`] succeeded.
    pub fn frame<F: FrameScheduler>(&mut self, scheduler: &mut F) {
        if self.state != DriverState::Running {
            log::debug!("frame callback before start, ignoring");
            return;
        }
        self.update_point();
        let culled = self.trails.advance(&mut self.surface);
        self.frames += 1;
        log::trace!(
            "frame {}: age={} trails={} culled={}",
            self.frames,
            self.point.age,
            self.trails.len(),
            culled
        );
        scheduler.request_frame();
    }

    fn update_point(&mut self) {
        euler_step(&mut self.point, &self.config.simulation);

        let vp = self.config.viewport;
        let screen = vp.project(self.point.x, self.point.y);
        // Color follows the clamped position so it matches the visible dot
        let color = spectrum_color(screen.x, vp.width);
        self.last_screen = screen;

        if let Some(h) = self.point_handle {
            self.surface.set_position(h, screen.x, screen.y);
            self.surface.set_color(h, color);
            self.surface.set_glow(h, color, GLOW_ALPHA, GLOW_RADIUS);
        }

        if self.trails.should_emit(self.point.age) {
            self.trails.emit(&mut self.surface, screen, color);
        }
    }

    /// Back to the seed with an empty trail. The boundary and point stay.
    pub fn reset(&mut self) {
        self.trails.clear(&mut self.surface);
        self.point = TrajectoryPoint::from_array(self.config.seed);
        self.last_screen = self.config.viewport.center();
        self.frames = 0;
    }
}

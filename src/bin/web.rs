use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

#[path = "../animator.rs"]
mod animator;
#[path = "../config.rs"]
mod config;
#[path = "../error.rs"]
mod error;
#[path = "../lorenz.rs"]
mod lorenz;
#[path = "../raster.rs"]
mod raster;
#[path = "../surface.rs"]
mod surface;
#[path = "../trail.rs"]
mod trail;
#[path = "../viewport.rs"]
mod viewport;

use animator::{Animator, DriverState, FrameScheduler};
use config::AppConfig;
use lorenz::TrajectoryPoint;
use surface::Scene;
use viewport::{ScreenPos, Viewport};

/// Everything the page needs to draw one frame.
#[derive(Serialize, Clone)]
struct FrameSnapshot {
    frame: u64,
    state: DriverState,
    point: TrajectoryPoint,
    screen: ScreenPos,
    trail_count: usize,
    viewport: Viewport,
    scene: Scene,
}

impl FrameSnapshot {
    fn capture(animator: &Animator<Scene>) -> Self {
        FrameSnapshot {
            frame: animator.frame_count(),
            state: animator.state(),
            point: *animator.point(),
            screen: animator.screen_position(),
            trail_count: animator.trails().len(),
            viewport: animator.config().viewport,
            scene: animator.surface().clone(),
        }
    }
}

#[derive(Clone)]
struct AppState {
    frames: watch::Receiver<FrameSnapshot>,
    config: Arc<AppConfig>,
}

#[derive(Deserialize)]
struct SnapshotQuery {
    frames: Option<u64>,
    scale: Option<u32>,
}

/// Scheduler for the tick loop: a frame request is honoured on the next tick.
#[derive(Default)]
struct TickScheduler {
    requested: bool,
}

impl TickScheduler {
    fn take(&mut self) -> bool {
        std::mem::take(&mut self.requested)
    }
}

impl FrameScheduler for TickScheduler {
    fn request_frame(&mut self) {
        self.requested = true;
    }
}

/// The only owner of the animator. Runs until every receiver is gone.
async fn run_animation(
    mut animator: Animator<Scene>,
    mut scheduler: TickScheduler,
    tx: watch::Sender<FrameSnapshot>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    while scheduler.take() {
        ticker.tick().await;
        animator.frame(&mut scheduler);
        if tx.send(FrameSnapshot::capture(&animator)).is_err() {
            log::info!("no viewers left, stopping animation");
            break;
        }
    }
}

const INDEX_HTML: &str = r##"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <title>Lorenz Attractor</title>
    <style>
      body { margin: 0; background: #1a202c; color: #e2e8f0; font-family: sans-serif; display: flex; flex-direction: column; align-items: center; }
      h1 { font-weight: 300; margin: 24px 0 8px; }
      #lorenz-canvas { margin-top: 16px; image-rendering: auto; }
      #stats { font-size: 12px; color: #a0aec0; margin-top: 8px; font-family: monospace; }
      a { color: #667eea; }
    </style>
  </head>
  <body>
    <h1>Lorenz Attractor</h1>
    <canvas id="lorenz-canvas" width="800" height="600"></canvas>
    <div id="stats"></div>
    <p><a href="/snapshot.png?frames=1000" download="lorenz.png">Export PNG</a> · <a href="/config">Config</a></p>
    <script>
      (function () {
        const canvas = document.getElementById('lorenz-canvas');
        if (!canvas) {
          console.error('Lorenz canvas not found!');
          return;
        }
        const ctx = canvas.getContext('2d');
        const stats = document.getElementById('stats');
        const radius = { point: 4, trail: 1.5 };
        let inflight = false;

        function draw(snap) {
          const vp = snap.viewport;
          const k = Math.min(canvas.width / vp.width, canvas.height / vp.height);
          const ox = (canvas.width - vp.width * k) / 2;
          const oy = (canvas.height - vp.height * k) / 2;
          ctx.setTransform(1, 0, 0, 1, 0, 0);
          ctx.clearRect(0, 0, canvas.width, canvas.height);
          ctx.setTransform(k, 0, 0, k, ox, oy);

          for (const e of snap.scene.elements) {
            ctx.globalAlpha = e.opacity;
            if (e.kind === 'boundary') {
              ctx.strokeStyle = e.color;
              ctx.lineWidth = 1 / k;
              ctx.strokeRect(0, 0, vp.width, vp.height);
              continue;
            }
            if (e.glow) {
              ctx.shadowColor = e.glow.color + Math.round(e.glow.alpha * 255).toString(16).padStart(2, '0');
              ctx.shadowBlur = e.glow.radius * k;
            } else {
              ctx.shadowBlur = 0;
            }
            ctx.fillStyle = e.color;
            ctx.beginPath();
            ctx.arc(e.x, e.y, radius[e.kind], 0, Math.PI * 2);
            ctx.fill();
          }
          ctx.globalAlpha = 1;
          ctx.shadowBlur = 0;
          if (stats) {
            const p = snap.point;
            stats.textContent = `frame ${snap.frame}  x=${p.x.toFixed(3)} y=${p.y.toFixed(3)} z=${p.z.toFixed(3)}  trails=${snap.trail_count}`;
          }
        }

        function animate() {
          if (!inflight) {
            inflight = true;
            fetch('/frame')
              .then((r) => r.json())
              .then(draw)
              .catch((err) => console.error('frame fetch failed', err))
              .finally(() => { inflight = false; });
          }
          requestAnimationFrame(animate);
        }
        animate();
      })();
    </script>
  </body>
</html>
"##;

async fn index() -> impl IntoResponse {
    Html(INDEX_HTML)
}

async fn frame(State(state): State<AppState>) -> impl IntoResponse {
    let snap = state.frames.borrow().clone();
    Json(snap)
}

async fn current_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.config.as_ref().clone())
}

fn snapshot_png(config: &AppConfig, q: &SnapshotQuery) -> Result<Vec<u8>, String> {
    let frames = q.frames.unwrap_or(1000).min(config.web.max_snapshot_frames);
    let scale = q.scale.unwrap_or(config.snapshot.scale).clamp(1, 16);
    let img = raster::snapshot_after(&config.animator, frames, scale);
    raster::encode_png(&img).map_err(|e| format!("encode png: {e}"))
}

async fn snapshot(State(state): State<AppState>, Query(q): Query<SnapshotQuery>) -> Response {
    let config = state.config.clone();
    let result = tokio::task::spawn_blocking(move || snapshot_png(&config, &q))
        .await
        .map_err(|e| format!("snapshot task: {e}"))
        .and_then(|r| r);

    match result {
        Ok(bytes) => ([(header::CONTENT_TYPE, "image/png")], bytes).into_response(),
        Err(e) => {
            log::error!("{e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/frame", get(frame))
        .route("/config", get(current_config))
        .route("/snapshot.png", get(snapshot))
        .with_state(state)
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let config = match AppConfig::load() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            log::error!("config: {e}");
            return;
        }
    };
    let addr: SocketAddr = match config.web.bind.parse() {
        Ok(a) => a,
        Err(e) => {
            log::error!("bad bind address {:?}: {e}", config.web.bind);
            return;
        }
    };

    let mut animator = Animator::new(config.animator, Scene::new());
    let mut scheduler = TickScheduler::default();
    if let Err(e) = animator.start(&mut scheduler) {
        log::error!("animator failed to start, serving without animation: {e}");
    }

    let (tx, rx) = watch::channel(FrameSnapshot::capture(&animator));
    let interval = Duration::from_millis(config.web.frame_interval_ms);
    tokio::spawn(run_animation(animator, scheduler, tx, interval));

    let app = router(AppState {
        frames: rx,
        config: config.clone(),
    });

    log::info!("Serving on http://{addr}");
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            log::error!("bind {addr}: {e}");
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        log::error!("server: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_scheduler_consumes_request() {
        let mut s = TickScheduler::default();
        assert!(!s.take());
        s.request_frame();
        assert!(s.take());
        assert!(!s.take());
    }

    #[test]
    fn test_snapshot_capture_serializes_scene() {
        let mut sched = TickScheduler::default();
        let mut animator = Animator::new(AppConfig::default().animator, Scene::new());
        animator.start(&mut sched).unwrap();
        for _ in 0..10 {
            animator.frame(&mut sched);
        }
        let json = serde_json::to_value(FrameSnapshot::capture(&animator)).unwrap();
        assert_eq!(json["frame"], 10);
        assert_eq!(json["state"], "Running");
        assert_eq!(json["trail_count"], 5);
        assert_eq!(json["point"]["age"], 10);
        // boundary + point + 5 markers
        assert_eq!(json["scene"]["elements"].as_array().map(|a| a.len()), Some(7));
        assert_eq!(json["viewport"]["width"], 200.0);
    }

    #[test]
    fn test_snapshot_png_caps_frames() {
        let mut config = AppConfig::default();
        config.web.max_snapshot_frames = 10;
        let q = SnapshotQuery {
            frames: Some(u64::MAX),
            scale: Some(1),
        };
        let png = snapshot_png(&config, &q).unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }

    #[test]
    fn test_unstarted_animator_snapshot_is_empty() {
        let animator = Animator::new(AppConfig::default().animator, Scene::unavailable("none"));
        let snap = FrameSnapshot::capture(&animator);
        assert_eq!(snap.state, DriverState::Uninitialized);
        assert!(snap.scene.elements().is_empty());
    }
}

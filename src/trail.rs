/// Fading trail markers left behind the trajectory point

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::surface::{ElementHandle, ElementKind, RenderSurface};
use crate::viewport::{Rgb, ScreenPos};

/// Emission, fade and cull settings.
///
/// `max_trails` is an optional hard cap. When unset, markers are only
/// bounded by age: with the defaults that is max_age / emission_period = 150.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailPolicy {
    pub emission_period: u64,
    pub max_age: u64,
    pub decay_rate: f64,
    pub max_trails: Option<usize>,
}

impl Default for TrailPolicy {
    fn default() -> Self {
        TrailPolicy {
            emission_period: 2,
            max_age: 300,
            decay_rate: 0.02,
            max_trails: None,
        }
    }
}

impl TrailPolicy {
    /// Markers alive at once once emission and culling balance out.
    pub fn steady_state_len(&self) -> usize {
        let by_age = (self.max_age / self.emission_period.max(1)) as usize;
        match self.max_trails {
            Some(cap) => by_age.min(cap),
            None => by_age,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrailMarker {
    pub screen_x: f64,
    pub screen_y: f64,
    pub age: u64,
    pub handle: ElementHandle,
}

/// exp(-decay * age), floored at 0
pub fn opacity(age: u64, decay_rate: f64) -> f64 {
    (-decay_rate * age as f64).exp().max(0.0)
}

/// Markers in creation order, oldest first.
#[derive(Debug, Default)]
pub struct Trails {
    policy: TrailPolicy,
    markers: VecDeque<TrailMarker>,
}

impl Trails {
    pub fn new(policy: TrailPolicy) -> Self {
        Trails {
            policy,
            markers: VecDeque::new(),
        }
    }

    pub fn policy(&self) -> &TrailPolicy {
        &self.policy
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrailMarker> {
        self.markers.iter()
    }

    /// Emission happens on every `emission_period`-th point age.
    pub fn should_emit(&self, point_age: u64) -> bool {
        point_age % self.policy.emission_period.max(1) == 0
    }

    /// Drop a new marker at `pos`. A failing surface skips the marker.
    pub fn emit<S: RenderSurface>(&mut self, surface: &mut S, pos: ScreenPos, color: Rgb) {
        if let Some(cap) = self.policy.max_trails {
            while self.markers.len() >= cap {
                match self.markers.pop_front() {
                    Some(oldest) => release(surface, oldest.handle),
                    None => break,
                }
            }
            if cap == 0 {
                return;
            }
        }

        let handle = match surface.create(ElementKind::Trail) {
            Ok(h) => h,
            Err(e) => {
                log::warn!("skipping trail marker: {e}");
                return;
            }
        };
        surface.set_position(handle, pos.x, pos.y);
        surface.set_color(handle, color);

        self.markers.push_back(TrailMarker {
            screen_x: pos.x,
            screen_y: pos.y,
            age: 0,
            handle,
        });
    }

    /// Age every marker by one frame, refresh its opacity and cull the ones
    /// past `max_age`. Each marker is visited exactly once; culled handles are
    /// released exactly once. Returns how many markers were culled.
    pub fn advance<S: RenderSurface>(&mut self, surface: &mut S) -> usize {
        let TrailPolicy {
            max_age,
            decay_rate,
            ..
        } = self.policy;
        let before = self.markers.len();

        self.markers.retain_mut(|marker| {
            marker.age += 1;
            surface.set_opacity(marker.handle, opacity(marker.age, decay_rate));
            if marker.age > max_age {
                release(surface, marker.handle);
                false
            } else {
                true
            }
        });

        before - self.markers.len()
    }

    /// Release every marker, e.g. before restarting the animation.
    pub fn clear<S: RenderSurface>(&mut self, surface: &mut S) {
        for marker in self.markers.drain(..) {
            release(surface, marker.handle);
        }
    }
}

fn release<S: RenderSurface>(surface: &mut S, handle: ElementHandle) {
    if let Err(e) = surface.destroy(handle) {
        log::warn!("trail marker release failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::Scene;

    fn pos(x: f64) -> ScreenPos {
        ScreenPos { x, y: 10.0 }
    }

    #[test]
    fn test_opacity_decreases_and_floors() {
        let mut last = opacity(0, 0.02);
        assert_eq!(last, 1.0);
        for age in 1..=1000 {
            let o = opacity(age, 0.02);
            assert!(o < last, "age {age}");
            assert!(o >= 0.0);
            last = o;
        }
        assert_eq!(opacity(100_000, 0.02), 0.0);
    }

    #[test]
    fn test_should_emit_on_even_ages() {
        let trails = Trails::new(TrailPolicy::default());
        let emitted: Vec<u64> = (1..=10).filter(|&a| trails.should_emit(a)).collect();
        assert_eq!(emitted, vec![2, 4, 6, 8, 10]);
    }

    #[test]
    fn test_marker_removed_exactly_after_max_age() {
        let mut scene = Scene::new();
        let mut trails = Trails::new(TrailPolicy::default());
        trails.emit(&mut scene, pos(1.0), Rgb(0, 0, 0));

        for _ in 0..300 {
            assert_eq!(trails.advance(&mut scene), 0);
        }
        assert_eq!(trails.len(), 1);
        assert_eq!(trails.iter().next().map(|m| m.age), Some(300));

        assert_eq!(trails.advance(&mut scene), 1);
        assert!(trails.is_empty());
        assert_eq!(scene.destroyed(), 1);
        assert!(scene.elements().is_empty());
    }

    #[test]
    fn test_adjacent_expired_markers_all_processed() {
        let mut scene = Scene::new();
        let policy = TrailPolicy {
            max_age: 3,
            ..TrailPolicy::default()
        };
        let mut trails = Trails::new(policy);
        // Two consecutive markers due together, then a younger survivor
        trails.emit(&mut scene, pos(1.0), Rgb(0, 0, 0));
        trails.emit(&mut scene, pos(2.0), Rgb(0, 0, 0));
        trails.advance(&mut scene);
        trails.emit(&mut scene, pos(3.0), Rgb(0, 0, 0));
        trails.advance(&mut scene);
        trails.advance(&mut scene);

        let ages: Vec<u64> = trails.iter().map(|m| m.age).collect();
        assert_eq!(ages, vec![3, 3, 2]);

        assert_eq!(trails.advance(&mut scene), 2);
        let survivors: Vec<(f64, u64)> = trails.iter().map(|m| (m.screen_x, m.age)).collect();
        assert_eq!(survivors, vec![(3.0, 3)]);
        assert_eq!(scene.destroyed(), 2);
    }

    #[test]
    fn test_advance_sets_opacity_on_surface() {
        let mut scene = Scene::new();
        let mut trails = Trails::new(TrailPolicy::default());
        trails.emit(&mut scene, pos(5.0), Rgb(0xFF, 0, 0));
        trails.advance(&mut scene);
        trails.advance(&mut scene);

        let handle = trails.iter().next().unwrap().handle;
        let element = scene.get(handle).unwrap();
        assert_eq!(element.opacity, (-0.02f64 * 2.0).exp());
        assert_eq!(element.color, Rgb(0xFF, 0, 0));
        assert_eq!(element.x, 5.0);
    }

    #[test]
    fn test_max_trails_evicts_oldest() {
        let mut scene = Scene::new();
        let policy = TrailPolicy {
            max_trails: Some(2),
            ..TrailPolicy::default()
        };
        let mut trails = Trails::new(policy);
        for x in [1.0, 2.0, 3.0] {
            trails.emit(&mut scene, pos(x), Rgb(0, 0, 0));
        }
        let xs: Vec<f64> = trails.iter().map(|m| m.screen_x).collect();
        assert_eq!(xs, vec![2.0, 3.0]);
        assert_eq!(scene.count(ElementKind::Trail), 2);
        assert_eq!(policy.steady_state_len(), 2);
    }

    #[test]
    fn test_failed_create_skips_marker() {
        let mut scene = Scene::unavailable("gone");
        let mut trails = Trails::new(TrailPolicy::default());
        trails.emit(&mut scene, pos(1.0), Rgb(0, 0, 0));
        assert!(trails.is_empty());
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut scene = Scene::new();
        let mut trails = Trails::new(TrailPolicy::default());
        for x in 0..5 {
            trails.emit(&mut scene, pos(x as f64), Rgb(0, 0, 0));
        }
        trails.clear(&mut scene);
        assert!(trails.is_empty());
        assert_eq!(scene.destroyed(), 5);
    }
}

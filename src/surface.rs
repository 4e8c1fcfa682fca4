//! Rendering-surface boundary.
//!
//! The animator never draws directly. It asks a [`RenderSurface`] to create
//! visual elements and then moves, colors and fades them through opaque
//! handles. [`Scene`] is the in-memory surface both binaries use: the desktop
//! viewer turns it into GPU quads, the web viewer serializes it to JSON and the
//! snapshot exporter rasterizes it.

use serde::Serialize;

use crate::error::SurfaceError;
use crate::viewport::Rgb;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Boundary,
    Point,
    Trail,
}

impl ElementKind {
    /// Drawn radius in viewport pixels. The boundary is an outline of the
    /// whole viewport and has no radius.
    pub fn radius(self) -> f64 {
        match self {
            ElementKind::Boundary => 0.0,
            ElementKind::Point => 4.0,
            ElementKind::Trail => 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ElementHandle(pub u64);

pub trait RenderSurface {
    fn create(&mut self, kind: ElementKind) -> Result<ElementHandle, SurfaceError>;
    fn set_position(&mut self, handle: ElementHandle, x: f64, y: f64);
    fn set_color(&mut self, handle: ElementHandle, color: Rgb);
    fn set_glow(&mut self, handle: ElementHandle, color: Rgb, alpha: f64, radius: f64);
    fn set_opacity(&mut self, handle: ElementHandle, opacity: f64);
    fn destroy(&mut self, handle: ElementHandle) -> Result<(), SurfaceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Glow {
    pub color: Rgb,
    pub alpha: f64,
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    pub id: ElementHandle,
    pub kind: ElementKind,
    pub x: f64,
    pub y: f64,
    pub color: Rgb,
    pub glow: Option<Glow>,
    pub opacity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Scene {
    #[serde(skip)]
    unavailable: Option<String>,
    #[serde(skip)]
    next_id: u64,
    /// Sorted by id, which is creation order.
    elements: Vec<Element>,
    created: u64,
    destroyed: u64,
}

impl Default for Scene {
    fn default() -> Self {
        Scene::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Scene {
            unavailable: None,
            next_id: 1,
            elements: Vec::new(),
            created: 0,
            destroyed: 0,
        }
    }

    /// A surface whose host element is missing; every `create` fails.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Scene {
            unavailable: Some(reason.into()),
            ..Scene::new()
        }
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn get(&self, handle: ElementHandle) -> Option<&Element> {
        self.index_of(handle).map(|i| &self.elements[i])
    }

    pub fn count(&self, kind: ElementKind) -> usize {
        self.elements.iter().filter(|e| e.kind == kind).count()
    }

    pub fn created(&self) -> u64 {
        self.created
    }

    pub fn destroyed(&self) -> u64 {
        self.destroyed
    }

    fn index_of(&self, handle: ElementHandle) -> Option<usize> {
        self.elements.binary_search_by_key(&handle, |e| e.id).ok()
    }

    fn with_element(&mut self, handle: ElementHandle, f: impl FnOnce(&mut Element)) {
        match self.index_of(handle) {
            Some(i) => f(&mut self.elements[i]),
            None => log::trace!("ignoring update to released element {:?}", handle),
        }
    }
}

impl RenderSurface for Scene {
    fn create(&mut self, kind: ElementKind) -> Result<ElementHandle, SurfaceError> {
        if let Some(reason) = &self.unavailable {
            return Err(SurfaceError::Unavailable(reason.clone()));
        }
        let id = ElementHandle(self.next_id);
        self.next_id += 1;
        self.created += 1;
        self.elements.push(Element {
            id,
            kind,
            x: 0.0,
            y: 0.0,
            color: Rgb(0xFF, 0xFF, 0xFF),
            glow: None,
            opacity: 1.0,
        });
        Ok(id)
    }

    fn set_position(&mut self, handle: ElementHandle, x: f64, y: f64) {
        self.with_element(handle, |e| {
            e.x = x;
            e.y = y;
        });
    }

    fn set_color(&mut self, handle: ElementHandle, color: Rgb) {
        self.with_element(handle, |e| e.color = color);
    }

    fn set_glow(&mut self, handle: ElementHandle, color: Rgb, alpha: f64, radius: f64) {
        self.with_element(handle, |e| {
            e.glow = Some(Glow {
                color,
                alpha,
                radius,
            })
        });
    }

    fn set_opacity(&mut self, handle: ElementHandle, opacity: f64) {
        self.with_element(handle, |e| e.opacity = opacity);
    }

    fn destroy(&mut self, handle: ElementHandle) -> Result<(), SurfaceError> {
        let i = self
            .index_of(handle)
            .ok_or(SurfaceError::UnknownElement(handle))?;
        self.elements.remove(i);
        self.destroyed += 1;
        Ok(())
    }
}

/// CPU rasterization of a scene, used for PNG snapshot export

use std::io::Cursor;

use image::{ImageOutputFormat, Rgba, RgbaImage};

use crate::animator::{AnimatorConfig, Animator, FrameScheduler};
use crate::surface::{Element, ElementKind, Scene};
use crate::viewport::{Rgb, Viewport};

pub const BACKGROUND: Rgb = Rgb(0x1A, 0x20, 0x2C);

/// Render every element of `scene` at `scale` output pixels per viewport pixel.
pub fn render_scene(scene: &Scene, viewport: &Viewport, scale: u32) -> RgbaImage {
    let scale = scale.max(1);
    let width = (viewport.width.ceil() as u32).max(1) * scale;
    let height = (viewport.height.ceil() as u32).max(1) * scale;
    let Rgb(r, g, b) = BACKGROUND;
    let mut img = RgbaImage::from_pixel(width, height, Rgba([r, g, b, 255]));
    let s = scale as f64;

    for element in scene.elements() {
        match element.kind {
            ElementKind::Boundary => draw_outline(&mut img, element.color, element.opacity, scale),
            ElementKind::Point | ElementKind::Trail => draw_element(&mut img, element, s),
        }
    }
    img
}

fn draw_element(img: &mut RgbaImage, element: &Element, s: f64) {
    let cx = element.x * s;
    let cy = element.y * s;
    if let Some(glow) = element.glow {
        let radius = glow.radius * s;
        fill_disc(img, cx, cy, radius, |d| {
            let t = 1.0 - d / radius;
            (glow.color, glow.alpha * element.opacity * t * t)
        });
    }
    let radius = element.kind.radius() * s;
    fill_disc(img, cx, cy, radius, |_| (element.color, element.opacity));
}

fn fill_disc(
    img: &mut RgbaImage,
    cx: f64,
    cy: f64,
    radius: f64,
    shade: impl Fn(f64) -> (Rgb, f64),
) {
    if radius <= 0.0 {
        return;
    }
    let (w, h) = img.dimensions();
    let x0 = (cx - radius).floor().max(0.0) as u32;
    let y0 = (cy - radius).floor().max(0.0) as u32;
    let x1 = ((cx + radius).ceil().max(0.0) as u32).min(w);
    let y1 = ((cy + radius).ceil().max(0.0) as u32).min(h);

    for y in y0..y1 {
        for x in x0..x1 {
            let dx = x as f64 + 0.5 - cx;
            let dy = y as f64 + 0.5 - cy;
            let d = (dx * dx + dy * dy).sqrt();
            if d <= radius {
                let (color, alpha) = shade(d);
                blend(img.get_pixel_mut(x, y), color, alpha);
            }
        }
    }
}

fn draw_outline(img: &mut RgbaImage, color: Rgb, opacity: f64, thickness: u32) {
    let (w, h) = img.dimensions();
    for y in 0..h {
        for x in 0..w {
            let edge = x < thickness || y < thickness || x >= w - thickness || y >= h - thickness;
            if edge {
                blend(img.get_pixel_mut(x, y), color, opacity);
            }
        }
    }
}

fn blend(dst: &mut Rgba<u8>, color: Rgb, alpha: f64) {
    let a = alpha.clamp(0.0, 1.0);
    let src = [color.0, color.1, color.2];
    for (channel, s) in dst.0.iter_mut().zip(src) {
        *channel = (s as f64 * a + *channel as f64 * (1.0 - a)).round() as u8;
    }
}

pub fn encode_png(img: &RgbaImage) -> image::ImageResult<Vec<u8>> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)?;
    Ok(bytes)
}

struct Headless;

impl FrameScheduler for Headless {
    fn request_frame(&mut self) {}
}

/// Run a fresh animator for `frames` frames off-screen and rasterize the
/// result. Deterministic: the same config and frame count give the same image.
pub fn snapshot_after(config: &AnimatorConfig, frames: u64, scale: u32) -> RgbaImage {
    let mut animator = Animator::new(*config, Scene::new());
    if let Err(e) = animator.start(&mut Headless) {
        log::error!("snapshot animator failed to start: {e}");
    }
    for _ in 0..frames {
        animator.frame(&mut Headless);
    }
    render_scene(animator.surface(), &config.viewport, scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::RenderSurface;

    #[test]
    fn test_image_size_follows_viewport_and_scale() {
        let img = render_scene(&Scene::new(), &Viewport::default(), 3);
        assert_eq!(img.dimensions(), (600, 450));
        assert_eq!(img.get_pixel(300, 200).0, [0x1A, 0x20, 0x2C, 255]);
    }

    #[test]
    fn test_trail_marker_is_painted() {
        let mut scene = Scene::new();
        let h = scene.create(ElementKind::Trail).unwrap();
        scene.set_position(h, 50.0, 50.0);
        scene.set_color(h, Rgb(0xFF, 0, 0));
        let img = render_scene(&scene, &Viewport::default(), 2);
        assert_eq!(img.get_pixel(100, 100).0, [0xFF, 0, 0, 255]);
        assert_eq!(img.get_pixel(10, 100).0, [0x1A, 0x20, 0x2C, 255]);
    }

    #[test]
    fn test_faded_marker_blends_with_background() {
        let mut scene = Scene::new();
        let h = scene.create(ElementKind::Trail).unwrap();
        scene.set_position(h, 50.0, 50.0);
        scene.set_color(h, Rgb(0xFF, 0xFF, 0xFF));
        scene.set_opacity(h, 0.0);
        let img = render_scene(&scene, &Viewport::default(), 2);
        assert_eq!(img.get_pixel(100, 100).0, [0x1A, 0x20, 0x2C, 255]);
    }

    #[test]
    fn test_boundary_outline() {
        let mut scene = Scene::new();
        let h = scene.create(ElementKind::Boundary).unwrap();
        scene.set_color(h, Rgb(0, 0xFF, 0));
        let img = render_scene(&scene, &Viewport::default(), 1);
        assert_eq!(img.get_pixel(0, 0).0, [0, 0xFF, 0, 255]);
        assert_eq!(img.get_pixel(199, 149).0, [0, 0xFF, 0, 255]);
        assert_eq!(img.get_pixel(100, 75).0, [0x1A, 0x20, 0x2C, 255]);
    }

    #[test]
    fn test_snapshot_is_deterministic_png() {
        let config = AnimatorConfig::default();
        let a = snapshot_after(&config, 300, 1);
        let b = snapshot_after(&config, 300, 1);
        assert_eq!(a.as_raw(), b.as_raw());

        let png = encode_png(&a).unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }
}

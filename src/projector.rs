//! Screen-space projection of tile bounding boxes.
//!
//! The sole bridge from world geometry to pixels: project a box's 8 corners
//! through the active camera and measure the screen rectangle they span.
//! This is a cheap, conservative size estimate for LOD thresholding, not a
//! silhouette or an occlusion query.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::bounds::Aabb;

/// What the projector needs from the renderer's camera: a world-to-pixel
/// query and the viewport extent.
pub trait ScreenProjection {
    /// World position to device pixel coordinates. `None` when the point is
    /// behind the camera plane; off-viewport coordinates are returned as-is.
    fn project(&self, world: Vec3) -> Option<Vec2>;

    /// Viewport size in device pixels.
    fn viewport_size(&self) -> (u32, u32);
}

/// View-projection matrix plus viewport, the usual concrete projection.
#[derive(Debug, Clone, Copy)]
pub struct CameraView {
    pub view_proj: Mat4,
    pub width: u32,
    pub height: u32,
}

impl CameraView {
    pub fn new(view_proj: Mat4, width: u32, height: u32) -> Self {
        Self {
            view_proj,
            width,
            height,
        }
    }

    /// Perspective look-at helper for callers that don't carry a matrix.
    pub fn from_camera(
        eye: Vec3,
        target: Vec3,
        up: Vec3,
        fov_y: f32,
        width: u32,
        height: u32,
    ) -> Self {
        let aspect = width as f32 / height.max(1) as f32;
        let proj = Mat4::perspective_rh(fov_y, aspect, 0.1, 10_000.0);
        let view = Mat4::look_at_rh(eye, target, up);
        Self::new(proj * view, width, height)
    }
}

impl ScreenProjection for CameraView {
    fn project(&self, world: Vec3) -> Option<Vec2> {
        let clip = self.view_proj * Vec4::new(world.x, world.y, world.z, 1.0);
        if clip.w <= 1e-4 {
            return None;
        }
        let ndc_x = clip.x / clip.w;
        let ndc_y = clip.y / clip.w;
        let sx = (ndc_x + 1.0) * 0.5 * self.width as f32;
        let sy = (1.0 - ndc_y) * 0.5 * self.height as f32;
        Some(Vec2::new(sx, sy))
    }

    fn viewport_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Diagonal, in pixels, of the screen rectangle spanned by the projected
/// box corners, each side inflated by `halo_px`.
///
/// A void box yields 0. A corner behind the camera makes the box count as
/// viewport-filling, which errs toward showing more detail rather than
/// culling something the camera is inside of.
pub fn pixel_diag<V: ScreenProjection + ?Sized>(view: &V, bbox: &Aabb, halo_px: f64) -> f64 {
    if bbox.is_void() {
        return 0.0;
    }

    let mut min_x = f64::MAX;
    let mut min_y = f64::MAX;
    let mut max_x = f64::MIN;
    let mut max_y = f64::MIN;

    for corner in bbox.corners() {
        let Some(p) = view.project(corner) else {
            let (w, h) = view.viewport_size();
            let dx = w as f64 + 2.0 * halo_px;
            let dy = h as f64 + 2.0 * halo_px;
            return (dx * dx + dy * dy).sqrt();
        };
        min_x = min_x.min(p.x as f64);
        min_y = min_y.min(p.y as f64);
        max_x = max_x.max(p.x as f64);
        max_y = max_y.max(p.y as f64);
    }

    let dx = (max_x - min_x) + 2.0 * halo_px;
    let dy = (max_y - min_y) + 2.0 * halo_px;
    (dx * dx + dy * dy).sqrt()
}

/// Area, in pixels, of the projected rectangle clamped to the viewport.
///
/// Not consulted by the baseline selection policy; available as an
/// alternative sizing metric.
pub fn pixel_area<V: ScreenProjection + ?Sized>(bbox: &Aabb, view: &V) -> f64 {
    if bbox.is_void() {
        return 0.0;
    }
    let (w, h) = view.viewport_size();
    let (wf, hf) = (w as f64, h as f64);

    let mut min_x = f64::MAX;
    let mut min_y = f64::MAX;
    let mut max_x = f64::MIN;
    let mut max_y = f64::MIN;

    for corner in bbox.corners() {
        let Some(p) = view.project(corner) else {
            return wf * hf;
        };
        min_x = min_x.min(p.x as f64);
        min_y = min_y.min(p.y as f64);
        max_x = max_x.max(p.x as f64);
        max_y = max_y.max(p.y as f64);
    }

    let min_x = min_x.clamp(0.0, wf);
    let max_x = max_x.clamp(0.0, wf);
    let min_y = min_y.clamp(0.0, hf);
    let max_y = max_y.clamp(0.0, hf);

    (max_x - min_x).max(0.0) * (max_y - min_y).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box_at(center: Vec3) -> Aabb {
        Aabb::new(center - Vec3::splat(0.5), center + Vec3::splat(0.5))
    }

    fn looking_down_z(eye_z: f32) -> CameraView {
        CameraView::from_camera(
            Vec3::new(0.0, 0.0, eye_z),
            Vec3::new(0.0, 0.0, eye_z - 1.0),
            Vec3::Y,
            std::f32::consts::FRAC_PI_4,
            1920,
            1080,
        )
    }

    #[test]
    fn void_box_projects_to_zero() {
        let view = looking_down_z(10.0);
        assert_eq!(pixel_diag(&view, &Aabb::VOID, 0.0), 0.0);
        assert_eq!(pixel_area(&Aabb::VOID, &view), 0.0);
    }

    #[test]
    fn diag_shrinks_with_distance() {
        let bbox = unit_box_at(Vec3::ZERO);
        let near = pixel_diag(&looking_down_z(5.0), &bbox, 0.0);
        let far = pixel_diag(&looking_down_z(50.0), &bbox, 0.0);
        assert!(near > far);
        assert!(far > 0.0);
    }

    #[test]
    fn halo_inflates_the_rectangle() {
        let bbox = unit_box_at(Vec3::ZERO);
        let view = looking_down_z(10.0);
        let bare = pixel_diag(&view, &bbox, 0.0);
        let padded = pixel_diag(&view, &bbox, 4.0);
        assert!(padded > bare);
    }

    #[test]
    fn corner_behind_camera_fills_the_viewport() {
        // camera sits inside the box, so some corners are behind it
        let bbox = Aabb::new(Vec3::splat(-10.0), Vec3::splat(10.0));
        let view = looking_down_z(0.0);
        let d = pixel_diag(&view, &bbox, 0.0);
        let expected = ((1920.0f64 * 1920.0) + (1080.0f64 * 1080.0)).sqrt();
        assert_eq!(d, expected);
        assert_eq!(pixel_area(&bbox, &view), 1920.0 * 1080.0);
    }

    #[test]
    fn area_is_clamped_to_the_viewport() {
        let bbox = Aabb::new(Vec3::splat(-100.0), Vec3::splat(100.0));
        let view = looking_down_z(150.0);
        let area = pixel_area(&bbox, &view);
        assert!(area <= 1920.0 * 1080.0);
        assert!(area > 0.0);
    }
}

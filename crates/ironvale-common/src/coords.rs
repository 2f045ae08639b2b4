//! World positions and planar movement helpers.
//!
//! Positions are `glam::Vec3` with `y` as the vertical axis. Distances used
//! for range and leash checks are full 3D; movement only ever changes the
//! horizontal `(x, z)` components.

use glam::Vec3;

/// Euclidean distance between two world positions.
#[must_use]
pub fn distance(a: Vec3, b: Vec3) -> f32 {
    a.distance(b)
}

/// Distance between two positions projected onto the horizontal plane.
#[must_use]
pub fn horizontal_distance(a: Vec3, b: Vec3) -> f32 {
    let dx = b.x - a.x;
    let dz = b.z - a.z;
    (dx * dx + dz * dz).sqrt()
}

/// Moves `from` toward `to` by at most `step` on the horizontal plane.
///
/// The vertical component of `from` is preserved. The step never overshoots
/// the horizontal projection of `to`.
#[must_use]
pub fn step_toward(from: Vec3, to: Vec3, step: f32) -> Vec3 {
    let dx = to.x - from.x;
    let dz = to.z - from.z;
    let len = (dx * dx + dz * dz).sqrt();
    if len < 0.0001 || step <= 0.0 {
        return from;
    }

    let travel = step.min(len);
    Vec3::new(from.x + dx / len * travel, from.y, from.z + dz / len * travel)
}

/// Returns a point on the horizontal plane at `radius` and `angle` (radians)
/// around `center`.
#[must_use]
pub fn offset_on_plane(center: Vec3, angle: f32, radius: f32) -> Vec3 {
    Vec3::new(
        center.x + angle.cos() * radius,
        center.y,
        center.z + angle.sin() * radius,
    )
}

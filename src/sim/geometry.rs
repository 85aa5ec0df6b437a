//! Oriented rectangle geometry
//!
//! Every hitbox in the arena is a rectangle with a center, fixed dimensions and
//! a rotation in degrees (clockwise from up). Corners and face normals are
//! cached and recomputed on every mutation, so they can never go stale.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::heading;

/// An oriented rectangle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    center: Vec2,
    half_extents: Vec2,
    /// Rotation in degrees, clockwise from up
    angle: f32,
    /// Top-left, top-right, bottom-right, bottom-left (before rotation)
    corners: [Vec2; 4],
    up_normal: Vec2,
    left_normal: Vec2,
}

impl Rectangle {
    pub fn new(center: Vec2, width: f32, height: f32, angle: f32) -> Self {
        let mut rect = Self {
            center,
            half_extents: Vec2::new(width / 2.0, height / 2.0),
            angle,
            corners: [Vec2::ZERO; 4],
            up_normal: Vec2::ZERO,
            left_normal: Vec2::ZERO,
        };
        rect.recompute();
        rect
    }

    /// Axis-aligned rectangle
    pub fn axis_aligned(center: Vec2, width: f32, height: f32) -> Self {
        Self::new(center, width, height, 0.0)
    }

    fn recompute(&mut self) {
        let up = heading(self.angle);
        // Left is up rotated 90 degrees counter-clockwise
        let left = Vec2::new(up.y, -up.x);
        self.up_normal = up;
        self.left_normal = left;

        let hx = self.half_extents.x;
        let hy = self.half_extents.y;
        self.corners = [
            self.center + up * hy + left * hx,
            self.center + up * hy - left * hx,
            self.center - up * hy - left * hx,
            self.center - up * hy + left * hx,
        ];
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.center
    }

    #[inline]
    pub fn angle(&self) -> f32 {
        self.angle
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.half_extents.x * 2.0
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.half_extents.y * 2.0
    }

    #[inline]
    pub fn half_extents(&self) -> Vec2 {
        self.half_extents
    }

    #[inline]
    pub fn corners(&self) -> &[Vec2; 4] {
        &self.corners
    }

    /// Unit normal of the top face
    #[inline]
    pub fn up_normal(&self) -> Vec2 {
        self.up_normal
    }

    /// Unit normal of the left face
    #[inline]
    pub fn left_normal(&self) -> Vec2 {
        self.left_normal
    }

    pub fn set_center(&mut self, center: Vec2) {
        self.center = center;
        self.recompute();
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.set_center(self.center + delta);
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.angle = crate::wrap_degrees(angle);
        self.recompute();
    }

    pub fn rotate(&mut self, delta: f32) {
        self.set_angle(self.angle + delta);
    }

    /// Project all four corners onto `axis`, returning the [min, max] interval
    pub fn project(&self, axis: Vec2) -> (f32, f32) {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for corner in &self.corners {
            let d = corner.dot(axis);
            min = min.min(d);
            max = max.max(d);
        }
        (min, max)
    }

    /// Check if a point lies inside the rectangle (edges inclusive)
    pub fn contains_point(&self, point: Vec2) -> bool {
        let local = point - self.center;
        local.dot(self.left_normal).abs() <= self.half_extents.x + 1e-4
            && local.dot(self.up_normal).abs() <= self.half_extents.y + 1e-4
    }
}

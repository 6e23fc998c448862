//! Screen mapping
//!
//! Affine transform from source-space coordinates (e.g. a normalized camera
//! frame) to absolute screen pixels, with optional axis inversion, a
//! sensitivity gain about the screen centre, and clamping to the physical
//! screen.

use crate::types::{Point2, ScreenPosition};
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in source space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Rect {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Normalized unit square, the coordinate space most landmark models emit
    pub fn unit() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// True when both extents are finite and strictly positive
    pub fn is_proper(&self) -> bool {
        let finite = [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite());
        finite && self.width() > 0.0 && self.height() > 0.0
    }
}

impl Default for Rect {
    fn default() -> Self {
        Self::unit()
    }
}

/// Source-to-screen mapping parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenMapping {
    /// Region of source space that spans the whole screen
    pub source_bounds: Rect,
    /// Screen width in pixels
    pub width: u32,
    /// Screen height in pixels
    pub height: u32,
    /// Mirror horizontally (front-facing cameras)
    pub invert_x: bool,
    pub invert_y: bool,
    /// Gain in (0, 1]; values below 1 compress the reachable area about the centre
    pub sensitivity: f64,
    /// Reported before the first valid sample; screen centre when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<ScreenPosition>,
}

impl Default for ScreenMapping {
    fn default() -> Self {
        Self {
            source_bounds: Rect::unit(),
            width: 1920,
            height: 1080,
            invert_x: false,
            invert_y: false,
            sensitivity: 1.0,
            home: None,
        }
    }
}

impl ScreenMapping {
    /// Identity mapping for a screen of the given size: source space is
    /// already in pixels.
    pub fn identity(width: u32, height: u32) -> Self {
        Self {
            source_bounds: Rect::new(0.0, 0.0, width as f64, height as f64),
            width,
            height,
            ..Default::default()
        }
    }

    pub fn center(&self) -> ScreenPosition {
        ScreenPosition::new(self.width as f64 / 2.0, self.height as f64 / 2.0)
    }

    /// Deterministic position reported while uninitialized
    pub fn home_position(&self) -> ScreenPosition {
        self.clamp(self.home.unwrap_or_else(|| self.center()))
    }

    /// Map a source-space point to a clamped screen position
    pub fn map(&self, point: Point2) -> ScreenPosition {
        let bounds = &self.source_bounds;
        let mut u = (point.x - bounds.min_x) / bounds.width();
        let mut v = (point.y - bounds.min_y) / bounds.height();

        if self.invert_x {
            u = 1.0 - u;
        }
        if self.invert_y {
            v = 1.0 - v;
        }

        // Scale about the centre: u' = u*s + 0.5*(1-s)
        let s = self.sensitivity;
        u = u * s + 0.5 * (1.0 - s);
        v = v * s + 0.5 * (1.0 - s);

        self.clamp(ScreenPosition::new(
            u * self.width as f64,
            v * self.height as f64,
        ))
    }

    /// Clamp to `[0, width] x [0, height]`; NaN collapses to the lower edge
    pub fn clamp(&self, position: ScreenPosition) -> ScreenPosition {
        ScreenPosition::new(
            clamp_axis(position.x, self.width as f64),
            clamp_axis(position.y, self.height as f64),
        )
    }
}

fn clamp_axis(value: f64, extent: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, extent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_unit_square_maps_to_screen() {
        let mapping = ScreenMapping::default();
        let p = mapping.map(Point2::new(0.25, 0.5));
        assert_relative_eq!(p.x, 480.0, epsilon = 1e-9);
        assert_relative_eq!(p.y, 540.0, epsilon = 1e-9);
    }

    #[test]
    fn test_invert_x_mirrors() {
        let mapping = ScreenMapping {
            invert_x: true,
            ..Default::default()
        };
        let p = mapping.map(Point2::new(0.25, 0.0));
        assert_relative_eq!(p.x, 1440.0, epsilon = 1e-9);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_sensitivity_compresses_about_center() {
        let mapping = ScreenMapping {
            sensitivity: 0.8,
            ..Default::default()
        };
        // Source edge lands 10% inside the screen edge
        let p = mapping.map(Point2::new(0.0, 1.0));
        assert_relative_eq!(p.x, 192.0, epsilon = 1e-9);
        assert_relative_eq!(p.y, 972.0, epsilon = 1e-9);
        let c = mapping.map(Point2::new(0.5, 0.5));
        assert_relative_eq!(c.x, 960.0, epsilon = 1e-9);
        assert_relative_eq!(c.y, 540.0, epsilon = 1e-9);
    }

    #[test]
    fn test_out_of_range_input_is_clamped() {
        let mapping = ScreenMapping::default();
        let p = mapping.map(Point2::new(-3.0, 7.5));
        assert_eq!(p, ScreenPosition::new(0.0, 1080.0));
    }

    #[test]
    fn test_home_defaults_to_center() {
        let mapping = ScreenMapping::identity(800, 600);
        assert_eq!(mapping.home_position(), ScreenPosition::new(400.0, 300.0));

        let custom = ScreenMapping {
            home: Some(ScreenPosition::new(5000.0, 10.0)),
            ..ScreenMapping::identity(800, 600)
        };
        assert_eq!(custom.home_position(), ScreenPosition::new(800.0, 10.0));
    }

    #[test]
    fn test_rect_validity() {
        assert!(Rect::unit().is_proper());
        assert!(!Rect::new(0.0, 0.0, 0.0, 1.0).is_proper());
        assert!(!Rect::new(1.0, 0.0, 0.0, 1.0).is_proper());
        assert!(!Rect::new(0.0, 0.0, f64::INFINITY, 1.0).is_proper());
    }

    proptest! {
        #[test]
        fn prop_mapped_output_within_screen(
            x in -1.0e9f64..1.0e9,
            y in -1.0e9f64..1.0e9,
            width in 1u32..8000,
            height in 1u32..8000,
            invert_x in any::<bool>(),
            sensitivity in 0.01f64..=1.0,
        ) {
            let mapping = ScreenMapping {
                width,
                height,
                invert_x,
                sensitivity,
                ..Default::default()
            };
            let p = mapping.map(Point2::new(x, y));
            prop_assert!(p.x >= 0.0 && p.x <= width as f64);
            prop_assert!(p.y >= 0.0 && p.y <= height as f64);
        }
    }
}

//! Layout rectangles.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in document coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Overlapping region, empty (zero-sized) when the rectangles are apart.
    pub fn intersection(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);

        Rect {
            x,
            y,
            width: (right - x).max(0.0),
            height: (bottom - y).max(0.0),
        }
    }

    /// Fraction of `self` covered by `viewport`. Zero-area rectangles are never visible.
    pub fn visible_fraction(&self, viewport: &Rect) -> f64 {
        let area = self.area();
        if area <= 0.0 {
            return 0.0;
        }
        (self.intersection(viewport).area() / area).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area() {
        assert_eq!(Rect::new(0.0, 0.0, 10.0, 5.0).area(), 50.0);
        assert_eq!(Rect::new(0.0, 0.0, -1.0, 5.0).area(), 0.0);
    }

    #[test]
    fn test_intersection_disjoint() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 20.0, 10.0, 10.0);
        assert_eq!(a.intersection(&b).area(), 0.0);
    }

    #[test]
    fn test_visible_fraction() {
        let viewport = Rect::new(0.0, 0.0, 100.0, 100.0);

        assert_eq!(Rect::new(10.0, 10.0, 20.0, 20.0).visible_fraction(&viewport), 1.0);
        assert_eq!(Rect::new(0.0, 80.0, 100.0, 40.0).visible_fraction(&viewport), 0.5);
        assert_eq!(Rect::new(0.0, 200.0, 100.0, 40.0).visible_fraction(&viewport), 0.0);
        assert_eq!(Rect::new(0.0, 0.0, 0.0, 0.0).visible_fraction(&viewport), 0.0);
    }

    #[test]
    fn test_translate() {
        let r = Rect::new(1.0, 2.0, 3.0, 4.0).translate(10.0, -2.0);
        assert_eq!(r, Rect::new(11.0, 0.0, 3.0, 4.0));
    }
}

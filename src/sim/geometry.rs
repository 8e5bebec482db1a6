//! Rectangles and the geometric tests the resolution passes rely on
//!
//! The free functions here are the stock implementations of the geometric
//! collaborators in [`super::hooks::Hooks`]. A host with its own geometry can
//! supply different ones.

use glam::Vec2;

use crate::physics::BoxView;

/// Axis-aligned rectangle with integer coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Rectangle of size `(w, h)` centred on an integer point
    pub fn centered_at(cx: i32, cy: i32, w: i32, h: i32) -> Self {
        Self::new(cx - w / 2, cy - h / 2, w, h)
    }

    pub fn right(&self) -> i32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }

    pub fn centerx(&self) -> i32 {
        self.x + self.w / 2
    }

    pub fn centery(&self) -> i32 {
        self.y + self.h / 2
    }

    /// Integer centre as a vector
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.centerx() as f32, self.centery() as f32)
    }

    /// Closed-interval overlap: touching edges count as contact
    pub fn overlaps(&self, other: &Rect) -> bool {
        !(self.right() < other.x
            || other.right() < self.x
            || self.bottom() < other.y
            || other.bottom() < self.y)
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.x as f32
            && p.x < self.right() as f32
            && p.y >= self.y as f32
            && p.y < self.bottom() as f32
    }

    pub fn to_box(&self) -> BoxView {
        BoxView::new(self.x as f32, self.y as f32, self.w as f32, self.h as f32)
    }
}

/// Reflect `v` across the line whose normal is `n` (must be unit length)
#[inline]
pub fn reflect_velocity(v: Vec2, n: Vec2) -> Vec2 {
    v - 2.0 * v.dot(n) * n
}

/// Whether the segment `start -> end` touches `rect` (Liang-Barsky clip)
pub fn line_segment_intersects_rect(start: Vec2, end: Vec2, rect: &Rect) -> bool {
    let d = end - start;
    let mut t0 = 0.0f32;
    let mut t1 = 1.0f32;

    let edges = [
        (-d.x, start.x - rect.x as f32),
        (d.x, rect.right() as f32 - start.x),
        (-d.y, start.y - rect.y as f32),
        (d.y, rect.bottom() as f32 - start.y),
    ];

    for (p, q) in edges {
        if p == 0.0 {
            // Parallel to this edge: reject if outside it
            if q < 0.0 {
                return false;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            if t > t1 {
                return false;
            }
            t0 = t0.max(t);
        } else {
            if t < t0 {
                return false;
            }
            t1 = t1.min(t);
        }
    }
    t0 <= t1
}

/// Even-odd point-in-polygon, pre-filtered by the polygon's bounding rect.
/// Fewer than three points is never inside.
pub fn point_in_polygon(point: Vec2, points: &[Vec2], bounds: &Rect) -> bool {
    if points.len() < 3 || !bounds.contains_point(point) {
        return false;
    }

    let mut inside = false;
    let mut prev = points[points.len() - 1];
    for &cur in points {
        if point.y > prev.y.min(cur.y) && point.y <= prev.y.max(cur.y) && point.x <= prev.x.max(cur.x)
        {
            let crosses = if prev.x == cur.x {
                true
            } else {
                let x_at = (point.y - prev.y) * (cur.x - prev.x) / (cur.y - prev.y) + prev.x;
                point.x <= x_at
            };
            if crosses {
                inside = !inside;
            }
        }
        prev = cur;
    }
    inside
}

/// Whether `rect` lies entirely outside a `width x height` screen
pub fn rect_offscreen(rect: &Rect, width: i32, height: i32) -> bool {
    rect.right() < 0 || rect.x > width || rect.bottom() < 0 || rect.y > height
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rect_overlap_touching_edges() {
        let a = Rect::new(0, 0, 10, 10);
        assert!(a.overlaps(&Rect::new(10, 10, 4, 4)));
        assert!(!a.overlaps(&Rect::new(11, 0, 4, 4)));
        assert!(a.overlaps(&Rect::new(-3, -3, 4, 4)));
    }

    #[test]
    fn test_rect_center_is_integer() {
        let r = Rect::new(0, 0, 5, 7);
        assert_eq!(r.center(), Vec2::new(2.0, 3.0));
        assert_eq!(Rect::centered_at(100, 50, 12, 12), Rect::new(94, 44, 12, 12));
    }

    #[test]
    fn test_reflect_about_vertical_normal_negates_x() {
        let v = reflect_velocity(Vec2::new(3.0, -4.0), Vec2::X);
        assert_eq!(v, Vec2::new(-3.0, -4.0));
    }

    #[test]
    fn test_segment_rect() {
        let r = Rect::new(10, 10, 10, 10);
        // Crosses straight through
        assert!(line_segment_intersects_rect(Vec2::new(0.0, 15.0), Vec2::new(30.0, 15.0), &r));
        // Fully inside
        assert!(line_segment_intersects_rect(Vec2::new(12.0, 12.0), Vec2::new(13.0, 13.0), &r));
        // Stops short
        assert!(!line_segment_intersects_rect(Vec2::new(0.0, 15.0), Vec2::new(9.0, 15.0), &r));
        // Passes above
        assert!(!line_segment_intersects_rect(Vec2::new(0.0, 0.0), Vec2::new(30.0, 5.0), &r));
        // Diagonal that misses the corner
        assert!(!line_segment_intersects_rect(Vec2::new(0.0, 12.0), Vec2::new(12.0, 0.0), &r));
    }

    #[test]
    fn test_point_in_polygon() {
        let square = [
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
        ];
        let bounds = Rect::new(0, 0, 10, 10);
        assert!(point_in_polygon(Vec2::new(5.0, 5.0), &square, &bounds));
        assert!(!point_in_polygon(Vec2::new(15.0, 5.0), &square, &bounds));
        assert!(!point_in_polygon(Vec2::new(5.0, 5.0), &square[..2], &bounds));

        let triangle = [Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), Vec2::new(0.0, 10.0)];
        assert!(point_in_polygon(Vec2::new(2.0, 2.0), &triangle, &bounds));
        assert!(!point_in_polygon(Vec2::new(8.0, 8.0), &triangle, &bounds));
    }

    #[test]
    fn test_offscreen() {
        assert!(!rect_offscreen(&Rect::new(0, 0, 8, 8), 800, 600));
        assert!(!rect_offscreen(&Rect::new(-8, 0, 8, 8), 800, 600));
        assert!(rect_offscreen(&Rect::new(-9, 0, 8, 8), 800, 600));
        assert!(rect_offscreen(&Rect::new(801, 0, 8, 8), 800, 600));
        assert!(rect_offscreen(&Rect::new(0, 601, 8, 8), 800, 600));
    }

    proptest! {
        #[test]
        fn prop_overlap_is_symmetric(
            ax in -100i32..100, ay in -100i32..100, aw in 0i32..50, ah in 0i32..50,
            bx in -100i32..100, by in -100i32..100, bw in 0i32..50, bh in 0i32..50,
        ) {
            let a = Rect::new(ax, ay, aw, ah);
            let b = Rect::new(bx, by, bw, bh);
            prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
            // Integer rects and their float views agree
            prop_assert_eq!(a.overlaps(&b), a.to_box().overlaps(&b.to_box()));
        }
    }
}

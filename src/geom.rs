//! Collision/visual shapes derived from map objects and tile templates.
use macroquad::math::{vec2, Rect, Vec2};
use std::f32::consts::{FRAC_1_SQRT_2, FRAC_PI_4, SQRT_2};

/// Rotate `p` counter-clockwise around the origin.
#[inline]
pub fn rotate_point(p: Vec2, angle: f32) -> Vec2 {
    if angle == 0.0 {
        return p;
    }
    let (sin, cos) = angle.sin_cos();
    vec2(p.x * cos - p.y * sin, p.x * sin + p.y * cos)
}

/// Closed polygon, points relative to `pos`.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub pos: Vec2,
    pub points: Vec<Vec2>,
}

impl Polygon {
    pub fn new(pos: Vec2, points: Vec<Vec2>) -> Self {
        Polygon { pos, points }
    }

    /// Axis-aligned rectangle as a 4 point polygon.
    pub fn rect(width: f32, height: f32) -> Self {
        Polygon::new(
            Vec2::ZERO,
            vec![Vec2::ZERO, vec2(width, 0.0), vec2(width, height), vec2(0.0, height)],
        )
    }

    /// Convexity test over consecutive edge cross products.
    ///
    /// `None` when the polygon has fewer than three points or all of them are
    /// collinear; `Some(false)` when the winding changes sign.
    pub fn is_convex(&self) -> Option<bool> {
        let v = &self.points;
        let n = v.len();
        if n < 3 {
            return None;
        }

        let mut flag = 0u8;
        for i in 0..n {
            let j = (i + 1) % n;
            let k = (i + 2) % n;
            let z = (v[j].x - v[i].x) * (v[k].y - v[j].y) - (v[j].y - v[i].y) * (v[k].x - v[j].x);
            if z < 0.0 {
                flag |= 1;
            } else if z > 0.0 {
                flag |= 2;
            }
            if flag == 3 {
                return Some(false);
            }
        }

        if flag != 0 {
            Some(true)
        } else {
            None
        }
    }
}

/// Ellipse given by its centre and radii.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipse {
    pub pos: Vec2,
    pub radius: Vec2,
}

/// A single line segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub pos: Vec2,
    pub points: [Vec2; 2],
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Polygon(Polygon),
    Ellipse(Ellipse),
    Line(Line),
    Point(Vec2),
}

impl Shape {
    /// Rotate around the local origin.
    ///
    /// Only the centre of an ellipse moves; its radii stay axis aligned.
    pub fn rotate(&mut self, angle: f32) {
        if angle == 0.0 {
            return;
        }
        match self {
            Shape::Polygon(p) => p.points.iter_mut().for_each(|pt| *pt = rotate_point(*pt, angle)),
            Shape::Line(l) => l.points.iter_mut().for_each(|pt| *pt = rotate_point(*pt, angle)),
            Shape::Ellipse(e) => e.pos = rotate_point(e.pos, angle),
            Shape::Point(p) => *p = rotate_point(*p, angle),
        }
    }

    /// Scale around the local origin. An ellipse scales its radii.
    pub fn scale(&mut self, x: f32, y: f32) {
        let s = vec2(x, y);
        match self {
            Shape::Polygon(p) => p.points.iter_mut().for_each(|pt| *pt *= s),
            Shape::Line(l) => l.points.iter_mut().for_each(|pt| *pt *= s),
            Shape::Ellipse(e) => e.radius *= s,
            Shape::Point(p) => *p *= s,
        }
    }

    /// Isometric projection: rotate 45 degrees, then squash vertically.
    pub fn to_iso(&mut self) {
        self.rotate(FRAC_PI_4);
        self.scale(SQRT_2, FRAC_1_SQRT_2);
    }

    pub fn translate(&mut self, offset: Vec2) {
        match self {
            Shape::Polygon(p) => p.pos += offset,
            Shape::Line(l) => l.pos += offset,
            Shape::Ellipse(e) => e.pos += offset,
            Shape::Point(p) => *p += offset,
        }
    }

    /// Bounding box in the shape's parent space.
    pub fn bounds(&self) -> Rect {
        fn hull(pos: Vec2, points: &[Vec2]) -> Rect {
            let (min, max) = points.iter().fold(
                (Vec2::splat(f32::INFINITY), Vec2::splat(f32::NEG_INFINITY)),
                |(min, max), p| (min.min(*p), max.max(*p)),
            );
            if points.is_empty() {
                return Rect::new(pos.x, pos.y, 0.0, 0.0);
            }
            Rect::new(pos.x + min.x, pos.y + min.y, max.x - min.x, max.y - min.y)
        }

        match self {
            Shape::Polygon(p) => hull(p.pos, &p.points),
            Shape::Line(l) => hull(l.pos, &l.points),
            Shape::Ellipse(e) => Rect::new(
                e.pos.x - e.radius.x,
                e.pos.y - e.radius.y,
                e.radius.x * 2.0,
                e.radius.y * 2.0,
            ),
            Shape::Point(p) => Rect::new(p.x, p.y, 0.0, 0.0),
        }
    }
}

//! Axis-aligned bounding volumes
//!
//! Destination quests store one of these; the location source reports the
//! tracked entity as one or more of them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Bounds {
    /// Build from two corners in any order
    pub fn new(a: [f32; 3], b: [f32; 3]) -> Self {
        let mut min = [0.0; 3];
        let mut max = [0.0; 3];
        for axis in 0..3 {
            min[axis] = a[axis].min(b[axis]);
            max[axis] = a[axis].max(b[axis]);
        }
        Self { min, max }
    }

    pub fn from_center_size(center: [f32; 3], size: [f32; 3]) -> Self {
        let mut min = [0.0; 3];
        let mut max = [0.0; 3];
        for axis in 0..3 {
            let half = size[axis].abs() / 2.0;
            min[axis] = center[axis] - half;
            max[axis] = center[axis] + half;
        }
        Self { min, max }
    }

    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) / 2.0,
            (self.min[1] + self.max[1]) / 2.0,
            (self.min[2] + self.max[2]) / 2.0,
        ]
    }

    /// Overlap test; touching faces count as intersecting
    pub fn intersects(&self, other: &Bounds) -> bool {
        (0..3).all(|axis| self.min[axis] <= other.max[axis] && other.min[axis] <= self.max[axis])
    }

    pub fn contains_point(&self, point: [f32; 3]) -> bool {
        (0..3).all(|axis| self.min[axis] <= point[axis] && point[axis] <= self.max[axis])
    }

    /// Grow to also cover `other`
    pub fn encapsulate(&mut self, other: &Bounds) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(other.min[axis]);
            self.max[axis] = self.max[axis].max(other.max[axis]);
        }
    }

    /// Smallest volume covering every part, `None` for no parts
    pub fn enclosing<'a>(parts: impl IntoIterator<Item = &'a Bounds>) -> Option<Bounds> {
        let mut parts = parts.into_iter();
        let mut total = *parts.next()?;
        for part in parts {
            total.encapsulate(part);
        }
        Some(total)
    }
}

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Screen-projected vertical coordinate of this point under the 3/4 camera.
    pub fn projected_yz(self) -> f32 {
        self.y + self.z
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Integer block coordinate.
///
/// A block at `p` has its top face in the plane `z = p.z` and its front face in the
/// plane `y = p.y`, spanning `z` from `p.z - 1` to `p.z`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl GridPosition {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn from_world(position: Vec3) -> Self {
        Self {
            x: floor_to_i32(position.x),
            y: floor_to_i32(position.y),
            z: floor_to_i32(position.z),
        }
    }

    pub fn to_world(self) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32)
    }

    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.z.saturating_add(dz),
        )
    }

    pub fn line_index(self) -> LineIndex {
        LineIndex {
            x: self.x,
            yz: self.y.saturating_add(self.z),
        }
    }
}

impl Add for GridPosition {
    type Output = GridPosition;

    fn add(self, rhs: GridPosition) -> GridPosition {
        self.offset(rhs.x, rhs.y, rhs.z)
    }
}

impl Sub for GridPosition {
    type Output = GridPosition;

    fn sub(self, rhs: GridPosition) -> GridPosition {
        GridPosition::new(
            self.x.saturating_sub(rhs.x),
            self.y.saturating_sub(rhs.y),
            self.z.saturating_sub(rhs.z),
        )
    }
}

/// Index of a perspective line: every point with the same `x` and `y + z` projects to
/// the same spot on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineIndex {
    pub x: i32,
    pub yz: i32,
}

impl LineIndex {
    pub const fn new(x: i32, yz: i32) -> Self {
        Self { x, yz }
    }

    /// Floors each axis before combining, so sub-block offsets never leak across lines.
    pub fn of_world(position: Vec3) -> Self {
        GridPosition::from_world(position).line_index()
    }
}

pub(crate) fn floor_to_i32(value: f32) -> i32 {
    value.floor() as i32
}

pub(crate) fn ceil_to_i32(value: f32) -> i32 {
    value.ceil() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_world_floors_negative_coordinates() {
        let grid = GridPosition::from_world(Vec3::new(-0.5, 1.99, -2.0));
        assert_eq!(grid, GridPosition::new(-1, 1, -2));
    }

    #[test]
    fn far_out_positions_saturate_instead_of_overflowing() {
        let far = Vec3::new(1.0e30, 3.0e9, 3.0e9);
        assert_eq!(LineIndex::of_world(far), LineIndex::new(i32::MAX, i32::MAX));
        let low = GridPosition::new(i32::MIN, i32::MIN, -1);
        assert_eq!(low.line_index(), LineIndex::new(i32::MIN, i32::MIN));
        assert_eq!(low.offset(-1, 0, 0).x, i32::MIN);
        assert_eq!(GridPosition::new(0, i32::MAX, 0).offset(0, 1, 0).y, i32::MAX);
    }

    #[test]
    fn grid_arithmetic_round_trips() {
        let a = GridPosition::new(3, -2, 7);
        let b = GridPosition::new(-1, 4, 2);
        assert_eq!((a + b) - b, a);
        assert_eq!(a.offset(0, -1, 0), GridPosition::new(3, -3, 7));
    }

    #[test]
    fn line_index_equal_iff_x_and_y_plus_z_match() {
        let positions = [
            GridPosition::new(0, 0, 0),
            GridPosition::new(0, 1, -1),
            GridPosition::new(0, -3, 3),
            GridPosition::new(1, 0, 0),
            GridPosition::new(0, 1, 0),
            GridPosition::new(-2, 5, 1),
            GridPosition::new(-2, 6, 0),
        ];
        for a in positions {
            for b in positions {
                let expected = a.x == b.x && a.y + a.z == b.y + b.z;
                assert_eq!(a.line_index() == b.line_index(), expected, "a={a:?} b={b:?}");
            }
        }
    }

    #[test]
    fn world_line_index_floors_each_axis_before_combining() {
        // y + z is 1.2 here, but each axis floors to zero.
        let index = LineIndex::of_world(Vec3::new(2.5, 0.6, 0.6));
        assert_eq!(index, LineIndex::new(2, 0));
    }

    #[test]
    fn vec3_ops() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(0.5, -1.0, 2.0);
        assert_eq!(a + b, Vec3::new(1.5, 1.0, 5.0));
        assert_eq!(a - b, Vec3::new(0.5, 3.0, 1.0));
        assert_eq!(b * 2.0, Vec3::new(1.0, -2.0, 4.0));
        assert!((a.projected_yz() - 5.0).abs() < f32::EPSILON);
    }
}

//! Mathematical types shared between the host and the compute backends.
//!
//! Device math is single precision (`Vec3`). Host positions stay in double
//! precision (`DVec3`) and are converted to window-relative `Vec3` at the
//! device boundary. Grid coordinates are `IVec3`.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Squared length below which a vector is treated as zero when normalizing.
pub const NORMALIZE_EPSILON_SQ: f32 = 1e-8;

/// Squared length below which `limit` leaves a vector untouched.
pub const LIMIT_EPSILON_SQ: f32 = 1e-6;

/// 3D Vector - position, velocity, direction (single precision)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vec3 {
    /// Creates a new Vec3
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Unit X vector
    pub const X: Self = Self::new(1.0, 0.0, 0.0);

    /// Unit Y vector
    pub const Y: Self = Self::new(0.0, 1.0, 0.0);

    /// Unit Z vector
    pub const Z: Self = Self::new(0.0, 0.0, 1.0);

    /// Same value on every axis
    #[must_use]
    pub const fn splat(v: f32) -> Self {
        Self::new(v, v, v)
    }

    /// Converts to array
    #[must_use]
    pub const fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// Creates from array
    #[must_use]
    pub const fn from_array(arr: [f32; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }

    /// Packs into a device `vec4` with the given `w`.
    #[must_use]
    pub const fn extend(self, w: f32) -> [f32; 4] {
        [self.x, self.y, self.z, w]
    }

    /// Reads the xyz part of a device `vec4`.
    #[must_use]
    pub const fn truncate(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2])
    }

    /// Dot product
    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product
    #[must_use]
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Length squared (avoids sqrt)
    #[must_use]
    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    /// Length
    #[must_use]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Horizontal (xz) length squared
    #[must_use]
    pub fn horizontal_length_squared(self) -> f32 {
        self.x * self.x + self.z * self.z
    }

    /// Distance to another point
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }

    /// Distance squared (avoids sqrt)
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f32 {
        (self - other).length_squared()
    }

    /// Unit vector in the same direction, or zero for near-zero input.
    ///
    /// Never produces NaN or infinity, whatever the input length.
    #[must_use]
    pub fn safe_normalize(self) -> Self {
        let len_sq = self.length_squared();
        if !len_sq.is_finite() || len_sq < NORMALIZE_EPSILON_SQ {
            return Self::ZERO;
        }
        self * (1.0 / len_sq.sqrt())
    }

    /// Scales the vector down to `max` length if it is longer.
    #[must_use]
    pub fn limit(self, max: f32) -> Self {
        let len_sq = self.length_squared();
        if len_sq > max * max && len_sq > LIMIT_EPSILON_SQ {
            return self * (max / len_sq.sqrt());
        }
        self
    }

    /// Component-wise floor to grid coordinates.
    #[must_use]
    pub fn floor(self) -> IVec3 {
        IVec3::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }

    /// True when every component is finite.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::SubAssign for Vec3 {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl std::ops::MulAssign<f32> for Vec3 {
    fn mul_assign(&mut self, rhs: f32) {
        *self = *self * rhs;
    }
}

impl std::ops::Div<f32> for Vec3 {
    type Output = Self;
    fn div(self, rhs: f32) -> Self {
        Self::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl std::ops::Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// Host-side world position (double precision)
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DVec3 {
    /// X component
    pub x: f64,
    /// Y component
    pub y: f64,
    /// Z component
    pub z: f64,
}

impl DVec3 {
    /// Creates a new DVec3
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Length squared
    #[must_use]
    pub fn length_squared(self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Distance squared to another point
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        (self - other).length_squared()
    }

    /// Block coordinates containing this point.
    #[must_use]
    pub fn block(self) -> IVec3 {
        IVec3::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }

    /// Position relative to `anchor`, narrowed to single precision.
    #[must_use]
    pub fn relative_to(self, anchor: IVec3) -> Vec3 {
        Vec3::new(
            (self.x - f64::from(anchor.x)) as f32,
            (self.y - f64::from(anchor.y)) as f32,
            (self.z - f64::from(anchor.z)) as f32,
        )
    }

    /// Widens a single precision vector.
    #[must_use]
    pub fn from_vec3(v: Vec3) -> Self {
        Self::new(f64::from(v.x), f64::from(v.y), f64::from(v.z))
    }

    /// Narrows to single precision (velocities only; positions use `relative_to`).
    #[must_use]
    pub fn as_vec3(self) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32)
    }
}

impl std::ops::Add for DVec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for DVec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Mul<f64> for DVec3 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Integer grid / block coordinate
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize)]
pub struct IVec3 {
    /// X component
    pub x: i32,
    /// Y component
    pub y: i32,
    /// Z component
    pub z: i32,
}

impl IVec3 {
    /// Creates a new IVec3
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Origin
    pub const ZERO: Self = Self::new(0, 0, 0);

    /// Packs into a device `vec4<i32>` with the given `w`.
    #[must_use]
    pub const fn extend(self, w: i32) -> [i32; 4] {
        [self.x, self.y, self.z, w]
    }

    /// Largest per-axis absolute difference.
    #[must_use]
    pub fn max_axis_distance(self, other: Self) -> i32 {
        (self.x - other.x)
            .abs()
            .max((self.y - other.y).abs())
            .max((self.z - other.z).abs())
    }

    /// Chunk column (16×16) containing this block.
    #[must_use]
    pub const fn chunk(self) -> (i32, i32) {
        (self.x >> 4, self.z >> 4)
    }

    /// Center of the block in world space.
    #[must_use]
    pub fn center(self) -> DVec3 {
        DVec3::new(
            f64::from(self.x) + 0.5,
            f64::from(self.y) + 0.5,
            f64::from(self.z) + 0.5,
        )
    }
}

impl std::ops::Add for IVec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for IVec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_normalize_zero_and_tiny() {
        let inputs = [
            Vec3::ZERO,
            Vec3::new(1e-5, 0.0, 0.0),
            Vec3::new(-5e-5, 5e-5, 0.0),
            Vec3::splat(f32::MIN_POSITIVE),
            Vec3::new(0.0, -0.0, 0.0),
        ];
        for v in inputs {
            let n = v.safe_normalize();
            assert_eq!(n, Vec3::ZERO, "input {v:?}");
            assert!(n.is_finite());
        }
    }

    #[test]
    fn test_safe_normalize_unit_length() {
        let n = Vec3::new(3.0, 4.0, 0.0).safe_normalize();
        assert!((n.length() - 1.0).abs() < 1e-6);
        assert!((n.x - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_safe_normalize_non_finite_input() {
        assert_eq!(Vec3::new(f32::NAN, 1.0, 0.0).safe_normalize(), Vec3::ZERO);
        assert_eq!(Vec3::new(f32::INFINITY, 0.0, 0.0).safe_normalize(), Vec3::ZERO);
    }

    #[test]
    fn test_limit() {
        let v = Vec3::new(10.0, 0.0, 0.0).limit(2.0);
        assert!((v.x - 2.0).abs() < 1e-6);

        let short = Vec3::new(0.5, 0.0, 0.0);
        assert_eq!(short.limit(2.0), short);
    }

    #[test]
    fn test_relative_and_block() {
        let p = DVec3::new(-0.5, 64.25, 1_000_000.75);
        assert_eq!(p.block(), IVec3::new(-1, 64, 1_000_000));

        let rel = p.relative_to(IVec3::new(-16, 0, 999_936));
        assert!((rel.x - 15.5).abs() < 1e-6);
        assert!((rel.z - 64.75).abs() < 1e-4);
    }

    #[test]
    fn test_chunk_of_negative_block() {
        assert_eq!(IVec3::new(-1, 0, 17).chunk(), (-1, 1));
    }
}

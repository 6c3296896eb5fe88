//! Host-side data model shared with the compute kernel.
//!
//! Both types are `#[repr(C)]` + [`bytemuck::Pod`]: the in-memory layout
//! is the wire layout, so uploads and readback are plain
//! `cast_slice` calls with no per-element marshalling.

use bytemuck::{Pod, Zeroable};

/// A 4-component point position. `w` rides along untouched; the kernel
/// transforms `x` and `z` only.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Host-side reference of the kernel's transform: rotate about the Y
    /// axis by `angle * y * envelope` radians.
    ///
    /// Exists for verification only; the GPU path never calls this.
    pub fn twisted(self, angle: f32, envelope: f32) -> Self {
        let ff = angle * self.y * envelope;
        let (sin, cos) = ff.sin_cos();
        Self {
            x: self.x * cos - self.z * sin,
            y: self.y,
            z: self.x * sin + self.z * cos,
            w: self.w,
        }
    }
}

/// Uniform block consumed by the kernel at binding 2.
///
/// Field order and types match the kernel's uniform declaration
/// (`int numVert; float angle; float envelope`) exactly; 12 bytes, no
/// padding.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct TwistParams {
    pub count: u32,
    pub angle: f32,
    pub envelope: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_match_the_kernel_interface() {
        assert_eq!(std::mem::size_of::<Point>(), 16);
        assert_eq!(std::mem::size_of::<TwistParams>(), 12);
        assert_eq!(std::mem::align_of::<Point>(), 4);
    }

    #[test]
    fn points_cast_to_bytes_in_order() {
        let points = [
            Point::new(1.0, 2.0, 3.0, 1.0),
            Point::new(4.0, 5.0, 6.0, 1.0),
        ];
        let bytes: &[u8] = bytemuck::cast_slice(&points);
        assert_eq!(bytes.len(), 32);

        let back: &[Point] = bytemuck::cast_slice(bytes);
        assert_eq!(back, &points);
    }

    #[test]
    fn params_survive_byte_cast_exactly() {
        let params = TwistParams {
            count: 7,
            angle: 0.5,
            envelope: -1.25,
        };
        let bytes = bytemuck::bytes_of(&params);
        assert_eq!(bytes.len(), 12);
        // The kernel reads the count as the first 32-bit word.
        assert_eq!(&bytes[0..4], &7u32.to_ne_bytes());
        assert_eq!(bytemuck::from_bytes::<TwistParams>(bytes), &params);
    }

    #[test]
    fn zero_angle_is_identity() {
        let p = Point::new(1.5, -2.0, 0.25, 1.0);
        assert_eq!(p.twisted(0.0, 1.0), p);
        assert_eq!(p.twisted(std::f32::consts::PI, 0.0), p);
    }

    #[test]
    fn twist_rotates_about_y() {
        // angle * y * envelope = (π/2) * 1 * 1: a quarter turn.
        let p = Point::new(1.0, 1.0, 0.0, 1.0);
        let t = p.twisted(std::f32::consts::FRAC_PI_2, 1.0);
        assert!((t.x - 0.0).abs() < 1e-6);
        assert!((t.z - 1.0).abs() < 1e-6);
        assert_eq!(t.y, 1.0);
        assert_eq!(t.w, 1.0);
    }

    #[test]
    fn twist_angle_scales_with_height() {
        // y = 2 doubles the rotation: a half turn at π/4.
        let p = Point::new(1.0, 2.0, 0.0, 1.0);
        let t = p.twisted(std::f32::consts::FRAC_PI_2, 1.0);
        assert!((t.x + 1.0).abs() < 1e-6);
        assert!(t.z.abs() < 1e-6);
    }
}

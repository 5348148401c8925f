/// Fixed-precision quantization of floats to integers. The integer is what
/// gets delta-packed; round-trips are lossy (bounded by the precision) but
/// deterministic: quantizing the same float twice always yields the same
/// integer. All conversions are explicit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantizer {
    precision: f32,
}

impl Quantizer {
    /// # Panics
    ///
    /// Panics if `precision` is not a positive, finite number.
    pub fn new(precision: f32) -> Self {
        if !(precision.is_finite() && precision > 0.0) {
            panic!("quantization precision must be positive and finite!");
        }
        Self { precision }
    }

    pub fn precision(&self) -> f32 {
        self.precision
    }

    pub fn quantize(&self, value: f32) -> i64 {
        (value / self.precision).round() as i64
    }

    pub fn dequantize(&self, raw: i64) -> f32 {
        raw as f32 * self.precision
    }
}

// Value types
//
// Minimal math types so the codec layer has something concrete to quantize;
// the engine converts its own vector/quaternion types at the boundary.

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quat {
    pub const IDENTITY: Quat = Quat {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

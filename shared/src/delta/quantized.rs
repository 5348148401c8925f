use rooknet_serde::{
    read_prefixed, write_prefixed, BitReader, BitWrite, Quantizer, Quat, SerdeErr, Vec3,
};

use crate::delta::DeltaCodec;

/// Delta codec for normalized/angle-like floats. Both sides quantize to a
/// fixed precision and the diff travels as a sign bit plus a
/// prefixed-length magnitude, which beats a varint for the small bounded
/// deltas these fields produce. Lossy (bounded by the precision) but
/// deterministic: the decoded value is the exact float the quantized
/// integer maps back to, on both sides.
#[derive(Debug, Clone, Copy)]
pub struct QuantizedFloatDelta {
    quantizer: Quantizer,
    max_delta_bits: u8,
}

impl QuantizedFloatDelta {
    /// # Panics
    ///
    /// Panics if `precision` is not positive or `max_delta_bits` is not in
    /// `1..=64` (both are part of the field's wire contract).
    pub fn new(precision: f32, max_delta_bits: u8) -> Self {
        if max_delta_bits == 0 || max_delta_bits > 64 {
            panic!("quantized delta bound must be between 1 and 64 bits!");
        }
        Self {
            quantizer: Quantizer::new(precision),
            max_delta_bits,
        }
    }

    pub fn quantizer(&self) -> &Quantizer {
        &self.quantizer
    }
}

impl DeltaCodec<f32> for QuantizedFloatDelta {
    fn write_delta(&self, writer: &mut dyn BitWrite, old: &f32, new: &f32) -> bool {
        let old_steps = self.quantizer.quantize(*old);
        let new_steps = self.quantizer.quantize(*new);

        let changed = old_steps != new_steps;
        writer.write_bit(changed);
        if changed {
            let diff = new_steps - old_steps;
            writer.write_bit(diff < 0);
            write_prefixed(writer, diff.unsigned_abs(), self.max_delta_bits);
        }
        changed
    }

    fn read_delta(&self, reader: &mut BitReader, old: &f32) -> Result<f32, SerdeErr> {
        let old_steps = self.quantizer.quantize(*old);

        if !reader.read_bit()? {
            return Ok(*old);
        }

        let negative = reader.read_bit()?;
        let magnitude = read_prefixed(reader, self.max_delta_bits)? as i64;
        let diff = if negative { -magnitude } else { magnitude };

        Ok(self.quantizer.dequantize(old_steps + diff))
    }
}

// Composite types delta each component; the outer changed flag keeps the
// all-unchanged case at one bit.

#[derive(Debug, Clone, Copy)]
pub struct QuantizedVec3Delta {
    component: QuantizedFloatDelta,
}

impl QuantizedVec3Delta {
    pub fn new(precision: f32, max_delta_bits: u8) -> Self {
        Self {
            component: QuantizedFloatDelta::new(precision, max_delta_bits),
        }
    }

    fn component_changed(&self, old: f32, new: f32) -> bool {
        let quantizer = self.component.quantizer();
        quantizer.quantize(old) != quantizer.quantize(new)
    }
}

impl DeltaCodec<Vec3> for QuantizedVec3Delta {
    fn write_delta(&self, writer: &mut dyn BitWrite, old: &Vec3, new: &Vec3) -> bool {
        let changed = self.component_changed(old.x, new.x)
            || self.component_changed(old.y, new.y)
            || self.component_changed(old.z, new.z);

        writer.write_bit(changed);
        if changed {
            self.component.write_delta(writer, &old.x, &new.x);
            self.component.write_delta(writer, &old.y, &new.y);
            self.component.write_delta(writer, &old.z, &new.z);
        }
        changed
    }

    fn read_delta(&self, reader: &mut BitReader, old: &Vec3) -> Result<Vec3, SerdeErr> {
        if !reader.read_bit()? {
            return Ok(*old);
        }

        Ok(Vec3 {
            x: self.component.read_delta(reader, &old.x)?,
            y: self.component.read_delta(reader, &old.y)?,
            z: self.component.read_delta(reader, &old.z)?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QuantizedQuatDelta {
    component: QuantizedFloatDelta,
}

impl QuantizedQuatDelta {
    pub fn new(precision: f32, max_delta_bits: u8) -> Self {
        Self {
            component: QuantizedFloatDelta::new(precision, max_delta_bits),
        }
    }

    fn component_changed(&self, old: f32, new: f32) -> bool {
        let quantizer = self.component.quantizer();
        quantizer.quantize(old) != quantizer.quantize(new)
    }
}

impl DeltaCodec<Quat> for QuantizedQuatDelta {
    fn write_delta(&self, writer: &mut dyn BitWrite, old: &Quat, new: &Quat) -> bool {
        let changed = self.component_changed(old.x, new.x)
            || self.component_changed(old.y, new.y)
            || self.component_changed(old.z, new.z)
            || self.component_changed(old.w, new.w);

        writer.write_bit(changed);
        if changed {
            self.component.write_delta(writer, &old.x, &new.x);
            self.component.write_delta(writer, &old.y, &new.y);
            self.component.write_delta(writer, &old.z, &new.z);
            self.component.write_delta(writer, &old.w, &new.w);
        }
        changed
    }

    fn read_delta(&self, reader: &mut BitReader, old: &Quat) -> Result<Quat, SerdeErr> {
        if !reader.read_bit()? {
            return Ok(*old);
        }

        Ok(Quat {
            x: self.component.read_delta(reader, &old.x)?,
            y: self.component.read_delta(reader, &old.y)?,
            z: self.component.read_delta(reader, &old.z)?,
            w: self.component.read_delta(reader, &old.w)?,
        })
    }
}

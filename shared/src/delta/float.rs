use rooknet_serde::{BitReader, BitWrite, Serde, SerdeErr};

use crate::delta::DeltaCodec;

/// Delta codec for raw floats. Float diffs are not generally compressible,
/// so a changed value is written in full (raw bit representation, so the
/// round trip is bit-exact). Change detection compares bit patterns: a NaN
/// baseline does not get stuck reporting "changed" forever.
#[derive(Debug, Clone, Copy, Default)]
pub struct FloatDelta;

impl DeltaCodec<f32> for FloatDelta {
    fn write_delta(&self, writer: &mut dyn BitWrite, old: &f32, new: &f32) -> bool {
        let changed = old.to_bits() != new.to_bits();
        writer.write_bit(changed);
        if changed {
            new.ser(writer);
        }
        changed
    }

    fn read_delta(&self, reader: &mut BitReader, old: &f32) -> Result<f32, SerdeErr> {
        if reader.read_bit()? {
            f32::de(reader)
        } else {
            Ok(*old)
        }
    }
}

impl DeltaCodec<f64> for FloatDelta {
    fn write_delta(&self, writer: &mut dyn BitWrite, old: &f64, new: &f64) -> bool {
        let changed = old.to_bits() != new.to_bits();
        writer.write_bit(changed);
        if changed {
            new.ser(writer);
        }
        changed
    }

    fn read_delta(&self, reader: &mut BitReader, old: &f64) -> Result<f64, SerdeErr> {
        if reader.read_bit()? {
            f64::de(reader)
        } else {
            Ok(*old)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FloatDelta;
    use crate::delta::DeltaCodec;
    use rooknet_serde::{BitReader, BitWrite, BitWriter};

    #[test]
    fn changed_value_is_bit_exact() {
        let old = 1.5f32;
        let new = -0.1f32;

        let mut writer = BitWriter::new();
        assert!(FloatDelta.write_delta(&mut writer, &old, &new));
        let buffer = writer.to_bytes();

        let mut reader = BitReader::new(&buffer);
        let out = FloatDelta.read_delta(&mut reader, &old).unwrap();
        assert_eq!(out.to_bits(), new.to_bits());
    }

    #[test]
    fn unchanged_costs_one_bit() {
        let mut writer = BitWriter::new();
        assert!(!FloatDelta.write_delta(&mut writer, &2.25f64, &2.25f64));
        assert_eq!(writer.bits_written(), 1);
    }
}

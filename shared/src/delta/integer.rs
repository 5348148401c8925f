use rooknet_serde::{
    read_varint_signed, read_varint_signed_wide, write_varint_signed, write_varint_signed_wide,
    BitReader, BitWrite, SerdeErr,
};

use crate::delta::DeltaCodec;

/// Delta codec for the integer primitives. The diff is computed one width
/// class larger than the source so the subtraction cannot overflow (e.g.
/// `i32::MAX - i32::MIN`), then zigzag + varint encoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntDelta;

macro_rules! impl_int_delta {
    ($type:ty, $wide:ty) => {
        impl DeltaCodec<$type> for IntDelta {
            fn write_delta(&self, writer: &mut dyn BitWrite, old: &$type, new: &$type) -> bool {
                let changed = old != new;
                writer.write_bit(changed);
                if changed {
                    let diff = <$wide>::from(*new) - <$wide>::from(*old);
                    write_varint_signed(writer, i64::from(diff));
                }
                changed
            }

            fn read_delta(&self, reader: &mut BitReader, old: &$type) -> Result<$type, SerdeErr> {
                if !reader.read_bit()? {
                    return Ok(*old);
                }
                let diff = read_varint_signed(reader)?;
                let value = i64::from(*old) + diff;
                <$type>::try_from(value).map_err(|_| SerdeErr::InvalidValue {
                    type_name: stringify!($type),
                })
            }
        }
    };
}

impl_int_delta!(i8, i16);
impl_int_delta!(i16, i32);
impl_int_delta!(i32, i64);
impl_int_delta!(u8, i16);
impl_int_delta!(u16, i32);
impl_int_delta!(u32, i64);

// The 64-bit widths promote to i128, which needs the wide varint path.

impl DeltaCodec<i64> for IntDelta {
    fn write_delta(&self, writer: &mut dyn BitWrite, old: &i64, new: &i64) -> bool {
        let changed = old != new;
        writer.write_bit(changed);
        if changed {
            let diff = i128::from(*new) - i128::from(*old);
            write_varint_signed_wide(writer, diff);
        }
        changed
    }

    fn read_delta(&self, reader: &mut BitReader, old: &i64) -> Result<i64, SerdeErr> {
        if !reader.read_bit()? {
            return Ok(*old);
        }
        let diff = read_varint_signed_wide(reader)?;
        let value = i128::from(*old) + diff;
        i64::try_from(value).map_err(|_| SerdeErr::InvalidValue { type_name: "i64" })
    }
}

impl DeltaCodec<u64> for IntDelta {
    fn write_delta(&self, writer: &mut dyn BitWrite, old: &u64, new: &u64) -> bool {
        let changed = old != new;
        writer.write_bit(changed);
        if changed {
            let diff = i128::from(*new) - i128::from(*old);
            write_varint_signed_wide(writer, diff);
        }
        changed
    }

    fn read_delta(&self, reader: &mut BitReader, old: &u64) -> Result<u64, SerdeErr> {
        if !reader.read_bit()? {
            return Ok(*old);
        }
        let diff = read_varint_signed_wide(reader)?;
        let value = i128::from(*old) + diff;
        u64::try_from(value).map_err(|_| SerdeErr::InvalidValue { type_name: "u64" })
    }
}

#[cfg(test)]
mod tests {
    use super::IntDelta;
    use crate::delta::DeltaCodec;
    use rooknet_serde::{BitReader, BitWrite, BitWriter};

    fn round_trip_i32(old: i32, new: i32) {
        let mut writer = BitWriter::new();
        IntDelta.write_delta(&mut writer, &old, &new);
        let buffer = writer.to_bytes();

        let mut reader = BitReader::new(&buffer);
        assert_eq!(IntDelta.read_delta(&mut reader, &old).unwrap(), new);
    }

    #[test]
    fn round_trips_across_the_full_range() {
        for (old, new) in [
            (0, 0),
            (0, 1),
            (1, 0),
            (-5, 5),
            (i32::MIN, i32::MAX),
            (i32::MAX, i32::MIN),
        ] {
            round_trip_i32(old, new);
        }
    }

    #[test]
    fn unchanged_costs_one_bit() {
        let mut writer = BitWriter::new();
        let changed = IntDelta.write_delta(&mut writer, &77i32, &77i32);

        assert!(!changed);
        assert_eq!(writer.bits_written(), 1);
    }

    #[test]
    fn sixty_four_bit_extremes() {
        for (old, new) in [(i64::MIN, i64::MAX), (i64::MAX, i64::MIN), (0, i64::MIN)] {
            let mut writer = BitWriter::new();
            IntDelta.write_delta(&mut writer, &old, &new);
            let buffer = writer.to_bytes();

            let mut reader = BitReader::new(&buffer);
            assert_eq!(IntDelta.read_delta(&mut reader, &old).unwrap(), new);
        }
    }

    #[test]
    fn unsigned_round_trips() {
        for (old, new) in [(0u16, u16::MAX), (u16::MAX, 0u16), (7, 8)] {
            let mut writer = BitWriter::new();
            IntDelta.write_delta(&mut writer, &old, &new);
            let buffer = writer.to_bytes();

            let mut reader = BitReader::new(&buffer);
            assert_eq!(IntDelta.read_delta(&mut reader, &old).unwrap(), new);
        }
    }
}

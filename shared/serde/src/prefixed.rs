use crate::{bit_reader::BitReader, bit_writer::BitWrite, error::SerdeErr};

/// Bits needed for the significant-bit-count prefix of a value bounded by
/// `max_bits`. Counts `0..=max_bits` must all be representable.
pub const fn prefix_width(max_bits: u8) -> u32 {
    u8::BITS - max_bits.leading_zeros()
}

/// Writes `value` as a significant-bit count followed by exactly that many
/// value bits. A zero value writes only the prefix, which makes this cheaper
/// than a varint for small bounded-range values.
///
/// # Panics
///
/// Panics if `max_bits` is not in `1..=64`, or if `value` does not fit in
/// `max_bits` bits. Both are programmer errors: the bound is part of the
/// field's wire contract.
pub fn write_prefixed(writer: &mut dyn BitWrite, value: u64, max_bits: u8) {
    if max_bits == 0 || max_bits > 64 {
        panic!("prefixed encoding requires a bound between 1 and 64 bits!");
    }

    let significant = 64 - value.leading_zeros();
    if significant > max_bits as u32 {
        panic!(
            "value `{}` is too high! (can't encode more than `{}` bits)",
            value, max_bits
        );
    }

    writer.write_bits(significant as u64, prefix_width(max_bits));
    writer.write_bits(value, significant);
}

/// Mirror of [`write_prefixed`]. A prefix claiming more than `max_bits`
/// significant bits is a protocol violation.
pub fn read_prefixed(reader: &mut BitReader, max_bits: u8) -> Result<u64, SerdeErr> {
    if max_bits == 0 || max_bits > 64 {
        panic!("prefixed encoding requires a bound between 1 and 64 bits!");
    }

    let significant = reader.read_bits(prefix_width(max_bits))? as u32;
    if significant > max_bits as u32 {
        return Err(SerdeErr::InvalidValue {
            type_name: "prefixed unsigned",
        });
    }

    reader.read_bits(significant)
}

#[cfg(test)]
mod tests {
    use super::{prefix_width, read_prefixed, write_prefixed};
    use crate::{bit_reader::BitReader, bit_writer::BitWriter, BitWrite};

    #[test]
    fn prefix_widths() {
        assert_eq!(prefix_width(1), 1);
        assert_eq!(prefix_width(7), 3);
        assert_eq!(prefix_width(8), 4);
        assert_eq!(prefix_width(32), 6);
        assert_eq!(prefix_width(64), 7);
    }

    #[test]
    fn round_trip_full_range() {
        let max_bits = 10u8;

        for value in 0..(1u64 << max_bits) {
            let mut writer = BitWriter::new();
            write_prefixed(&mut writer, value, max_bits);
            let buffer = writer.to_bytes();

            let mut reader = BitReader::new(&buffer);
            assert_eq!(read_prefixed(&mut reader, max_bits).unwrap(), value);
        }
    }

    #[test]
    fn zero_is_prefix_only() {
        let mut writer = BitWriter::new();
        write_prefixed(&mut writer, 0, 32);
        assert_eq!(writer.bits_written(), prefix_width(32));
    }

    #[test]
    fn round_trip_64_bit_bound() {
        for value in [0u64, 1, u32::MAX as u64, u64::MAX] {
            let mut writer = BitWriter::new();
            write_prefixed(&mut writer, value, 64);
            let buffer = writer.to_bytes();

            let mut reader = BitReader::new(&buffer);
            assert_eq!(read_prefixed(&mut reader, 64).unwrap(), value);
        }
    }

    #[test]
    #[should_panic]
    fn out_of_range_value_panics() {
        let mut writer = BitWriter::new();
        write_prefixed(&mut writer, 256, 8);
    }
}

use crate::{
    bit_reader::BitReader,
    bit_writer::BitWrite,
    error::SerdeErr,
    varint::{read_varint, write_varint},
};

/// A type that knows how to serialize & deserialize itself to/from a bit
/// stream, and how many bits its current value occupies.
pub trait Serde: Sized {
    fn ser(&self, writer: &mut dyn BitWrite);

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr>;

    fn bit_length(&self) -> u32;
}

/// A type whose serialized size does not depend on its value.
pub trait ConstBitLength {
    fn const_bit_length() -> u32;
}

// Primitives

impl Serde for bool {
    fn ser(&self, writer: &mut dyn BitWrite) {
        writer.write_bit(*self);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        reader.read_bit()
    }

    fn bit_length(&self) -> u32 {
        <Self as ConstBitLength>::const_bit_length()
    }
}

impl ConstBitLength for bool {
    fn const_bit_length() -> u32 {
        1
    }
}

macro_rules! impl_serde_unsigned {
    ($type:ty, $bits:expr) => {
        impl Serde for $type {
            fn ser(&self, writer: &mut dyn BitWrite) {
                writer.write_bits(u64::from(*self), $bits);
            }

            fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
                Ok(reader.read_bits($bits)? as $type)
            }

            fn bit_length(&self) -> u32 {
                $bits
            }
        }

        impl ConstBitLength for $type {
            fn const_bit_length() -> u32 {
                $bits
            }
        }
    };
}

impl_serde_unsigned!(u8, 8);
impl_serde_unsigned!(u16, 16);
impl_serde_unsigned!(u32, 32);

impl Serde for u64 {
    fn ser(&self, writer: &mut dyn BitWrite) {
        writer.write_bits(*self, 64);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        reader.read_bits(64)
    }

    fn bit_length(&self) -> u32 {
        64
    }
}

impl ConstBitLength for u64 {
    fn const_bit_length() -> u32 {
        64
    }
}

macro_rules! impl_serde_signed {
    ($type:ty, $unsigned:ty, $bits:expr) => {
        impl Serde for $type {
            fn ser(&self, writer: &mut dyn BitWrite) {
                (*self as $unsigned).ser(writer);
            }

            fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
                Ok(<$unsigned>::de(reader)? as $type)
            }

            fn bit_length(&self) -> u32 {
                $bits
            }
        }

        impl ConstBitLength for $type {
            fn const_bit_length() -> u32 {
                $bits
            }
        }
    };
}

impl_serde_signed!(i8, u8, 8);
impl_serde_signed!(i16, u16, 16);
impl_serde_signed!(i32, u32, 32);
impl_serde_signed!(i64, u64, 64);

// Floats travel as their raw bit representation: no precision loss.

impl Serde for f32 {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.to_bits().ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(f32::from_bits(u32::de(reader)?))
    }

    fn bit_length(&self) -> u32 {
        32
    }
}

impl ConstBitLength for f32 {
    fn const_bit_length() -> u32 {
        32
    }
}

impl Serde for f64 {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.to_bits().ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(f64::from_bits(u64::de(reader)?))
    }

    fn bit_length(&self) -> u32 {
        64
    }
}

impl ConstBitLength for f64 {
    fn const_bit_length() -> u32 {
        64
    }
}

// Containers

impl<T: Serde> Serde for Option<T> {
    fn ser(&self, writer: &mut dyn BitWrite) {
        match self {
            Some(value) => {
                writer.write_bit(true);
                value.ser(writer);
            }
            None => {
                writer.write_bit(false);
            }
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        if reader.read_bit()? {
            Ok(Some(T::de(reader)?))
        } else {
            Ok(None)
        }
    }

    fn bit_length(&self) -> u32 {
        match self {
            Some(value) => 1 + value.bit_length(),
            None => 1,
        }
    }
}

impl<T: Serde> Serde for Vec<T> {
    fn ser(&self, writer: &mut dyn BitWrite) {
        write_varint(writer, self.len() as u64);
        for item in self {
            item.ser(writer);
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let length = read_varint(reader)?;
        let mut output = Vec::new();
        for _ in 0..length {
            output.push(T::de(reader)?);
        }
        Ok(output)
    }

    fn bit_length(&self) -> u32 {
        let mut output = varint_bit_length(self.len() as u64);
        for item in self {
            output += item.bit_length();
        }
        output
    }
}

impl Serde for String {
    fn ser(&self, writer: &mut dyn BitWrite) {
        let bytes = self.as_bytes();
        write_varint(writer, bytes.len() as u64);
        for byte in bytes {
            writer.write_byte(*byte);
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let length = read_varint(reader)?;
        let mut bytes = Vec::new();
        for _ in 0..length {
            bytes.push(reader.read_byte()?);
        }
        String::from_utf8(bytes).map_err(|_| SerdeErr::InvalidValue { type_name: "String" })
    }

    fn bit_length(&self) -> u32 {
        varint_bit_length(self.len() as u64) + (self.len() as u32) * 8
    }
}

fn varint_bit_length(value: u64) -> u32 {
    let mut value = value;
    let mut output = 0;
    loop {
        value >>= 7;
        output += 8;
        if value == 0 {
            return output;
        }
    }
}

//! Value type tags and scalar payloads.
//!
//! [`ValueType`] is the immutable tag every value carries. The scalar
//! payloads are sum types over their representation: [`Integer`] over
//! signedness × width and [`Floating`] over width, so a payload can never
//! disagree with the width it claims.

use std::fmt;

/// A code unit of a wide string: UTF-16 on Windows, UTF-32 elsewhere.
#[cfg(windows)]
pub type WideChar = u16;

/// A code unit of a wide string: UTF-16 on Windows, UTF-32 elsewhere.
#[cfg(not(windows))]
pub type WideChar = u32;

/// The type tag of a value.
///
/// `Any` is a wildcard used in container element declarations; it is never
/// the concrete type of a constructed value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ValueType {
    /// `true` or `false`.
    Boolean = 1,
    /// Signed or unsigned integer of 8, 16, 32 or 64 bits.
    Integer,
    /// Floating-point number of 32, 64 or 80 bits.
    Floating,
    /// Zero-terminated sequence of wide code units.
    String,
    /// Two owned values.
    Pair,
    /// Ordered sequence of owned values sharing an item type.
    List,
    /// Insertion-ordered mapping stored as a list of hashed entries.
    Dictionary,
    /// Wildcard element type.
    Any,
}

impl ValueType {
    /// Whether a value of type `actual` may be stored where `self` is declared.
    pub fn admits(self, actual: ValueType) -> bool {
        self == ValueType::Any || self == actual
    }

    /// The stable byte written into identity hashes.
    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Boolean => "Boolean",
            Self::Integer => "Integer",
            Self::Floating => "Floating",
            Self::String => "String",
            Self::Pair => "Pair",
            Self::List => "List",
            Self::Dictionary => "Dictionary",
            Self::Any => "Any",
        };
        f.write_str(name)
    }
}

/// Whether an integer is signed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Signedness {
    /// Two's complement signed.
    Signed = 0,
    /// Unsigned.
    Unsigned = 1,
}

/// Width of an integer in bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum IntegerWidth {
    /// 8 bits.
    W8 = 0,
    /// 16 bits.
    W16 = 1,
    /// 32 bits.
    W32 = 2,
    /// 64 bits.
    W64 = 3,
}

impl IntegerWidth {
    /// Number of bits.
    pub fn bits(self) -> u32 {
        8 << (self as u32)
    }
}

/// Width of a floating-point number in bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum FloatingWidth {
    /// IEEE 754 binary32.
    W32 = 0,
    /// IEEE 754 binary64.
    W64 = 1,
    /// x87 80-bit extended precision.
    W80 = 2,
}

impl FloatingWidth {
    /// Number of bits.
    pub fn bits(self) -> u32 {
        match self {
            Self::W32 => 32,
            Self::W64 => 64,
            Self::W80 => 80,
        }
    }
}

/// An integer payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Integer {
    /// Signed 8-bit.
    I8(i8),
    /// Signed 16-bit.
    I16(i16),
    /// Signed 32-bit.
    I32(i32),
    /// Signed 64-bit.
    I64(i64),
    /// Unsigned 8-bit.
    U8(u8),
    /// Unsigned 16-bit.
    U16(u16),
    /// Unsigned 32-bit.
    U32(u32),
    /// Unsigned 64-bit.
    U64(u64),
}

impl Integer {
    /// Build an integer from a raw bit pattern, keeping the low `width` bits.
    pub fn from_bits(signedness: Signedness, width: IntegerWidth, bits: u64) -> Self {
        match (signedness, width) {
            (Signedness::Signed, IntegerWidth::W8) => Self::I8(bits as u8 as i8),
            (Signedness::Signed, IntegerWidth::W16) => Self::I16(bits as u16 as i16),
            (Signedness::Signed, IntegerWidth::W32) => Self::I32(bits as u32 as i32),
            (Signedness::Signed, IntegerWidth::W64) => Self::I64(bits as i64),
            (Signedness::Unsigned, IntegerWidth::W8) => Self::U8(bits as u8),
            (Signedness::Unsigned, IntegerWidth::W16) => Self::U16(bits as u16),
            (Signedness::Unsigned, IntegerWidth::W32) => Self::U32(bits as u32),
            (Signedness::Unsigned, IntegerWidth::W64) => Self::U64(bits),
        }
    }

    /// The raw bit pattern, zero-extended to 64 bits.
    pub fn to_bits(self) -> u64 {
        match self {
            Self::I8(v) => v as u8 as u64,
            Self::I16(v) => v as u16 as u64,
            Self::I32(v) => v as u32 as u64,
            Self::I64(v) => v as u64,
            Self::U8(v) => v as u64,
            Self::U16(v) => v as u64,
            Self::U32(v) => v as u64,
            Self::U64(v) => v,
        }
    }

    /// Signedness of the payload.
    pub fn signedness(self) -> Signedness {
        match self {
            Self::I8(_) | Self::I16(_) | Self::I32(_) | Self::I64(_) => Signedness::Signed,
            Self::U8(_) | Self::U16(_) | Self::U32(_) | Self::U64(_) => Signedness::Unsigned,
        }
    }

    /// Width of the payload.
    pub fn width(self) -> IntegerWidth {
        match self {
            Self::I8(_) | Self::U8(_) => IntegerWidth::W8,
            Self::I16(_) | Self::U16(_) => IntegerWidth::W16,
            Self::I32(_) | Self::U32(_) => IntegerWidth::W32,
            Self::I64(_) | Self::U64(_) => IntegerWidth::W64,
        }
    }

    /// Whether `other` has the same signedness and width.
    pub fn same_shape(self, other: Integer) -> bool {
        self.signedness() == other.signedness() && self.width() == other.width()
    }

    /// The value widened to `i128`, which holds every variant exactly.
    pub fn to_i128(self) -> i128 {
        match self {
            Self::I8(v) => v.into(),
            Self::I16(v) => v.into(),
            Self::I32(v) => v.into(),
            Self::I64(v) => v.into(),
            Self::U8(v) => v.into(),
            Self::U16(v) => v.into(),
            Self::U32(v) => v.into(),
            Self::U64(v) => v.into(),
        }
    }
}

impl fmt::Display for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_i128())
    }
}

/// An x87 80-bit extended-precision bit pattern.
///
/// Rust has no native 80-bit float, so the payload is kept as its bit
/// pattern: a 64-bit significand with an explicit integer bit and a 16-bit
/// sign-and-exponent word.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Extended80 {
    /// Significand including the explicit integer bit (bit 63).
    pub mantissa: u64,
    /// Sign in bit 15, biased exponent in bits 0..15.
    pub sign_exponent: u16,
}

impl Extended80 {
    const EXP_BIAS: i32 = 16383;
    const EXP_MAX: u16 = 0x7FFF;

    /// Widen an `f64` exactly.
    pub fn from_f64(value: f64) -> Self {
        let bits = value.to_bits();
        let sign = ((bits >> 63) as u16) << 15;
        let exp = ((bits >> 52) & 0x7FF) as i32;
        let frac = bits & ((1u64 << 52) - 1);

        let (mantissa, exponent) = match (exp, frac) {
            (0, 0) => (0, 0),
            (0x7FF, _) => ((1u64 << 63) | (frac << 11), Self::EXP_MAX),
            (0, _) => {
                let lz = frac.leading_zeros() as i32;
                (frac << lz, (15372 - lz) as u16)
            }
            _ => ((1u64 << 63) | (frac << 11), (exp - 1023 + Self::EXP_BIAS) as u16),
        };
        Self {
            mantissa,
            sign_exponent: sign | exponent,
        }
    }

    /// Narrow to the nearest `f64`, rounding half to even.
    pub fn to_f64(self) -> f64 {
        let negative = self.sign_exponent & 0x8000 != 0;
        let exponent = self.sign_exponent & Self::EXP_MAX;
        let sign = if negative { -1.0 } else { 1.0 };

        if exponent == Self::EXP_MAX {
            return if self.mantissa << 1 == 0 {
                sign * f64::INFINITY
            } else {
                f64::NAN
            };
        }
        if self.mantissa == 0 {
            return sign * 0.0;
        }

        let lz = self.mantissa.leading_zeros() as i32;
        let m = self.mantissa << lz;
        let mut e2 = exponent as i32 - Self::EXP_BIAS - lz;

        if e2 < -1022 {
            // Subnormal or zero in f64: the value is m * 2^(e2 - 63), counted
            // in units of 2^-1074.
            let shift = (-1011 - e2) as u32;
            if shift > 64 {
                return sign * 0.0;
            }
            let wide = m as u128;
            let mut frac = (wide >> shift) as u64;
            let dropped = wide & ((1u128 << shift) - 1);
            let half = 1u128 << (shift - 1);
            if dropped > half || (dropped == half && frac & 1 == 1) {
                // Carrying into bit 52 yields the smallest normal, as wanted.
                frac += 1;
            }
            return f64::from_bits(((negative as u64) << 63) | frac);
        }

        let tail = m << 1;
        let mut frac = tail >> 12;
        let dropped = tail & 0xFFF;
        if dropped > 0x800 || (dropped == 0x800 && frac & 1 == 1) {
            frac += 1;
            if frac == 1u64 << 52 {
                frac = 0;
                e2 += 1;
            }
        }
        if e2 > 1023 {
            return sign * f64::INFINITY;
        }
        let bits = ((negative as u64) << 63) | (((e2 + 1023) as u64) << 52) | frac;
        f64::from_bits(bits)
    }

    /// The ten bytes of the pattern in little-endian order.
    pub fn to_le_bytes(self) -> [u8; 10] {
        let mut out = [0u8; 10];
        out[..8].copy_from_slice(&self.mantissa.to_le_bytes());
        out[8..].copy_from_slice(&self.sign_exponent.to_le_bytes());
        out
    }
}

/// A floating-point payload.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Floating {
    /// IEEE 754 binary32.
    F32(f32),
    /// IEEE 754 binary64.
    F64(f64),
    /// x87 extended precision.
    F80(Extended80),
}

impl Floating {
    /// Width of the payload.
    pub fn width(self) -> FloatingWidth {
        match self {
            Self::F32(_) => FloatingWidth::W32,
            Self::F64(_) => FloatingWidth::W64,
            Self::F80(_) => FloatingWidth::W80,
        }
    }

    /// The value as an `f64` (rounded for 80-bit payloads).
    pub fn to_f64(self) -> f64 {
        match self {
            Self::F32(v) => v.into(),
            Self::F64(v) => v,
            Self::F80(v) => v.to_f64(),
        }
    }

    /// The bit pattern in little-endian order; its length is `width / 8`.
    pub fn to_le_bytes(self) -> smallvec::SmallVec<[u8; 10]> {
        match self {
            Self::F32(v) => v.to_le_bytes().into_iter().collect(),
            Self::F64(v) => v.to_le_bytes().into_iter().collect(),
            Self::F80(v) => v.to_le_bytes().into_iter().collect(),
        }
    }
}

impl fmt::Display for Floating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::F80(v) => write!(f, "{}", v.to_f64()),
        }
    }
}

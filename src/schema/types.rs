//! Schema Types - The Field Type Catalog
//!
//! The closed set of EVM primitive types a vault rule can be declared over,
//! together with the constraints each one implies (numeric range, byte length).
//! Anything not in this catalog is treated as an unsupported rule by the parser.

use num_bigint::BigInt;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer widths recognised for `intN` / `uintN`
pub const INTEGER_WIDTHS: [u16; 7] = [8, 16, 24, 32, 64, 128, 256];

/// Largest fixed-size byte array (`bytes32`)
pub const MAX_FIXED_BYTES: u8 = 32;

/// Broad classification of a field type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeClass {
    Numeric,
    FixedBytes,
    VariableBytes,
    Address,
    Bool,
    String,
}

/// A field type from the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum FieldType {
    /// Unsigned integer of the given bit width
    Uint(u16),
    /// Signed (two's complement) integer of the given bit width
    Int(u16),
    /// Fixed-size byte array, `bytes1` through `bytes32`
    FixedBytes(u8),
    /// Variable-length byte array
    Bytes,
    /// 20-byte account address
    Address,
    Bool,
    String,
}

impl FieldType {
    /// Look up a type name in the catalog.
    ///
    /// Matching is exact and case-sensitive: `uint256` is recognised,
    /// `UINT256`, `uint` and `uint40` are not.
    pub fn parse(name: &str) -> Option<FieldType> {
        match name {
            "address" => return Some(FieldType::Address),
            "bool" => return Some(FieldType::Bool),
            "string" => return Some(FieldType::String),
            "bytes" => return Some(FieldType::Bytes),
            _ => {}
        }

        if let Some(bits) = name.strip_prefix("uint") {
            return parse_integer_width(bits).map(FieldType::Uint);
        }
        if let Some(bits) = name.strip_prefix("int") {
            return parse_integer_width(bits).map(FieldType::Int);
        }
        if let Some(len) = name.strip_prefix("bytes") {
            return parse_canonical::<u8>(len)
                .filter(|n| (1..=MAX_FIXED_BYTES).contains(n))
                .map(FieldType::FixedBytes);
        }
        None
    }

    /// Classification used by validation and rendering
    pub fn class(&self) -> TypeClass {
        match self {
            FieldType::Uint(_) | FieldType::Int(_) => TypeClass::Numeric,
            FieldType::FixedBytes(_) => TypeClass::FixedBytes,
            FieldType::Bytes => TypeClass::VariableBytes,
            FieldType::Address => TypeClass::Address,
            FieldType::Bool => TypeClass::Bool,
            FieldType::String => TypeClass::String,
        }
    }

    /// True for every `intN` and `uintN`
    pub fn is_numeric(&self) -> bool {
        self.class() == TypeClass::Numeric
    }

    /// True for `bytesN` and `bytes`
    pub fn is_bytes(&self) -> bool {
        matches!(self.class(), TypeClass::FixedBytes | TypeClass::VariableBytes)
    }

    /// True for types whose ABI encoding is length-prefixed
    pub fn is_dynamic(&self) -> bool {
        matches!(self, FieldType::Bytes | FieldType::String)
    }

    /// True for the widths the catalog actually contains
    pub fn is_cataloged(&self) -> bool {
        match self {
            FieldType::Uint(bits) | FieldType::Int(bits) => INTEGER_WIDTHS.contains(bits),
            FieldType::FixedBytes(n) => (1..=MAX_FIXED_BYTES).contains(n),
            _ => true,
        }
    }

    /// Bit width of an integer type
    pub fn bit_width(&self) -> Option<u16> {
        match self {
            FieldType::Uint(bits) | FieldType::Int(bits) => Some(*bits),
            _ => None,
        }
    }

    /// Inclusive lower bound of a numeric type
    pub fn min_value(&self) -> Option<BigInt> {
        if !self.is_cataloged() {
            return None;
        }
        match self {
            FieldType::Uint(_) => Some(BigInt::zero()),
            FieldType::Int(bits) => Some(-(BigInt::one() << (*bits as usize - 1))),
            _ => None,
        }
    }

    /// Inclusive upper bound of a numeric type
    pub fn max_value(&self) -> Option<BigInt> {
        if !self.is_cataloged() {
            return None;
        }
        match self {
            FieldType::Uint(bits) => Some((BigInt::one() << (*bits as usize)) - BigInt::one()),
            FieldType::Int(bits) => Some((BigInt::one() << (*bits as usize - 1)) - BigInt::one()),
            _ => None,
        }
    }

    /// Declared length of a `bytesN` type
    pub fn fixed_byte_length(&self) -> Option<usize> {
        match self {
            FieldType::FixedBytes(n) if self.is_cataloged() => Some(*n as usize),
            _ => None,
        }
    }

    /// Check that a value lies within this type's numeric range
    pub fn contains(&self, value: &BigInt) -> bool {
        match (self.min_value(), self.max_value()) {
            (Some(min), Some(max)) => *value >= min && *value <= max,
            _ => false,
        }
    }

    /// Every type in the catalog, in a stable order
    pub fn catalog() -> Vec<FieldType> {
        let mut types = Vec::new();
        types.extend(INTEGER_WIDTHS.iter().map(|b| FieldType::Int(*b)));
        types.extend(INTEGER_WIDTHS.iter().map(|b| FieldType::Uint(*b)));
        types.extend((1..=MAX_FIXED_BYTES).map(FieldType::FixedBytes));
        types.extend([
            FieldType::Bytes,
            FieldType::Address,
            FieldType::Bool,
            FieldType::String,
        ]);
        types
    }
}

fn parse_integer_width(bits: &str) -> Option<u16> {
    parse_canonical::<u16>(bits).filter(|b| INTEGER_WIDTHS.contains(b))
}

/// Parse a decimal suffix, rejecting signs and leading zeros
fn parse_canonical<T>(digits: &str) -> Option<T>
where
    T: std::str::FromStr + ToString,
{
    let value = digits.parse::<T>().ok()?;
    (value.to_string() == digits).then_some(value)
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Uint(bits) => write!(f, "uint{}", bits),
            FieldType::Int(bits) => write!(f, "int{}", bits),
            FieldType::FixedBytes(n) => write!(f, "bytes{}", n),
            FieldType::Bytes => write!(f, "bytes"),
            FieldType::Address => write!(f, "address"),
            FieldType::Bool => write!(f, "bool"),
            FieldType::String => write!(f, "string"),
        }
    }
}

impl From<FieldType> for String {
    fn from(ty: FieldType) -> Self {
        ty.to_string()
    }
}

impl TryFrom<String> for FieldType {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        FieldType::parse(&name).ok_or_else(|| format!("unsupported field type: {}", name))
    }
}

/// Catalog lookup returning a validity flag alongside the resolved type.
///
/// Absence is a normal outcome, never an error.
pub fn is_valid_type(name: &str) -> (bool, Option<FieldType>) {
    let ty = FieldType::parse(name);
    (ty.is_some(), ty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_names_roundtrip() {
        for ty in FieldType::catalog() {
            assert_eq!(FieldType::parse(&ty.to_string()), Some(ty));
        }
        assert_eq!(FieldType::catalog().len(), 7 + 7 + 32 + 4);
    }

    #[test]
    fn test_lookup_is_exact() {
        assert_eq!(is_valid_type("uint256"), (true, Some(FieldType::Uint(256))));
        assert_eq!(is_valid_type("UINT256"), (false, None));
        assert_eq!(is_valid_type("uint"), (false, None));
        assert_eq!(is_valid_type("uint40"), (false, None));
        assert_eq!(is_valid_type("uint08"), (false, None));
        assert_eq!(is_valid_type("bytes0"), (false, None));
        assert_eq!(is_valid_type("bytes33"), (false, None));
        assert_eq!(is_valid_type("bytes+1"), (false, None));
        assert_eq!(is_valid_type(""), (false, None));
        assert_eq!(is_valid_type("unknownfoo"), (false, None));
    }

    #[test]
    fn test_classification() {
        assert!(FieldType::Int(24).is_numeric());
        assert!(!FieldType::Int(24).is_bytes());
        assert!(FieldType::FixedBytes(4).is_bytes());
        assert!(FieldType::Bytes.is_bytes());
        assert!(FieldType::Bytes.is_dynamic());
        assert!(FieldType::String.is_dynamic());
        assert!(!FieldType::Address.is_bytes());
        assert_eq!(FieldType::Bool.class(), TypeClass::Bool);
    }

    #[test]
    fn test_numeric_bounds() {
        assert_eq!(FieldType::Uint(8).min_value(), Some(BigInt::from(0)));
        assert_eq!(FieldType::Uint(8).max_value(), Some(BigInt::from(255)));
        assert_eq!(FieldType::Int(8).min_value(), Some(BigInt::from(-128)));
        assert_eq!(FieldType::Int(8).max_value(), Some(BigInt::from(127)));
        assert_eq!(FieldType::Uint(64).max_value(), Some(BigInt::from(u64::MAX)));
        assert_eq!(FieldType::Int(128).min_value(), Some(BigInt::from(i128::MIN)));

        let max256 = FieldType::Uint(256).max_value().unwrap();
        assert_eq!(max256.bits(), 256);
        assert!(FieldType::Address.min_value().is_none());
    }

    #[test]
    fn test_widths_outside_catalog_have_no_bounds() {
        for ty in [FieldType::Int(0), FieldType::Uint(0), FieldType::Uint(512), FieldType::Int(40)] {
            assert!(!ty.is_cataloged());
            assert_eq!(ty.min_value(), None);
            assert_eq!(ty.max_value(), None);
            assert!(!ty.contains(&BigInt::from(0)));
        }
        assert!(!FieldType::Uint(512).contains(&(BigInt::one() << 300usize)));
        assert_eq!(FieldType::FixedBytes(0).fixed_byte_length(), None);
        assert_eq!(FieldType::FixedBytes(33).fixed_byte_length(), None);
        assert!(FieldType::catalog().iter().all(FieldType::is_cataloged));
    }

    #[test]
    fn test_fixed_byte_length() {
        assert_eq!(FieldType::FixedBytes(32).fixed_byte_length(), Some(32));
        assert_eq!(FieldType::Bytes.fixed_byte_length(), None);
        assert_eq!(FieldType::String.fixed_byte_length(), None);
    }

    #[test]
    fn test_serde_uses_type_name() {
        let json = serde_json::to_string(&FieldType::Int(24)).unwrap();
        assert_eq!(json, "\"int24\"");
        let back: FieldType = serde_json::from_str("\"bytes8\"").unwrap();
        assert_eq!(back, FieldType::FixedBytes(8));
        assert!(serde_json::from_str::<FieldType>("\"float\"").is_err());
    }
}

//! Operator Catalog
//!
//! Comparison operators a vault rule can apply between an attestation field
//! and its threshold. The integer codes are the ordinals of the on-chain
//! contract's operator enum and must never be reordered.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::types::{FieldType, TypeClass};

/// A rule comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum Operator {
    Eq = 0,
    Ne = 1,
    Gt = 2,
    Ge = 3,
    Lt = 4,
    Le = 5,
    /// Field does not constrain eligibility
    None = 6,
}

impl Operator {
    /// All operators in code order
    pub const ALL: [Operator; 7] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Gt,
        Operator::Ge,
        Operator::Lt,
        Operator::Le,
        Operator::None,
    ];

    /// Operators legal on fields that only support equality
    pub const EQUALITY: [Operator; 3] = [Operator::Eq, Operator::Ne, Operator::None];

    /// On-chain enum ordinal
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Reverse of [`Operator::code`]
    pub fn from_code(code: u8) -> Option<Operator> {
        Self::ALL.get(code as usize).copied()
    }

    /// Short name used in forms and on the command line
    pub fn mnemonic(self) -> &'static str {
        match self {
            Operator::Eq => "EQ",
            Operator::Ne => "NE",
            Operator::Gt => "GT",
            Operator::Ge => "GE",
            Operator::Lt => "LT",
            Operator::Le => "LE",
            Operator::None => "NONE",
        }
    }

    /// Reverse of [`Operator::mnemonic`] (exact match)
    pub fn from_mnemonic(mnemonic: &str) -> Option<Operator> {
        Self::ALL.into_iter().find(|op| op.mnemonic() == mnemonic)
    }

    /// Human-readable label
    pub fn label(self) -> &'static str {
        match self {
            Operator::Eq => "Equal",
            Operator::Ne => "Not Equal",
            Operator::Gt => "Greater Than",
            Operator::Ge => "Greater Than or Equal",
            Operator::Lt => "Less Than",
            Operator::Le => "Less Than or Equal",
            Operator::None => "None",
        }
    }

    pub fn is_none(self) -> bool {
        self == Operator::None
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::from_mnemonic(s).ok_or_else(|| format!("unknown operator: {}", s))
    }
}

/// Decode a stored operator code for display; unknown codes read as `NONE`.
pub fn operator_from_code_lossy(code: u8) -> Operator {
    Operator::from_code(code).unwrap_or(Operator::None)
}

/// Operators permitted for a field type.
///
/// Only integers get ordering comparisons. Strings are held to equality:
/// a lexical "greater than" is not a meaningful eligibility rule.
pub fn allowed_operators(ty: &FieldType) -> &'static [Operator] {
    match ty.class() {
        TypeClass::Numeric => &Operator::ALL,
        TypeClass::FixedBytes
        | TypeClass::VariableBytes
        | TypeClass::Address
        | TypeClass::Bool
        | TypeClass::String => &Operator::EQUALITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip() {
        for op in Operator::ALL {
            assert_eq!(Operator::from_code(op.code()), Some(op));
            assert_eq!(Operator::from_mnemonic(op.mnemonic()), Some(op));
        }
        assert_eq!(Operator::from_code(7), None);
    }

    #[test]
    fn test_codes_match_contract_enum() {
        let codes: Vec<u8> = Operator::ALL.iter().map(|op| op.code()).collect();
        assert_eq!(codes, vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(Operator::Ge.code(), 3);
        assert_eq!(Operator::None.label(), "None");
        assert_eq!(Operator::Le.label(), "Less Than or Equal");
    }

    #[test]
    fn test_mnemonic_is_case_sensitive() {
        assert_eq!("GE".parse::<Operator>(), Ok(Operator::Ge));
        assert!("ge".parse::<Operator>().is_err());
        assert!("".parse::<Operator>().is_err());
    }

    #[test]
    fn test_lossy_code() {
        assert_eq!(operator_from_code_lossy(2), Operator::Gt);
        assert_eq!(operator_from_code_lossy(200), Operator::None);
    }

    #[test]
    fn test_allowed_operators_by_type() {
        assert_eq!(allowed_operators(&FieldType::Uint(256)).len(), 7);
        assert_eq!(allowed_operators(&FieldType::Int(8)).len(), 7);
        for ty in [
            FieldType::Address,
            FieldType::Bool,
            FieldType::Bytes,
            FieldType::FixedBytes(32),
            FieldType::String,
        ] {
            assert_eq!(allowed_operators(&ty), &[Operator::Eq, Operator::Ne, Operator::None]);
        }
    }

    #[test]
    fn test_none_always_allowed() {
        for ty in FieldType::catalog() {
            assert!(allowed_operators(&ty).contains(&Operator::None));
        }
    }

    #[test]
    fn test_serde_mnemonic() {
        assert_eq!(serde_json::to_string(&Operator::Ne).unwrap(), "\"NE\"");
        assert_eq!(serde_json::from_str::<Operator>("\"NONE\"").unwrap(), Operator::None);
    }
}

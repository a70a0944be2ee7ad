//! Schema Module - Attestation Schema Rule Engine
//!
//! Turns an attestation schema declaration into vault eligibility rules:
//!
//! 1. **Type Catalog** - the EVM primitive types a rule may be declared over
//! 2. **Operator Catalog** - comparison operators and their contract codes
//! 3. **Parser** - schema string to ordered rule descriptors
//! 4. **Validation** - operator/threshold checks and ABI threshold encoding
//!
//! Everything here is pure and synchronous.

pub mod codec;
pub mod display;
pub mod operators;
pub mod parser;
pub mod types;
pub mod validation;

pub use codec::{decode_value, encode_value, AbiValue, Codec, CodecError, DecodeContext, EncodeContext};
pub use display::{describe_rules, RuleSummary};
pub use operators::{allowed_operators, Operator};
pub use parser::{parse_schema, split_schema, RuleDescriptor, SupportedRule, UnsupportedRule};
pub use types::{is_valid_type, FieldType, TypeClass};
pub use validation::{
    default_inputs, encode_rules, field_state, validate_rule, validate_value, BatchError,
    EncodedRule, EncodedRules, FieldError, FieldInput, FieldRule, FieldState, RuleInputs,
    RuleValidator,
};

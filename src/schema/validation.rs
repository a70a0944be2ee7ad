//! Rule Validation and Threshold Encoding
//!
//! Checks the operator and threshold a user picked for each schema field and
//! produces the positional `operators[]` / `thresholds[]` arrays the vault
//! contract expects. This module provides:
//!
//! - Per-type value validators (range, hex length, address, bool)
//! - A per-field state machine for forms (`Unfilled` through `Valid`/`Invalid`)
//! - An all-or-nothing batch encoder for submission
//!
//! Choosing `NONE` always succeeds with an empty threshold. Unsupported
//! rules are pinned to `NONE`.

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

use super::codec::{encode_value, parse_address, AbiValue};
use super::operators::Operator;
use super::parser::RuleDescriptor;
use super::types::{FieldType, TypeClass};

pub const MSG_OPERATOR_REQUIRED: &str = "Operator is required";
pub const MSG_INVALID_OPERATOR: &str = "Invalid operator";
pub const MSG_OPERATOR_NOT_ALLOWED: &str = "Invalid operator for this field";

/// Raw user input for one rule field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInput {
    /// Operator mnemonic (`EQ`, `GE`, `NONE`, ...), if one was chosen
    pub operator: Option<String>,
    /// Threshold value as typed
    #[serde(default)]
    pub value: String,
}

impl FieldInput {
    pub fn new(operator: &str, value: &str) -> Self {
        Self {
            operator: Some(operator.to_string()),
            value: value.to_string(),
        }
    }

    /// Input that skips the field
    pub fn skip() -> Self {
        Self::new(Operator::None.mnemonic(), "")
    }

    fn operator_token(&self) -> Option<&str> {
        self.operator.as_deref().map(str::trim).filter(|op| !op.is_empty())
    }
}

/// User inputs keyed by field name
pub type RuleInputs = HashMap<String, FieldInput>;

/// Which half of a field's input an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTarget {
    Operator,
    Value,
}

/// A recoverable problem with one field's input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Name of the field that failed validation
    pub field: String,
    pub target: FieldTarget,
    /// Human-readable error message
    pub message: String,
}

impl FieldError {
    pub fn operator(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            target: FieldTarget::Operator,
            message: message.to_string(),
        }
    }

    pub fn value(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            target: FieldTarget::Value,
            message: message.to_string(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = match self.target {
            FieldTarget::Operator => "operator",
            FieldTarget::Value => "value",
        };
        write!(f, "Field '{}' {}: {}", self.field, target, self.message)
    }
}

impl std::error::Error for FieldError {}

/// Why a batch could not be encoded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    /// The schema produced no rules at all
    #[error("The validation schema is invalid")]
    EmptySchema,

    /// One or more fields failed validation
    #[error("{} rule field(s) failed validation", .0.len())]
    Fields(Vec<FieldError>),
}

impl BatchError {
    /// Field errors carried by this failure
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            BatchError::EmptySchema => &[],
            BatchError::Fields(errors) => errors,
        }
    }
}

/// Output for one validated field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedRule {
    pub operator: Operator,
    /// ABI-encoded threshold, empty when the operator is `NONE`
    pub threshold: Vec<u8>,
}

impl EncodedRule {
    pub fn skip() -> Self {
        Self {
            operator: Operator::None,
            threshold: Vec::new(),
        }
    }

    pub fn operator_code(&self) -> u8 {
        self.operator.code()
    }

    pub fn threshold_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.threshold))
    }
}

/// Parallel arrays ready for the contract call, in schema order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedRules {
    pub operators: Vec<u8>,
    pub thresholds: Vec<Vec<u8>>,
}

impl EncodedRules {
    fn push(&mut self, rule: EncodedRule) {
        self.operators.push(rule.operator_code());
        self.thresholds.push(rule.threshold);
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Thresholds as `0x` hex strings
    pub fn thresholds_hex(&self) -> Vec<String> {
        self.thresholds
            .iter()
            .map(|t| format!("0x{}", hex::encode(t)))
            .collect()
    }
}

// ============================================================================
// Value validators
// ============================================================================

/// Checks a raw value against a type and converts it for encoding
pub type ValueValidator = fn(FieldType, &str) -> Result<AbiValue, String>;

/// Pick the validator for a field type
pub fn validator_for(ty: &FieldType) -> ValueValidator {
    match ty.class() {
        TypeClass::Numeric => validate_numeric,
        TypeClass::FixedBytes => validate_fixed_bytes,
        TypeClass::VariableBytes => validate_bytes,
        TypeClass::Address => validate_address,
        TypeClass::Bool => validate_bool,
        TypeClass::String => validate_string,
    }
}

/// Validate a value against a field type.
///
/// The value is trimmed first. On success the typed value is returned,
/// on failure a user-facing message.
pub fn validate_value(ty: FieldType, value: &str) -> Result<AbiValue, String> {
    validator_for(&ty)(ty, value.trim())
}

fn validate_numeric(ty: FieldType, value: &str) -> Result<AbiValue, String> {
    let parsed = parse_integer(value).ok_or_else(|| "Must be a valid number".to_string())?;

    if !ty.contains(&parsed) {
        let (min, max) = match (ty.min_value(), ty.max_value()) {
            (Some(min), Some(max)) => (min, max),
            _ => return Err("Must be a valid number".to_string()),
        };
        return Err(format!("Must be a number between {} and {}", min, max));
    }

    Ok(match ty {
        FieldType::Int(bits) => AbiValue::Int(bits, parsed),
        FieldType::Uint(bits) => AbiValue::Uint(bits, parsed),
        _ => return Err("Must be a valid number".to_string()),
    })
}

/// Parse a decimal integer with optional leading `-`, or a `0x` hex literal
fn parse_integer(value: &str) -> Option<BigInt> {
    if let Some(digits) = value.strip_prefix("0x") {
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        return BigInt::parse_bytes(digits.as_bytes(), 16);
    }

    let digits = value.strip_prefix('-').unwrap_or(value);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    BigInt::parse_bytes(value.as_bytes(), 10)
}

/// Decode `0x`-prefixed hex with at least one whole byte
fn parse_hex(value: &str) -> Option<Vec<u8>> {
    let digits = value.strip_prefix("0x")?;
    if digits.is_empty() {
        return None;
    }
    hex::decode(digits).ok()
}

fn validate_fixed_bytes(ty: FieldType, value: &str) -> Result<AbiValue, String> {
    let expected = ty.fixed_byte_length().unwrap_or_default();
    match parse_hex(value) {
        Some(bytes) if bytes.len() == expected => Ok(AbiValue::FixedBytes(bytes)),
        _ => Err(format!("Must be a valid {}-byte hex string", expected)),
    }
}

fn validate_bytes(_ty: FieldType, value: &str) -> Result<AbiValue, String> {
    parse_hex(value)
        .map(AbiValue::Bytes)
        .ok_or_else(|| "Must be a valid bytes string".to_string())
}

fn validate_address(_ty: FieldType, value: &str) -> Result<AbiValue, String> {
    parse_address(value)
        .map(AbiValue::Address)
        .ok_or_else(|| "Must be a valid address".to_string())
}

fn validate_bool(_ty: FieldType, value: &str) -> Result<AbiValue, String> {
    match value {
        "true" => Ok(AbiValue::Bool(true)),
        "false" => Ok(AbiValue::Bool(false)),
        _ => Err("Must be a valid boolean".to_string()),
    }
}

fn validate_string(_ty: FieldType, value: &str) -> Result<AbiValue, String> {
    Ok(AbiValue::String(value.to_string()))
}

// ============================================================================
// Field rules
// ============================================================================

/// Validation record for one schema field, built once after parsing
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub name: String,
    /// `None` for unsupported types
    pub field_type: Option<FieldType>,
    pub allowed_operators: Vec<Operator>,
    validator: Option<ValueValidator>,
}

impl FieldRule {
    pub fn is_supported(&self) -> bool {
        self.field_type.is_some()
    }

    /// Resolve the operator token, applying the unsupported-rule pin
    fn resolve_operator(&self, token: Option<&str>) -> Result<Operator, FieldError> {
        let token = match token {
            Some(token) => token,
            None if !self.is_supported() => return Ok(Operator::None),
            None => return Err(FieldError::operator(&self.name, MSG_OPERATOR_REQUIRED)),
        };

        let op = Operator::from_mnemonic(token)
            .ok_or_else(|| FieldError::operator(&self.name, MSG_INVALID_OPERATOR))?;

        if op.is_none() {
            return Ok(op);
        }
        if !self.allowed_operators.contains(&op) {
            return Err(FieldError::operator(&self.name, MSG_OPERATOR_NOT_ALLOWED));
        }
        Ok(op)
    }

    /// Validate one field's input and encode its threshold
    pub fn check(&self, input: &FieldInput) -> Result<EncodedRule, FieldError> {
        let operator = self.resolve_operator(input.operator_token())?;
        if operator.is_none() {
            return Ok(EncodedRule::skip());
        }

        let (ty, validator) = match (self.field_type, self.validator) {
            (Some(ty), Some(validator)) => (ty, validator),
            _ => return Err(FieldError::operator(&self.name, MSG_OPERATOR_NOT_ALLOWED)),
        };

        let value = validator(ty, input.value.trim())
            .map_err(|msg| FieldError::value(&self.name, &msg))?;
        let threshold =
            encode_value(&value).map_err(|e| FieldError::value(&self.name, &e.to_string()))?;

        Ok(EncodedRule {
            operator,
            threshold,
        })
    }

    /// Current state of the field in an interactive form
    pub fn state(&self, input: Option<&FieldInput>) -> FieldState {
        let token = input.and_then(FieldInput::operator_token);
        if token.is_none() && !self.is_supported() {
            return FieldState::Valid(EncodedRule::skip());
        }
        let (input, token) = match (input, token) {
            (Some(input), Some(token)) => (input, token),
            _ => return FieldState::Unfilled,
        };

        let operator = match self.resolve_operator(Some(token)) {
            Ok(op) => op,
            Err(e) => return FieldState::Invalid(e),
        };

        let awaiting_value = !operator.is_none()
            && input.value.trim().is_empty()
            && self.field_type != Some(FieldType::String);
        if awaiting_value {
            return FieldState::OperatorChosen(operator);
        }

        match self.check(input) {
            Ok(encoded) => FieldState::Valid(encoded),
            Err(e) => FieldState::Invalid(e),
        }
    }
}

impl From<&RuleDescriptor> for FieldRule {
    fn from(rule: &RuleDescriptor) -> Self {
        let field_type = rule.field_type();
        Self {
            name: rule.name().to_string(),
            field_type,
            allowed_operators: rule.allowed_operators().to_vec(),
            validator: field_type.as_ref().map(validator_for),
        }
    }
}

/// Per-field form state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldState {
    /// No operator chosen yet
    Unfilled,
    /// Operator chosen, threshold still empty
    OperatorChosen(Operator),
    Valid(EncodedRule),
    Invalid(FieldError),
}

impl FieldState {
    pub fn is_valid(&self) -> bool {
        matches!(self, FieldState::Valid(_))
    }
}

/// Validate a single rule with a chosen operator and raw value
pub fn validate_rule(
    rule: &RuleDescriptor,
    operator: &str,
    value: &str,
) -> Result<EncodedRule, FieldError> {
    FieldRule::from(rule).check(&FieldInput::new(operator, value))
}

/// Form state for a single rule
pub fn field_state(rule: &RuleDescriptor, input: Option<&FieldInput>) -> FieldState {
    FieldRule::from(rule).state(input)
}

// ============================================================================
// Rule validator
// ============================================================================

/// Field rules for a whole schema, in declaration order, with lookup by name
#[derive(Debug, Clone, Default)]
pub struct RuleValidator {
    fields: Vec<FieldRule>,
    /// Field name to first position with that name
    index: HashMap<String, usize>,
}

impl RuleValidator {
    pub fn new(rules: &[RuleDescriptor]) -> Self {
        let fields: Vec<FieldRule> = rules.iter().map(FieldRule::from).collect();
        let mut index = HashMap::new();
        for (pos, field) in fields.iter().enumerate() {
            index.entry(field.name.clone()).or_insert(pos);
        }
        Self { fields, index }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[FieldRule] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FieldRule> {
        self.index.get(name).map(|pos| &self.fields[*pos])
    }

    /// Validate a single named field
    pub fn validate_field(&self, name: &str, input: &FieldInput) -> Option<Result<EncodedRule, FieldError>> {
        self.get(name).map(|rule| rule.check(input))
    }

    /// Form state of every field, in order
    pub fn states(&self, inputs: &RuleInputs) -> Vec<FieldState> {
        self.fields
            .iter()
            .map(|rule| rule.state(inputs.get(&rule.name)))
            .collect()
    }

    /// Validate every field and build the contract arrays.
    ///
    /// Either every field is valid and one entry per field is produced,
    /// or nothing is produced and every field error is returned.
    pub fn encode(&self, inputs: &RuleInputs) -> Result<EncodedRules, BatchError> {
        if self.fields.is_empty() {
            return Err(BatchError::EmptySchema);
        }

        let empty = FieldInput::default();
        let mut encoded = EncodedRules::default();
        let mut errors = Vec::new();

        for rule in &self.fields {
            let input = inputs.get(&rule.name).unwrap_or(&empty);
            match rule.check(input) {
                Ok(field) => {
                    debug!(
                        "Rule '{}' encoded with {} ({} bytes)",
                        rule.name,
                        field.operator,
                        field.threshold.len()
                    );
                    encoded.push(field);
                }
                Err(e) => {
                    debug!("Rule '{}' rejected: {}", rule.name, e.message);
                    errors.push(e);
                }
            }
        }

        if !errors.is_empty() {
            info!("Rule batch rejected with {} field error(s)", errors.len());
            return Err(BatchError::Fields(errors));
        }

        info!("Encoded {} vault rules", encoded.len());
        Ok(encoded)
    }
}

/// Encode every rule for submission (all-or-nothing)
pub fn encode_rules(rules: &[RuleDescriptor], inputs: &RuleInputs) -> Result<EncodedRules, BatchError> {
    RuleValidator::new(rules).encode(inputs)
}

/// Initial form inputs: unsupported rules pinned to `NONE`,
/// supported rules with no operator and their default value
pub fn default_inputs(rules: &[RuleDescriptor]) -> RuleInputs {
    rules
        .iter()
        .map(|rule| {
            let input = if rule.is_supported() {
                FieldInput {
                    operator: None,
                    value: rule.default_value().to_string(),
                }
            } else {
                FieldInput::skip()
            };
            (rule.name().to_string(), input)
        })
        .collect()
}

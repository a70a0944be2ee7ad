//! Rule summaries for vault detail views.
//!
//! Pairs a vault's schema with the operators and thresholds stored on chain
//! and decodes each threshold back to readable text.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::codec::decode_value;
use super::operators::{operator_from_code_lossy, Operator};
use super::parser::{parse_schema, RuleDescriptor};

/// Label shown in place of an operator for unsupported rules
pub const UNSUPPORTED_LABEL: &str = "Unsupported";

/// One rule as shown to a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSummary {
    pub name: String,
    pub type_name: String,
    pub supported: bool,
    /// Stored operator, `None` when the arrays are shorter than the schema
    pub operator: Option<Operator>,
    /// Operator label, or "Unsupported"
    pub operator_label: String,
    /// Decoded threshold; absent for skipped or unsupported rules
    pub threshold: Option<String>,
}

impl RuleSummary {
    /// Whether this rule actually constrains eligibility
    pub fn is_active(&self) -> bool {
        self.supported && matches!(self.operator, Some(op) if !op.is_none())
    }
}

fn summarize(rule: &RuleDescriptor, code: Option<u8>, threshold: Option<&[u8]>) -> RuleSummary {
    let operator = code.map(operator_from_code_lossy);

    let operator_label = if rule.is_supported() {
        operator.unwrap_or(Operator::None).label().to_string()
    } else {
        UNSUPPORTED_LABEL.to_string()
    };

    let threshold = match (rule.field_type(), operator, threshold) {
        (Some(ty), Some(op), Some(raw)) if !op.is_none() => Some(match decode_value(ty, raw) {
            Ok(value) => value.to_string(),
            Err(e) => {
                warn!("Cannot decode threshold for '{}': {}", rule.name(), e);
                format!("0x{}", hex::encode(raw))
            }
        }),
        _ => None,
    };

    RuleSummary {
        name: rule.name().to_string(),
        type_name: rule.type_name(),
        supported: rule.is_supported(),
        operator,
        operator_label,
        threshold,
    }
}

/// Summarize stored rules positionally against their schema
pub fn describe_rules(schema: &str, operators: &[u8], thresholds: &[Vec<u8>]) -> Vec<RuleSummary> {
    let rules = parse_schema(schema);
    if operators.len() != rules.len() || thresholds.len() != rules.len() {
        warn!(
            "Stored rule arrays ({} ops, {} thresholds) do not match {} schema fields",
            operators.len(),
            thresholds.len(),
            rules.len()
        );
    }

    rules
        .iter()
        .enumerate()
        .map(|(i, rule)| {
            summarize(
                rule,
                operators.get(i).copied(),
                thresholds.get(i).map(Vec::as_slice),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::validation::{encode_rules, FieldInput, RuleInputs};

    #[test]
    fn test_describe_encoded_rules() {
        let schema = "address wallet,uint256 score,bool active,foo bar";
        let rules = parse_schema(schema);
        let mut inputs = RuleInputs::new();
        inputs.insert(
            "wallet".to_string(),
            FieldInput::new("EQ", "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"),
        );
        inputs.insert("score".to_string(), FieldInput::new("GE", "100"));
        inputs.insert("active".to_string(), FieldInput::skip());
        let encoded = encode_rules(&rules, &inputs).unwrap();

        let summaries = describe_rules(schema, &encoded.operators, &encoded.thresholds);
        assert_eq!(summaries.len(), 4);

        assert_eq!(summaries[0].operator_label, "Equal");
        assert_eq!(
            summaries[0].threshold.as_deref(),
            Some("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed")
        );
        assert_eq!(summaries[1].operator_label, "Greater Than or Equal");
        assert_eq!(summaries[1].threshold.as_deref(), Some("100"));
        assert!(summaries[1].is_active());

        assert_eq!(summaries[2].operator, Some(Operator::None));
        assert_eq!(summaries[2].threshold, None);
        assert!(!summaries[2].is_active());

        assert_eq!(summaries[3].operator_label, UNSUPPORTED_LABEL);
        assert_eq!(summaries[3].type_name, "foo");
        assert_eq!(summaries[3].threshold, None);
    }

    #[test]
    fn test_undecodable_threshold_falls_back_to_hex() {
        let summaries = describe_rules("uint8 level", &[0], &[vec![0xab]]);
        assert_eq!(summaries[0].threshold.as_deref(), Some("0xab"));
    }

    #[test]
    fn test_short_arrays() {
        let summaries = describe_rules("uint8 a,uint8 b", &[6], &[vec![]]);
        assert_eq!(summaries[1].operator, None);
        assert_eq!(summaries[1].operator_label, "None");
        assert_eq!(summaries[1].threshold, None);
    }
}

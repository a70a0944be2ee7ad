//! Schema Parser
//!
//! Turns an attestation schema declaration such as
//! `"uint256 score, address wallet"` into an ordered list of rule descriptors.
//! Declaration order is preserved: the vault contract consumes operators and
//! thresholds as positional arrays aligned with it.
//!
//! Parsing never fails. A field whose type is outside the catalog becomes an
//! unsupported rule pinned to `NONE`, and a segment that is not a
//! `<type> <name>` pair is dropped, so the rest of the schema stays usable.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::operators::{allowed_operators, Operator};
use super::types::FieldType;

/// A rule whose type is in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedRule {
    /// Field name as declared in the schema
    pub name: String,
    /// Resolved field type
    pub field_type: FieldType,
    /// Operators the user may choose from (always includes `NONE`)
    pub allowed_operators: Vec<Operator>,
    /// Initial value shown in the threshold input
    pub default_value: String,
}

/// A rule whose type is not in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsupportedRule {
    pub name: String,
    /// Type token exactly as it appeared in the schema
    pub raw_type: String,
}

/// One field extracted from a schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleDescriptor {
    Supported(SupportedRule),
    Unsupported(UnsupportedRule),
}

impl RuleDescriptor {
    /// Build the descriptor for a single `<type> <name>` declaration
    pub fn from_declaration(type_token: &str, name: &str) -> Self {
        match FieldType::parse(type_token) {
            Some(field_type) => RuleDescriptor::Supported(SupportedRule {
                name: name.to_string(),
                field_type,
                allowed_operators: allowed_operators(&field_type).to_vec(),
                default_value: default_value_for(&field_type).to_string(),
            }),
            None => {
                debug!("Field '{}' has unsupported type '{}'", name, type_token);
                RuleDescriptor::Unsupported(UnsupportedRule {
                    name: name.to_string(),
                    raw_type: type_token.to_string(),
                })
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            RuleDescriptor::Supported(rule) => &rule.name,
            RuleDescriptor::Unsupported(rule) => &rule.name,
        }
    }

    /// Type name for display; unsupported rules keep their raw token
    pub fn type_name(&self) -> String {
        match self {
            RuleDescriptor::Supported(rule) => rule.field_type.to_string(),
            RuleDescriptor::Unsupported(rule) => rule.raw_type.clone(),
        }
    }

    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            RuleDescriptor::Supported(rule) => Some(rule.field_type),
            RuleDescriptor::Unsupported(_) => None,
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, RuleDescriptor::Supported(_))
    }

    pub fn allowed_operators(&self) -> &[Operator] {
        match self {
            RuleDescriptor::Supported(rule) => &rule.allowed_operators,
            RuleDescriptor::Unsupported(_) => &[Operator::None],
        }
    }

    pub fn allows(&self, op: Operator) -> bool {
        self.allowed_operators().contains(&op)
    }

    pub fn default_value(&self) -> &str {
        match self {
            RuleDescriptor::Supported(rule) => &rule.default_value,
            RuleDescriptor::Unsupported(_) => "",
        }
    }
}

fn default_value_for(ty: &FieldType) -> &'static str {
    if ty.is_numeric() {
        "0"
    } else {
        ""
    }
}

/// Split a schema into its `(type, name)` declaration pairs.
///
/// Quote characters are stripped first. Segments that do not consist of
/// exactly two whitespace-separated tokens are skipped.
pub fn split_schema(schema: &str) -> Vec<(String, String)> {
    let cleaned = schema.replace('"', "");

    cleaned
        .split(',')
        .enumerate()
        .filter_map(|(index, segment)| {
            let mut tokens = segment.split_whitespace();
            match (tokens.next(), tokens.next(), tokens.next()) {
                (Some(ty), Some(name), None) => Some((ty.to_string(), name.to_string())),
                _ => {
                    if !segment.trim().is_empty() {
                        debug!("Dropping malformed schema segment {}: {:?}", index, segment);
                    }
                    None
                }
            }
        })
        .collect()
}

/// Parse a schema into rule descriptors, preserving declaration order
pub fn parse_schema(schema: &str) -> Vec<RuleDescriptor> {
    split_schema(schema)
        .iter()
        .map(|(ty, name)| RuleDescriptor::from_declaration(ty, name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_schema() {
        assert!(parse_schema("").is_empty());
        assert!(parse_schema("   ").is_empty());
        assert!(parse_schema("\"\"").is_empty());
        assert!(parse_schema(",,").is_empty());
    }

    #[test]
    fn test_graceful_degradation() {
        let rules = parse_schema("uint256 age,unknownfoo bar,bool active");
        assert_eq!(rules.len(), 3);

        assert!(rules[0].is_supported());
        assert_eq!(rules[0].name(), "age");
        assert_eq!(rules[0].field_type(), Some(FieldType::Uint(256)));
        assert_eq!(rules[0].default_value(), "0");

        assert!(!rules[1].is_supported());
        assert_eq!(rules[1].name(), "bar");
        assert_eq!(rules[1].type_name(), "unknownfoo");
        assert_eq!(rules[1].allowed_operators(), &[Operator::None]);
        assert_eq!(rules[1].default_value(), "");

        assert!(rules[2].is_supported());
        assert_eq!(rules[2].allowed_operators(), &Operator::EQUALITY);
        assert_eq!(rules[2].default_value(), "");
    }

    #[test]
    fn test_parsing_is_deterministic() {
        let schema = "\"address wallet, uint8 level, string handle, uint reaction\"";
        assert_eq!(parse_schema(schema), parse_schema(schema));
    }

    #[test]
    fn test_quotes_and_whitespace_stripped() {
        let rules = parse_schema("\"uint256  score\" ,\t\"bytes32 root\"");
        let names: Vec<&str> = rules.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["score", "root"]);
        assert_eq!(rules[1].field_type(), Some(FieldType::FixedBytes(32)));
    }

    #[test]
    fn test_malformed_segments_dropped() {
        let rules = parse_schema("uint256 a,lonely,,bool b,string c d");
        let names: Vec<&str> = rules.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_order_preserved() {
        let pairs = split_schema("string reaction,bytes icon,uint message");
        assert_eq!(
            pairs,
            vec![
                ("string".to_string(), "reaction".to_string()),
                ("bytes".to_string(), "icon".to_string()),
                ("uint".to_string(), "message".to_string()),
            ]
        );

        let rules = parse_schema("string reaction,bytes icon,uint message");
        assert!(rules[0].is_supported());
        assert!(rules[1].is_supported());
        assert!(!rules[2].is_supported());
    }

    #[test]
    fn test_descriptor_serde_tag() {
        let rules = parse_schema("int8 delta,foo bar");
        let json = serde_json::to_value(&rules).unwrap();
        assert_eq!(json[0]["kind"], "supported");
        assert_eq!(json[0]["field_type"], "int8");
        assert_eq!(json[1]["kind"], "unsupported");
        assert_eq!(json[1]["raw_type"], "foo");
    }
}

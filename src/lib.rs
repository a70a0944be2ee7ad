//! Zuni Vault - Attestation-Gated Vault Rules
//!
//! A vault only pays out to claimers whose attestations satisfy its rules:
//! - Rules come from an attestation schema (`"uint256 score,address wallet"`)
//! - Each field gets an operator (`EQ`, `GE`, ... or `NONE` to skip it)
//! - Each threshold is ABI-encoded exactly as the vault contract decodes it
//! - Operators and thresholds are submitted as arrays aligned with the schema

pub mod config;
pub mod error;
pub mod registry;
pub mod schema;
pub mod vault;

pub use config::{ConfigError, VaultConfig};
pub use error::{Error, Result};
pub use registry::{InMemoryRegistry, RegistryCache, RegistryError, SchemaRecord, SchemaRegistry, SchemaUid};
pub use vault::{
    prepare_vault_rules, submit_vault, ClaimData, ClaimType, CreateVaultParams, PreparedRules,
    VaultContract, VaultError,
};

// Re-export the rule engine
pub use schema::{
    // Catalogs
    allowed_operators, is_valid_type, FieldType, Operator, TypeClass,
    // Parser
    parse_schema, split_schema, RuleDescriptor, SupportedRule, UnsupportedRule,
    // Validation and encoding
    default_inputs, encode_rules, field_state, validate_rule, validate_value, BatchError,
    EncodedRule, EncodedRules, FieldError, FieldInput, FieldRule, FieldState, RuleInputs,
    RuleValidator,
    // Codec and display
    decode_value, describe_rules, encode_value, AbiValue, CodecError, RuleSummary,
};

//! Vault creation plumbing around the rule engine.
//!
//! Fetches a validation schema from the registry, runs the user's rule
//! inputs through the validator and packages the result, together with the
//! vault's claim terms, for the contract call.

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

use crate::registry::{RegistryError, SchemaRecord, SchemaRegistry, SchemaUid};
use crate::schema::codec::{
    parse_address, Codec, CodecError, CodecResult, DecodeContext, EncodeContext, ADDRESS_LENGTH,
};
use crate::schema::parser::{parse_schema, RuleDescriptor};
use crate::schema::validation::{BatchError, EncodedRules, RuleInputs, RuleValidator};

/// Errors while preparing or submitting a vault
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VaultError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Rules(#[from] BatchError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("deposit window must end after it starts ({start} >= {end})")]
    InvalidWindow { start: u64, end: u64 },

    #[error("vault name is required")]
    MissingName,

    #[error("vault description is required")]
    MissingDescription,

    #[error("Invalid attester address: {0}")]
    InvalidAttester(String),

    #[error("{0}")]
    InvalidClaim(&'static str),

    #[error("{operators} operators but {thresholds} thresholds")]
    MisalignedRules { operators: usize, thresholds: usize },

    #[error("contract call failed: {0}")]
    Contract(String),
}

// ============================================================================
// Claim terms
// ============================================================================

/// Decimal places of on-chain claim amounts
pub const CLAIM_DECIMALS: u32 = 18;

/// Largest fixed payout, in whole units
pub const MAX_FIXED_AMOUNT_UNITS: u64 = u64::MAX;

pub const MSG_INVALID_AMOUNT: &str =
    "Claim amount must be a valid number, greater than 0 and less than 2^64";
pub const MSG_INVALID_PERCENTAGE: &str =
    "Claim percentage must be a valid number between 0 and 100";

/// How an eligible claimer's payout is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum ClaimType {
    Fixed = 0,
    Percentage = 1,
}

impl ClaimType {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<ClaimType> {
        match code {
            0 => Some(ClaimType::Fixed),
            1 => Some(ClaimType::Percentage),
            _ => None,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            ClaimType::Fixed => "FIXED",
            ClaimType::Percentage => "PERCENTAGE",
        }
    }
}

impl fmt::Display for ClaimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl FromStr for ClaimType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FIXED" => Ok(ClaimType::Fixed),
            "PERCENTAGE" => Ok(ClaimType::Percentage),
            _ => Err(format!("unknown claim type: {}", s)),
        }
    }
}

/// Claim terms as stored on the vault: `(uint8, uint256, uint256, bytes)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimData {
    pub claim_type: ClaimType,
    pub fixed_amount: BigInt,
    pub percentage: BigInt,
    #[serde(with = "hex_bytes")]
    pub custom_data: Vec<u8>,
}

impl ClaimData {
    /// Every claimer receives the same amount, given in whole units (`"1.5"`)
    pub fn fixed(amount: &str) -> Result<Self, VaultError> {
        let claim = Self {
            claim_type: ClaimType::Fixed,
            fixed_amount: parse_scaled(amount).ok_or(VaultError::InvalidClaim(MSG_INVALID_AMOUNT))?,
            percentage: BigInt::from(0),
            custom_data: Vec::new(),
        };
        claim.validate()?;
        Ok(claim)
    }

    /// Every claimer receives a share of the pool, given in percent (`"12.5"`)
    pub fn percentage(percentage: &str) -> Result<Self, VaultError> {
        let claim = Self {
            claim_type: ClaimType::Percentage,
            fixed_amount: BigInt::from(0),
            percentage: parse_scaled(percentage)
                .ok_or(VaultError::InvalidClaim(MSG_INVALID_PERCENTAGE))?,
            custom_data: Vec::new(),
        };
        claim.validate()?;
        Ok(claim)
    }

    /// Check the scaled amount for the claim type against its bounds
    pub fn validate(&self) -> Result<(), VaultError> {
        let scale = claim_scale();
        let zero = BigInt::from(0);
        match self.claim_type {
            ClaimType::Fixed => {
                let max = BigInt::from(MAX_FIXED_AMOUNT_UNITS) * &scale;
                if self.fixed_amount <= zero || self.fixed_amount > max {
                    return Err(VaultError::InvalidClaim(MSG_INVALID_AMOUNT));
                }
            }
            ClaimType::Percentage => {
                let max = BigInt::from(100) * &scale;
                if self.percentage < zero || self.percentage > max {
                    return Err(VaultError::InvalidClaim(MSG_INVALID_PERCENTAGE));
                }
            }
        }
        Ok(())
    }
}

fn claim_scale() -> BigInt {
    BigInt::from(10).pow(CLAIM_DECIMALS)
}

/// Parse a non-negative decimal into an integer with `CLAIM_DECIMALS` places
fn parse_scaled(value: &str) -> Option<BigInt> {
    let value = value.trim();
    let (whole, frac) = value.split_once('.').unwrap_or((value, ""));
    let decimals = CLAIM_DECIMALS as usize;

    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) || frac.len() > decimals {
        return None;
    }
    format!("{}{:0<width$}", whole, frac, width = decimals).parse().ok()
}

impl Codec for ClaimData {
    const HEAD_WORDS: usize = 4;

    fn encode(&self, ctx: &mut EncodeContext) -> CodecResult<usize> {
        let mut written = ctx.write_uint(8, &BigInt::from(self.claim_type.code()))?;
        written += ctx.write_uint(256, &self.fixed_amount)?;
        written += ctx.write_uint(256, &self.percentage)?;
        written += ctx.write_dynamic(&self.custom_data)?;
        Ok(written)
    }

    fn decode(ctx: &mut DecodeContext) -> CodecResult<Self> {
        let code = ctx.read_uint(8)?;
        let claim_type = code
            .to_u8()
            .and_then(ClaimType::from_code)
            .ok_or_else(|| CodecError::InvalidData(format!("unknown claim type {}", code)))?;

        Ok(Self {
            claim_type,
            fixed_amount: ctx.read_uint(256)?,
            percentage: ctx.read_uint(256)?,
            custom_data: ctx.read_dynamic()?.to_vec(),
        })
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let digits = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(digits).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Rule preparation
// ============================================================================

/// A schema fetched, parsed and encoded for submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRules {
    pub record: SchemaRecord,
    pub rules: Vec<RuleDescriptor>,
    pub encoded: EncodedRules,
}

/// Parse the schema behind `uid` without validating any inputs
pub fn load_rules<R>(registry: &R, uid: &SchemaUid) -> Result<(SchemaRecord, Vec<RuleDescriptor>), VaultError>
where
    R: SchemaRegistry + ?Sized,
{
    let record = registry.get_schema(uid)?;
    let rules = parse_schema(&record.schema);
    debug!("Schema {} parsed into {} rules", uid, rules.len());
    Ok((record, rules))
}

/// Look up a schema, parse it and encode the user's rule inputs
pub fn prepare_vault_rules<R>(
    registry: &R,
    uid: &SchemaUid,
    inputs: &RuleInputs,
) -> Result<PreparedRules, VaultError>
where
    R: SchemaRegistry + ?Sized,
{
    let (record, rules) = load_rules(registry, uid)?;
    let encoded = RuleValidator::new(&rules).encode(inputs)?;
    Ok(PreparedRules {
        record,
        rules,
        encoded,
    })
}

// ============================================================================
// Contract call
// ============================================================================

/// Arguments of the vault contract's `createVault`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVaultParams {
    pub name: String,
    pub description: String,
    pub deposit_start: u64,
    pub deposit_end: u64,
    pub schema_uid: SchemaUid,
    /// Attesters whose attestations count; empty accepts any attester
    pub attesters: Vec<[u8; ADDRESS_LENGTH]>,
    pub operators: Vec<u8>,
    pub thresholds: Vec<Vec<u8>>,
    pub claim: ClaimData,
}

impl CreateVaultParams {
    pub fn new(
        name: &str,
        description: &str,
        deposit_window: (u64, u64),
        prepared: PreparedRules,
        claim: ClaimData,
    ) -> Result<Self, VaultError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(VaultError::MissingName);
        }
        let description = description.trim();
        if description.is_empty() {
            return Err(VaultError::MissingDescription);
        }
        claim.validate()?;

        let (start, end) = deposit_window;
        if start >= end {
            return Err(VaultError::InvalidWindow { start, end });
        }

        let EncodedRules {
            operators,
            thresholds,
        } = prepared.encoded;
        if operators.len() != thresholds.len() || operators.len() != prepared.rules.len() {
            return Err(VaultError::MisalignedRules {
                operators: operators.len(),
                thresholds: thresholds.len(),
            });
        }

        Ok(Self {
            name: name.to_string(),
            description: description.to_string(),
            deposit_start: start,
            deposit_end: end,
            schema_uid: prepared.record.uid,
            attesters: Vec::new(),
            operators,
            thresholds,
            claim,
        })
    }

    /// Restrict the vault to attestations from the given `0x` addresses
    pub fn with_attesters<S: AsRef<str>>(mut self, attesters: &[S]) -> Result<Self, VaultError> {
        self.attesters = attesters
            .iter()
            .map(|attester| {
                let attester = attester.as_ref().trim();
                parse_address(attester).ok_or_else(|| VaultError::InvalidAttester(attester.to_string()))
            })
            .collect::<Result<_, _>>()?;
        Ok(self)
    }
}

/// Submission side of the vault contract
pub trait VaultContract {
    /// Submit a new vault and return its id
    fn create_vault(&self, params: &CreateVaultParams) -> Result<[u8; 32], VaultError>;
}

/// Validate everything locally, then submit
pub fn submit_vault<C>(contract: &C, params: &CreateVaultParams) -> Result<[u8; 32], VaultError>
where
    C: VaultContract + ?Sized,
{
    if params.operators.len() != params.thresholds.len() {
        return Err(VaultError::MisalignedRules {
            operators: params.operators.len(),
            thresholds: params.thresholds.len(),
        });
    }
    params.claim.validate()?;
    params.claim.to_abi()?;

    let id = contract.create_vault(params)?;
    info!(
        "Created vault '{}' with {} rules: 0x{}",
        params.name,
        params.operators.len(),
        hex::encode(id)
    );
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryRegistry;
    use crate::schema::validation::FieldInput;
    use std::cell::RefCell;

    struct RecordingContract {
        calls: RefCell<Vec<CreateVaultParams>>,
    }

    impl VaultContract for RecordingContract {
        fn create_vault(&self, params: &CreateVaultParams) -> Result<[u8; 32], VaultError> {
            self.calls.borrow_mut().push(params.clone());
            Ok([0x01; 32])
        }
    }

    fn registry_with(schema: &str) -> (InMemoryRegistry, SchemaUid) {
        let mut registry = InMemoryRegistry::new();
        let uid = registry.register(schema, [0x22; 20], true).unwrap();
        (registry, uid)
    }

    fn score_inputs(op: &str, value: &str) -> RuleInputs {
        let mut inputs = RuleInputs::new();
        inputs.insert("score".to_string(), FieldInput::new(op, value));
        inputs.insert("note".to_string(), FieldInput::skip());
        inputs
    }

    #[test]
    fn test_claim_type_codes() {
        assert_eq!(ClaimType::Fixed.code(), 0);
        assert_eq!(ClaimType::from_code(1), Some(ClaimType::Percentage));
        assert_eq!(ClaimType::from_code(2), None);
        assert_eq!("PERCENTAGE".parse::<ClaimType>(), Ok(ClaimType::Percentage));
        assert!("fixed".parse::<ClaimType>().is_err());
    }

    #[test]
    fn test_claim_data_layout() {
        let claim = ClaimData {
            claim_type: ClaimType::Fixed,
            fixed_amount: BigInt::from(1_000),
            percentage: BigInt::from(0),
            custom_data: vec![0xab, 0xcd],
        };
        let encoded = claim.to_abi().unwrap();

        assert_eq!(encoded.len(), 4 * 32 + 32 + 32);
        assert_eq!(encoded[31], 0);
        assert_eq!(&encoded[62..64], &[0x03, 0xe8]);
        // offset of the bytes tail
        assert_eq!(encoded[127], 0x80);
        assert_eq!(encoded[159], 2);
        assert_eq!(&encoded[160..162], &[0xab, 0xcd]);

        assert_eq!(ClaimData::from_abi(&encoded).unwrap(), claim);
    }

    #[test]
    fn test_claim_data_rejects_unknown_type() {
        let mut encoded = ClaimData::percentage("5").unwrap().to_abi().unwrap();
        encoded[31] = 9;
        assert!(ClaimData::from_abi(&encoded).is_err());
    }

    #[test]
    fn test_prepare_vault_rules() {
        let (registry, uid) = registry_with("uint256 score,string note");
        let prepared = prepare_vault_rules(&registry, &uid, &score_inputs("GE", "100")).unwrap();
        assert_eq!(prepared.rules.len(), 2);
        assert_eq!(prepared.encoded.operators, vec![3, 6]);
        assert!(prepared.encoded.thresholds[1].is_empty());
    }

    #[test]
    fn test_prepare_surfaces_errors() {
        let (registry, uid) = registry_with("uint256 score,string note");
        let err = prepare_vault_rules(&registry, &uid, &score_inputs("GE", "-5")).unwrap_err();
        assert!(matches!(err, VaultError::Rules(BatchError::Fields(_))));

        let missing = SchemaUid([0x09; 32]);
        let err = prepare_vault_rules(&registry, &missing, &RuleInputs::new()).unwrap_err();
        assert_eq!(err, VaultError::Registry(RegistryError::NotFound(missing)));

        let (registry, uid) = registry_with("lonely");
        let err = prepare_vault_rules(&registry, &uid, &RuleInputs::new()).unwrap_err();
        assert_eq!(err, VaultError::Rules(BatchError::EmptySchema));
    }

    #[test]
    fn test_submit_vault() {
        let (registry, uid) = registry_with("uint256 score,string note");
        let prepared = prepare_vault_rules(&registry, &uid, &score_inputs("LT", "7")).unwrap();
        let params = CreateVaultParams::new(
            " Builders ",
            "for builders",
            (1_700_000_000, 1_700_086_400),
            prepared,
            ClaimData::percentage("10").unwrap(),
        )
        .unwrap();
        assert_eq!(params.name, "Builders");
        assert_eq!(params.schema_uid, uid);

        let contract = RecordingContract {
            calls: RefCell::new(Vec::new()),
        };
        assert_eq!(submit_vault(&contract, &params).unwrap(), [0x01; 32]);
        assert_eq!(contract.calls.borrow()[0].operators, vec![4, 6]);
    }

    #[test]
    fn test_params_validation() {
        let (registry, uid) = registry_with("uint256 score,string note");
        let prepared = prepare_vault_rules(&registry, &uid, &score_inputs("EQ", "1")).unwrap();

        let claim = ClaimData::fixed("1").unwrap();

        let err = CreateVaultParams::new("v", "d", (10, 10), prepared.clone(), claim.clone())
            .unwrap_err();
        assert_eq!(err, VaultError::InvalidWindow { start: 10, end: 10 });

        let err = CreateVaultParams::new("  ", "d", (1, 2), prepared.clone(), claim.clone())
            .unwrap_err();
        assert_eq!(err, VaultError::MissingName);

        let err = CreateVaultParams::new("v", "  ", (1, 2), prepared.clone(), claim).unwrap_err();
        assert_eq!(err, VaultError::MissingDescription);

        let mut oversized = ClaimData::percentage("100").unwrap();
        oversized.percentage += BigInt::from(1);
        let err = CreateVaultParams::new("v", "d", (1, 2), prepared, oversized).unwrap_err();
        assert_eq!(err, VaultError::InvalidClaim(MSG_INVALID_PERCENTAGE));
    }

    #[test]
    fn test_claim_amounts_scaled() {
        let claim = ClaimData::fixed("1.5").unwrap();
        assert_eq!(claim.fixed_amount, BigInt::from(15) * BigInt::from(10).pow(17));
        assert_eq!(claim.percentage, BigInt::from(0));

        let claim = ClaimData::percentage("12.25").unwrap();
        assert_eq!(claim.percentage, BigInt::from(1225) * BigInt::from(10).pow(16));

        assert_eq!(ClaimData::percentage("0").unwrap().percentage, BigInt::from(0));
        assert!(ClaimData::fixed(&u64::MAX.to_string()).is_ok());
    }

    #[test]
    fn test_claim_bounds() {
        let amount = Err(VaultError::InvalidClaim(MSG_INVALID_AMOUNT));
        assert_eq!(ClaimData::fixed("0"), amount);
        assert_eq!(ClaimData::fixed("-1"), amount);
        assert_eq!(ClaimData::fixed(""), amount);
        assert_eq!(ClaimData::fixed("."), amount);
        assert_eq!(ClaimData::fixed("1e3"), amount);
        assert_eq!(ClaimData::fixed("18446744073709551616"), amount);
        assert_eq!(ClaimData::fixed("0.0000000000000000001"), amount);

        let percentage = Err(VaultError::InvalidClaim(MSG_INVALID_PERCENTAGE));
        assert_eq!(ClaimData::percentage("500"), percentage);
        assert_eq!(ClaimData::percentage("100.01"), percentage);
        assert_eq!(ClaimData::percentage("ten"), percentage);
    }

    #[test]
    fn test_attesters() {
        let (registry, uid) = registry_with("uint256 score,string note");
        let prepared = prepare_vault_rules(&registry, &uid, &score_inputs("GT", "0")).unwrap();
        let params =
            CreateVaultParams::new("v", "d", (1, 2), prepared, ClaimData::fixed("2").unwrap())
                .unwrap();
        assert!(params.attesters.is_empty());

        let params = params
            .clone()
            .with_attesters(&[
                " 0x1111111111111111111111111111111111111111",
                "0xABABABABABABABABABABABABABABABABABABABAB",
            ])
            .unwrap();
        assert_eq!(params.attesters, vec![[0x11; 20], [0xab; 20]]);

        let err = params.with_attesters(&["0x1234"]).unwrap_err();
        assert_eq!(err, VaultError::InvalidAttester("0x1234".to_string()));
    }
}

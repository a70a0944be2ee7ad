//! Attestation schema registry access.
//!
//! Schemas are content-addressed: a schema UID is the Keccak-256 hash of the
//! packed `(schema, resolver, revocable)` record. The registry itself is an
//! external service reached through the [`SchemaRegistry`] trait; handles are
//! shared through an explicit [`RegistryCache`] rather than a global.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::schema::codec::{parse_address, ADDRESS_LENGTH};

/// Errors from registry lookups
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("invalid schema uid: {0}")]
    InvalidUid(String),

    #[error("the validation schema is not found: {0}")]
    NotFound(SchemaUid),

    #[error("schema already registered: {0}")]
    AlreadyRegistered(SchemaUid),

    #[error("invalid registry address: {0}")]
    InvalidAddress(String),

    #[error("failed to load schema registry: {0}")]
    Connection(String),
}

/// A content-addressed schema identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SchemaUid(pub [u8; 32]);

impl SchemaUid {
    /// Derive the UID of a schema record
    pub fn compute(schema: &str, resolver: &[u8; ADDRESS_LENGTH], revocable: bool) -> Self {
        let mut hasher = Keccak256::new();
        hasher.update(schema.as_bytes());
        hasher.update(resolver);
        hasher.update([revocable as u8]);
        Self(hasher.finalize().into())
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to `0x` hex string
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse from a `0x`-prefixed 64-digit hex string
    pub fn from_hex(s: &str) -> Result<Self, RegistryError> {
        let invalid = || RegistryError::InvalidUid(s.to_string());
        let digits = s.trim().strip_prefix("0x").ok_or_else(invalid)?;
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| invalid())?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for SchemaUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for SchemaUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchemaUid({}...)", &self.to_hex()[..10])
    }
}

impl FromStr for SchemaUid {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<SchemaUid> for String {
    fn from(uid: SchemaUid) -> Self {
        uid.to_hex()
    }
}

impl TryFrom<String> for SchemaUid {
    type Error = RegistryError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

/// A registered schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRecord {
    pub uid: SchemaUid,
    /// Declaration string, e.g. `"uint256 score,address wallet"`
    pub schema: String,
    pub resolver: [u8; ADDRESS_LENGTH],
    pub revocable: bool,
}

/// Lookup side of an attestation schema registry
pub trait SchemaRegistry {
    fn get_schema(&self, uid: &SchemaUid) -> Result<SchemaRecord, RegistryError>;
}

impl<R: SchemaRegistry + ?Sized> SchemaRegistry for Arc<R> {
    fn get_schema(&self, uid: &SchemaUid) -> Result<SchemaRecord, RegistryError> {
        (**self).get_schema(uid)
    }
}

/// Registry held in memory, for tests and offline tooling
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    records: HashMap<SchemaUid, SchemaRecord>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema and return its UID
    pub fn register(
        &mut self,
        schema: &str,
        resolver: [u8; ADDRESS_LENGTH],
        revocable: bool,
    ) -> Result<SchemaUid, RegistryError> {
        let uid = SchemaUid::compute(schema, &resolver, revocable);
        if self.records.contains_key(&uid) {
            return Err(RegistryError::AlreadyRegistered(uid));
        }

        self.records.insert(
            uid,
            SchemaRecord {
                uid,
                schema: schema.to_string(),
                resolver,
                revocable,
            },
        );
        debug!("Registered schema {} ({})", uid, schema);
        Ok(uid)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SchemaRegistry for InMemoryRegistry {
    fn get_schema(&self, uid: &SchemaUid) -> Result<SchemaRecord, RegistryError> {
        self.records
            .get(uid)
            .cloned()
            .ok_or(RegistryError::NotFound(*uid))
    }
}

/// Registry handles keyed by registry contract address.
///
/// Each address is connected at most once; later requests get the same handle.
pub struct RegistryCache<R> {
    entries: Mutex<HashMap<[u8; ADDRESS_LENGTH], Arc<R>>>,
}

impl<R> RegistryCache<R> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached handle for `address`, creating it with `connect` on first use
    pub fn get_or_create<F>(&self, address: &str, connect: F) -> Result<Arc<R>, RegistryError>
    where
        F: FnOnce(&[u8; ADDRESS_LENGTH]) -> Result<R, RegistryError>,
    {
        let key = parse_address(address.trim())
            .ok_or_else(|| RegistryError::InvalidAddress(address.to_string()))?;

        let mut entries = self.entries.lock();
        if let Some(registry) = entries.get(&key) {
            return Ok(Arc::clone(registry));
        }

        let registry = Arc::new(connect(&key)?);
        entries.insert(key, Arc::clone(&registry));
        info!("Connected schema registry at 0x{}", hex::encode(key));
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R> Default for RegistryCache<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for RegistryCache<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCache")
            .field("entries", &self.len())
            .finish()
    }
}

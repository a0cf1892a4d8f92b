// crates/nacre-core/src/lib.rs
//
// nacre-core: Core types, protocol configuration, and crypto primitives
// for the Nacre staking ledger.
//
// This is the leaf crate that all other crates in the workspace depend on.
// It defines the canonical data structures (validators, queued requests,
// accountability events), the error type, and the ed25519/sha2 helpers
// used for registration proofs and deterministic sampling seeds.

pub mod amount;
pub mod config;
pub mod crypto;
pub mod error;
pub mod events;
pub mod fault;
pub mod identity;
pub mod request;
pub mod validator;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use nacre_core::Validator;`

pub use amount::{Amount, ATTO_PER_NTN, FEE_FACTOR_UNIT, RATE_PRECISION, TREASURY_FEE_PRECISION};
pub use config::{AccountabilityConfig, ProtocolConfig};
pub use error::NacreError;
pub use events::LedgerEvent;
pub use fault::{AccountabilityEvent, EventKind, Rule, Severity};
pub use identity::{Address, RegistrationProof};
pub use request::{BondingRequest, PendingCommissionRate, UnbondingRequest};
pub use validator::{Validator, ValidatorState};

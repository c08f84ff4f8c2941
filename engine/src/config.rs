//! # Engine Configuration & Constants
//!
//! Every magic number the vault engine relies on lives here. Deployment
//! targets, version identifiers, and input caps -- if a constant is
//! hardcoded anywhere else in the engine, that's a bug.

/// Engine version string, kept in sync with the crate version.
pub const ENGINE_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Chain Identifiers
// ---------------------------------------------------------------------------

/// Filecoin Calibration testnet -- the only chain with a live PDP verifier
/// deployment today, and therefore the only chain where verifiable vaults
/// can currently pass their liveness gate.
pub const CHAIN_ID_FILECOIN_CALIBRATION: u64 = 314_159;

/// Flow EVM mainnet. Vaults here are always non-verifiable; no verifier
/// is registered and the gate fails closed if one is ever requested.
pub const CHAIN_ID_FLOW_EVM: u64 = 747;

/// Local devnet chain id used by the node binary and the test suites.
pub const CHAIN_ID_DEVNET: u64 = 31_337;

// ---------------------------------------------------------------------------
// Input Caps
// ---------------------------------------------------------------------------

/// Maximum accepted length of a terms CID string.
///
/// The CID is stored verbatim and never interpreted, but an unbounded
/// opaque blob in every vault record is an easy way to bloat the ledger.
/// Real IPFS CIDs are well under 100 characters; 256 leaves headroom for
/// URI prefixes and future CID formats.
pub const MAX_TERMS_CID_LENGTH: usize = 256;

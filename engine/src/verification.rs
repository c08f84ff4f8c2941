//! # Verification Gate
//!
//! Verifiable vaults gate their payouts on an external storage-proof
//! liveness oracle: the funds only move while the content the vault pays
//! for is provably still being stored. The oracle itself (a PDP verifier
//! contract) lives outside the engine; [`ProofVerifier`] is the boundary.
//!
//! The gate resolves which verifier to ask from a per-chain registry.
//! If no verifier is configured for the current chain the gate fails
//! **closed** -- the payout is rejected with `VerificationNotConfigured`
//! rather than silently skipping the check.
//!
//! The one escape hatch is the funder override: a vault created with
//! `funder_can_override = true` lets the funder bypass a dead proof set
//! at payout time. The flag is fixed permanently at creation, so a
//! beneficiary can evaluate that risk before any funding happens.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::address::Address;
use crate::error::VaultError;

// ---------------------------------------------------------------------------
// Verification Terms
// ---------------------------------------------------------------------------

/// Per-vault verification parameters, fixed at creation and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationTerms {
    /// The proof set whose liveness gates this vault's payouts.
    pub proof_set_id: u64,
    /// Whether the funder may bypass a failed liveness check.
    pub funder_can_override: bool,
}

// ---------------------------------------------------------------------------
// Oracle Boundary
// ---------------------------------------------------------------------------

/// The external storage-proof oracle boundary.
///
/// `verifier` is the per-chain verifier address the gate resolved; the
/// implementation queries that contract (or its local stand-in) for the
/// proof set's liveness.
pub trait ProofVerifier {
    /// Returns `true` if the proof set is currently live.
    fn is_live(&self, verifier: &Address, proof_set_id: u64) -> bool;
}

/// A [`ProofVerifier`] backed by an explicit set of live proof set ids.
///
/// Devnet and test stand-in for a real PDP verifier contract.
#[derive(Debug, Clone, Default)]
pub struct StaticProofVerifier {
    live: HashSet<u64>,
}

impl StaticProofVerifier {
    /// Creates a verifier with no live proof sets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a proof set live or dead.
    pub fn set_live(&mut self, proof_set_id: u64, live: bool) {
        if live {
            self.live.insert(proof_set_id);
        } else {
            self.live.remove(&proof_set_id);
        }
    }
}

impl ProofVerifier for StaticProofVerifier {
    fn is_live(&self, _verifier: &Address, proof_set_id: u64) -> bool {
        self.live.contains(&proof_set_id)
    }
}

// ---------------------------------------------------------------------------
// VerificationGate
// ---------------------------------------------------------------------------

/// Per-chain verifier registry plus the payout-time gate logic.
#[derive(Debug, Clone)]
pub struct VerificationGate {
    /// The only account allowed to register verifiers.
    owner: Address,
    /// The chain this deployment runs on.
    chain_id: u64,
    /// Registered verifier contract per chain id.
    verifiers: HashMap<u64, Address>,
}

impl VerificationGate {
    /// Creates a gate with an empty verifier registry.
    pub fn new(owner: Address, chain_id: u64) -> Self {
        Self {
            owner,
            chain_id,
            verifiers: HashMap::new(),
        }
    }

    /// The admin account for this gate.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// The chain id this deployment runs on.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Returns the verifier registered for `chain_id`, if any.
    pub fn verifier_for_chain(&self, chain_id: u64) -> Option<Address> {
        self.verifiers.get(&chain_id).copied()
    }

    /// Registers (or replaces) the verifier contract for a chain.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotTheOwner`] unless `caller` is the gate
    /// owner, and [`VaultError::ZeroAddress`] for a zero verifier.
    pub fn set_verifier_for_chain(
        &mut self,
        caller: &Address,
        chain_id: u64,
        verifier: Address,
    ) -> Result<(), VaultError> {
        if *caller != self.owner {
            return Err(VaultError::NotTheOwner);
        }
        if verifier.is_zero() {
            return Err(VaultError::ZeroAddress);
        }
        tracing::info!(chain_id, %verifier, "verifier registered");
        self.verifiers.insert(chain_id, verifier);
        Ok(())
    }

    /// Requires the proof set to be live on the current chain.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::VerificationNotConfigured`] when no verifier
    /// is registered for the current chain (fail-safe closed), and
    /// [`VaultError::VerificationNotLive`] when the oracle reports the
    /// proof set dead.
    pub fn require_live(
        &self,
        oracle: &dyn ProofVerifier,
        proof_set_id: u64,
    ) -> Result<(), VaultError> {
        let verifier = self
            .verifier_for_chain(self.chain_id)
            .ok_or(VaultError::VerificationNotConfigured {
                chain_id: self.chain_id,
            })?;
        if !oracle.is_live(&verifier, proof_set_id) {
            return Err(VaultError::VerificationNotLive { proof_set_id });
        }
        Ok(())
    }

    /// The payout-path check: enforce liveness unless the funder both
    /// asked to bypass and pre-registered the right to.
    pub fn check_payout(
        &self,
        oracle: &dyn ProofVerifier,
        terms: &VerificationTerms,
        bypass: bool,
    ) -> Result<(), VaultError> {
        if bypass && terms.funder_can_override {
            tracing::warn!(
                proof_set_id = terms.proof_set_id,
                "funder override: skipping liveness check"
            );
            return Ok(());
        }
        self.require_live(oracle, terms.proof_set_id)
    }
}

//! # Vault Error Taxonomy
//!
//! One distinct variant per failure condition, so a calling layer can map
//! each rejection to a precise diagnostic instead of a generic "reverted".
//! Every error in this enum is returned *before* any state change becomes
//! visible: validation, authorization, and state checks reject up front,
//! and a transfer failure rolls the vault record back to its pre-call
//! snapshot before surfacing.

use thiserror::Error;

/// Errors that can occur during vault operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VaultError {
    // -- input validation ---------------------------------------------------
    /// An address argument that must identify a real account was zero.
    #[error("zero address is not a valid account")]
    ZeroAddress,

    /// The deposit amount for a prize-pool vault was zero.
    #[error("vault amount must be greater than zero")]
    ZeroAmount,

    /// A milestone payout schedule contained a zero entry.
    #[error("milestone payout amounts cannot be zero")]
    MilestoneAmountsCannotBeZero,

    /// The milestone payout schedule was empty.
    #[error("milestone vault requires at least one payout")]
    NoMilestonesToPay,

    /// At creation: the release time is not in the future.
    /// At payout: the release time has not been reached yet.
    #[error("release time not met")]
    ReleaseTimeNotMet,

    /// Summing a payout schedule overflowed u64.
    #[error("amount overflow: schedule exceeds u64 range")]
    AmountOverflow,

    /// The terms CID exceeds the storage cap. The CID is opaque to the
    /// engine but still bounded so a single record cannot bloat the ledger.
    #[error("terms CID too long: {length} chars (max {max})")]
    TermsCidTooLong {
        /// Length of the supplied CID string.
        length: usize,
        /// The configured maximum.
        max: usize,
    },

    // -- authorization ------------------------------------------------------
    /// The caller is not the vault's funder.
    #[error("caller is not the funder of this vault")]
    NotTheFunder,

    /// The caller is not the vault's beneficiary.
    #[error("caller is not the beneficiary of this vault")]
    NotTheBeneficiary,

    /// The caller is not the registry owner (admin operations only).
    #[error("caller is not the registry owner")]
    NotTheOwner,

    // -- state --------------------------------------------------------------
    /// No vault exists with the given id.
    #[error("vault {0} does not exist")]
    VaultNotFound(u64),

    /// The vault has already paid out everything it ever will.
    #[error("vault is finalized")]
    VaultIsFinalized,

    /// The operation belongs to a different payout policy than the one
    /// this vault runs under.
    #[error("operation does not apply to a {actual} vault")]
    WrongVaultType {
        /// The vault's actual policy label.
        actual: String,
    },

    /// A distribution's recipient and amount arrays differ in length.
    #[error("recipients and amounts arrays must have equal length")]
    MismatchedPayoutArrays,

    /// A distribution's amounts do not sum to the exact remaining balance.
    #[error("incorrect total payout: expected {expected}, got {actual}")]
    IncorrectTotalPayout {
        /// The remaining undistributed balance of the vault.
        expected: u64,
        /// The sum of the amounts the caller supplied.
        actual: u64,
    },

    // -- external dependencies ----------------------------------------------
    /// The token ledger refused a transfer. The vault record is unchanged.
    #[error("token transfer failed: {reason}")]
    TransferFailed {
        /// The ledger's own description of the failure.
        reason: String,
    },

    /// The proof set backing a verifiable vault is not live.
    #[error("storage proof set {proof_set_id} is not live")]
    VerificationNotLive {
        /// The proof set that failed the liveness check.
        proof_set_id: u64,
    },

    /// No verifier is configured for the current chain. Verifiable payouts
    /// fail closed rather than skipping the check.
    #[error("no storage proof verifier configured for chain {chain_id}")]
    VerificationNotConfigured {
        /// The chain the deployment is running on.
        chain_id: u64,
    },
}

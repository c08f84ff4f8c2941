//! # Vault Records
//!
//! A [`Vault`] is one escrow record: a single deposit custodied under one
//! payout policy. The record is a shared header (parties, token, liability
//! counters, terms) plus a variant-specific payload in [`VaultKind`], so
//! prize-pool fields never sit meaninglessly on a milestone vault and
//! vice versa.
//!
//! Records are created once, mutated only along their payout lifecycle,
//! and never deleted. `finalized` is terminal and monotonic: once a vault
//! has paid out everything it ever will, no further value can leave it.
//!
//! ```text
//! mod.rs      — the record itself: header, variants, read projection
//! policy.rs   — the two payout state machines (+ the legacy path)
//! registry.rs — the vault table, id counter, indices, orchestration
//! ```

pub mod policy;
pub mod registry;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::verification::VerificationTerms;

// ---------------------------------------------------------------------------
// VaultType / VaultKind
// ---------------------------------------------------------------------------

/// The payout policy a vault runs under. This is the external label used
/// in events and read projections; the variant payload lives in
/// [`VaultKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultType {
    /// Funder-controlled, time-gated, multi-recipient, one-shot.
    PrizePool,
    /// Single fixed beneficiary, sequential partial releases.
    Milestone,
}

impl std::fmt::Display for VaultType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VaultType::PrizePool => write!(f, "PrizePool"),
            VaultType::Milestone => write!(f, "Milestone"),
        }
    }
}

/// Variant-specific payout state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultKind {
    /// Locked until `release_time`, then distributed in one shot by the
    /// funder across any set of recipients.
    PrizePool {
        /// Instant at which distribution becomes possible.
        release_time: DateTime<Utc>,
    },

    /// Released to the beneficiary one milestone at a time, in order.
    Milestone {
        /// The agreed payout for each milestone, in schedule order.
        payouts: Vec<u64>,
        /// Parallel flags: `paid[i]` is true once milestone `i` paid out.
        paid: Vec<bool>,
        /// Index of the next milestone to pay. Strictly nondecreasing;
        /// equals `payouts.len()` once the vault is finalized.
        next_to_pay: usize,
    },
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// One escrow record.
///
/// The liability counters (`total_amount`, `amount_withdrawn`) are the
/// engine's shadow ledger; the external token's accounting stays
/// authoritative for actual balances.
///
/// Maintained invariants:
/// - `amount_withdrawn <= total_amount`, with equality exactly when
///   `finalized`.
/// - `beneficiary` is the zero address iff the vault is a prize pool.
/// - `verification` is fixed at creation and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    /// Sequential id assigned at creation. Never reused.
    pub id: u64,
    /// The account that deposited the funds and controls payouts.
    pub funder: Address,
    /// The fixed recipient for milestone vaults; zero for prize pools.
    pub beneficiary: Address,
    /// The external token the deposit is denominated in.
    pub token: Address,
    /// The full escrowed amount, in token base units.
    pub total_amount: u64,
    /// How much has left the vault so far.
    pub amount_withdrawn: u64,
    /// Content-addressed terms document. Stored verbatim, never parsed.
    pub terms_cid: String,
    /// Terminal flag. Monotonic: false -> true, never back.
    pub finalized: bool,
    /// When the vault was created (environment-supplied timestamp).
    pub created_at: DateTime<Utc>,
    /// Liveness-gating parameters; `None` for non-verifiable vaults.
    pub verification: Option<VerificationTerms>,
    /// Variant-specific payout state.
    pub kind: VaultKind,
}

impl Vault {
    /// Builds a prize-pool record. Validation happens in the registry;
    /// this constructor only assembles the invariant-correct shape
    /// (zero beneficiary, nothing withdrawn, not finalized).
    #[allow(clippy::too_many_arguments)]
    pub fn new_prize_pool(
        id: u64,
        funder: Address,
        token: Address,
        total_amount: u64,
        terms_cid: String,
        verification: Option<VerificationTerms>,
        release_time: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            funder,
            beneficiary: Address::ZERO,
            token,
            total_amount,
            amount_withdrawn: 0,
            terms_cid,
            finalized: false,
            created_at,
            verification,
            kind: VaultKind::PrizePool { release_time },
        }
    }

    /// Builds a milestone record. The caller (registry) has already
    /// validated the schedule: nonempty, all entries nonzero, checked sum.
    #[allow(clippy::too_many_arguments)]
    pub fn new_milestone(
        id: u64,
        funder: Address,
        beneficiary: Address,
        token: Address,
        payouts: Vec<u64>,
        terms_cid: String,
        verification: Option<VerificationTerms>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let total_amount = payouts.iter().sum();
        let paid = vec![false; payouts.len()];
        Self {
            id,
            funder,
            beneficiary,
            token,
            total_amount,
            amount_withdrawn: 0,
            terms_cid,
            finalized: false,
            created_at,
            verification,
            kind: VaultKind::Milestone {
                payouts,
                paid,
                next_to_pay: 0,
            },
        }
    }

    /// The external policy label for this vault.
    pub fn vault_type(&self) -> VaultType {
        match self.kind {
            VaultKind::PrizePool { .. } => VaultType::PrizePool,
            VaultKind::Milestone { .. } => VaultType::Milestone,
        }
    }

    /// The undistributed balance still custodied for this vault.
    pub fn remaining(&self) -> u64 {
        self.total_amount - self.amount_withdrawn
    }

    /// Returns `true` if this vault gates payouts on proof liveness.
    pub fn is_verifiable(&self) -> bool {
        self.verification.is_some()
    }

    /// Full read projection for external consumers.
    pub fn details(&self) -> VaultDetails {
        let (release_time, milestone_payouts, milestones_paid, next_milestone_to_pay) =
            match &self.kind {
                VaultKind::PrizePool { release_time } => (Some(*release_time), vec![], vec![], None),
                VaultKind::Milestone {
                    payouts,
                    paid,
                    next_to_pay,
                } => (None, payouts.clone(), paid.clone(), Some(*next_to_pay)),
            };

        VaultDetails {
            id: self.id,
            funder: self.funder,
            beneficiary: self.beneficiary,
            token: self.token,
            vault_type: self.vault_type(),
            total_amount: self.total_amount,
            amount_withdrawn: self.amount_withdrawn,
            terms_cid: self.terms_cid.clone(),
            finalized: self.finalized,
            created_at: self.created_at,
            is_verifiable: self.is_verifiable(),
            proof_set_id: self.verification.map(|v| v.proof_set_id),
            funder_can_override_verification: self
                .verification
                .map(|v| v.funder_can_override)
                .unwrap_or(false),
            release_time,
            milestone_payouts,
            milestones_paid,
            next_milestone_to_pay,
        }
    }
}

// ---------------------------------------------------------------------------
// VaultDetails
// ---------------------------------------------------------------------------

/// Flattened, serializable projection of a vault record.
///
/// This is what the read surface hands to dashboards and indexers: every
/// field of the record, with variant-specific fields empty or absent
/// where the vault's type does not carry them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultDetails {
    pub id: u64,
    pub funder: Address,
    pub beneficiary: Address,
    pub token: Address,
    pub vault_type: VaultType,
    pub total_amount: u64,
    pub amount_withdrawn: u64,
    pub terms_cid: String,
    pub finalized: bool,
    pub created_at: DateTime<Utc>,
    pub is_verifiable: bool,
    pub proof_set_id: Option<u64>,
    pub funder_can_override_verification: bool,
    pub release_time: Option<DateTime<Utc>>,
    pub milestone_payouts: Vec<u64>,
    pub milestones_paid: Vec<bool>,
    pub next_milestone_to_pay: Option<usize>,
}

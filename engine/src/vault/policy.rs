//! # Payout Policies
//!
//! The two payout state machines, plus the legacy time-locked path. Each
//! policy validates the payout against the vault's variant state, applies
//! the ledger effects to the record, and returns a [`TransferPlan`] for
//! the custody layer to execute.
//!
//! The ordering discipline is checks-effects-interactions: by the time a
//! plan leaves this module, the vault record already reflects the payout
//! (`amount_withdrawn`, `finalized`, milestone bookkeeping). The external
//! transfers happen last, so any callback they trigger observes a vault
//! that cannot re-trigger a second payout from the same state. If a
//! transfer then fails, the registry restores the record from its
//! pre-call snapshot -- commit or abort, nothing in between.
//!
//! Access and time checks run before these functions are called (see
//! [`crate::access`] and the registry); this module owns the variant
//! guards, the exact-sum rule, and the state transitions.

use crate::address::Address;
use crate::error::VaultError;
use crate::vault::{Vault, VaultKind};

// ---------------------------------------------------------------------------
// TransferPlan
// ---------------------------------------------------------------------------

/// One outbound transfer the custody layer must execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    /// Who receives the funds.
    pub recipient: Address,
    /// Amount in token base units.
    pub amount: u64,
}

/// The transfers a policy decided on, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    /// Outbound transfers, executed in order. All must succeed.
    pub transfers: Vec<Transfer>,
    /// Whether this payout finalized the vault (drives `VaultCompleted`).
    pub finalizes: bool,
}

// ---------------------------------------------------------------------------
// PrizePoolPolicy
// ---------------------------------------------------------------------------

/// Multi-recipient, one-shot distribution.
pub struct PrizePoolPolicy;

impl PrizePoolPolicy {
    /// Validates and applies a full distribution of the vault's remaining
    /// balance across `recipients`.
    ///
    /// The amounts must sum to exactly `total_amount - amount_withdrawn`.
    /// On success the vault is finalized before any transfer is issued.
    ///
    /// # Errors
    ///
    /// - [`VaultError::WrongVaultType`] if the vault is not a prize pool.
    /// - [`VaultError::MismatchedPayoutArrays`] on length mismatch.
    /// - [`VaultError::ZeroAddress`] if any recipient is zero.
    /// - [`VaultError::AmountOverflow`] if the amounts overflow u64.
    /// - [`VaultError::IncorrectTotalPayout`] if the sum is not exact.
    ///
    /// All failures leave the vault unchanged.
    pub fn distribute(
        vault: &mut Vault,
        recipients: &[Address],
        amounts: &[u64],
    ) -> Result<TransferPlan, VaultError> {
        if !matches!(vault.kind, VaultKind::PrizePool { .. }) {
            return Err(VaultError::WrongVaultType {
                actual: vault.vault_type().to_string(),
            });
        }
        if recipients.len() != amounts.len() {
            return Err(VaultError::MismatchedPayoutArrays);
        }
        if recipients.iter().any(Address::is_zero) {
            return Err(VaultError::ZeroAddress);
        }

        let sum = amounts
            .iter()
            .try_fold(0u64, |acc, a| acc.checked_add(*a))
            .ok_or(VaultError::AmountOverflow)?;
        let remaining = vault.remaining();
        if sum != remaining {
            return Err(VaultError::IncorrectTotalPayout {
                expected: remaining,
                actual: sum,
            });
        }

        // Effects before interactions.
        vault.amount_withdrawn = vault.total_amount;
        vault.finalized = true;

        let transfers = recipients
            .iter()
            .zip(amounts)
            .map(|(recipient, amount)| Transfer {
                recipient: *recipient,
                amount: *amount,
            })
            .collect();

        Ok(TransferPlan {
            transfers,
            finalizes: true,
        })
    }
}

// ---------------------------------------------------------------------------
// MilestonePolicy
// ---------------------------------------------------------------------------

/// Sequential partial release to a single fixed beneficiary.
pub struct MilestonePolicy;

impl MilestonePolicy {
    /// Validates and applies the release of the next unpaid milestone.
    ///
    /// # Errors
    ///
    /// - [`VaultError::WrongVaultType`] if the vault is not a milestone
    ///   vault.
    /// - [`VaultError::VaultIsFinalized`] once every milestone has paid.
    /// - [`VaultError::AmountOverflow`] if the withdrawal counter would
    ///   overflow (unreachable while the creation-time sum invariant
    ///   holds).
    pub fn release_next(vault: &mut Vault) -> Result<TransferPlan, VaultError> {
        let beneficiary = vault.beneficiary;
        let total = vault.amount_withdrawn;
        let label = vault.vault_type().to_string();

        let VaultKind::Milestone {
            payouts,
            paid,
            next_to_pay,
        } = &mut vault.kind
        else {
            return Err(VaultError::WrongVaultType { actual: label });
        };

        let index = *next_to_pay;
        if index >= payouts.len() {
            return Err(VaultError::VaultIsFinalized);
        }
        let amount = payouts[index];
        let withdrawn = total
            .checked_add(amount)
            .ok_or(VaultError::AmountOverflow)?;

        // Effects before interactions.
        paid[index] = true;
        *next_to_pay = index + 1;
        let finalizes = *next_to_pay == payouts.len();

        vault.amount_withdrawn = withdrawn;
        if finalizes {
            vault.finalized = true;
        }

        Ok(TransferPlan {
            transfers: vec![Transfer {
                recipient: beneficiary,
                amount,
            }],
            finalizes,
        })
    }
}

// ---------------------------------------------------------------------------
// Legacy Time-Locked Release
// ---------------------------------------------------------------------------

/// Applies the legacy single-recipient time-locked release: the full
/// remaining balance to the vault's beneficiary, finalizing the vault.
///
/// This is the historical state machine that predates prize pools.
/// Current prize-pool vaults carry the zero beneficiary, so the
/// beneficiary gate upstream makes this path unreachable for them;
/// it remains first-class for records from older deployments.
///
/// # Errors
///
/// Returns [`VaultError::WrongVaultType`] for milestone vaults -- their
/// schedule is released through [`MilestonePolicy`] only.
pub fn release_time_locked(vault: &mut Vault) -> Result<TransferPlan, VaultError> {
    if !matches!(vault.kind, VaultKind::PrizePool { .. }) {
        return Err(VaultError::WrongVaultType {
            actual: vault.vault_type().to_string(),
        });
    }

    let amount = vault.remaining();

    // Effects before interactions.
    vault.amount_withdrawn = vault.total_amount;
    vault.finalized = true;

    Ok(TransferPlan {
        transfers: vec![Transfer {
            recipient: vault.beneficiary,
            amount,
        }],
        finalizes: true,
    })
}

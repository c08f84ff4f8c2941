//! # Access Control Guard
//!
//! Stateless per-call authorization and state predicates. Each check
//! fails with its own distinct [`VaultError`] variant rather than a
//! generic rejection, so the calling layer can tell "wrong account"
//! apart from "right account, wrong time".
//!
//! These functions never mutate anything. They read the vault record and
//! the call context and either pass or name the exact reason they don't.

use chrono::{DateTime, Utc};

use crate::address::Address;
use crate::error::VaultError;
use crate::vault::Vault;

/// Fails with [`VaultError::NotTheFunder`] unless `caller` funded the vault.
pub fn require_funder(vault: &Vault, caller: &Address) -> Result<(), VaultError> {
    if vault.funder != *caller {
        return Err(VaultError::NotTheFunder);
    }
    Ok(())
}

/// Fails with [`VaultError::NotTheBeneficiary`] unless `caller` is the
/// vault's beneficiary.
///
/// Prize-pool vaults carry the zero beneficiary, and the zero address can
/// never be a caller, so this check is unsatisfiable for them.
pub fn require_beneficiary(vault: &Vault, caller: &Address) -> Result<(), VaultError> {
    if vault.beneficiary != *caller {
        return Err(VaultError::NotTheBeneficiary);
    }
    Ok(())
}

/// Fails with [`VaultError::VaultIsFinalized`] if the vault is terminal.
pub fn require_not_finalized(vault: &Vault) -> Result<(), VaultError> {
    if vault.finalized {
        return Err(VaultError::VaultIsFinalized);
    }
    Ok(())
}

/// Fails with [`VaultError::ReleaseTimeNotMet`] if `now` is before
/// `release_time`. Equality passes: funds unlock at the release instant.
pub fn require_time_reached(
    now: DateTime<Utc>,
    release_time: DateTime<Utc>,
) -> Result<(), VaultError> {
    if now < release_time {
        return Err(VaultError::ReleaseTimeNotMet);
    }
    Ok(())
}

//! # Token Boundary & Custody
//!
//! The engine never tracks raw token balances itself -- the external
//! token's own accounting is authoritative. What the engine keeps is a
//! shadow liability ledger (`total_amount` / `amount_withdrawn` per
//! vault), and the required consistency property is that the sum of all
//! outstanding vault liabilities never exceeds the token balance actually
//! held by the custody account.
//!
//! [`TokenLedger`] is the capability set the engine requires of any
//! token: `balance_of`, `transfer`, `transfer_from`. Amounts are raw
//! integers in the token's own smallest unit; the engine performs no
//! decimal conversion.
//!
//! [`TokenCustody`] wraps the two transfer directions the engine uses:
//! `deposit` pulls the full amount from the funder at vault creation
//! (requires prior approval, as with any `transferFrom`), and `payout`
//! pushes value out to a recipient. Both are all-or-nothing: any ledger
//! failure surfaces as [`VaultError::TransferFailed`] with no partial
//! movement.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::address::Address;
use crate::error::VaultError;

// ---------------------------------------------------------------------------
// Ledger Boundary
// ---------------------------------------------------------------------------

/// Errors a token ledger can report. Carried verbatim into
/// [`VaultError::TransferFailed`] so callers see the token's own reason.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenLedgerError {
    /// The sender holds less than the transfer amount.
    #[error("insufficient balance: account has {balance}, needs {amount}")]
    InsufficientBalance {
        /// Current balance of the debited account.
        balance: u64,
        /// Amount the transfer required.
        amount: u64,
    },

    /// The spender's allowance does not cover the pull.
    #[error("insufficient allowance: approved {allowance}, needs {amount}")]
    InsufficientAllowance {
        /// Remaining approved amount for the spender.
        allowance: u64,
        /// Amount the pull required.
        amount: u64,
    },

    /// Crediting the recipient would overflow u64.
    #[error("balance overflow crediting recipient")]
    Overflow,
}

/// The capability set the engine requires of an external token.
///
/// Mirrors the ERC-20 surface the engine actually touches. A transfer
/// either moves the full amount or returns an error and moves nothing.
pub trait TokenLedger {
    /// Returns the balance of `account` in the token's smallest unit.
    fn balance_of(&self, account: &Address) -> u64;

    /// Moves `amount` from `from` to `to`.
    fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), TokenLedgerError>;

    /// Moves `amount` from `owner` to `to`, spending `spender`'s
    /// allowance. Requires a prior approval by `owner`.
    fn transfer_from(
        &mut self,
        spender: &Address,
        owner: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), TokenLedgerError>;
}

// ---------------------------------------------------------------------------
// TokenCustody
// ---------------------------------------------------------------------------

/// Executes deposits into and payouts out of the custody account.
///
/// The custody address is the registry's own account on the external
/// token -- the place escrowed value sits between creation and payout.
#[derive(Debug, Clone, Copy)]
pub struct TokenCustody {
    custody: Address,
}

impl TokenCustody {
    /// Creates a custody executor for the given custody account.
    pub fn new(custody: Address) -> Self {
        Self { custody }
    }

    /// The custody account address.
    pub fn address(&self) -> Address {
        self.custody
    }

    /// Pulls `amount` from `payer` into custody via `transfer_from`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::TransferFailed`] if the ledger rejects the
    /// pull (no approval, insufficient balance). No partial deposit.
    pub fn deposit(
        &self,
        ledger: &mut dyn TokenLedger,
        payer: &Address,
        amount: u64,
    ) -> Result<(), VaultError> {
        ledger
            .transfer_from(&self.custody, payer, &self.custody, amount)
            .map_err(|e| VaultError::TransferFailed {
                reason: e.to_string(),
            })
    }

    /// Pushes `amount` from custody to `recipient`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::TransferFailed`] if the ledger rejects the
    /// transfer. No partial payout.
    pub fn payout(
        &self,
        ledger: &mut dyn TokenLedger,
        recipient: &Address,
        amount: u64,
    ) -> Result<(), VaultError> {
        ledger
            .transfer(&self.custody, recipient, amount)
            .map_err(|e| VaultError::TransferFailed {
                reason: e.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// InMemoryToken
// ---------------------------------------------------------------------------

/// An ERC-20-equivalent ledger held in memory.
///
/// This is the devnet and test collaborator: same failure modes as a real
/// token (balance checks, allowance-gated pulls, overflow checks), no
/// chain underneath. The node binary keeps one per token address.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryToken {
    balances: HashMap<Address, u64>,
    /// Allowances keyed by `(owner, spender)`.
    allowances: HashMap<(Address, Address), u64>,
}

impl InMemoryToken {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits `amount` to `account` out of thin air. Devnet faucet.
    pub fn mint(&mut self, account: &Address, amount: u64) -> Result<(), TokenLedgerError> {
        let balance = self.balances.entry(*account).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or(TokenLedgerError::Overflow)?;
        Ok(())
    }

    /// Sets `spender`'s allowance over `owner`'s funds to exactly `amount`.
    pub fn approve(&mut self, owner: &Address, spender: &Address, amount: u64) {
        self.allowances.insert((*owner, *spender), amount);
    }

    /// Returns the remaining allowance of `spender` over `owner`'s funds.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> u64 {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    fn move_balance(
        &mut self,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), TokenLedgerError> {
        let from_balance = self.balances.get(from).copied().unwrap_or(0);
        if from_balance < amount {
            return Err(TokenLedgerError::InsufficientBalance {
                balance: from_balance,
                amount,
            });
        }
        let to_balance = self.balances.get(to).copied().unwrap_or(0);
        let credited = to_balance
            .checked_add(amount)
            .ok_or(TokenLedgerError::Overflow)?;

        self.balances.insert(*from, from_balance - amount);
        self.balances.insert(*to, credited);
        Ok(())
    }
}

impl TokenLedger for InMemoryToken {
    fn balance_of(&self, account: &Address) -> u64 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), TokenLedgerError> {
        self.move_balance(from, to, amount)
    }

    fn transfer_from(
        &mut self,
        spender: &Address,
        owner: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), TokenLedgerError> {
        let allowance = self.allowance(owner, spender);
        if allowance < amount {
            return Err(TokenLedgerError::InsufficientAllowance { allowance, amount });
        }
        self.move_balance(owner, to, amount)?;
        self.allowances.insert((*owner, *spender), allowance - amount);
        Ok(())
    }
}

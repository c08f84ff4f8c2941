//! # Vault Registry
//!
//! The registry owns the vault table, the id counter, and the per-user
//! secondary indices, and composes every other component on mutating
//! calls:
//!
//! ```text
//! call -> access guards -> verification gate -> policy (plan + effects)
//!      -> token custody (transfers) -> commit -> events
//! ```
//!
//! One registry instance is one deployment. It is explicitly constructed
//! (`next id = 0`, empty tables) and passed by reference to everything
//! that needs it -- there is no process-global instance.
//!
//! External collaborators arrive as call arguments: the token ledger the
//! vault's token resolves to, the storage-proof oracle, the caller's
//! address, and the transaction timestamp `now` supplied by the
//! embedding environment. The engine itself never reads a clock and
//! never does I/O, which is what keeps every operation deterministic and
//! the whole call commit-or-abort.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::access;
use crate::address::Address;
use crate::config::MAX_TERMS_CID_LENGTH;
use crate::error::VaultError;
use crate::events::{EventEmitter, VaultEvent};
use crate::token::{TokenCustody, TokenLedger};
use crate::vault::policy::{self, MilestonePolicy, PrizePoolPolicy, TransferPlan};
use crate::vault::{Vault, VaultDetails, VaultKind};
use crate::verification::{ProofVerifier, VerificationGate, VerificationTerms};

/// The escrow ledger for one deployment.
pub struct VaultRegistry {
    custody: TokenCustody,
    gate: VerificationGate,
    events: EventEmitter,
    /// All vaults ever created, indexed by id. Append-only.
    vaults: Vec<Vault>,
    /// Vault ids per funder, in creation order. Written at creation only.
    funder_index: HashMap<Address, Vec<u64>>,
    /// Vault ids per beneficiary, in creation order. Written at creation
    /// only, and only for nonzero beneficiaries.
    beneficiary_index: HashMap<Address, Vec<u64>>,
}

impl VaultRegistry {
    /// Creates an empty registry.
    ///
    /// `custody_address` is the registry's own account on the external
    /// tokens; `owner` administers the verification gate; `chain_id`
    /// selects which registered verifier gates verifiable payouts.
    pub fn new(custody_address: Address, chain_id: u64, owner: Address) -> Self {
        Self {
            custody: TokenCustody::new(custody_address),
            gate: VerificationGate::new(owner, chain_id),
            events: EventEmitter::new(),
            vaults: Vec::new(),
            funder_index: HashMap::new(),
            beneficiary_index: HashMap::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Creates a prize-pool vault, pulling `amount` from the caller.
    ///
    /// The caller must have approved the custody account for at least
    /// `amount` on the token beforehand.
    ///
    /// # Errors
    ///
    /// [`VaultError::ZeroAddress`], [`VaultError::ZeroAmount`],
    /// [`VaultError::ReleaseTimeNotMet`] (release time not in the
    /// future), [`VaultError::TermsCidTooLong`], or
    /// [`VaultError::TransferFailed`] if the deposit pull fails. No state
    /// changes on any failure.
    #[allow(clippy::too_many_arguments)]
    pub fn create_prize_pool_vault(
        &mut self,
        ledger: &mut dyn TokenLedger,
        caller: Address,
        now: DateTime<Utc>,
        token: Address,
        amount: u64,
        release_time: DateTime<Utc>,
        terms_cid: String,
        verification: Option<VerificationTerms>,
    ) -> Result<u64, VaultError> {
        if caller.is_zero() || token.is_zero() {
            return Err(VaultError::ZeroAddress);
        }
        if amount == 0 {
            return Err(VaultError::ZeroAmount);
        }
        if release_time <= now {
            return Err(VaultError::ReleaseTimeNotMet);
        }
        Self::check_terms_cid(&terms_cid)?;

        self.custody.deposit(ledger, &caller, amount)?;

        let id = self.vaults.len() as u64;
        let vault = Vault::new_prize_pool(
            id,
            caller,
            token,
            amount,
            terms_cid,
            verification,
            release_time,
            now,
        );
        self.commit_new_vault(vault);
        Ok(id)
    }

    /// Creates a milestone vault, pulling the schedule total from the
    /// caller.
    ///
    /// # Errors
    ///
    /// [`VaultError::ZeroAddress`], [`VaultError::NoMilestonesToPay`],
    /// [`VaultError::MilestoneAmountsCannotBeZero`],
    /// [`VaultError::AmountOverflow`], [`VaultError::TermsCidTooLong`],
    /// or [`VaultError::TransferFailed`]. No state changes on failure.
    #[allow(clippy::too_many_arguments)]
    pub fn create_milestone_vault(
        &mut self,
        ledger: &mut dyn TokenLedger,
        caller: Address,
        now: DateTime<Utc>,
        beneficiary: Address,
        token: Address,
        payouts: Vec<u64>,
        terms_cid: String,
        verification: Option<VerificationTerms>,
    ) -> Result<u64, VaultError> {
        if caller.is_zero() || beneficiary.is_zero() || token.is_zero() {
            return Err(VaultError::ZeroAddress);
        }
        if payouts.is_empty() {
            return Err(VaultError::NoMilestonesToPay);
        }
        if payouts.contains(&0) {
            return Err(VaultError::MilestoneAmountsCannotBeZero);
        }
        let total = payouts
            .iter()
            .try_fold(0u64, |acc, p| acc.checked_add(*p))
            .ok_or(VaultError::AmountOverflow)?;
        Self::check_terms_cid(&terms_cid)?;

        self.custody.deposit(ledger, &caller, total)?;

        let id = self.vaults.len() as u64;
        let vault = Vault::new_milestone(
            id,
            caller,
            beneficiary,
            token,
            payouts,
            terms_cid,
            verification,
            now,
        );
        self.commit_new_vault(vault);
        Ok(id)
    }

    /// Appends the vault, updates the indices, and emits `VaultCreated`.
    fn commit_new_vault(&mut self, vault: Vault) {
        self.funder_index
            .entry(vault.funder)
            .or_default()
            .push(vault.id);
        if !vault.beneficiary.is_zero() {
            self.beneficiary_index
                .entry(vault.beneficiary)
                .or_default()
                .push(vault.id);
        }
        self.events.emit(VaultEvent::VaultCreated {
            vault_id: vault.id,
            funder: vault.funder,
            beneficiary: vault.beneficiary,
            vault_type: vault.vault_type(),
            total_amount: vault.total_amount,
        });
        self.vaults.push(vault);
    }

    // -----------------------------------------------------------------------
    // Payouts
    // -----------------------------------------------------------------------

    /// Distributes a prize pool's full remaining balance across
    /// `recipients`, finalizing the vault.
    ///
    /// Only the funder may call, only at or after the release time, and
    /// the amounts must sum to exactly the remaining balance. Verifiable
    /// vaults additionally require the proof set to be live, unless the
    /// funder both set `bypass` and pre-registered the override at
    /// creation.
    #[allow(clippy::too_many_arguments)]
    pub fn distribute_prize_pool(
        &mut self,
        ledger: &mut dyn TokenLedger,
        oracle: &dyn ProofVerifier,
        caller: Address,
        now: DateTime<Utc>,
        id: u64,
        recipients: &[Address],
        amounts: &[u64],
        bypass: bool,
    ) -> Result<(), VaultError> {
        let vault = self.vault(id)?;
        access::require_funder(vault, &caller)?;
        access::require_not_finalized(vault)?;
        let release_time = match vault.kind {
            VaultKind::PrizePool { release_time } => release_time,
            _ => {
                return Err(VaultError::WrongVaultType {
                    actual: vault.vault_type().to_string(),
                })
            }
        };
        access::require_time_reached(now, release_time)?;
        if let Some(terms) = vault.verification {
            self.gate.check_payout(oracle, &terms, bypass)?;
        }

        let snapshot = vault.clone();
        let plan = PrizePoolPolicy::distribute(&mut self.vaults[id as usize], recipients, amounts)?;
        let distributed: u64 = plan.transfers.iter().map(|t| t.amount).sum();
        self.execute_plan(ledger, id, snapshot, &plan)?;

        self.events.emit(VaultEvent::FundsDistributed {
            vault_id: id,
            total_amount: distributed,
        });
        self.events.emit(VaultEvent::VaultCompleted { vault_id: id });
        Ok(())
    }

    /// Releases the next unpaid milestone to the vault's beneficiary.
    ///
    /// Only the funder may call. The verification gate applies exactly as
    /// in [`Self::distribute_prize_pool`].
    pub fn release_next_milestone(
        &mut self,
        ledger: &mut dyn TokenLedger,
        oracle: &dyn ProofVerifier,
        caller: Address,
        id: u64,
        bypass: bool,
    ) -> Result<(), VaultError> {
        let vault = self.vault(id)?;
        access::require_funder(vault, &caller)?;
        access::require_not_finalized(vault)?;
        if let Some(terms) = vault.verification {
            self.gate.check_payout(oracle, &terms, bypass)?;
        }

        let snapshot = vault.clone();
        let plan = MilestonePolicy::release_next(&mut self.vaults[id as usize])?;
        self.execute_plan(ledger, id, snapshot, &plan)?;

        for transfer in &plan.transfers {
            self.events.emit(VaultEvent::FundsReleased {
                vault_id: id,
                recipient: transfer.recipient,
                amount: transfer.amount,
            });
        }
        if plan.finalizes {
            self.events.emit(VaultEvent::VaultCompleted { vault_id: id });
        }
        Ok(())
    }

    /// Legacy single-recipient time-locked release.
    ///
    /// The historical state machine that predates prize pools: the
    /// beneficiary, and only the beneficiary, pulls the full amount once
    /// the release time passes. Current prize-pool vaults carry the zero
    /// beneficiary, so this path only succeeds for records created by
    /// older deployments; production flows use a single-recipient
    /// distribution instead.
    pub fn release_time_locked_funds(
        &mut self,
        ledger: &mut dyn TokenLedger,
        caller: Address,
        now: DateTime<Utc>,
        id: u64,
    ) -> Result<(), VaultError> {
        let vault = self.vault(id)?;
        access::require_beneficiary(vault, &caller)?;
        access::require_not_finalized(vault)?;
        let release_time = match vault.kind {
            VaultKind::PrizePool { release_time } => release_time,
            _ => {
                return Err(VaultError::WrongVaultType {
                    actual: vault.vault_type().to_string(),
                })
            }
        };
        access::require_time_reached(now, release_time)?;

        let snapshot = vault.clone();
        let plan = policy::release_time_locked(&mut self.vaults[id as usize])?;
        self.execute_plan(ledger, id, snapshot, &plan)?;

        for transfer in &plan.transfers {
            self.events.emit(VaultEvent::FundsReleased {
                vault_id: id,
                recipient: transfer.recipient,
                amount: transfer.amount,
            });
        }
        self.events.emit(VaultEvent::VaultCompleted { vault_id: id });
        Ok(())
    }

    /// Executes a plan's transfers out of custody.
    ///
    /// The whole plan is validated against the ledger before any value
    /// moves, so a plan either executes in full or not at all: a
    /// mid-batch failure would otherwise leave transfers on the token
    /// that the restored vault record no longer accounts for. Any
    /// failure restores the vault from `snapshot` before surfacing.
    fn execute_plan(
        &mut self,
        ledger: &mut dyn TokenLedger,
        id: u64,
        snapshot: Vault,
        plan: &TransferPlan,
    ) -> Result<(), VaultError> {
        if let Err(err) = Self::check_plan_executable(&*ledger, &self.custody, plan) {
            self.vaults[id as usize] = snapshot;
            return Err(err);
        }

        for transfer in &plan.transfers {
            if let Err(err) = self
                .custody
                .payout(ledger, &transfer.recipient, transfer.amount)
            {
                // Unreachable for a ledger that honors its own balance
                // and overflow rules; restore the record regardless.
                self.vaults[id as usize] = snapshot;
                return Err(err);
            }
        }
        Ok(())
    }

    /// Rejects a plan the ledger cannot execute in full: a custody
    /// shortfall, or a recipient balance that would overflow once all
    /// of that recipient's credits in the plan land.
    fn check_plan_executable(
        ledger: &dyn TokenLedger,
        custody: &TokenCustody,
        plan: &TransferPlan,
    ) -> Result<(), VaultError> {
        // The conservation invariant guarantees custody covers the plan;
        // a shortfall means the external token misbehaved.
        let needed: u64 = plan.transfers.iter().map(|t| t.amount).sum();
        let held = ledger.balance_of(&custody.address());
        if held < needed {
            return Err(VaultError::TransferFailed {
                reason: format!("custody holds {held}, plan needs {needed}"),
            });
        }

        // Simulate the credits, accumulating duplicates, so an overflow
        // on a later transfer to the same recipient is caught too.
        let mut credited: HashMap<Address, u64> = HashMap::new();
        for transfer in &plan.transfers {
            let balance = credited
                .entry(transfer.recipient)
                .or_insert_with(|| ledger.balance_of(&transfer.recipient));
            *balance = balance.checked_add(transfer.amount).ok_or_else(|| {
                VaultError::TransferFailed {
                    reason: format!("crediting {} would overflow", transfer.recipient),
                }
            })?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Administration
    // -----------------------------------------------------------------------

    /// Registers the storage-proof verifier contract for a chain.
    /// Owner-only; see [`VerificationGate::set_verifier_for_chain`].
    pub fn set_verifier_for_chain(
        &mut self,
        caller: Address,
        chain_id: u64,
        verifier: Address,
    ) -> Result<(), VaultError> {
        self.gate.set_verifier_for_chain(&caller, chain_id, verifier)
    }

    // -----------------------------------------------------------------------
    // Read Surface
    // -----------------------------------------------------------------------

    /// Returns the vault record for `id`.
    pub fn vault(&self, id: u64) -> Result<&Vault, VaultError> {
        self.vaults
            .get(id as usize)
            .ok_or(VaultError::VaultNotFound(id))
    }

    /// Full read projection of one vault.
    pub fn vault_details(&self, id: u64) -> Result<VaultDetails, VaultError> {
        Ok(self.vault(id)?.details())
    }

    /// Number of vaults ever created (also the next id to be assigned).
    pub fn vault_count(&self) -> u64 {
        self.vaults.len() as u64
    }

    /// Ids of every vault `funder` created, in creation order.
    pub fn vault_ids_funded_by(&self, funder: &Address) -> Vec<u64> {
        self.funder_index.get(funder).cloned().unwrap_or_default()
    }

    /// Ids of every vault naming `beneficiary`, in creation order.
    pub fn vault_ids_as_beneficiary(&self, beneficiary: &Address) -> Vec<u64> {
        self.beneficiary_index
            .get(beneficiary)
            .cloned()
            .unwrap_or_default()
    }

    /// The custody account address funders must approve.
    pub fn custody_address(&self) -> Address {
        self.custody.address()
    }

    /// The verification gate (verifier registry, owner, chain id).
    pub fn gate(&self) -> &VerificationGate {
        &self.gate
    }

    /// The committed event log, in emission order.
    pub fn events(&self) -> &[VaultEvent] {
        self.events.events()
    }

    /// Drains the committed event log for checkpointing indexers.
    pub fn take_events(&mut self) -> Vec<VaultEvent> {
        self.events.take_events()
    }

    fn check_terms_cid(terms_cid: &str) -> Result<(), VaultError> {
        if terms_cid.len() > MAX_TERMS_CID_LENGTH {
            return Err(VaultError::TermsCidTooLong {
                length: terms_cid.len(),
                max: MAX_TERMS_CID_LENGTH,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CHAIN_ID_DEVNET;
    use crate::token::{InMemoryToken, TokenLedgerError};
    use crate::verification::StaticProofVerifier;
    use chrono::Duration;

    fn addr(n: u8) -> Address {
        Address::from_bytes([n; 20])
    }

    const CUSTODY: u8 = 0xCC;
    const OWNER: u8 = 0xAA;
    const FUNDER: u8 = 1;
    const BENEFICIARY: u8 = 2;
    const TOKEN: u8 = 0x70;

    fn registry() -> VaultRegistry {
        VaultRegistry::new(addr(CUSTODY), CHAIN_ID_DEVNET, addr(OWNER))
    }

    /// Token ledger pre-funded and pre-approved for the funder.
    fn funded_token(amount: u64) -> InMemoryToken {
        let mut token = InMemoryToken::new();
        token.mint(&addr(FUNDER), amount).unwrap();
        token.approve(&addr(FUNDER), &addr(CUSTODY), amount);
        token
    }

    fn create_prize_pool(
        registry: &mut VaultRegistry,
        token: &mut InMemoryToken,
        amount: u64,
        now: DateTime<Utc>,
    ) -> u64 {
        registry
            .create_prize_pool_vault(
                token,
                addr(FUNDER),
                now,
                addr(TOKEN),
                amount,
                now + Duration::hours(1),
                "ipfs://terms".into(),
                None,
            )
            .unwrap()
    }

    fn create_milestones(
        registry: &mut VaultRegistry,
        token: &mut InMemoryToken,
        payouts: Vec<u64>,
    ) -> u64 {
        registry
            .create_milestone_vault(
                token,
                addr(FUNDER),
                Utc::now(),
                addr(BENEFICIARY),
                addr(TOKEN),
                payouts,
                "ipfs://terms".into(),
                None,
            )
            .unwrap()
    }

    /// A ledger whose outbound transfers always fail. Deposits are not
    /// exercised through it.
    struct BrokenToken {
        balance: u64,
    }

    impl TokenLedger for BrokenToken {
        fn balance_of(&self, _account: &Address) -> u64 {
            self.balance
        }
        fn transfer(
            &mut self,
            _from: &Address,
            _to: &Address,
            amount: u64,
        ) -> Result<(), TokenLedgerError> {
            Err(TokenLedgerError::InsufficientBalance { balance: 0, amount })
        }
        fn transfer_from(
            &mut self,
            _spender: &Address,
            _owner: &Address,
            _to: &Address,
            amount: u64,
        ) -> Result<(), TokenLedgerError> {
            Err(TokenLedgerError::InsufficientAllowance {
                allowance: 0,
                amount,
            })
        }
    }

    // -- creation -----------------------------------------------------------

    #[test]
    fn create_prize_pool_pulls_deposit_and_indexes() {
        let mut registry = registry();
        let mut token = funded_token(5000);
        let now = Utc::now();

        let id = create_prize_pool(&mut registry, &mut token, 5000, now);
        assert_eq!(id, 0);
        assert_eq!(token.balance_of(&addr(CUSTODY)), 5000);
        assert_eq!(token.balance_of(&addr(FUNDER)), 0);

        let details = registry.vault_details(0).unwrap();
        assert_eq!(details.funder, addr(FUNDER));
        assert!(details.beneficiary.is_zero());
        assert_eq!(details.total_amount, 5000);
        assert_eq!(details.amount_withdrawn, 0);
        assert!(!details.finalized);

        assert_eq!(registry.vault_ids_funded_by(&addr(FUNDER)), vec![0]);
        // Prize pools have no beneficiary, so no beneficiary index entry.
        assert!(registry.vault_ids_as_beneficiary(&addr(FUNDER)).is_empty());
        assert!(matches!(
            registry.events()[0],
            VaultEvent::VaultCreated { vault_id: 0, .. }
        ));
    }

    #[test]
    fn create_rejects_zero_inputs() {
        let mut registry = registry();
        let mut token = funded_token(1000);
        let now = Utc::now();

        let err = registry
            .create_prize_pool_vault(
                &mut token,
                addr(FUNDER),
                now,
                Address::ZERO,
                1000,
                now + Duration::hours(1),
                "cid".into(),
                None,
            )
            .unwrap_err();
        assert_eq!(err, VaultError::ZeroAddress);

        let err = registry
            .create_prize_pool_vault(
                &mut token,
                addr(FUNDER),
                now,
                addr(TOKEN),
                0,
                now + Duration::hours(1),
                "cid".into(),
                None,
            )
            .unwrap_err();
        assert_eq!(err, VaultError::ZeroAmount);

        // Nothing moved, nothing recorded.
        assert_eq!(token.balance_of(&addr(FUNDER)), 1000);
        assert_eq!(registry.vault_count(), 0);
        assert!(registry.events().is_empty());
    }

    #[test]
    fn create_rejects_past_release_time() {
        let mut registry = registry();
        let mut token = funded_token(1000);
        let now = Utc::now();

        // Equal to now is also "not in the future".
        let err = registry
            .create_prize_pool_vault(
                &mut token,
                addr(FUNDER),
                now,
                addr(TOKEN),
                1000,
                now,
                "cid".into(),
                None,
            )
            .unwrap_err();
        assert_eq!(err, VaultError::ReleaseTimeNotMet);
    }

    #[test]
    fn create_rejects_oversized_terms_cid() {
        let mut registry = registry();
        let mut token = funded_token(1000);
        let now = Utc::now();

        let cid = "a".repeat(MAX_TERMS_CID_LENGTH + 1);
        let err = registry
            .create_prize_pool_vault(
                &mut token,
                addr(FUNDER),
                now,
                addr(TOKEN),
                1000,
                now + Duration::hours(1),
                cid,
                None,
            )
            .unwrap_err();
        assert_eq!(
            err,
            VaultError::TermsCidTooLong {
                length: MAX_TERMS_CID_LENGTH + 1,
                max: MAX_TERMS_CID_LENGTH,
            }
        );

        // A cid at the cap passes; the check runs before any funds move.
        assert_eq!(token.balance_of(&addr(FUNDER)), 1000);
        assert_eq!(registry.vault_count(), 0);
        registry
            .create_prize_pool_vault(
                &mut token,
                addr(FUNDER),
                now,
                addr(TOKEN),
                1000,
                now + Duration::hours(1),
                "a".repeat(MAX_TERMS_CID_LENGTH),
                None,
            )
            .unwrap();
    }

    #[test]
    fn create_milestone_validates_schedule() {
        let mut registry = registry();
        let mut token = funded_token(1000);
        let now = Utc::now();

        let err = registry
            .create_milestone_vault(
                &mut token,
                addr(FUNDER),
                now,
                addr(BENEFICIARY),
                addr(TOKEN),
                vec![],
                "cid".into(),
                None,
            )
            .unwrap_err();
        assert_eq!(err, VaultError::NoMilestonesToPay);

        let err = registry
            .create_milestone_vault(
                &mut token,
                addr(FUNDER),
                now,
                addr(BENEFICIARY),
                addr(TOKEN),
                vec![100, 0, 150],
                "cid".into(),
                None,
            )
            .unwrap_err();
        assert_eq!(err, VaultError::MilestoneAmountsCannotBeZero);

        let err = registry
            .create_milestone_vault(
                &mut token,
                addr(FUNDER),
                now,
                addr(BENEFICIARY),
                addr(TOKEN),
                vec![u64::MAX, 1],
                "cid".into(),
                None,
            )
            .unwrap_err();
        assert_eq!(err, VaultError::AmountOverflow);
    }

    #[test]
    fn create_milestone_indexes_both_parties() {
        let mut registry = registry();
        let mut token = funded_token(300);
        let id = create_milestones(&mut registry, &mut token, vec![100, 200]);

        assert_eq!(registry.vault_ids_funded_by(&addr(FUNDER)), vec![id]);
        assert_eq!(
            registry.vault_ids_as_beneficiary(&addr(BENEFICIARY)),
            vec![id]
        );
        assert_eq!(token.balance_of(&addr(CUSTODY)), 300);
    }

    #[test]
    fn create_without_approval_fails_and_commits_nothing() {
        let mut registry = registry();
        let mut token = InMemoryToken::new();
        token.mint(&addr(FUNDER), 1000).unwrap();
        let now = Utc::now();

        let err = registry
            .create_prize_pool_vault(
                &mut token,
                addr(FUNDER),
                now,
                addr(TOKEN),
                1000,
                now + Duration::hours(1),
                "cid".into(),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, VaultError::TransferFailed { .. }));
        assert_eq!(registry.vault_count(), 0);
    }

    #[test]
    fn ids_are_sequential_across_kinds() {
        let mut registry = registry();
        let mut token = funded_token(10_000);
        let now = Utc::now();

        let a = create_prize_pool(&mut registry, &mut token, 5000, now);
        let b = create_milestones(&mut registry, &mut token, vec![100, 200]);
        let c = create_prize_pool(&mut registry, &mut token, 1000, now);

        assert_eq!((a, b, c), (0, 1, 2));
        assert_eq!(registry.vault_count(), 3);
        assert_eq!(registry.vault_ids_funded_by(&addr(FUNDER)), vec![0, 1, 2]);
    }

    #[test]
    fn reads_on_unknown_id_fail() {
        let registry = registry();
        assert_eq!(registry.vault_details(0).unwrap_err(), VaultError::VaultNotFound(0));
    }

    // -- distribution -------------------------------------------------------

    #[test]
    fn distribute_requires_funder_and_time() {
        let mut registry = registry();
        let mut token = funded_token(5000);
        let oracle = StaticProofVerifier::new();
        let now = Utc::now();
        let id = create_prize_pool(&mut registry, &mut token, 5000, now);

        let err = registry
            .distribute_prize_pool(
                &mut token,
                &oracle,
                addr(9),
                now + Duration::hours(2),
                id,
                &[addr(3)],
                &[5000],
                false,
            )
            .unwrap_err();
        assert_eq!(err, VaultError::NotTheFunder);

        let err = registry
            .distribute_prize_pool(
                &mut token,
                &oracle,
                addr(FUNDER),
                now + Duration::minutes(30),
                id,
                &[addr(3)],
                &[5000],
                false,
            )
            .unwrap_err();
        assert_eq!(err, VaultError::ReleaseTimeNotMet);
    }

    #[test]
    fn distribute_pays_recipients_and_finalizes() {
        let mut registry = registry();
        let mut token = funded_token(5000);
        let oracle = StaticProofVerifier::new();
        let now = Utc::now();
        let id = create_prize_pool(&mut registry, &mut token, 5000, now);

        registry
            .distribute_prize_pool(
                &mut token,
                &oracle,
                addr(FUNDER),
                now + Duration::hours(1),
                id,
                &[addr(3), addr(4)],
                &[2000, 3000],
                false,
            )
            .unwrap();

        assert_eq!(token.balance_of(&addr(3)), 2000);
        assert_eq!(token.balance_of(&addr(4)), 3000);
        assert_eq!(token.balance_of(&addr(CUSTODY)), 0);

        let details = registry.vault_details(id).unwrap();
        assert!(details.finalized);
        assert_eq!(details.amount_withdrawn, 5000);

        let events = registry.events();
        assert!(matches!(
            events[events.len() - 2],
            VaultEvent::FundsDistributed {
                vault_id: 0,
                total_amount: 5000
            }
        ));
        assert!(matches!(
            events[events.len() - 1],
            VaultEvent::VaultCompleted { vault_id: 0 }
        ));

        // One-shot: a second distribution fails.
        let err = registry
            .distribute_prize_pool(
                &mut token,
                &oracle,
                addr(FUNDER),
                now + Duration::hours(1),
                id,
                &[addr(3)],
                &[0],
                false,
            )
            .unwrap_err();
        assert_eq!(err, VaultError::VaultIsFinalized);
    }

    #[test]
    fn distribute_transfer_failure_rolls_back() {
        let mut registry = registry();
        let mut token = funded_token(5000);
        let now = Utc::now();
        let oracle = StaticProofVerifier::new();
        let id = create_prize_pool(&mut registry, &mut token, 5000, now);

        let before = registry.vault(id).unwrap().clone();
        let events_before = registry.events().len();

        // Same liabilities, but the token refuses the payout.
        let mut broken = BrokenToken { balance: 5000 };
        let err = registry
            .distribute_prize_pool(
                &mut broken,
                &oracle,
                addr(FUNDER),
                now + Duration::hours(1),
                id,
                &[addr(3)],
                &[5000],
                false,
            )
            .unwrap_err();

        assert!(matches!(err, VaultError::TransferFailed { .. }));
        assert_eq!(registry.vault(id).unwrap(), &before);
        assert_eq!(registry.events().len(), events_before);
    }

    #[test]
    fn distribute_aborts_on_custody_shortfall() {
        let mut registry = registry();
        let mut token = funded_token(5000);
        let now = Utc::now();
        let oracle = StaticProofVerifier::new();
        let id = create_prize_pool(&mut registry, &mut token, 5000, now);

        let mut broken = BrokenToken { balance: 4999 };
        let err = registry
            .distribute_prize_pool(
                &mut broken,
                &oracle,
                addr(FUNDER),
                now + Duration::hours(1),
                id,
                &[addr(3)],
                &[5000],
                false,
            )
            .unwrap_err();
        assert!(matches!(err, VaultError::TransferFailed { .. }));
        assert!(!registry.vault(id).unwrap().finalized);
    }

    #[test]
    fn distribute_recipient_overflow_aborts_before_any_transfer() {
        let mut registry = registry();
        let mut token = funded_token(5000);
        let now = Utc::now();
        let oracle = StaticProofVerifier::new();
        let id = create_prize_pool(&mut registry, &mut token, 5000, now);

        // The second recipient already sits at the ceiling, so crediting
        // it would overflow. The first leg must not execute either.
        token.mint(&addr(4), u64::MAX).unwrap();

        let before = registry.vault(id).unwrap().clone();
        let events_before = registry.events().len();
        let err = registry
            .distribute_prize_pool(
                &mut token,
                &oracle,
                addr(FUNDER),
                now + Duration::hours(1),
                id,
                &[addr(3), addr(4)],
                &[2000, 3000],
                false,
            )
            .unwrap_err();

        assert!(matches!(err, VaultError::TransferFailed { .. }));
        assert_eq!(token.balance_of(&addr(3)), 0);
        assert_eq!(token.balance_of(&addr(4)), u64::MAX);
        assert_eq!(token.balance_of(&addr(CUSTODY)), 5000);
        assert_eq!(registry.vault(id).unwrap(), &before);
        assert_eq!(registry.events().len(), events_before);
    }

    #[test]
    fn distribute_overflow_check_accumulates_repeat_recipients() {
        let mut registry = registry();
        let mut token = funded_token(5000);
        let now = Utc::now();
        let oracle = StaticProofVerifier::new();
        let id = create_prize_pool(&mut registry, &mut token, 5000, now);

        // Each credit fits on its own; their sum does not.
        token.mint(&addr(3), u64::MAX - 4000).unwrap();

        let err = registry
            .distribute_prize_pool(
                &mut token,
                &oracle,
                addr(FUNDER),
                now + Duration::hours(1),
                id,
                &[addr(3), addr(3)],
                &[2000, 3000],
                false,
            )
            .unwrap_err();

        assert!(matches!(err, VaultError::TransferFailed { .. }));
        assert_eq!(token.balance_of(&addr(3)), u64::MAX - 4000);
        assert_eq!(token.balance_of(&addr(CUSTODY)), 5000);
        assert!(!registry.vault(id).unwrap().finalized);
    }

    // -- milestones ---------------------------------------------------------

    #[test]
    fn milestones_release_sequentially() {
        let mut registry = registry();
        let mut token = funded_token(300);
        let oracle = StaticProofVerifier::new();
        let id = create_milestones(&mut registry, &mut token, vec![100, 200]);

        registry
            .release_next_milestone(&mut token, &oracle, addr(FUNDER), id, false)
            .unwrap();
        assert_eq!(token.balance_of(&addr(BENEFICIARY)), 100);
        let details = registry.vault_details(id).unwrap();
        assert_eq!(details.next_milestone_to_pay, Some(1));
        assert!(!details.finalized);

        registry
            .release_next_milestone(&mut token, &oracle, addr(FUNDER), id, false)
            .unwrap();
        assert_eq!(token.balance_of(&addr(BENEFICIARY)), 300);
        let details = registry.vault_details(id).unwrap();
        assert!(details.finalized);
        assert_eq!(details.milestones_paid, vec![true, true]);

        let err = registry
            .release_next_milestone(&mut token, &oracle, addr(FUNDER), id, false)
            .unwrap_err();
        assert_eq!(err, VaultError::VaultIsFinalized);
    }

    #[test]
    fn milestone_release_is_funder_only() {
        let mut registry = registry();
        let mut token = funded_token(300);
        let oracle = StaticProofVerifier::new();
        let id = create_milestones(&mut registry, &mut token, vec![100, 200]);

        let err = registry
            .release_next_milestone(&mut token, &oracle, addr(BENEFICIARY), id, false)
            .unwrap_err();
        assert_eq!(err, VaultError::NotTheFunder);
    }

    // -- verification gate --------------------------------------------------

    fn verifiable_prize_pool(
        registry: &mut VaultRegistry,
        token: &mut InMemoryToken,
        now: DateTime<Utc>,
        funder_can_override: bool,
    ) -> u64 {
        registry
            .create_prize_pool_vault(
                token,
                addr(FUNDER),
                now,
                addr(TOKEN),
                5000,
                now + Duration::hours(1),
                "ipfs://terms".into(),
                Some(VerificationTerms {
                    proof_set_id: 42,
                    funder_can_override,
                }),
            )
            .unwrap()
    }

    #[test]
    fn verifiable_payout_fails_closed_without_verifier() {
        let mut registry = registry();
        let mut token = funded_token(5000);
        let oracle = StaticProofVerifier::new();
        let now = Utc::now();
        let id = verifiable_prize_pool(&mut registry, &mut token, now, false);

        let err = registry
            .distribute_prize_pool(
                &mut token,
                &oracle,
                addr(FUNDER),
                now + Duration::hours(1),
                id,
                &[addr(3)],
                &[5000],
                false,
            )
            .unwrap_err();
        assert_eq!(
            err,
            VaultError::VerificationNotConfigured {
                chain_id: CHAIN_ID_DEVNET
            }
        );
    }

    #[test]
    fn verifiable_payout_requires_liveness() {
        let mut registry = registry();
        let mut token = funded_token(5000);
        let mut oracle = StaticProofVerifier::new();
        let now = Utc::now();
        let id = verifiable_prize_pool(&mut registry, &mut token, now, false);

        registry
            .set_verifier_for_chain(addr(OWNER), CHAIN_ID_DEVNET, addr(0xEE))
            .unwrap();

        // Dead proof set: rejected regardless of the bypass flag, because
        // the override was not registered at creation.
        for bypass in [false, true] {
            let err = registry
                .distribute_prize_pool(
                    &mut token,
                    &oracle,
                    addr(FUNDER),
                    now + Duration::hours(1),
                    id,
                    &[addr(3)],
                    &[5000],
                    bypass,
                )
                .unwrap_err();
            assert_eq!(err, VaultError::VerificationNotLive { proof_set_id: 42 });
        }

        oracle.set_live(42, true);
        registry
            .distribute_prize_pool(
                &mut token,
                &oracle,
                addr(FUNDER),
                now + Duration::hours(1),
                id,
                &[addr(3)],
                &[5000],
                false,
            )
            .unwrap();
        assert_eq!(token.balance_of(&addr(3)), 5000);
    }

    #[test]
    fn registered_override_bypasses_dead_proof_set() {
        let mut registry = registry();
        let mut token = funded_token(5000);
        let oracle = StaticProofVerifier::new();
        let now = Utc::now();
        let id = verifiable_prize_pool(&mut registry, &mut token, now, true);

        registry
            .set_verifier_for_chain(addr(OWNER), CHAIN_ID_DEVNET, addr(0xEE))
            .unwrap();

        registry
            .distribute_prize_pool(
                &mut token,
                &oracle,
                addr(FUNDER),
                now + Duration::hours(1),
                id,
                &[addr(3)],
                &[5000],
                true,
            )
            .unwrap();
        assert!(registry.vault(id).unwrap().finalized);
    }

    #[test]
    fn set_verifier_is_owner_only() {
        let mut registry = registry();
        let err = registry
            .set_verifier_for_chain(addr(FUNDER), CHAIN_ID_DEVNET, addr(0xEE))
            .unwrap_err();
        assert_eq!(err, VaultError::NotTheOwner);
    }

    // -- legacy time-locked path --------------------------------------------

    #[test]
    fn legacy_release_unreachable_for_prize_pools() {
        let mut registry = registry();
        let mut token = funded_token(5000);
        let now = Utc::now();
        let id = create_prize_pool(&mut registry, &mut token, 5000, now);

        // No caller can match the zero beneficiary.
        let err = registry
            .release_time_locked_funds(&mut token, addr(FUNDER), now + Duration::hours(2), id)
            .unwrap_err();
        assert_eq!(err, VaultError::NotTheBeneficiary);
    }

    #[test]
    fn legacy_release_pays_historical_record() {
        let mut registry = registry();
        let mut token = funded_token(5000);
        let now = Utc::now();
        let id = create_prize_pool(&mut registry, &mut token, 5000, now);

        // Age the record into the pre-prize-pool shape: a time-locked
        // vault with a real beneficiary.
        registry.vaults[id as usize].beneficiary = addr(BENEFICIARY);

        let err = registry
            .release_time_locked_funds(&mut token, addr(BENEFICIARY), now, id)
            .unwrap_err();
        assert_eq!(err, VaultError::ReleaseTimeNotMet);

        registry
            .release_time_locked_funds(&mut token, addr(BENEFICIARY), now + Duration::hours(1), id)
            .unwrap();
        assert_eq!(token.balance_of(&addr(BENEFICIARY)), 5000);
        assert!(registry.vault(id).unwrap().finalized);

        let err = registry
            .release_time_locked_funds(&mut token, addr(BENEFICIARY), now + Duration::hours(2), id)
            .unwrap_err();
        assert_eq!(err, VaultError::VaultIsFinalized);
    }

    #[test]
    fn legacy_release_rejects_milestone_vaults() {
        let mut registry = registry();
        let mut token = funded_token(300);
        let id = create_milestones(&mut registry, &mut token, vec![100, 200]);

        let err = registry
            .release_time_locked_funds(&mut token, addr(BENEFICIARY), Utc::now(), id)
            .unwrap_err();
        assert!(matches!(err, VaultError::WrongVaultType { .. }));
    }
}

// Copyright (c) 2026 Haven Labs. MIT License.
// See LICENSE for details.

//! # Haven Engine — Escrow Vault Ledger
//!
//! The core of Haven: a deterministic escrow ledger that custodies token
//! deposits under explicit payout policies. Money goes in once, leaves
//! only along the policy's rules, and every movement is accounted for.
//!
//! Two policies exist, because two is how many the problem needs:
//!
//! - **Prize pool** — time-locked, funder-controlled, distributed in one
//!   shot across any set of recipients. Hackathons, bounties, contests.
//! - **Milestone** — a fixed beneficiary paid one agreed tranche at a
//!   time, in order. Grants and contract work.
//!
//! Either kind can additionally be *verifiable*: payouts gate on a
//! storage-proof oracle attesting the content the vault pays for is
//! still being stored. The gate fails closed — no verifier, no payout.
//!
//! ## Architecture
//!
//! Modules mirror the actual concerns of an escrow ledger:
//!
//! - **address** — 20-byte account identifiers, hex in, hex out.
//! - **vault** — the records, the payout policies, and the registry
//!   that orchestrates them.
//! - **token** — the external token boundary and the custody account.
//! - **access** — who may call what, and when.
//! - **verification** — the storage-proof liveness gate.
//! - **events** — the append-only log off-chain indexers consume.
//! - **config** — chain ids and input caps, all in one place.
//!
//! ## Design Philosophy
//!
//! 1. Deterministic: no clocks, no I/O — the environment supplies time
//!    and the token ledger.
//! 2. Commit-or-abort: a failed call leaves no trace, down to the event
//!    log.
//! 3. Effects before interactions: the ledger is updated before value
//!    moves, never after.
//! 4. Every operation that moves value is tested twice over: once for
//!    the payout, once for each way it can refuse.

pub mod access;
pub mod address;
pub mod config;
pub mod error;
pub mod events;
pub mod token;
pub mod vault;
pub mod verification;

pub use address::Address;
pub use error::VaultError;
pub use events::VaultEvent;
pub use token::{InMemoryToken, TokenCustody, TokenLedger, TokenLedgerError};
pub use vault::registry::VaultRegistry;
pub use vault::{Vault, VaultDetails, VaultKind, VaultType};
pub use verification::{ProofVerifier, StaticProofVerifier, VerificationGate, VerificationTerms};

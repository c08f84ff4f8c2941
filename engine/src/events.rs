//! # Vault Events
//!
//! Structured notifications for off-chain indexers. Every committed
//! mutation appends one or more [`VaultEvent`]s to the registry's event
//! log, in commit order, and mirrors them through `tracing` so a node
//! operator sees the same stream in the logs.
//!
//! Events are only appended after a call has fully committed -- an
//! aborted call leaves the log untouched.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::vault::VaultType;

/// A structured notification emitted by the vault registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VaultEvent {
    /// A new vault was created and funded.
    #[serde(rename = "vault_created")]
    VaultCreated {
        vault_id: u64,
        funder: Address,
        beneficiary: Address,
        vault_type: VaultType,
        total_amount: u64,
    },

    /// Funds left the vault toward a single recipient (milestone release
    /// or legacy time-locked release).
    #[serde(rename = "funds_released")]
    FundsReleased {
        vault_id: u64,
        recipient: Address,
        amount: u64,
    },

    /// A prize pool paid out its full remaining balance in one shot.
    #[serde(rename = "funds_distributed")]
    FundsDistributed { vault_id: u64, total_amount: u64 },

    /// The vault reached its terminal state. No further value can leave.
    #[serde(rename = "vault_completed")]
    VaultCompleted { vault_id: u64 },
}

/// Append-only event log with a `tracing` mirror.
#[derive(Debug, Default)]
pub struct EventEmitter {
    log: Vec<VaultEvent>,
}

impl EventEmitter {
    /// Creates an empty emitter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event to the log and mirrors it at info level.
    pub fn emit(&mut self, event: VaultEvent) {
        match &event {
            VaultEvent::VaultCreated {
                vault_id,
                funder,
                total_amount,
                ..
            } => {
                tracing::info!(vault_id, %funder, total_amount, "vault created");
            }
            VaultEvent::FundsReleased {
                vault_id,
                recipient,
                amount,
            } => {
                tracing::info!(vault_id, %recipient, amount, "funds released");
            }
            VaultEvent::FundsDistributed {
                vault_id,
                total_amount,
            } => {
                tracing::info!(vault_id, total_amount, "prize pool distributed");
            }
            VaultEvent::VaultCompleted { vault_id } => {
                tracing::info!(vault_id, "vault completed");
            }
        }
        self.log.push(event);
    }

    /// Returns the full event log in emission order.
    pub fn events(&self) -> &[VaultEvent] {
        &self.log
    }

    /// Drains the log, handing ownership of the events to the caller.
    /// Used by indexers that checkpoint what they have consumed.
    pub fn take_events(&mut self) -> Vec<VaultEvent> {
        std::mem::take(&mut self.log)
    }
}

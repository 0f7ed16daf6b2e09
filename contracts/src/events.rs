//! # Notifications
//!
//! The append-only record of what committed operations did. Entries are
//! added only after an operation's state changes are applied, so the log
//! never describes a rejected operation. Nothing reads it to make
//! decisions; it exists for observers.
//!
//! Each entry gets the next sequence number. Sequence numbers start at 0
//! and are contiguous. Rewinding a token to a checkpoint hands discarded
//! numbers out again; the entries that held them were never published.

use levy_protocol::{Address, Amount};
use serde::{Deserialize, Serialize};

/// A single observable effect of a committed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Notification {
    /// One ledger leg. Mints are reported with `from == Address::ZERO`.
    Transfer {
        from: Address,
        to: Address,
        amount: Amount,
    },
    /// An allowance was set.
    Approval {
        owner: Address,
        spender: Address,
        amount: Amount,
    },
    /// The treasury reference was reassigned.
    TreasuryChanged { old: Address, new: Address },
    /// The fee rate was changed.
    FeeRateChanged { old: Amount, new: Amount },
    /// An exemption flag was set.
    ExemptionChanged { account: Address, exempt: bool },
    /// A taxed transfer under the exemption-checked variant.
    FeeCollected {
        from: Address,
        to: Address,
        fee_amount: Amount,
        net_amount: Amount,
    },
    /// The system was paused by `account`.
    Paused { account: Address },
    /// The system was unpaused by `account`.
    Unpaused { account: Address },
}

impl Notification {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Transfer { .. } => "transfer",
            Notification::Approval { .. } => "approval",
            Notification::TreasuryChanged { .. } => "treasury_changed",
            Notification::FeeRateChanged { .. } => "fee_rate_changed",
            Notification::ExemptionChanged { .. } => "exemption_changed",
            Notification::FeeCollected { .. } => "fee_collected",
            Notification::Paused { .. } => "paused",
            Notification::Unpaused { .. } => "unpaused",
        }
    }
}

/// A notification together with its position in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencedNotification {
    pub seq: u64,
    pub event: Notification,
}

/// Append-only notification log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
    entries: Vec<SequencedNotification>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a log from persisted entries.
    ///
    /// Entries are sorted by sequence number. Returns `None` if they do not
    /// form a contiguous run starting at 0.
    pub fn from_entries(mut entries: Vec<SequencedNotification>) -> Option<Self> {
        entries.sort_by_key(|e| e.seq);
        let contiguous = entries
            .iter()
            .enumerate()
            .all(|(i, e)| e.seq == i as u64);
        contiguous.then_some(Self { entries })
    }

    /// Sequence number the next appended entry will receive.
    pub fn next_seq(&self) -> u64 {
        self.entries.len() as u64
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends a batch of notifications from one committed operation.
    pub(crate) fn append(&mut self, events: Vec<Notification>) {
        for event in events {
            let seq = self.next_seq();
            self.entries.push(SequencedNotification { seq, event });
        }
    }

    /// Drops every entry with sequence number `>= next_seq`.
    pub(crate) fn truncate(&mut self, next_seq: u64) {
        self.entries.truncate(next_seq as usize);
    }

    /// All entries with sequence number `>= seq`.
    pub fn since(&self, seq: u64) -> &[SequencedNotification] {
        let start = (seq as usize).min(self.entries.len());
        &self.entries[start..]
    }

    pub fn iter(&self) -> impl Iterator<Item = &SequencedNotification> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&SequencedNotification> {
        self.entries.last()
    }
}

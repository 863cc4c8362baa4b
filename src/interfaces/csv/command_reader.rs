use crate::domain::party::{Actor, AccountId, Role};
use crate::error::{LifecycleError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// Lifecycle operations a command file can replay.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum CommandOp {
    SubmitDirect,
    SubmitCustom,
    SubmitEmergency,
    Assign,
    Quote,
    Accept,
    Reject,
    Withdraw,
    Progress,
    Complete,
    Reschedule,
    ApproveReschedule,
    DenyReschedule,
    Cancel,
    BackJob,
    ApproveBackJob,
    RejectBackJob,
    Supplement,
    Dispute,
    ResolveDispute,
    RequestRefund,
    ApproveRefund,
    RejectRefund,
    MarkPaid,
    SetRate,
}

/// One row of a command file.
///
/// `target` is the request, booking or transaction id the operation addresses (the
/// catalog service id for `submit_direct`). `note` carries free text, or quotation
/// items as `Label=price;Label=price`. `outcome` is the dispute outcome for
/// `resolve_dispute`, the rate key (`default`, `shop` or a tier) for `set_rate`, and the
/// provider note for `quote`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CommandRecord {
    pub op: CommandOp,
    pub actor: u64,
    pub role: Role,
    #[serde(default)]
    pub target: Option<u64>,
    #[serde(default)]
    pub provider: Option<u64>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub outcome: Option<String>,
}

impl CommandRecord {
    pub fn actor(&self) -> Actor {
        Actor {
            id: AccountId(self.actor),
            role: self.role,
        }
    }

    pub fn target(&self) -> Result<u64> {
        self.target.ok_or_else(|| {
            LifecycleError::ValidationError(format!("{:?} needs a target id", self.op))
        })
    }

    pub fn amount(&self) -> Result<Decimal> {
        self.amount.ok_or_else(|| {
            LifecycleError::ValidationError(format!("{:?} needs an amount", self.op))
        })
    }

    pub fn note(&self) -> String {
        self.note.clone().unwrap_or_default()
    }
}

/// Reads lifecycle commands from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths, and
/// yields one `Result` per row so a bad row never stops the stream.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserialises commands.
    pub fn commands(self) -> impl Iterator<Item = Result<CommandRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LifecycleError::from))
    }
}

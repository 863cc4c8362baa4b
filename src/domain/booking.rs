use super::money::Money;
use super::party::{AccountId, Role};
use super::request::{QuotedLineItem, RequestId};
use super::transaction::TransactionId;
use crate::error::{LifecycleError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

record_id!(
    /// Identity of a booking created from an accepted (or withdrawn) request.
    BookingId
);

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Active,
    Completed,
    Cancelled,
    Rescheduled,
    BackJobs,
    Dispute,
    Refunded,
}

impl BookingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            BookingStatus::Active => "active",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Rescheduled => "rescheduled",
            BookingStatus::BackJobs => "back_jobs",
            BookingStatus::Dispute => "dispute",
            BookingStatus::Refunded => "refunded",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Some(BookingStatus::Active),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "rescheduled" => Some(BookingStatus::Rescheduled),
            "back_jobs" => Some(BookingStatus::BackJobs),
            "dispute" => Some(BookingStatus::Dispute),
            "refunded" => Some(BookingStatus::Refunded),
            _ => None,
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Sub-status of a reschedule, back-job or refund request.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkProgress {
    pub started_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
    /// Set while an approved back-job is being worked.
    pub rework: Option<BackJob>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub completed_at: DateTime<Utc>,
    pub total_amount: Money,
    pub notes: Option<String>,
    pub refund_request: Option<Refund>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reschedule {
    pub requested_by: AccountId,
    pub requested_by_role: Role,
    pub reason: String,
    pub status: ApprovalStatus,
    pub requested_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub cancelled_by: AccountId,
    pub cancelled_by_role: Role,
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackJob {
    pub requested_by: AccountId,
    pub reason: String,
    pub status: ApprovalStatus,
    pub requested_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    pub requested_by: AccountId,
    pub requested_by_role: Role,
    pub reason: String,
    pub amount: Money,
    pub status: ApprovalStatus,
    pub admin: Option<AccountId>,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum DisputeOutcome {
    Completed,
    Refunded { amount: Money },
    Cancelled,
}

impl DisputeOutcome {
    pub const fn label(&self) -> &'static str {
        match self {
            DisputeOutcome::Completed => "completed",
            DisputeOutcome::Refunded { .. } => "refunded",
            DisputeOutcome::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeResolution {
    pub outcome: DisputeOutcome,
    pub admin: AccountId,
    pub notes: String,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    pub complainer: AccountId,
    pub complainer_role: Role,
    pub complaint_against: Option<AccountId>,
    pub description: String,
    pub opened_at: DateTime<Utc>,
    pub resolution: Option<DisputeResolution>,
}

/// The state a booking was in when a dispute was raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "lowercase")]
pub enum DisputedFrom {
    Active(WorkProgress),
    Completed(Completion),
}

/// Current status together with the sub-state record that only exists in that status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BookingState {
    Active(WorkProgress),
    Completed(Completion),
    Rescheduled {
        pending: Reschedule,
        progress: WorkProgress,
    },
    Cancelled(Cancellation),
    BackJobs {
        request: BackJob,
        completion: Completion,
    },
    Dispute {
        dispute: Dispute,
        prior: DisputedFrom,
    },
    Refunded(Refund),
}

impl BookingState {
    pub fn status(&self) -> BookingStatus {
        match self {
            BookingState::Active(_) => BookingStatus::Active,
            BookingState::Completed(_) => BookingStatus::Completed,
            BookingState::Rescheduled { .. } => BookingStatus::Rescheduled,
            BookingState::Cancelled(_) => BookingStatus::Cancelled,
            BookingState::BackJobs { .. } => BookingStatus::BackJobs,
            BookingState::Dispute { .. } => BookingStatus::Dispute,
            BookingState::Refunded(_) => BookingStatus::Refunded,
        }
    }
}

/// What a successful `complete` did, so the caller knows whether to settle commission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    FirstCompletion,
    Rework,
}

/// Post-acceptance life of a request.
///
/// `amount_fee` is fixed at creation and never recomputed. The status is derived from
/// `state`, so a sub-state record can only exist while the booking is in its status.
/// Resolved reschedules, back-jobs, disputes and refund requests are appended to the
/// history lists when they leave the live state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    id: BookingId,
    request: RequestId,
    client: AccountId,
    provider: Option<AccountId>,
    amount_fee: Money,
    total_amount: Money,
    state: BookingState,
    supplements: Vec<QuotedLineItem>,
    reschedules: Vec<Reschedule>,
    back_jobs: Vec<BackJob>,
    disputes: Vec<Dispute>,
    refunds: Vec<Refund>,
    transaction: Option<TransactionId>,
    booked_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// A fresh booking in `active`, priced with the request's settled amount.
    pub fn open(
        id: BookingId,
        request: RequestId,
        client: AccountId,
        provider: AccountId,
        amount_fee: Money,
        now: DateTime<Utc>,
    ) -> Self {
        Self::with_state(
            id,
            request,
            client,
            Some(provider),
            amount_fee,
            BookingState::Active(WorkProgress::default()),
            now,
        )
    }

    /// The zero-amount cancelled booking that records a client withdrawal.
    pub fn withdrawn(
        id: BookingId,
        request: RequestId,
        client: AccountId,
        provider: Option<AccountId>,
        reason: String,
        now: DateTime<Utc>,
    ) -> Self {
        let cancellation = Cancellation {
            cancelled_by: client,
            cancelled_by_role: Role::Client,
            reason,
            cancelled_at: now,
        };
        Self::with_state(
            id,
            request,
            client,
            provider,
            Money::ZERO,
            BookingState::Cancelled(cancellation),
            now,
        )
    }

    fn with_state(
        id: BookingId,
        request: RequestId,
        client: AccountId,
        provider: Option<AccountId>,
        amount_fee: Money,
        state: BookingState,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            request,
            client,
            provider,
            amount_fee,
            total_amount: amount_fee,
            state,
            supplements: Vec::new(),
            reschedules: Vec::new(),
            back_jobs: Vec::new(),
            disputes: Vec::new(),
            refunds: Vec::new(),
            transaction: None,
            booked_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn id(&self) -> BookingId {
        self.id
    }

    pub fn request(&self) -> RequestId {
        self.request
    }

    pub fn client(&self) -> AccountId {
        self.client
    }

    pub fn provider(&self) -> Option<AccountId> {
        self.provider
    }

    pub fn amount_fee(&self) -> Money {
        self.amount_fee
    }

    pub fn status(&self) -> BookingStatus {
        self.state.status()
    }

    pub fn state(&self) -> &BookingState {
        &self.state
    }

    pub fn supplements(&self) -> &[QuotedLineItem] {
        &self.supplements
    }

    pub fn reschedules(&self) -> &[Reschedule] {
        &self.reschedules
    }

    pub fn back_jobs(&self) -> &[BackJob] {
        &self.back_jobs
    }

    pub fn disputes(&self) -> &[Dispute] {
        &self.disputes
    }

    pub fn refunds(&self) -> &[Refund] {
        &self.refunds
    }

    pub fn transaction(&self) -> Option<TransactionId> {
        self.transaction
    }

    pub fn booked_at(&self) -> DateTime<Utc> {
        self.booked_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// The approved refund, if the booking ended refunded.
    pub fn refund(&self) -> Option<&Refund> {
        match &self.state {
            BookingState::Refunded(refund) => Some(refund),
            _ => None,
        }
    }

    /// The dispute currently awaiting an administrator, if any.
    pub fn open_dispute(&self) -> Option<&Dispute> {
        match &self.state {
            BookingState::Dispute { dispute, .. } => Some(dispute),
            _ => None,
        }
    }

    pub fn is_party(&self, account: AccountId) -> bool {
        self.client == account || self.provider == Some(account)
    }

    /// Contract price plus any rework supplements.
    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    fn invalid(&self, operation: &'static str) -> LifecycleError {
        LifecycleError::InvalidState {
            booking: self.id,
            operation,
            current: self.status(),
        }
    }

    fn validate_refund_amount(&self, amount: Money) -> Result<()> {
        if amount.is_zero() {
            return Err(LifecycleError::ValidationError(
                "Refund amount must be greater than zero".to_string(),
            ));
        }
        if amount > self.amount_fee {
            return Err(LifecycleError::ValidationError(format!(
                "Refund amount {} exceeds booking fee {}",
                amount, self.amount_fee
            )));
        }
        Ok(())
    }

    fn require_text(value: &str, what: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(LifecycleError::ValidationError(format!("{what} is required")));
        }
        Ok(())
    }

    fn finish(&mut self, notes: Option<String>, now: DateTime<Utc>) -> Completion {
        self.completed_at = Some(now);
        Completion {
            completed_at: now,
            total_amount: self.total_amount(),
            notes,
            refund_request: None,
        }
    }

    pub(crate) fn attach_transaction(&mut self, transaction: TransactionId) -> Result<()> {
        if self.transaction.is_some() {
            return Err(LifecycleError::DuplicateTransaction { booking: self.id });
        }
        self.transaction = Some(transaction);
        Ok(())
    }

    /// Records progress on active work, stamping the start time on first use.
    pub fn update_progress(&mut self, note: String, now: DateTime<Utc>) -> Result<()> {
        let BookingState::Active(progress) = &mut self.state else {
            return Err(self.invalid("update progress on"));
        };
        progress.started_at.get_or_insert(now);
        progress.note = Some(note).filter(|note| !note.trim().is_empty());
        self.updated_at = now;
        Ok(())
    }

    /// `active → completed`. Completing approved rework closes the back-job as well.
    pub fn complete(
        &mut self,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<CompletionKind> {
        let BookingState::Active(progress) = &self.state else {
            return Err(self.invalid("complete"));
        };
        let rework = progress.rework.clone();
        let kind = match rework {
            Some(mut back_job) => {
                back_job.status = ApprovalStatus::Completed;
                back_job.completed_at = Some(now);
                self.back_jobs.push(back_job);
                CompletionKind::Rework
            }
            None => CompletionKind::FirstCompletion,
        };
        let completion = self.finish(notes, now);
        self.state = BookingState::Completed(completion);
        self.updated_at = now;
        Ok(kind)
    }

    /// `active → rescheduled`.
    pub fn request_reschedule(
        &mut self,
        requested_by: AccountId,
        role: Role,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let BookingState::Active(progress) = &self.state else {
            return Err(self.invalid("reschedule"));
        };
        Self::require_text(&reason, "A reschedule reason")?;
        let progress = progress.clone();
        self.state = BookingState::Rescheduled {
            pending: Reschedule {
                requested_by,
                requested_by_role: role,
                reason,
                status: ApprovalStatus::Pending,
                requested_at: now,
                resolved_at: None,
            },
            progress,
        };
        self.updated_at = now;
        Ok(())
    }

    /// `rescheduled → active` either way; the decision is kept in the reschedule history.
    pub fn resolve_reschedule(&mut self, approve: bool, now: DateTime<Utc>) -> Result<()> {
        let BookingState::Rescheduled { pending, progress } = &self.state else {
            return Err(self.invalid("resolve a reschedule on"));
        };
        let mut resolved = pending.clone();
        resolved.status = if approve {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Rejected
        };
        resolved.resolved_at = Some(now);
        let progress = progress.clone();
        self.reschedules.push(resolved);
        self.state = BookingState::Active(progress);
        self.updated_at = now;
        Ok(())
    }

    /// `active → cancelled`. A booking with a pending reschedule has to settle it first.
    pub fn cancel(
        &mut self,
        cancelled_by: AccountId,
        role: Role,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !matches!(self.state, BookingState::Active(_)) {
            return Err(self.invalid("cancel"));
        }
        self.state = BookingState::Cancelled(Cancellation {
            cancelled_by,
            cancelled_by_role: role,
            reason,
            cancelled_at: now,
        });
        self.updated_at = now;
        Ok(())
    }

    /// `completed → back_jobs`, allowed within `window` of the last completion.
    pub fn request_back_job(
        &mut self,
        requested_by: AccountId,
        reason: String,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let BookingState::Completed(completion) = &self.state else {
            return Err(self.invalid("request a back-job on"));
        };
        if completion.refund_request.is_some() {
            return Err(self.invalid("request a back-job while a refund is pending on"));
        }
        Self::require_text(&reason, "A back-job reason")?;
        if now - completion.completed_at > window {
            return Err(LifecycleError::ValidationError(format!(
                "Back-jobs must be requested within {} days of completion",
                window.num_days()
            )));
        }
        let completion = completion.clone();
        self.state = BookingState::BackJobs {
            request: BackJob {
                requested_by,
                reason,
                status: ApprovalStatus::Pending,
                requested_at: now,
                resolved_at: None,
                completed_at: None,
            },
            completion,
        };
        self.updated_at = now;
        Ok(())
    }

    /// `back_jobs → active`: the rework is reopened without touching the fee.
    pub fn approve_back_job(&mut self, now: DateTime<Utc>) -> Result<()> {
        let BookingState::BackJobs { request, .. } = &self.state else {
            return Err(self.invalid("approve a back-job on"));
        };
        let mut approved = request.clone();
        approved.status = ApprovalStatus::Approved;
        approved.resolved_at = Some(now);
        self.state = BookingState::Active(WorkProgress {
            started_at: None,
            note: None,
            rework: Some(approved),
        });
        self.updated_at = now;
        Ok(())
    }

    /// `back_jobs → completed`, restoring the completion the request was raised against.
    pub fn reject_back_job(&mut self, now: DateTime<Utc>) -> Result<()> {
        let BookingState::BackJobs {
            request,
            completion,
        } = &self.state
        else {
            return Err(self.invalid("reject a back-job on"));
        };
        let mut rejected = request.clone();
        rejected.status = ApprovalStatus::Rejected;
        rejected.resolved_at = Some(now);
        let completion = completion.clone();
        self.back_jobs.push(rejected);
        self.state = BookingState::Completed(completion);
        self.updated_at = now;
        Ok(())
    }

    /// Adds a priced line item for rework. Only legal while an approved back-job is active.
    pub fn add_supplement(&mut self, item: QuotedLineItem, now: DateTime<Utc>) -> Result<()> {
        let in_rework = matches!(
            &self.state,
            BookingState::Active(WorkProgress {
                rework: Some(_),
                ..
            })
        );
        if !in_rework {
            return Err(self.invalid("add a supplement to"));
        }
        Self::require_text(&item.label, "A supplement label")?;
        self.total_amount = self.total_amount.checked_add(item.price)?;
        self.supplements.push(item);
        self.updated_at = now;
        Ok(())
    }

    /// `active | completed → dispute`. At most one dispute may be open at a time.
    pub fn raise_dispute(
        &mut self,
        complainer: AccountId,
        role: Role,
        description: String,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let prior = match &self.state {
            BookingState::Dispute { .. } => {
                return Err(LifecycleError::DisputeAlreadyOpen { booking: self.id });
            }
            BookingState::Active(progress) => DisputedFrom::Active(progress.clone()),
            BookingState::Completed(completion) => DisputedFrom::Completed(completion.clone()),
            _ => return Err(self.invalid("dispute")),
        };
        Self::require_text(&description, "A dispute description")?;
        let complaint_against = if complainer == self.client {
            self.provider
        } else {
            Some(self.client)
        };
        self.state = BookingState::Dispute {
            dispute: Dispute {
                complainer,
                complainer_role: role,
                complaint_against,
                description,
                opened_at: now,
                resolution: None,
            },
            prior,
        };
        self.updated_at = now;
        Ok(())
    }

    /// `dispute → completed | refunded | cancelled`.
    ///
    /// Returns the completion kind when the outcome completes a booking that was active
    /// when disputed, so the caller can settle commission exactly once. Rework that was in
    /// flight is archived to the back-job history: completed if the outcome completes the
    /// booking, otherwise left approved and never finished.
    pub fn resolve_dispute(
        &mut self,
        admin: AccountId,
        outcome: DisputeOutcome,
        notes: String,
        now: DateTime<Utc>,
    ) -> Result<Option<CompletionKind>> {
        let BookingState::Dispute { dispute, prior } = &self.state else {
            return Err(self.invalid("resolve a dispute on"));
        };
        if let DisputeOutcome::Refunded { amount } = &outcome {
            self.validate_refund_amount(*amount)?;
        }

        let mut resolved = dispute.clone();
        let prior = prior.clone();
        resolved.resolution = Some(DisputeResolution {
            outcome: outcome.clone(),
            admin,
            notes: notes.clone(),
            resolved_at: now,
        });

        let rework = match &prior {
            DisputedFrom::Active(progress) => progress.rework.clone(),
            DisputedFrom::Completed(_) => None,
        };
        let mut completed = None;
        self.state = match outcome {
            DisputeOutcome::Completed => match prior {
                DisputedFrom::Completed(completion) => BookingState::Completed(completion),
                DisputedFrom::Active(_) => {
                    completed = Some(if rework.is_some() {
                        CompletionKind::Rework
                    } else {
                        CompletionKind::FirstCompletion
                    });
                    BookingState::Completed(self.finish(Some(notes), now))
                }
            },
            DisputeOutcome::Refunded { amount } => BookingState::Refunded(Refund {
                requested_by: resolved.complainer,
                requested_by_role: resolved.complainer_role,
                reason: resolved.description.clone(),
                amount,
                status: ApprovalStatus::Approved,
                admin: Some(admin),
                requested_at: resolved.opened_at,
                processed_at: Some(now),
            }),
            DisputeOutcome::Cancelled => BookingState::Cancelled(Cancellation {
                cancelled_by: admin,
                cancelled_by_role: Role::Admin,
                reason: notes,
                cancelled_at: now,
            }),
        };
        if let Some(mut back_job) = rework {
            if completed == Some(CompletionKind::Rework) {
                back_job.status = ApprovalStatus::Completed;
                back_job.completed_at = Some(now);
            }
            self.back_jobs.push(back_job);
        }
        self.disputes.push(resolved);
        self.updated_at = now;
        Ok(completed)
    }

    /// Client refund request on a completed booking, validated before any change.
    pub fn request_refund(
        &mut self,
        requested_by: AccountId,
        role: Role,
        amount: Money,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let BookingState::Completed(completion) = &self.state else {
            return Err(self.invalid("request a refund on"));
        };
        if completion.refund_request.is_some() {
            return Err(self.invalid("request a second refund on"));
        }
        self.validate_refund_amount(amount)?;
        Self::require_text(&reason, "A refund reason")?;
        if let BookingState::Completed(completion) = &mut self.state {
            completion.refund_request = Some(Refund {
                requested_by,
                requested_by_role: role,
                reason,
                amount,
                status: ApprovalStatus::Pending,
                admin: None,
                requested_at: now,
                processed_at: None,
            });
        }
        self.updated_at = now;
        Ok(())
    }

    /// `completed → refunded` once an administrator approves the pending request.
    pub fn approve_refund(&mut self, admin: AccountId, now: DateTime<Utc>) -> Result<Money> {
        let BookingState::Completed(Completion {
            refund_request: Some(pending),
            ..
        }) = &self.state
        else {
            return Err(self.invalid("approve a refund on"));
        };
        let mut approved = pending.clone();
        approved.status = ApprovalStatus::Approved;
        approved.admin = Some(admin);
        approved.processed_at = Some(now);
        let amount = approved.amount;
        self.state = BookingState::Refunded(approved);
        self.updated_at = now;
        Ok(amount)
    }

    /// Rejects the pending refund; the booking stays `completed`.
    pub fn reject_refund(&mut self, admin: AccountId, now: DateTime<Utc>) -> Result<()> {
        let BookingState::Completed(completion) = &mut self.state else {
            return Err(self.invalid("reject a refund on"));
        };
        let Some(mut rejected) = completion.refund_request.take() else {
            return Err(self.invalid("reject a refund on"));
        };
        rejected.status = ApprovalStatus::Rejected;
        rejected.admin = Some(admin);
        rejected.processed_at = Some(now);
        self.refunds.push(rejected);
        self.updated_at = now;
        Ok(())
    }
}

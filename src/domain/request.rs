use super::money::Money;
use super::party::AccountId;
use crate::error::{LifecycleError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

record_id!(
    /// Identity of a client-submitted service request.
    RequestId
);

record_id!(
    /// Identity of a catalog service (or add-on).
    ServiceId
);

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Quoted,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Quoted => "quoted",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub const fn is_open(self) -> bool {
        matches!(self, RequestStatus::Pending | RequestStatus::Quoted)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A request for a catalog service, optionally with add-ons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectRequest {
    pub service: ServiceId,
    #[serde(default)]
    pub add_ons: Vec<ServiceId>,
}

/// A free-text request the provider prices with a quotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRequest {
    pub description: String,
    pub budget_estimate: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyRequest {
    pub description: String,
}

/// What the client is asking for. Fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RequestKind {
    Direct(DirectRequest),
    Custom(CustomRequest),
    Emergency(EmergencyRequest),
}

impl RequestKind {
    pub const fn label(&self) -> &'static str {
        match self {
            RequestKind::Direct(_) => "direct",
            RequestKind::Custom(_) => "custom",
            RequestKind::Emergency(_) => "emergency",
        }
    }

    fn validate(&self) -> Result<()> {
        let description = match self {
            RequestKind::Direct(_) => return Ok(()),
            RequestKind::Custom(custom) => &custom.description,
            RequestKind::Emergency(emergency) => &emergency.description,
        };
        if description.trim().is_empty() {
            return Err(LifecycleError::ValidationError(format!(
                "A {} request needs a description",
                self.label()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotedLineItem {
    pub label: String,
    pub price: Money,
}

impl QuotedLineItem {
    pub fn new(label: impl Into<String>, price: Money) -> Self {
        Self {
            label: label.into(),
            price,
        }
    }
}

/// A provider's priced breakdown for a request. The total is summed once, when quoted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotation {
    pub items: Vec<QuotedLineItem>,
    pub provider_note: Option<String>,
    pub quoted_by: AccountId,
    pub quoted_at: DateTime<Utc>,
    total: Money,
}

impl Quotation {
    pub fn total(&self) -> Money {
        self.total
    }
}

/// Why a request left the open states without being accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "closure", rename_all = "lowercase")]
pub enum RequestClosure {
    Rejected { by: AccountId, reason: String },
    Withdrawn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: RequestStatus,
    pub at: DateTime<Utc>,
}

/// A client's ask, from submission to acceptance or rejection.
///
/// State-bearing fields are private; they change only through the transition methods,
/// each of which checks its precondition before touching anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    id: RequestId,
    client: AccountId,
    provider: Option<AccountId>,
    kind: RequestKind,
    status: RequestStatus,
    quotation: Option<Quotation>,
    closure: Option<RequestClosure>,
    history: Vec<StatusChange>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ServiceRequest {
    pub fn submit(
        id: RequestId,
        client: AccountId,
        provider: Option<AccountId>,
        kind: RequestKind,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        kind.validate()?;
        Ok(Self {
            id,
            client,
            provider,
            kind,
            status: RequestStatus::Pending,
            quotation: None,
            closure: None,
            history: vec![StatusChange {
                status: RequestStatus::Pending,
                at: now,
            }],
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn client(&self) -> AccountId {
        self.client
    }

    pub fn provider(&self) -> Option<AccountId> {
        self.provider
    }

    pub fn kind(&self) -> &RequestKind {
        &self.kind
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn quotation(&self) -> Option<&Quotation> {
        self.quotation.as_ref()
    }

    pub fn closure(&self) -> Option<&RequestClosure> {
        self.closure.as_ref()
    }

    pub fn history(&self) -> &[StatusChange] {
        &self.history
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn reject_transition(&self, operation: &'static str) -> LifecycleError {
        LifecycleError::InvalidTransition {
            request: self.id,
            operation,
            current: self.status,
        }
    }

    fn ensure_open(&self, operation: &'static str) -> Result<()> {
        if self.status.is_open() {
            Ok(())
        } else {
            Err(self.reject_transition(operation))
        }
    }

    fn move_to(&mut self, status: RequestStatus, now: DateTime<Utc>) {
        if self.status != status {
            self.history.push(StatusChange { status, at: now });
        }
        self.status = status;
        self.updated_at = now;
    }

    /// Assigns a provider to a request that is still waiting for one.
    pub fn assign_provider(&mut self, provider: AccountId, now: DateTime<Utc>) -> Result<()> {
        if self.status != RequestStatus::Pending {
            return Err(self.reject_transition("assign a provider to"));
        }
        self.provider = Some(provider);
        self.updated_at = now;
        Ok(())
    }

    /// Replaces any prior quotation and moves the request to `quoted`.
    ///
    /// Custom requests can always be quoted; direct requests only when re-pricing is
    /// enabled for the deployment. Emergency requests are priced at acceptance instead.
    pub fn quote(
        &mut self,
        items: Vec<QuotedLineItem>,
        provider_note: Option<String>,
        quoted_by: AccountId,
        allow_direct_requote: bool,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_open("quote")?;
        let quotable = match self.kind {
            RequestKind::Custom(_) => true,
            RequestKind::Direct(_) => allow_direct_requote,
            RequestKind::Emergency(_) => false,
        };
        if !quotable {
            return Err(self.reject_transition("quote"));
        }
        if items.is_empty() {
            return Err(LifecycleError::ValidationError(
                "A quotation needs at least one line item".to_string(),
            ));
        }
        if let Some(item) = items.iter().find(|item| item.label.trim().is_empty()) {
            return Err(LifecycleError::ValidationError(format!(
                "Quoted line item priced {} has no label",
                item.price
            )));
        }
        let total = Money::total(items.iter().map(|item| item.price))?;

        self.quotation = Some(Quotation {
            items,
            provider_note: provider_note.filter(|note| !note.trim().is_empty()),
            quoted_by,
            quoted_at: now,
            total,
        });
        if self.provider.is_none() {
            self.provider = Some(quoted_by);
        }
        self.move_to(RequestStatus::Quoted, now);
        Ok(())
    }

    /// The contractual price a booking is created with.
    ///
    /// Quoted total if a quotation exists, else the catalog price for direct requests,
    /// else whatever the provider entered at acceptance (zero if nothing).
    pub fn settled_price(
        &self,
        catalog_price: Option<Money>,
        provider_price: Option<Money>,
    ) -> Money {
        if let Some(quotation) = &self.quotation {
            return quotation.total();
        }
        match self.kind {
            RequestKind::Direct(_) => catalog_price.unwrap_or(Money::ZERO),
            RequestKind::Custom(_) | RequestKind::Emergency(_) => {
                provider_price.unwrap_or(Money::ZERO)
            }
        }
    }

    pub fn accept(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_open("accept")?;
        self.move_to(RequestStatus::Accepted, now);
        Ok(())
    }

    /// Rejects the request and unassigns its provider, returning the provider that was
    /// assigned so it can be told.
    pub fn reject(
        &mut self,
        by: AccountId,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<Option<AccountId>> {
        self.ensure_open("reject")?;
        let previous = self.provider.take();
        self.closure = Some(RequestClosure::Rejected { by, reason });
        self.move_to(RequestStatus::Rejected, now);
        Ok(previous)
    }

    /// Client withdrawal. The request is closed, not deleted; the caller records a
    /// zero-amount cancelled booking as the audit trail.
    pub fn withdraw(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_open("withdraw")?;
        self.closure = Some(RequestClosure::Withdrawn);
        self.move_to(RequestStatus::Rejected, now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn custom(description: &str) -> RequestKind {
        RequestKind::Custom(CustomRequest {
            description: description.to_string(),
            budget_estimate: None,
        })
    }

    fn direct() -> RequestKind {
        RequestKind::Direct(DirectRequest {
            service: ServiceId(1),
            add_ons: Vec::new(),
        })
    }

    fn items() -> Vec<QuotedLineItem> {
        vec![
            QuotedLineItem::new("Oil change", Money::new(dec!(450.00)).unwrap()),
            QuotedLineItem::new("Filter", Money::new(dec!(150.00)).unwrap()),
        ]
    }

    fn pending(kind: RequestKind) -> ServiceRequest {
        ServiceRequest::submit(RequestId(1), AccountId(1), None, kind, Utc::now()).unwrap()
    }

    #[test]
    fn test_submit_requires_description() {
        let result =
            ServiceRequest::submit(RequestId(1), AccountId(1), None, custom("  "), Utc::now());
        assert!(matches!(result, Err(LifecycleError::ValidationError(_))));

        let emergency = RequestKind::Emergency(EmergencyRequest {
            description: String::new(),
        });
        let result =
            ServiceRequest::submit(RequestId(1), AccountId(1), None, emergency, Utc::now());
        assert!(matches!(result, Err(LifecycleError::ValidationError(_))));
    }

    #[test]
    fn test_quote_sets_total_and_assigns_provider() {
        let mut request = pending(custom("Engine knocks"));
        request
            .quote(items(), Some("Two hours".into()), AccountId(10), false, Utc::now())
            .unwrap();

        assert_eq!(request.status(), RequestStatus::Quoted);
        assert_eq!(request.provider(), Some(AccountId(10)));
        assert_eq!(request.settled_price(None, None).value(), dec!(600.00));
        assert_eq!(request.history().len(), 2);
    }

    #[test]
    fn test_requote_replaces_items() {
        let mut request = pending(custom("Brakes squeal"));
        request.quote(items(), None, AccountId(10), false, Utc::now()).unwrap();
        let replacement = vec![QuotedLineItem::new("Pads", Money::new(dec!(90)).unwrap())];
        request
            .quote(replacement, None, AccountId(10), false, Utc::now())
            .unwrap();

        let quotation = request.quotation().unwrap();
        assert_eq!(quotation.items.len(), 1);
        assert_eq!(quotation.total().value(), dec!(90));
        // Staying in `quoted` is not a new status change.
        assert_eq!(request.history().len(), 2);
    }

    #[test]
    fn test_quote_rules_by_kind() {
        let mut request = pending(direct());
        assert!(matches!(
            request.quote(items(), None, AccountId(10), false, Utc::now()),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert!(request.quote(items(), None, AccountId(10), true, Utc::now()).is_ok());

        let mut request = pending(RequestKind::Emergency(EmergencyRequest {
            description: "Flat tyre".into(),
        }));
        assert!(matches!(
            request.quote(items(), None, AccountId(10), true, Utc::now()),
            Err(LifecycleError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_quote_validates_items() {
        let mut request = pending(custom("Noise"));
        assert!(matches!(
            request.quote(Vec::new(), None, AccountId(10), false, Utc::now()),
            Err(LifecycleError::ValidationError(_))
        ));
        let unlabeled = vec![QuotedLineItem::new(" ", Money::ZERO)];
        assert!(matches!(
            request.quote(unlabeled, None, AccountId(10), false, Utc::now()),
            Err(LifecycleError::ValidationError(_))
        ));
        assert_eq!(request.status(), RequestStatus::Pending);
    }

    #[test]
    fn test_quote_total_out_of_range_is_rejected() {
        let mut request = pending(custom("Noise"));
        let items = vec![
            QuotedLineItem::new("Everything", Money::new(rust_decimal::Decimal::MAX).unwrap()),
            QuotedLineItem::new("Tip", Money::new(dec!(1)).unwrap()),
        ];
        assert!(matches!(
            request.quote(items, None, AccountId(10), false, Utc::now()),
            Err(LifecycleError::ValidationError(_))
        ));
        assert_eq!(request.status(), RequestStatus::Pending);
        assert!(request.quotation().is_none());
    }

    #[test]
    fn test_quote_after_accept_is_invalid() {
        let mut request = pending(custom("Noise"));
        request.accept(Utc::now()).unwrap();
        match request.quote(items(), None, AccountId(10), false, Utc::now()) {
            Err(LifecycleError::InvalidTransition { current, .. }) => {
                assert_eq!(current, RequestStatus::Accepted)
            }
            other => panic!("expected invalid transition, got {other:?}"),
        }
    }

    #[test]
    fn test_reject_unassigns_provider() {
        let mut request = ServiceRequest::submit(
            RequestId(3),
            AccountId(1),
            Some(AccountId(10)),
            custom("Noise"),
            Utc::now(),
        )
        .unwrap();
        let previous = request
            .reject(AccountId(10), "Too far".into(), Utc::now())
            .unwrap();
        assert_eq!(previous, Some(AccountId(10)));
        assert_eq!(request.provider(), None);
        assert_eq!(request.status(), RequestStatus::Rejected);
        assert!(request.accept(Utc::now()).is_err());
    }

    #[test]
    fn test_withdraw_closes_request() {
        let mut request = pending(custom("Noise"));
        request.withdraw(Utc::now()).unwrap();
        assert_eq!(request.closure(), Some(&RequestClosure::Withdrawn));
        assert!(matches!(
            request.withdraw(Utc::now()),
            Err(LifecycleError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_settled_price_fallbacks() {
        let request = pending(direct());
        let catalog = Money::new(dec!(800)).unwrap();
        assert_eq!(request.settled_price(Some(catalog), None), catalog);

        let request = pending(RequestKind::Emergency(EmergencyRequest {
            description: "Battery".into(),
        }));
        assert_eq!(request.settled_price(None, None), Money::ZERO);
        let entered = Money::new(dec!(120)).unwrap();
        assert_eq!(request.settled_price(None, Some(entered)), entered);
    }

    #[test]
    fn test_assign_only_while_pending() {
        let mut request = pending(custom("Noise"));
        request.assign_provider(AccountId(11), Utc::now()).unwrap();
        assert_eq!(request.provider(), Some(AccountId(11)));
        request.quote(items(), None, AccountId(11), false, Utc::now()).unwrap();
        assert!(request.assign_provider(AccountId(12), Utc::now()).is_err());
    }
}

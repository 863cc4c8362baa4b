use super::{LifecycleOrchestrator, forbidden};
use crate::application::locks::LockKey;
use crate::application::notices;
use crate::domain::booking::{Booking, BookingId};
use crate::domain::money::Money;
use crate::domain::party::{AccountId, Actor, Role};
use crate::domain::ports::{Changeset, Sequence};
use crate::domain::request::{
    DirectRequest, QuotedLineItem, RequestId, RequestKind, RequestStatus, ServiceRequest,
};
use crate::error::{Entity, LifecycleError, Result};
use tracing::{debug, info};

impl LifecycleOrchestrator {
    /// Catalog price of a direct request: the service plus every add-on.
    async fn direct_price(&self, direct: &DirectRequest) -> Result<Money> {
        let mut total = Money::ZERO;
        for id in std::iter::once(&direct.service).chain(&direct.add_ons) {
            let service = self.catalog.service(*id).await?.ok_or_else(|| {
                LifecycleError::ValidationError(format!("Catalog service {id} does not exist"))
            })?;
            total = total.checked_add(service.price)?;
        }
        Ok(total)
    }

    /// Creates a `pending` request owned by the calling client.
    pub async fn submit_request(
        &self,
        actor: Actor,
        provider: Option<AccountId>,
        kind: RequestKind,
    ) -> Result<ServiceRequest> {
        if actor.role != Role::Client {
            return Err(forbidden(actor, "submit", Entity::Request, 0));
        }
        if let RequestKind::Direct(direct) = &kind {
            self.direct_price(direct).await?;
        }

        let now = self.clock.now();
        let id = RequestId(self.store.next_id(Sequence::Request).await?);
        let request = ServiceRequest::submit(id, actor.id, provider, kind, now)?;
        let changes = Changeset::new(now)
            .request(request.clone())
            .notify(notices::request_submitted(&request));
        self.store.commit(changes).await?;

        info!(
            request = %id,
            client = %actor.id,
            kind = request.kind().label(),
            "Request submitted"
        );
        Ok(request)
    }

    /// Offers a pending request to a provider. Owner or administrator only.
    pub async fn assign_provider(
        &self,
        actor: Actor,
        id: RequestId,
        provider: AccountId,
    ) -> Result<ServiceRequest> {
        let _guard = self.locks.acquire(LockKey::Request(id)).await;
        let mut request = self.request(id).await?;
        if !(actor.is_admin() || request.client() == actor.id) {
            return Err(forbidden(actor, "assign", Entity::Request, id.0));
        }

        let now = self.clock.now();
        request.assign_provider(provider, now)?;
        let changes = Changeset::new(now)
            .request(request.clone())
            .notify(notices::provider_assigned(&request, provider));
        self.store.commit(changes).await?;

        info!(request = %id, provider = %provider, "Provider assigned");
        Ok(request)
    }

    /// Prices a request with line items, replacing any earlier quotation.
    pub async fn quote_request(
        &self,
        actor: Actor,
        id: RequestId,
        items: Vec<QuotedLineItem>,
        note: Option<String>,
    ) -> Result<ServiceRequest> {
        let _guard = self.locks.acquire(LockKey::Request(id)).await;
        let mut request = self.request(id).await?;
        let assigned_elsewhere = request.provider().is_some_and(|p| p != actor.id);
        if !actor.role.is_provider() || assigned_elsewhere {
            return Err(forbidden(actor, "quote", Entity::Request, id.0));
        }

        let now = self.clock.now();
        request.quote(items, note, actor.id, self.policy.allow_direct_requote, now)?;
        let changes = Changeset::new(now)
            .request(request.clone())
            .notify(notices::quotation_received(&request));
        self.store.commit(changes).await?;

        info!(
            request = %id,
            provider = %actor.id,
            total = %request.settled_price(None, None),
            "Request quoted"
        );
        Ok(request)
    }

    /// Accepts a request and books it, exactly once.
    ///
    /// Providers accept requests offered to them (or unassigned ones, which they then
    /// take); clients accept a quotation. `provider_price` is only honoured from a
    /// provider, for custom and emergency requests that were never quoted.
    pub async fn accept_request(
        &self,
        actor: Actor,
        id: RequestId,
        provider_price: Option<Money>,
    ) -> Result<Booking> {
        let _guard = self.locks.acquire(LockKey::Request(id)).await;
        let mut request = self.request(id).await?;
        if let Some(existing) = self.store.booking_for_request(id).await? {
            debug!(request = %id, booking = %existing.id(), "Accept lost to an earlier booking");
            return Err(LifecycleError::AlreadyBooked {
                request: id,
                booking: existing.id(),
                current: request.status(),
            });
        }

        let (provider, provider_price) = match actor.role {
            role if role.is_provider() => {
                if request.provider().is_some_and(|p| p != actor.id) {
                    return Err(forbidden(actor, "accept", Entity::Request, id.0));
                }
                (actor.id, provider_price)
            }
            Role::Client => {
                if request.client() != actor.id {
                    return Err(forbidden(actor, "accept", Entity::Request, id.0));
                }
                if request.status() == RequestStatus::Pending {
                    return Err(forbidden(actor, "accept an unquoted", Entity::Request, id.0));
                }
                let provider = request.provider().ok_or_else(|| {
                    LifecycleError::ValidationError(format!("Request {id} has no provider to book"))
                })?;
                (provider, None)
            }
            _ => return Err(forbidden(actor, "accept", Entity::Request, id.0)),
        };

        let now = self.clock.now();
        if request.provider().is_none() && request.status() == RequestStatus::Pending {
            request.assign_provider(provider, now)?;
        }
        request.accept(now)?;

        let catalog_price = match request.kind() {
            RequestKind::Direct(direct) if request.quotation().is_none() => {
                Some(self.direct_price(direct).await?)
            }
            _ => None,
        };
        let amount_fee = request.settled_price(catalog_price, provider_price);

        let booking_id = BookingId(self.store.next_id(Sequence::Booking).await?);
        let booking = Booking::open(booking_id, id, request.client(), provider, amount_fee, now);
        let changes = Changeset::new(now)
            .request(request.clone())
            .booking(booking.clone())
            .notify(notices::request_accepted(&request, &booking));
        self.store.commit(changes).await?;

        info!(
            request = %id,
            booking = %booking_id,
            provider = %provider,
            amount_fee = %amount_fee,
            "Request accepted"
        );
        Ok(booking)
    }

    /// Rejects an open request; the client or the assigned provider may do so.
    pub async fn reject_request(
        &self,
        actor: Actor,
        id: RequestId,
        reason: String,
    ) -> Result<ServiceRequest> {
        let _guard = self.locks.acquire(LockKey::Request(id)).await;
        let mut request = self.request(id).await?;
        let allowed = request.client() == actor.id
            || (actor.role.is_provider() && request.provider() == Some(actor.id));
        if !allowed {
            return Err(forbidden(actor, "reject", Entity::Request, id.0));
        }

        let now = self.clock.now();
        let previous = request.reject(actor.id, reason.clone(), now)?;
        let changes = Changeset::new(now)
            .request(request.clone())
            .notify(notices::request_rejected(&request, actor.id, previous, &reason));
        self.store.commit(changes).await?;

        info!(request = %id, by = %actor.id, "Request rejected");
        Ok(request)
    }

    /// Client withdrawal, recorded as a zero-amount cancelled booking.
    pub async fn withdraw_request(
        &self,
        actor: Actor,
        id: RequestId,
        reason: String,
    ) -> Result<Booking> {
        let _guard = self.locks.acquire(LockKey::Request(id)).await;
        let mut request = self.request(id).await?;
        if request.client() != actor.id {
            return Err(forbidden(actor, "withdraw", Entity::Request, id.0));
        }

        let now = self.clock.now();
        request.withdraw(now)?;
        let booking_id = BookingId(self.store.next_id(Sequence::Booking).await?);
        let reason = if reason.trim().is_empty() {
            "Withdrawn by client".to_string()
        } else {
            reason
        };
        let booking = Booking::withdrawn(
            booking_id,
            id,
            request.client(),
            request.provider(),
            reason,
            now,
        );
        let changes = Changeset::new(now)
            .request(request.clone())
            .booking(booking.clone())
            .notify(notices::request_withdrawn(&request));
        self.store.commit(changes).await?;

        info!(request = %id, booking = %booking_id, "Request withdrawn");
        Ok(booking)
    }
}

use crate::domain::booking::{BookingId, BookingStatus};
use crate::domain::party::AccountId;
use crate::domain::request::{RequestId, RequestStatus, ServiceRequest};
use std::fmt;
use thiserror::Error;

/// The kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Request,
    Booking,
    Transaction,
    Service,
    Account,
    CommissionSettings,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Entity::Request => "request",
            Entity::Booking => "booking",
            Entity::Transaction => "transaction",
            Entity::Service => "service",
            Entity::Account => "account",
            Entity::CommissionSettings => "commission settings",
        };
        f.write_str(label)
    }
}

/// Authoritative status returned alongside a rejected transition so callers can resync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentStatus {
    Request(RequestStatus),
    Booking(BookingStatus),
}

impl fmt::Display for CurrentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurrentStatus::Request(status) => f.write_str(status.label()),
            CurrentStatus::Booking(status) => f.write_str(status.label()),
        }
    }
}

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Cannot {operation} request {request} while it is {current}")]
    InvalidTransition {
        request: RequestId,
        operation: &'static str,
        current: RequestStatus,
    },
    #[error("Cannot {operation} booking {booking} while it is {current}")]
    InvalidState {
        booking: BookingId,
        operation: &'static str,
        current: BookingStatus,
    },
    #[error("Request {request} already has booking {booking}")]
    AlreadyBooked {
        request: RequestId,
        booking: BookingId,
        current: RequestStatus,
    },
    #[error("Booking {booking} already has an open dispute")]
    DisputeAlreadyOpen { booking: BookingId },
    #[error("Booking {booking} already has a transaction")]
    DuplicateTransaction { booking: BookingId },
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: u64 },
    #[error("Account {actor} may not {operation} {entity} {id}")]
    Forbidden {
        actor: AccountId,
        operation: &'static str,
        entity: Entity,
        id: u64,
    },
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl LifecycleError {
    /// The entity status at the time of rejection, when the error came from a state machine.
    pub fn current_status(&self) -> Option<CurrentStatus> {
        match self {
            LifecycleError::InvalidTransition { current, .. } => {
                Some(CurrentStatus::Request(*current))
            }
            LifecycleError::InvalidState { current, .. } => Some(CurrentStatus::Booking(*current)),
            LifecycleError::AlreadyBooked { current, .. } => Some(CurrentStatus::Request(*current)),
            LifecycleError::DisputeAlreadyOpen { .. } => {
                Some(CurrentStatus::Booking(BookingStatus::Dispute))
            }
            _ => None,
        }
    }

    /// HTTP status an API adapter should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            LifecycleError::ValidationError(_)
            | LifecycleError::InvalidTransition { .. }
            | LifecycleError::InvalidState { .. }
            | LifecycleError::CsvError(_)
            | LifecycleError::SerializationError(_) => 400,
            LifecycleError::Forbidden { .. } => 403,
            LifecycleError::NotFound { .. } => 404,
            LifecycleError::AlreadyBooked { .. }
            | LifecycleError::DisputeAlreadyOpen { .. }
            | LifecycleError::DuplicateTransaction { .. } => 409,
            LifecycleError::IoError(_) | LifecycleError::InternalError(_) => 500,
        }
    }

    pub(crate) fn not_found(entity: Entity, id: u64) -> Self {
        LifecycleError::NotFound { entity, id }
    }

    /// Store-side conflict for a request that already has a booking, carrying the stored
    /// request's status.
    pub(crate) fn already_booked(
        request: RequestId,
        existing: BookingId,
        stored: Option<&ServiceRequest>,
    ) -> Self {
        match stored {
            Some(stored) => LifecycleError::AlreadyBooked {
                request,
                booking: existing,
                current: stored.status(),
            },
            None => LifecycleError::internal(format!(
                "Booking {existing} refers to unknown request {request}"
            )),
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        LifecycleError::InternalError(Box::new(std::io::Error::other(message.into())))
    }
}

pub type Result<T> = std::result::Result<T, LifecycleError>;

use super::csv::command_reader::{CommandOp, CommandRecord};
use crate::application::LifecycleOrchestrator;
use crate::domain::booking::{BookingId, DisputeOutcome};
use crate::domain::commission::{MechanicTier, RateUpdate};
use crate::domain::money::Money;
use crate::domain::party::AccountId;
use crate::domain::request::{
    CustomRequest, DirectRequest, EmergencyRequest, QuotedLineItem, RequestId, RequestKind,
    ServiceId,
};
use crate::domain::transaction::TransactionId;
use crate::error::{LifecycleError, Result};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Parses `Label=price;Label=price` into quotation items.
pub fn parse_items(raw: &str) -> Result<Vec<QuotedLineItem>> {
    raw.split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (label, price) = part.rsplit_once('=').ok_or_else(|| {
                LifecycleError::ValidationError(format!("Quoted item '{part}' is not Label=price"))
            })?;
            let price = Decimal::from_str(price.trim()).map_err(|_| {
                LifecycleError::ValidationError(format!("Quoted item '{part}' has a bad price"))
            })?;
            Ok(QuotedLineItem::new(label.trim(), Money::new(price)?))
        })
        .collect()
}

fn parse_ids(raw: &str) -> Result<Vec<ServiceId>> {
    raw.split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u64>().map(ServiceId).map_err(|_| {
                LifecycleError::ValidationError(format!("Add-on id '{part}' is not a number"))
            })
        })
        .collect()
}

fn parse_outcome(command: &CommandRecord) -> Result<DisputeOutcome> {
    match command.outcome.as_deref().map(str::trim) {
        Some("completed") => Ok(DisputeOutcome::Completed),
        Some("cancelled") => Ok(DisputeOutcome::Cancelled),
        Some("refunded") => Ok(DisputeOutcome::Refunded {
            amount: Money::new(command.amount()?)?,
        }),
        other => Err(LifecycleError::ValidationError(format!(
            "Unknown dispute outcome {other:?}"
        ))),
    }
}

fn rate_update(command: &CommandRecord) -> Result<RateUpdate> {
    let rate = command.amount()?;
    let key = command.outcome.as_deref().map(str::trim).unwrap_or("default");
    let mut update = RateUpdate::default();
    match key {
        "default" => update.default_rate = Some(rate),
        "shop" => update.shop_rate = Some(rate),
        tier => {
            let tier = MechanicTier::parse(tier).ok_or_else(|| {
                LifecycleError::ValidationError(format!("Unknown rate key '{tier}'"))
            })?;
            update.mechanic_rates.insert(tier, rate);
        }
    }
    Ok(update)
}

/// Applies one command through the orchestrator.
pub async fn apply(orchestrator: &LifecycleOrchestrator, command: &CommandRecord) -> Result<()> {
    let actor = command.actor();
    let provider = command.provider.map(AccountId);
    let booking = || command.target().map(BookingId);
    let request = || command.target().map(RequestId);

    match command.op {
        CommandOp::SubmitDirect => {
            let kind = RequestKind::Direct(DirectRequest {
                service: ServiceId(command.target()?),
                add_ons: parse_ids(&command.note())?,
            });
            orchestrator.submit_request(actor, provider, kind).await?;
        }
        CommandOp::SubmitCustom => {
            let kind = RequestKind::Custom(CustomRequest {
                description: command.note(),
                budget_estimate: command.amount.map(Money::new).transpose()?,
            });
            orchestrator.submit_request(actor, provider, kind).await?;
        }
        CommandOp::SubmitEmergency => {
            let kind = RequestKind::Emergency(EmergencyRequest {
                description: command.note(),
            });
            orchestrator.submit_request(actor, provider, kind).await?;
        }
        CommandOp::Assign => {
            let provider = provider.ok_or_else(|| {
                LifecycleError::ValidationError("assign needs a provider".to_string())
            })?;
            orchestrator.assign_provider(actor, request()?, provider).await?;
        }
        CommandOp::Quote => {
            let items = parse_items(&command.note())?;
            orchestrator
                .quote_request(actor, request()?, items, command.outcome.clone())
                .await?;
        }
        CommandOp::Accept => {
            let price = command.amount.map(Money::new).transpose()?;
            orchestrator.accept_request(actor, request()?, price).await?;
        }
        CommandOp::Reject => {
            orchestrator
                .reject_request(actor, request()?, command.note())
                .await?;
        }
        CommandOp::Withdraw => {
            orchestrator
                .withdraw_request(actor, request()?, command.note())
                .await?;
        }
        CommandOp::Progress => {
            orchestrator
                .update_progress(actor, booking()?, command.note())
                .await?;
        }
        CommandOp::Complete => {
            orchestrator
                .complete_booking(actor, booking()?, command.note.clone())
                .await?;
        }
        CommandOp::Reschedule => {
            orchestrator
                .request_reschedule(actor, booking()?, command.note())
                .await?;
        }
        CommandOp::ApproveReschedule | CommandOp::DenyReschedule => {
            let approve = command.op == CommandOp::ApproveReschedule;
            orchestrator
                .resolve_reschedule(actor, booking()?, approve)
                .await?;
        }
        CommandOp::Cancel => {
            orchestrator
                .cancel_booking(actor, booking()?, command.note())
                .await?;
        }
        CommandOp::BackJob => {
            orchestrator
                .request_back_job(actor, booking()?, command.note())
                .await?;
        }
        CommandOp::ApproveBackJob | CommandOp::RejectBackJob => {
            let approve = command.op == CommandOp::ApproveBackJob;
            orchestrator.resolve_back_job(actor, booking()?, approve).await?;
        }
        CommandOp::Supplement => {
            let price = Money::new(command.amount()?)?;
            orchestrator
                .add_supplement(actor, booking()?, command.note(), price)
                .await?;
        }
        CommandOp::Dispute => {
            orchestrator
                .open_dispute(actor, booking()?, command.note())
                .await?;
        }
        CommandOp::ResolveDispute => {
            let outcome = parse_outcome(command)?;
            orchestrator
                .resolve_dispute(actor, booking()?, outcome, command.note())
                .await?;
        }
        CommandOp::RequestRefund => {
            let amount = Money::new(command.amount()?)?;
            orchestrator
                .request_refund(actor, booking()?, amount, command.note())
                .await?;
        }
        CommandOp::ApproveRefund | CommandOp::RejectRefund => {
            let approve = command.op == CommandOp::ApproveRefund;
            orchestrator.resolve_refund(actor, booking()?, approve).await?;
        }
        CommandOp::MarkPaid => {
            orchestrator
                .mark_payout_paid(actor, TransactionId(command.target()?))
                .await?;
        }
        CommandOp::SetRate => {
            orchestrator
                .update_commission_settings(actor, rate_update(command)?)
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_items() {
        let items = parse_items("Oil change=450.00; Filter=150").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].label, "Oil change");
        assert_eq!(items[1].price.value(), dec!(150));
    }

    #[test]
    fn test_parse_items_rejects_garbage() {
        assert!(parse_items("Oil change").is_err());
        assert!(parse_items("Oil change=abc").is_err());
        assert!(parse_items("Oil change=-5").is_err());
    }

    #[test]
    fn test_parse_ids() {
        assert_eq!(parse_ids("3; 4").unwrap(), vec![ServiceId(3), ServiceId(4)]);
        assert!(parse_ids("").unwrap().is_empty());
        assert!(parse_ids("x").is_err());
    }
}

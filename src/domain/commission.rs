use super::money::{Money, Rate};
use super::party::AccountId;
use crate::error::{LifecycleError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A mechanic's ranking.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MechanicTier {
    Standard,
    Bronze,
    Silver,
    Gold,
}

impl MechanicTier {
    pub const fn label(self) -> &'static str {
        match self {
            MechanicTier::Standard => "standard",
            MechanicTier::Bronze => "bronze",
            MechanicTier::Silver => "silver",
            MechanicTier::Gold => "gold",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "standard" => Some(MechanicTier::Standard),
            "bronze" => Some(MechanicTier::Bronze),
            "silver" => Some(MechanicTier::Silver),
            "gold" => Some(MechanicTier::Gold),
            _ => None,
        }
    }
}

/// How a provider is classified for commission purposes.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(tag = "kind", content = "tier", rename_all = "lowercase")]
pub enum ProviderClassification {
    Mechanic(MechanicTier),
    Shop,
    #[default]
    Unclassified,
}

/// The platform's commission rate configuration.
///
/// There is one live copy per deployment. It is never read implicitly: callers take a
/// snapshot and pass it to [`compute`], so a transaction can always be reproduced from
/// the settings it was computed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionSettings {
    pub default_rate: Rate,
    #[serde(default)]
    pub mechanic_rates: BTreeMap<MechanicTier, Rate>,
    #[serde(default)]
    pub shop_rate: Option<Rate>,
    #[serde(default)]
    pub updated_by: Option<AccountId>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for CommissionSettings {
    fn default() -> Self {
        let rate = Rate::percent_unchecked;
        let mechanic_rates = BTreeMap::from([
            (MechanicTier::Bronze, rate(dec!(12))),
            (MechanicTier::Silver, rate(dec!(10))),
            (MechanicTier::Gold, rate(dec!(8))),
        ]);
        Self {
            default_rate: rate(dec!(15)),
            mechanic_rates,
            shop_rate: Some(rate(dec!(10))),
            updated_by: None,
            updated_at: None,
        }
    }
}

impl CommissionSettings {
    /// Mechanic tier rate, else shop rate, else the default rate.
    pub fn rate_for(&self, classification: ProviderClassification) -> Rate {
        let specific = match classification {
            ProviderClassification::Mechanic(tier) => self.mechanic_rates.get(&tier).copied(),
            ProviderClassification::Shop => self.shop_rate,
            ProviderClassification::Unclassified => None,
        };
        specific.unwrap_or(self.default_rate)
    }

    /// Applies an administrative override. Every rate is validated before any is written.
    pub fn apply(&mut self, update: &RateUpdate, by: AccountId, at: DateTime<Utc>) -> Result<()> {
        let default_rate = update.default_rate.map(Rate::new).transpose()?;
        let shop_rate = update.shop_rate.map(Rate::new).transpose()?;
        let mechanic_rates = update
            .mechanic_rates
            .iter()
            .map(|(tier, value)| Rate::new(*value).map(|rate| (*tier, rate)))
            .collect::<Result<Vec<_>>>()?;

        if default_rate.is_none() && shop_rate.is_none() && mechanic_rates.is_empty() {
            return Err(LifecycleError::ValidationError(
                "Rate update changes nothing".to_string(),
            ));
        }

        if let Some(rate) = default_rate {
            self.default_rate = rate;
        }
        if let Some(rate) = shop_rate {
            self.shop_rate = Some(rate);
        }
        self.mechanic_rates.extend(mechanic_rates);
        self.updated_by = Some(by);
        self.updated_at = Some(at);
        Ok(())
    }
}

/// Administrative change request; absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateUpdate {
    #[serde(default)]
    pub default_rate: Option<Decimal>,
    #[serde(default)]
    pub mechanic_rates: BTreeMap<MechanicTier, Decimal>,
    #[serde(default)]
    pub shop_rate: Option<Decimal>,
}

/// The result of splitting a gross amount between platform and provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionBreakdown {
    pub gross: Money,
    pub rate: Rate,
    pub commission: Money,
    pub payout: Money,
}

/// Splits `gross` into commission and payout.
///
/// The commission is rounded half-up to cents; the payout is the exact remainder and is
/// never rounded on its own, so `commission + payout == gross` always holds. With whole-cent
/// amounts and rates of at most 100% the commission never exceeds the gross; if it somehow
/// did, the split is refused rather than patched.
pub fn compute(
    settings: &CommissionSettings,
    gross: Money,
    classification: ProviderClassification,
) -> Result<CommissionBreakdown> {
    let rate = settings.rate_for(classification);
    let commission = rate.share_of(gross)?;
    let payout = gross.checked_sub(commission).ok_or_else(|| {
        LifecycleError::internal(format!("Commission {commission} exceeds gross {gross}"))
    })?;
    Ok(CommissionBreakdown {
        gross,
        rate,
        commission,
        payout,
    })
}

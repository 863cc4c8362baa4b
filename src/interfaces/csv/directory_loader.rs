use crate::domain::commission::{MechanicTier, ProviderClassification};
use crate::domain::money::Money;
use crate::domain::party::AccountId;
use crate::domain::ports::{CatalogService, PartyProfile};
use crate::domain::request::ServiceId;
use crate::error::{LifecycleError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct CatalogRow {
    id: u64,
    name: String,
    price: Decimal,
}

#[derive(Debug, Deserialize)]
struct ProviderRow {
    id: u64,
    name: String,
    kind: String,
    #[serde(default)]
    tier: Option<String>,
    #[serde(default)]
    contact: Option<String>,
}

fn reader<R: Read>(source: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(source)
}

/// Reads `id,name,price` rows. Unlike command files, one bad row fails the load.
pub fn read_catalog<R: Read>(source: R) -> Result<Vec<CatalogService>> {
    reader(source)
        .into_deserialize::<CatalogRow>()
        .map(|row| {
            let row = row?;
            Ok(CatalogService {
                id: ServiceId(row.id),
                name: row.name,
                price: Money::new(row.price)?,
            })
        })
        .collect()
}

fn classify(kind: &str, tier: Option<&str>) -> Result<ProviderClassification> {
    match kind.trim().to_ascii_lowercase().as_str() {
        "shop" => Ok(ProviderClassification::Shop),
        "mechanic" => {
            let tier = match tier.filter(|t| !t.trim().is_empty()) {
                Some(tier) => MechanicTier::parse(tier).ok_or_else(|| {
                    LifecycleError::ValidationError(format!("Unknown mechanic tier '{tier}'"))
                })?,
                None => MechanicTier::Standard,
            };
            Ok(ProviderClassification::Mechanic(tier))
        }
        "" | "client" => Ok(ProviderClassification::Unclassified),
        other => Err(LifecycleError::ValidationError(format!(
            "Unknown provider kind '{other}'"
        ))),
    }
}

/// Reads `id,name,kind,tier,contact` rows into directory profiles.
pub fn read_profiles<R: Read>(source: R) -> Result<Vec<PartyProfile>> {
    reader(source)
        .into_deserialize::<ProviderRow>()
        .map(|row| {
            let row = row?;
            Ok(PartyProfile {
                id: AccountId(row.id),
                display_name: row.name,
                contact: row.contact,
                classification: classify(&row.kind, row.tier.as_deref())?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_read_catalog() {
        let data = "id,name,price\n7,Brake service,800.00\n8,Wiper fluid,15";
        let services = read_catalog(data.as_bytes()).unwrap();
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].price.value(), dec!(800.00));
    }

    #[test]
    fn test_read_catalog_rejects_negative_price() {
        let data = "id,name,price\n7,Brake service,-1";
        assert!(matches!(
            read_catalog(data.as_bytes()),
            Err(LifecycleError::ValidationError(_))
        ));
    }

    #[test]
    fn test_read_profiles() {
        let data = concat!(
            "id,name,kind,tier,contact\n",
            "10,Ana,mechanic,gold,ana@example.com\n",
            "11,Bolt Shop,shop,,\n",
            "12,Ben,mechanic,,",
        );
        let profiles = read_profiles(data.as_bytes()).unwrap();
        assert_eq!(
            profiles[0].classification,
            ProviderClassification::Mechanic(MechanicTier::Gold)
        );
        assert_eq!(profiles[1].classification, ProviderClassification::Shop);
        assert_eq!(
            profiles[2].classification,
            ProviderClassification::Mechanic(MechanicTier::Standard)
        );
        assert_eq!(profiles[0].contact.as_deref(), Some("ana@example.com"));
    }

    #[test]
    fn test_unknown_tier() {
        let data = "id,name,kind,tier\n10,Ana,mechanic,platinum";
        assert!(read_profiles(data.as_bytes()).is_err());
    }
}

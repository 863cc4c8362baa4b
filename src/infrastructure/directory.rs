use crate::domain::party::AccountId;
use crate::domain::ports::{CatalogService, PartyDirectory, PartyProfile, ServiceCatalog};
use crate::domain::request::ServiceId;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// A catalog snapshot held in memory, typically loaded once at startup.
#[derive(Debug, Default, Clone)]
pub struct StaticCatalog {
    services: HashMap<ServiceId, CatalogService>,
}

impl StaticCatalog {
    pub fn new(services: impl IntoIterator<Item = CatalogService>) -> Self {
        Self {
            services: services
                .into_iter()
                .map(|service| (service.id, service))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[async_trait]
impl ServiceCatalog for StaticCatalog {
    async fn service(&self, id: ServiceId) -> Result<Option<CatalogService>> {
        Ok(self.services.get(&id).cloned())
    }
}

/// Provider and client profiles held in memory.
#[derive(Debug, Default, Clone)]
pub struct StaticDirectory {
    profiles: HashMap<AccountId, PartyProfile>,
}

impl StaticDirectory {
    pub fn new(profiles: impl IntoIterator<Item = PartyProfile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|profile| (profile.id, profile))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[async_trait]
impl PartyDirectory for StaticDirectory {
    async fn profile(&self, id: AccountId) -> Result<Option<PartyProfile>> {
        Ok(self.profiles.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::commission::{MechanicTier, ProviderClassification};
    use crate::domain::money::Money;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_static_catalog_lookup() {
        let catalog = StaticCatalog::new([CatalogService {
            id: ServiceId(7),
            name: "Brake service".into(),
            price: Money::new(dec!(800.00)).unwrap(),
        }]);
        let found = catalog.service(ServiceId(7)).await.unwrap().unwrap();
        assert_eq!(found.price.value(), dec!(800.00));
        assert!(catalog.service(ServiceId(8)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_static_directory_lookup() {
        let directory = StaticDirectory::new([PartyProfile {
            id: AccountId(10),
            display_name: "Ana's Garage".into(),
            contact: None,
            classification: ProviderClassification::Mechanic(MechanicTier::Gold),
        }]);
        let profile = directory.profile(AccountId(10)).await.unwrap().unwrap();
        assert_eq!(
            profile.classification,
            ProviderClassification::Mechanic(MechanicTier::Gold)
        );
        assert!(directory.profile(AccountId(11)).await.unwrap().is_none());
    }
}

//! Coin redemption against the service catalog.

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::ledger::{Ledger, LedgerEntry};
use crate::store::Store;
use crate::types::{Coins, Reason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// One redeemable catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceItem {
    pub service_id: String,
    pub name: String,
    pub coin_cost: Coins,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

pub struct RedemptionDesk {
    store: Store,
    ledger: Ledger,
    clock: Arc<dyn Clock>,
}

impl RedemptionDesk {
    pub fn new(store: Store, ledger: Ledger, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            ledger,
            clock,
        }
    }

    pub fn add_service(&self, name: &str, coin_cost: Coins) -> CoreResult<ServiceItem> {
        if name.trim().is_empty() {
            return Err(CoreError::Validation("service name is required".into()));
        }
        if coin_cost <= 0 {
            return Err(CoreError::Validation(
                "service cost must be positive".into(),
            ));
        }
        let item = ServiceItem {
            service_id: format!("svc-{}", Uuid::new_v4()),
            name: name.trim().to_string(),
            coin_cost,
            active: true,
            created_at: self.clock.now(),
        };
        self.store.insert_service(&item)?;
        Ok(item)
    }

    pub fn list_services(&self) -> CoreResult<Vec<ServiceItem>> {
        self.store.active_services()
    }

    /// Debit the service's cost from the account. Insufficient balance
    /// surfaces from the ledger before anything is written.
    pub fn redeem(&self, account_id: &str, service_id: &str) -> CoreResult<LedgerEntry> {
        let Some(service) = self.store.get_service(service_id)? else {
            return Err(CoreError::Validation(format!(
                "service '{service_id}' not found"
            )));
        };
        if !service.active {
            return Err(CoreError::Validation(format!(
                "service '{}' is not available",
                service.name
            )));
        }
        let entry = self.ledger.apply_delta(
            account_id,
            -service.coin_cost,
            Reason::Redemption,
            Some(&service.service_id),
        )?;
        log::info!(
            "service redeemed account={account_id} service={} cost={}",
            service.service_id,
            service.coin_cost
        );
        Ok(entry)
    }
}

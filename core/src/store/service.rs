//! Redeemable-service catalog reads/writes. Catalog management beyond
//! insert and list belongs to the admin collaborator.

use super::{parse_timestamp, Store};
use crate::error::CoreResult;
use crate::redemption::ServiceItem;
use rusqlite::{params, OptionalExtension, Row};

impl Store {
    pub fn insert_service(&self, s: &ServiceItem) -> CoreResult<()> {
        self.lock().execute(
            "INSERT INTO service (service_id, name, coin_cost, active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                s.service_id,
                s.name,
                s.coin_cost,
                s.active as i32,
                s.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_service(&self, service_id: &str) -> CoreResult<Option<ServiceItem>> {
        let row = self
            .lock()
            .query_row(
                "SELECT service_id, name, coin_cost, active, created_at
                 FROM service WHERE service_id = ?1",
                params![service_id],
                service_row_mapper,
            )
            .optional()?;
        Ok(row)
    }

    pub fn active_services(&self) -> CoreResult<Vec<ServiceItem>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT service_id, name, coin_cost, active, created_at
             FROM service WHERE active = 1 ORDER BY name ASC",
        )?;
        let rows = stmt.query_map([], service_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn service_row_mapper(row: &Row<'_>) -> Result<ServiceItem, rusqlite::Error> {
    Ok(ServiceItem {
        service_id: row.get(0)?,
        name: row.get(1)?,
        coin_cost: row.get(2)?,
        active: row.get::<_, i32>(3)? != 0,
        created_at: parse_timestamp(4, &row.get::<_, String>(4)?)?,
    })
}

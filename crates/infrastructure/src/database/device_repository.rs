use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use domain::device::{
    DeviceLineAssignment, DeviceStatus, DeviceUpsert, DeviceWithAssignment, DiscoveredDevice,
};
use domain::error::DomainResult;
use domain::repository::DeviceRepository;

use super::internal;

pub struct PgDeviceRepository {
    pool: PgPool,
}

impl PgDeviceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const DEVICE_COLUMNS: &str = "id, mac_address, device_type, firmware_version, ip_address, \
     capabilities, first_seen, last_seen, status, metadata, created_at, updated_at";

fn row_to_device(row: &PgRow) -> DomainResult<DiscoveredDevice> {
    let status: String = row.try_get("status").map_err(internal)?;

    Ok(DiscoveredDevice {
        id: row.try_get("id").map_err(internal)?,
        mac_address: row.try_get("mac_address").map_err(internal)?,
        device_type: row.try_get("device_type").map_err(internal)?,
        firmware_version: row.try_get("firmware_version").map_err(internal)?,
        ip_address: row.try_get("ip_address").map_err(internal)?,
        capabilities: row.try_get("capabilities").map_err(internal)?,
        first_seen: row.try_get("first_seen").map_err(internal)?,
        last_seen: row.try_get("last_seen").map_err(internal)?,
        status: DeviceStatus::parse(&status),
        metadata: row.try_get("metadata").map_err(internal)?,
        created_at: row.try_get("created_at").map_err(internal)?,
        updated_at: row.try_get("updated_at").map_err(internal)?,
    })
}

fn row_to_assignment(row: &PgRow) -> DomainResult<DeviceLineAssignment> {
    Ok(DeviceLineAssignment {
        id: row.try_get("id").map_err(internal)?,
        device_mac: row.try_get("device_mac").map_err(internal)?,
        line_id: row.try_get("line_id").map_err(internal)?,
        assigned_at: row.try_get("assigned_at").map_err(internal)?,
        assigned_by: row.try_get("assigned_by").map_err(internal)?,
        active: row.try_get("active").map_err(internal)?,
        created_at: row.try_get("created_at").map_err(internal)?,
        updated_at: row.try_get("updated_at").map_err(internal)?,
    })
}

#[async_trait]
impl DeviceRepository for PgDeviceRepository {
    async fn upsert(&self, device: &DeviceUpsert) -> DomainResult<DiscoveredDevice> {
        let now = Utc::now();

        let row = sqlx::query(&format!(
            "INSERT INTO discovered_devices (
                 mac_address, device_type, firmware_version, ip_address,
                 capabilities, first_seen, last_seen, status, metadata
             ) VALUES ($1, $2, $3, $4, $5, $6, $6, 'online', $7)
             ON CONFLICT (mac_address) DO UPDATE SET
                 device_type = EXCLUDED.device_type,
                 firmware_version = EXCLUDED.firmware_version,
                 ip_address = EXCLUDED.ip_address,
                 capabilities = EXCLUDED.capabilities,
                 last_seen = EXCLUDED.last_seen,
                 status = EXCLUDED.status,
                 metadata = EXCLUDED.metadata,
                 updated_at = now()
             RETURNING {DEVICE_COLUMNS}"
        ))
        .bind(&device.mac_address)
        .bind(&device.device_type)
        .bind(device.firmware_version.as_deref())
        .bind(device.ip_address.as_deref())
        .bind(&device.capabilities)
        .bind(now)
        .bind(&device.metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(internal)?;

        row_to_device(&row)
    }

    async fn get_by_mac(&self, mac: &str) -> DomainResult<Option<DiscoveredDevice>> {
        let row = sqlx::query(&format!(
            "SELECT {DEVICE_COLUMNS} FROM discovered_devices WHERE mac_address = $1"
        ))
        .bind(mac)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;

        row.as_ref().map(row_to_device).transpose()
    }

    async fn list(&self) -> DomainResult<Vec<DeviceWithAssignment>> {
        let rows = sqlx::query(
            "SELECT
                 d.id, d.mac_address, d.device_type, d.firmware_version, d.ip_address,
                 d.capabilities, d.first_seen, d.last_seen, d.status, d.metadata,
                 d.created_at, d.updated_at,
                 dla.line_id AS assigned_line_id,
                 pl.code AS assigned_line_code,
                 pl.name AS assigned_line_name,
                 dla.assigned_at
             FROM discovered_devices d
             LEFT JOIN device_line_assignments dla
                 ON d.mac_address = dla.device_mac AND dla.active = true
             LEFT JOIN production_lines pl
                 ON dla.line_id = pl.id
             ORDER BY d.last_seen DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        let mut devices = Vec::with_capacity(rows.len());
        for row in &rows {
            devices.push(DeviceWithAssignment {
                device: row_to_device(row)?,
                assigned_line_id: row.try_get("assigned_line_id").map_err(internal)?,
                assigned_line_code: row.try_get("assigned_line_code").map_err(internal)?,
                assigned_line_name: row.try_get("assigned_line_name").map_err(internal)?,
                assigned_at: row.try_get("assigned_at").map_err(internal)?,
            });
        }

        Ok(devices)
    }

    async fn mark_seen(&self, mac: &str) -> DomainResult<()> {
        sqlx::query(
            "UPDATE discovered_devices
             SET last_seen = now(), status = 'online', updated_at = now()
             WHERE mac_address = $1",
        )
        .bind(mac)
        .execute(&self.pool)
        .await
        .map_err(internal)?;

        Ok(())
    }

    async fn mark_stale_offline(&self, threshold: Duration) -> DomainResult<u64> {
        let cutoff = Utc::now() - threshold;

        let result = sqlx::query(
            "UPDATE discovered_devices
             SET status = 'offline', updated_at = now()
             WHERE last_seen < $1 AND status = 'online'",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(internal)?;

        Ok(result.rows_affected())
    }

    async fn assign_to_line(
        &self,
        mac: &str,
        line_id: Uuid,
        assigned_by: Option<&str>,
    ) -> DomainResult<()> {
        let mut tx = self.pool.begin().await.map_err(internal)?;

        // Deactivate prior bindings on both sides so the partial unique
        // indices (one active per MAC, one active per line) hold.
        sqlx::query(
            "UPDATE device_line_assignments
             SET active = false, updated_at = now()
             WHERE device_mac = $1 AND active = true",
        )
        .bind(mac)
        .execute(&mut *tx)
        .await
        .map_err(internal)?;

        sqlx::query(
            "UPDATE device_line_assignments
             SET active = false, updated_at = now()
             WHERE line_id = $1 AND active = true",
        )
        .bind(line_id)
        .execute(&mut *tx)
        .await
        .map_err(internal)?;

        sqlx::query(
            "INSERT INTO device_line_assignments (device_mac, line_id, assigned_by, active)
             VALUES ($1, $2, $3, true)",
        )
        .bind(mac)
        .bind(line_id)
        .bind(assigned_by)
        .execute(&mut *tx)
        .await
        .map_err(internal)?;

        tx.commit().await.map_err(internal)
    }

    async fn unassign(&self, mac: &str) -> DomainResult<()> {
        sqlx::query(
            "UPDATE device_line_assignments
             SET active = false, updated_at = now()
             WHERE device_mac = $1 AND active = true",
        )
        .bind(mac)
        .execute(&self.pool)
        .await
        .map_err(internal)?;

        Ok(())
    }

    async fn assignment_for_device(
        &self,
        mac: &str,
    ) -> DomainResult<Option<DeviceLineAssignment>> {
        let row = sqlx::query(
            "SELECT id, device_mac, line_id, assigned_at, assigned_by, active,
                    created_at, updated_at
             FROM device_line_assignments
             WHERE device_mac = $1 AND active = true
             LIMIT 1",
        )
        .bind(mac)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;

        row.as_ref().map(row_to_assignment).transpose()
    }

    async fn assignment_for_line(
        &self,
        line_id: Uuid,
    ) -> DomainResult<Option<DeviceLineAssignment>> {
        let row = sqlx::query(
            "SELECT id, device_mac, line_id, assigned_at, assigned_by, active,
                    created_at, updated_at
             FROM device_line_assignments
             WHERE line_id = $1 AND active = true
             LIMIT 1",
        )
        .bind(line_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;

        row.as_ref().map(row_to_assignment).transpose()
    }
}

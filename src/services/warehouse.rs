//! Works-management warehouse access: USRN geometry lookups and street
//! works statistics over DuckDB (MotherDuck in production).
//!
//! The engine driver is blocking, so every query runs on the blocking pool
//! with a fresh read-only connection, mirroring the per-request connection
//! discipline of the upstream warehouse.

use crate::config::WarehouseConfig;
use crate::error::AppError;
use crate::models::StreetWorksStats;
use crate::services::metrics;
use crate::services::ngd::BoundingBox;
use anyhow::anyhow;
use async_trait::async_trait;
use duckdb::{params, params_from_iter, Connection};
use geo::{BoundingRect, Geometry};
use serde_json::{json, Value};
use std::time::Instant;
use wkt::TryFromWkt;

/// Monthly permit tables contributing to the 12-month works summary.
const PERMIT_MONTH_TABLES: [&str; 12] = [
    "01_2024", "02_2024", "03_2024", "04_2024", "05_2024", "06_2024", "07_2024", "08_2024",
    "09_2024", "10_2024", "11_2024", "12_2024",
];

#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Buffered integer bounding box of the street geometry for a USRN.
    /// Missing USRNs are a not-found error.
    async fn bbox_for_usrn(&self, usrn: &str) -> Result<BoundingBox, AppError>;

    /// Last-month and 12-month street works summaries for a USRN.
    async fn street_works_stats(&self, usrn: &str) -> Result<StreetWorksStats, AppError>;
}

#[derive(Clone)]
pub struct DuckDbWarehouse {
    config: WarehouseConfig,
}

impl DuckDbWarehouse {
    pub fn new(config: WarehouseConfig) -> Self {
        Self { config }
    }

    async fn run_blocking<T, F>(&self, operation: &'static str, job: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(Connection, WarehouseConfig) -> Result<T, AppError> + Send + 'static,
    {
        let config = self.config.clone();
        let started = Instant::now();

        let result = tokio::task::spawn_blocking(move || {
            let conn = open_read_only(&config.database_url)?;
            job(conn, config)
        })
        .await
        .map_err(|e| AppError::InternalError(anyhow!("warehouse task failed: {}", e)))?;

        metrics::record_warehouse_query(operation, started.elapsed().as_secs_f64());
        if result.is_err() {
            metrics::record_warehouse_error(operation);
        }

        result
    }
}

#[async_trait]
impl Warehouse for DuckDbWarehouse {
    async fn bbox_for_usrn(&self, usrn: &str) -> Result<BoundingBox, AppError> {
        let usrn = usrn.to_string();

        self.run_blocking("bbox_for_usrn", move |conn, config| {
            let sql = format!(
                "SELECT geometry FROM {}.{} WHERE usrn = ?",
                config.usrn_schema, config.usrn_table
            );

            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![usrn])?;

            let Some(row) = rows.next()? else {
                tracing::warn!(usrn = %usrn, "No geometry found for USRN");
                return Err(AppError::NotFound(anyhow!(
                    "no geometry found for USRN {}",
                    usrn
                )));
            };

            let geometry_wkt: String = row.get(0)?;
            bbox_from_wkt(&geometry_wkt, config.buffer_distance)
        })
        .await
    }

    async fn street_works_stats(&self, usrn: &str) -> Result<StreetWorksStats, AppError> {
        let usrn = usrn.to_string();

        self.run_blocking("street_works_stats", move |conn, config| {
            let last_month = last_month_rows(&conn, &config, &usrn)?;
            let annual = annual_rows(&conn, &config, &usrn)?;

            if last_month.is_empty() && annual.is_empty() {
                tracing::warn!(usrn = %usrn, "No street works data found for USRN");
            }

            Ok(StreetWorksStats {
                last_month_work_summary: or_no_data(last_month),
                annual_work_summary: or_no_data(annual),
            })
        })
        .await
    }
}

fn open_read_only(database_url: &str) -> Result<Connection, duckdb::Error> {
    let config = duckdb::Config::default().access_mode(duckdb::AccessMode::ReadOnly)?;
    Connection::open_with_flags(database_url, config)
}

fn or_no_data(rows: Vec<Value>) -> Vec<Value> {
    if rows.is_empty() {
        vec![Value::String("NO DATA".to_string())]
    } else {
        rows
    }
}

/// Bounding box of a WKT geometry, widened by the buffer distance and
/// rounded to integer grid coordinates. A square-cap buffer widens the
/// envelope by exactly the buffer distance on each side, so the envelope is
/// expanded directly instead of buffering the geometry itself.
fn bbox_from_wkt(raw: &str, buffer: f64) -> Result<BoundingBox, AppError> {
    let geometry: Geometry<f64> = Geometry::try_from_wkt_str(raw)
        .map_err(|e| AppError::InternalError(anyhow!("invalid USRN geometry WKT: {}", e)))?;

    let rect = geometry
        .bounding_rect()
        .ok_or_else(|| AppError::InternalError(anyhow!("USRN geometry has no extent")))?;

    Ok(BoundingBox {
        min_x: (rect.min().x - buffer).round() as i64,
        min_y: (rect.min().y - buffer).round() as i64,
        max_x: (rect.max().x + buffer).round() as i64,
        max_y: (rect.max().y + buffer).round() as i64,
    })
}

fn last_month_rows(
    conn: &Connection,
    config: &WarehouseConfig,
    usrn: &str,
) -> Result<Vec<Value>, AppError> {
    let sql = last_month_work_summary_sql(config);
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt.query_map(params![usrn, usrn], |row| {
        Ok(json!({
            "highway_authority": text_column(row, 0)?,
            "promoter_organisation": text_column(row, 1)?,
            "work_category": text_column(row, 2)?,
            "activity_type": text_column(row, 3)?,
            "collaborative_working": text_column(row, 4)?,
            "work_count": row.get::<_, i64>(5)?.to_string(),
        }))
    })?;

    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
}

fn annual_rows(
    conn: &Connection,
    config: &WarehouseConfig,
    usrn: &str,
) -> Result<Vec<Value>, AppError> {
    let sql = annual_work_summary_sql(config);
    let mut stmt = conn.prepare(&sql)?;

    let bindings = std::iter::repeat(usrn).take(PERMIT_MONTH_TABLES.len());
    let rows = stmt.query_map(params_from_iter(bindings), |row| {
        Ok(json!({
            "highway_authority": text_column(row, 0)?,
            "promoter_organisation": text_column(row, 1)?,
            "sector": text_column(row, 2)?,
            "work_category": text_column(row, 3)?,
            "total_works": row.get::<_, i64>(4)?.to_string(),
            "collaborative_works": row.get::<_, i64>(5)?.to_string(),
        }))
    })?;

    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
}

fn text_column(row: &duckdb::Row<'_>, index: usize) -> Result<String, duckdb::Error> {
    Ok(row.get::<_, Option<String>>(index)?.unwrap_or_default())
}

/// Completed plus in-progress works for the USRN, grouped into count rows.
fn last_month_work_summary_sql(config: &WarehouseConfig) -> String {
    let grouped = |table: &str| {
        format!(
            "SELECT highway_authority, promoter_organisation, work_category, activity_type, \
             collaborative_working, COUNT(*) AS work_count \
             FROM {}.{} WHERE usrn = ? \
             GROUP BY highway_authority, promoter_organisation, work_category, activity_type, \
             collaborative_working",
            config.street_manager_schema, table
        )
    };

    format!(
        "{}\nUNION ALL\n{}",
        grouped(&config.completed_works_table),
        grouped(&config.in_progress_works_table)
    )
}

/// Distinct completed permits across the monthly tables, with the promoter
/// classified into a sector via the SWA-code reference table.
fn annual_work_summary_sql(config: &WarehouseConfig) -> String {
    let monthly_scans = PERMIT_MONTH_TABLES
        .iter()
        .map(|table| {
            format!(
                "SELECT permit_reference_number, promoter_organisation, promoter_swa_code, \
                 highway_authority, work_category, collaborative_working \
                 FROM {}.\"{}\" \
                 WHERE work_status_ref = 'completed' AND event_type = 'WORK_STOP' AND usrn = ?",
                config.work_summary_schema, table
            )
        })
        .collect::<Vec<_>>()
        .join("\nUNION ALL\n");

    format!(
        r#"WITH base_data AS (
{monthly_scans}
),
distinct_permits AS (
    SELECT DISTINCT
        permit_reference_number,
        promoter_organisation,
        promoter_swa_code,
        highway_authority,
        work_category,
        collaborative_working
    FROM base_data
),
sector_classification AS (
    SELECT
        dp.promoter_organisation,
        dp.promoter_swa_code,
        CASE
            WHEN swa.ofwat_licence IS NOT NULL THEN 'Water'
            WHEN swa.ofgem_electricity_licence IS NOT NULL THEN 'Electricity'
            WHEN swa.ofgem_gas_licence IS NOT NULL THEN 'Gas'
            WHEN swa.ofcom_licence IS NOT NULL THEN 'Telecommunications'
            WHEN swa.swa_code IS NOT NULL THEN 'Highway Authority'
            ELSE 'Other'
        END AS sector
    FROM (SELECT DISTINCT promoter_organisation, promoter_swa_code FROM distinct_permits) dp
    LEFT JOIN {swa_table} swa
        ON CAST(dp.promoter_swa_code AS INT) = CAST(swa.swa_code AS INT)
),
work_analysis AS (
    SELECT
        dp.highway_authority,
        dp.promoter_organisation,
        sc.sector,
        dp.work_category,
        CAST(COUNT(DISTINCT dp.permit_reference_number) AS BIGINT) AS total_works,
        CAST(SUM(CASE WHEN dp.collaborative_working = 'Yes' THEN 1 ELSE 0 END) AS BIGINT) AS collaborative_works
    FROM distinct_permits dp
    LEFT JOIN sector_classification sc
        ON dp.promoter_organisation = sc.promoter_organisation
        AND dp.promoter_swa_code = sc.promoter_swa_code
    GROUP BY dp.highway_authority, dp.promoter_organisation, sc.sector, dp.work_category
)
SELECT highway_authority, promoter_organisation, sector, work_category, total_works, collaborative_works
FROM work_analysis
ORDER BY highway_authority, promoter_organisation, sector, work_category"#,
        swa_table = config.swa_codes_table,
    )
}

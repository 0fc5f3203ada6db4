//! Postgres-backed node store client.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::debug;

use crate::{NodeStore, StoreError};
use stationview_types::StationNode;

/// The single scan the engine requires from the relational store. Rows come
/// back ordered by id so the smallest-id root policy needs no extra sort.
const STATION_NODES_QUERY: &str = "\
    SELECT node_id, parent_node_id, node_name, \
           dynamic_model_id, static_model_id, setitem_model_id, \
           relation_position_id, position_id \
    FROM station_node \
    WHERE station_id = $1 \
    ORDER BY node_id";

/// Node store backed by a Postgres connection pool.
#[derive(Debug, Clone)]
pub struct PgNodeStore {
    pool: PgPool,
}

impl PgNodeStore {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to a Postgres instance by URL.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .connect(url)
            .await
            .map_err(|error| StoreError::nodes("(connect)", error))?;
        debug!("connected to postgres node store");
        Ok(Self { pool })
    }
}

#[async_trait]
impl NodeStore for PgNodeStore {
    async fn station_nodes(&self, station_id: &str) -> Result<Vec<StationNode>, StoreError> {
        let rows = sqlx::query(STATION_NODES_QUERY)
            .bind(station_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| StoreError::nodes(station_id, error))?;

        rows.iter()
            .map(|row| node_from_row(row).map_err(|error| StoreError::nodes(station_id, error)))
            .collect()
    }
}

fn node_from_row(row: &PgRow) -> Result<StationNode, sqlx::Error> {
    Ok(StationNode {
        id: row.try_get("node_id")?,
        parent_id: row.try_get("parent_node_id")?,
        name: row.try_get("node_name")?,
        position_id: row
            .try_get::<Option<String>, _>("position_id")?
            .unwrap_or_default(),
        relation_position_id: row
            .try_get::<Option<String>, _>("relation_position_id")?
            .unwrap_or_default(),
        dynamic_template_id: row.try_get("dynamic_model_id")?,
        static_template_id: row.try_get("static_model_id")?,
        set_item_template_id: row.try_get("setitem_model_id")?,
    })
}

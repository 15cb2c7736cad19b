//! DuckDB destination
//!
//! Datasets map to DuckDB schemas inside one database file.

use super::{sql, Destination, DestinationKind, LoadRecord};
use crate::error::LoadError;
use crate::normalize::{naming, CellValue, Column, LoadPackage, Schema, TableSchema};
use duckdb::{params, params_from_iter, types::Value, Connection};
use std::path::Path;
use tracing::{debug, info, instrument};

pub struct DuckDbDestination {
    conn: Connection,
    dataset: String,
}

impl DuckDbDestination {
    /// Open `<dir>/<pipeline>.duckdb`, or an in-memory database without `dir`
    pub fn open(dir: Option<&Path>, pipeline: &str, dataset: &str) -> Result<Self, LoadError> {
        let dataset = naming::normalize_identifier(dataset);
        if naming::is_reserved(&dataset) {
            return Err(LoadError::InvalidIdentifier(dataset));
        }

        let conn = match dir {
            Some(dir) => {
                let path = DestinationKind::DuckDb.database_path(dir, pipeline);
                info!(path = %path.display(), "Opening DuckDB database");
                Connection::open(&path)?
            },
            None => {
                info!("Opening in-memory DuckDB database");
                Connection::open_in_memory()?
            },
        };

        conn.execute_batch(&format!(
            "CREATE SCHEMA IF NOT EXISTS {}",
            sql::quote_ident(&dataset)
        ))?;

        Ok(Self { conn, dataset })
    }
}

fn to_value(cell: &CellValue) -> Value {
    match cell {
        CellValue::Null => Value::Null,
        CellValue::Bool(b) => Value::Boolean(*b),
        CellValue::BigInt(i) => Value::BigInt(*i),
        CellValue::Double(f) => Value::Double(*f),
        CellValue::Text(s) => Value::Text(s.clone()),
    }
}

impl Destination for DuckDbDestination {
    fn kind(&self) -> DestinationKind {
        DestinationKind::DuckDb
    }

    fn dataset(&self) -> &str {
        &self.dataset
    }

    fn schema(&self) -> Result<Schema, LoadError> {
        let mut stmt = self.conn.prepare(
            "SELECT table_name, column_name, data_type \
             FROM information_schema.columns \
             WHERE table_schema = ? \
             ORDER BY table_name, ordinal_position",
        )?;
        let rows = stmt
            .query_map(params![self.dataset], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut schema = Schema::new();
        let mut current: Option<TableSchema> = None;

        for (table, column, declared) in rows {
            if naming::is_reserved(&table) {
                continue;
            }
            if current.as_ref().is_some_and(|t| t.name != table) {
                if let Some(done) = current.take() {
                    schema.insert(done);
                }
            }
            current
                .get_or_insert_with(|| TableSchema::new(table))
                .add_column(Column::new(column, sql::parse_sql_type(&declared)));
        }
        if let Some(done) = current {
            schema.insert(done);
        }

        Ok(schema)
    }

    #[instrument(skip_all, fields(load_id = %load.load_id, dataset = %self.dataset))]
    fn write(&mut self, package: &LoadPackage, load: &LoadRecord) -> Result<(), LoadError> {
        let tx = self.conn.transaction()?;

        for table in &package.changes.new_tables {
            debug!(table = %table.name, columns = table.columns.len(), "Creating table");
            tx.execute_batch(&sql::create_table(&self.dataset, table))?;
        }

        for (table, column) in &package.changes.new_columns {
            debug!(table = %table, column = %column.name, "Adding column");
            tx.execute_batch(&sql::add_column(&self.dataset, table, column))?;
        }

        for batch in package.batches.iter().filter(|b| !b.rows.is_empty()) {
            let mut stmt = tx.prepare(&sql::insert(&self.dataset, &batch.table, &batch.columns))?;
            for row in &batch.rows {
                stmt.execute(params_from_iter(row.iter().map(to_value)))?;
            }
            debug!(table = %batch.table, rows = batch.rows.len(), "Inserted rows");
        }

        tx.execute_batch(&sql::create_loads_table(&self.dataset))?;
        tx.execute(
            &sql::insert_load(&self.dataset),
            params![
                load.load_id,
                load.pipeline_name,
                load.table_name,
                load.status,
                load.row_count as i64,
                load.inserted_at
            ],
        )?;

        tx.commit()?;
        Ok(())
    }
}

//! SQLite destination
//!
//! The `main` dataset is the main database file. Any other dataset is a
//! separate file attached under the dataset name.

use super::{sql, Destination, DestinationKind, LoadRecord};
use crate::error::LoadError;
use crate::normalize::{naming, CellValue, Column, LoadPackage, Schema, TableSchema};
use rusqlite::{params, params_from_iter, types::Value, Connection};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Schema name of the main database in SQLite
const MAIN_SCHEMA: &str = "main";

pub struct SqliteDestination {
    conn: Connection,
    dataset: String,
}

impl SqliteDestination {
    /// Open `<dir>/<pipeline>.sqlite`, or an in-memory database without `dir`
    pub fn open(dir: Option<&Path>, pipeline: &str, dataset: &str) -> Result<Self, LoadError> {
        let dataset = naming::normalize_identifier(dataset);
        if naming::is_reserved(&dataset) {
            return Err(LoadError::InvalidIdentifier(dataset));
        }

        let conn = match dir {
            Some(dir) => {
                let path = DestinationKind::Sqlite.database_path(dir, pipeline);
                info!(path = %path.display(), "Opening SQLite database");
                Connection::open(&path)?
            },
            None => {
                info!("Opening in-memory SQLite database");
                Connection::open_in_memory()?
            },
        };

        if dataset != MAIN_SCHEMA {
            let file = match dir {
                Some(dir) => dir
                    .join(format!("{}.{}.{}", pipeline, dataset, DestinationKind::Sqlite.extension()))
                    .to_string_lossy()
                    .into_owned(),
                None => ":memory:".to_string(),
            };
            debug!(dataset = %dataset, file = %file, "Attaching dataset");
            conn.execute(
                &format!("ATTACH DATABASE ?1 AS {}", sql::quote_ident(&dataset)),
                params![file],
            )?;
        }

        Ok(Self { conn, dataset })
    }

    fn table_names(&self) -> Result<Vec<String>, LoadError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT name FROM {}.sqlite_master WHERE type = 'table' ORDER BY name",
            sql::quote_ident(&self.dataset)
        ))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(names
            .into_iter()
            .filter(|n| !naming::is_reserved(n) && !n.starts_with("sqlite_"))
            .collect())
    }

    fn table_schema(&self, name: &str) -> Result<TableSchema, LoadError> {
        let mut stmt = self.conn.prepare(&format!(
            "PRAGMA {}.table_info({})",
            sql::quote_ident(&self.dataset),
            sql::quote_ident(name)
        ))?;
        let columns = stmt
            .query_map([], |row| {
                let column: String = row.get(1)?;
                let declared: String = row.get(2)?;
                Ok(Column::new(column, sql::parse_sql_type(&declared)))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TableSchema {
            name: name.to_string(),
            columns,
        })
    }
}

fn to_value(cell: &CellValue) -> Value {
    match cell {
        CellValue::Null => Value::Null,
        CellValue::Bool(b) => Value::Integer(i64::from(*b)),
        CellValue::BigInt(i) => Value::Integer(*i),
        CellValue::Double(f) => Value::Real(*f),
        CellValue::Text(s) => Value::Text(s.clone()),
    }
}

impl Destination for SqliteDestination {
    fn kind(&self) -> DestinationKind {
        DestinationKind::Sqlite
    }

    fn dataset(&self) -> &str {
        &self.dataset
    }

    fn schema(&self) -> Result<Schema, LoadError> {
        let mut schema = Schema::new();
        for name in self.table_names()? {
            schema.insert(self.table_schema(&name)?);
        }
        Ok(schema)
    }

    #[instrument(skip_all, fields(load_id = %load.load_id, dataset = %self.dataset))]
    fn write(&mut self, package: &LoadPackage, load: &LoadRecord) -> Result<(), LoadError> {
        let tx = self.conn.transaction()?;

        for table in &package.changes.new_tables {
            debug!(table = %table.name, columns = table.columns.len(), "Creating table");
            tx.execute(&sql::create_table(&self.dataset, table), [])?;
        }

        for (table, column) in &package.changes.new_columns {
            debug!(table = %table, column = %column.name, "Adding column");
            tx.execute(&sql::add_column(&self.dataset, table, column), [])?;
        }

        for batch in package.batches.iter().filter(|b| !b.rows.is_empty()) {
            let mut stmt = tx.prepare(&sql::insert(&self.dataset, &batch.table, &batch.columns))?;
            for row in &batch.rows {
                stmt.execute(params_from_iter(row.iter().map(to_value)))?;
            }
            debug!(table = %batch.table, rows = batch.rows.len(), "Inserted rows");
        }

        tx.execute(&sql::create_loads_table(&self.dataset), [])?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Normalizer;
    use serde_json::json;

    fn load_record(package: &LoadPackage) -> LoadRecord {
        LoadRecord {
            load_id: package.load_id.clone(),
            pipeline_name: "pouet_prod".to_string(),
            table_name: package.root_table.clone(),
            status: super::super::LOAD_STATUS_COMPLETED,
            row_count: package.root_rows(),
            inserted_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_write_then_read_schema() {
        let mut destination = SqliteDestination::open(None, "pouet_prod", "main").unwrap();

        let package = Normalizer::new(destination.schema().unwrap())
            .normalize(
                &[json!({"id": 1, "name": "Second Reality", "types": ["demo"], "nsfw": false})],
                "pouet_prod",
                "1.0",
            )
            .unwrap();
        destination.write(&package, &load_record(&package)).unwrap();

        let schema = destination.schema().unwrap();
        let names: Vec<_> = schema.tables().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["pouet_prod", "pouet_prod__types"]);

        let root = schema.table("pouet_prod").unwrap();
        assert_eq!(root.column("id").unwrap().data_type, crate::normalize::ColumnType::BigInt);
        assert_eq!(root.column("nsfw").unwrap().data_type, crate::normalize::ColumnType::Bool);

        let loads: i64 = destination
            .conn
            .query_row("SELECT COUNT(*) FROM main._loads", [], |row| row.get(0))
            .unwrap();
        assert_eq!(loads, 1);
    }

    #[test]
    fn test_attached_dataset() {
        let mut destination = SqliteDestination::open(None, "pouet_prod", "demoscene").unwrap();
        assert_eq!(destination.dataset(), "demoscene");

        let package = Normalizer::new(destination.schema().unwrap())
            .normalize(&[json!({"id": 1})], "pouet_prod", "1.0")
            .unwrap();
        destination.write(&package, &load_record(&package)).unwrap();

        let count: i64 = destination
            .conn
            .query_row("SELECT COUNT(*) FROM demoscene.pouet_prod", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_reserved_dataset_rejected() {
        assert!(matches!(
            SqliteDestination::open(None, "pouet_prod", "_private"),
            Err(LoadError::InvalidIdentifier(_))
        ));
    }
}

//! Normalization of JSON records into relational rows
//!
//! Records are opaque JSON values. The [`Normalizer`] turns a batch of them
//! into rows of one root table plus child tables:
//!
//! - nested objects are flattened into the row, path segments joined by `__`
//! - arrays become child tables `<parent>__<path>`, linked by `_parent_id`
//!   and ordered by `_list_idx`
//! - arrays of scalars keep each element in a `value` column
//!
//! Column types are inferred from the values and checked against the schema
//! already present in the destination. A value that does not fit its
//! column goes to a variant column such as `year__v_text`.

pub mod naming;
pub mod schema;

pub use schema::{Column, ColumnType, Schema, SchemaChanges, TableSchema};

use crate::error::LoadError;
use crate::fetch::Record;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// One cell of a normalized row
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    BigInt(i64),
    Double(f64),
    Text(String),
}

impl CellValue {
    /// Type and cell for a JSON scalar; `None` for nulls and containers
    fn from_scalar(value: &Value) -> Option<(ColumnType, CellValue)> {
        match value {
            Value::Bool(b) => Some((ColumnType::Bool, CellValue::Bool(*b))),
            Value::Number(n) => Some(match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => (ColumnType::BigInt, CellValue::BigInt(i)),
                (None, Some(f)) => (ColumnType::Double, CellValue::Double(f)),
                (None, None) => (ColumnType::Text, CellValue::Text(n.to_string())),
            }),
            Value::String(s) => Some((ColumnType::Text, CellValue::Text(s.clone()))),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Nested value kept as JSON text
    fn json(value: &Value) -> (ColumnType, CellValue) {
        (ColumnType::Json, CellValue::Text(value.to_string()))
    }

    /// Adapt the cell to the type of the column it lands in
    fn coerce(self, column: ColumnType) -> Self {
        match (self, column) {
            (CellValue::BigInt(i), ColumnType::Double) => CellValue::Double(i as f64),
            (cell, _) => cell,
        }
    }
}

/// Rows of one table aligned on `columns`
#[derive(Debug, Clone, PartialEq)]
pub struct TableBatch {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl TableBatch {
    /// Value of `column` in row `row`, mostly useful in tests
    pub fn cell(&self, row: usize, column: &str) -> Option<&CellValue> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }
}

/// Everything a destination needs for one load
#[derive(Debug, Clone)]
pub struct LoadPackage {
    pub load_id: String,
    /// Normalized name of the table the records were loaded into
    pub root_table: String,
    pub changes: SchemaChanges,
    /// Batches in the order their tables were first seen, root first
    pub batches: Vec<TableBatch>,
}

impl LoadPackage {
    /// Rows in the root table, one per record
    pub fn root_rows(&self) -> u64 {
        self.batches
            .iter()
            .find(|b| b.table == self.root_table)
            .map_or(0, |b| b.rows.len() as u64)
    }

    /// Row count of every table touched by this load
    pub fn row_counts(&self) -> Vec<(String, u64)> {
        self.batches
            .iter()
            .map(|b| (b.table.clone(), b.rows.len() as u64))
            .collect()
    }
}

type Row = HashMap<String, CellValue>;

/// Turns records into a [`LoadPackage`], evolving a copy of the
/// destination schema as new columns and tables show up.
pub struct Normalizer {
    base: Schema,
    schema: Schema,
    max_table_nesting: Option<usize>,
    rows: Vec<(String, Vec<Row>)>,
}

impl Normalizer {
    /// Start from the schema currently stored in the destination
    pub fn new(base: Schema) -> Self {
        Self {
            schema: base.clone(),
            base,
            max_table_nesting: None,
            rows: Vec::new(),
        }
    }

    /// Arrays below this many child-table levels are stored as JSON text
    pub fn with_max_table_nesting(mut self, depth: Option<usize>) -> Self {
        self.max_table_nesting = depth;
        self
    }

    /// Normalize `records` destined for `table`
    pub fn normalize(
        mut self,
        records: &[Record],
        table: &str,
        load_id: &str,
    ) -> Result<LoadPackage, LoadError> {
        let root = naming::normalize_identifier(table);
        if table.trim().is_empty() || naming::is_reserved(&root) {
            return Err(LoadError::InvalidIdentifier(table.to_string()));
        }

        // Root batch first so it is written before its children
        if !records.is_empty() {
            self.rows.push((root.clone(), Vec::with_capacity(records.len())));
        }

        for record in records {
            self.add_root_row(&root, record, load_id)?;
        }

        let Normalizer { base, schema, rows, .. } = self;
        let changes = schema.diff(&base);

        let batches = rows
            .into_iter()
            .map(|(table, rows)| {
                let columns: Vec<String> = schema
                    .table(&table)
                    .map(|t| t.column_names().map(str::to_string).collect())
                    .unwrap_or_default();
                let rows = rows
                    .into_iter()
                    .map(|mut row| {
                        columns
                            .iter()
                            .map(|c| row.remove(c).unwrap_or(CellValue::Null))
                            .collect()
                    })
                    .collect();
                TableBatch {
                    table,
                    columns,
                    rows,
                }
            })
            .collect::<Vec<_>>();

        debug!(
            load_id = %load_id,
            tables = batches.len(),
            new_tables = changes.new_tables.len(),
            new_columns = changes.new_columns.len(),
            "Normalized records"
        );

        Ok(LoadPackage {
            load_id: load_id.to_string(),
            root_table: root,
            changes,
            batches,
        })
    }

    fn add_root_row(&mut self, table: &str, record: &Record, load_id: &str) -> Result<(), LoadError> {
        let row_id = new_row_id();
        let mut row = Row::new();

        self.set_cell(
            table,
            &mut row,
            naming::LOAD_ID_COLUMN,
            ColumnType::Text,
            CellValue::Text(load_id.to_string()),
        )?;
        self.set_cell(
            table,
            &mut row,
            naming::ROW_ID_COLUMN,
            ColumnType::Text,
            CellValue::Text(row_id.clone()),
        )?;

        match record {
            Value::Object(map) => self.flatten(table, "", map, 0, &mut row, &row_id)?,
            other => self.add_value(table, naming::VALUE_COLUMN, other, 0, &mut row, &row_id)?,
        }

        self.push_row(table, row);
        Ok(())
    }

    fn flatten(
        &mut self,
        table: &str,
        prefix: &str,
        map: &Map<String, Value>,
        depth: usize,
        row: &mut Row,
        row_id: &str,
    ) -> Result<(), LoadError> {
        for (key, value) in map {
            let column = naming::join_path(prefix, &naming::normalize_identifier(key));
            self.add_value(table, &column, value, depth, row, row_id)?;
        }
        Ok(())
    }

    fn add_value(
        &mut self,
        table: &str,
        column: &str,
        value: &Value,
        depth: usize,
        row: &mut Row,
        row_id: &str,
    ) -> Result<(), LoadError> {
        match value {
            Value::Null => Ok(()),
            Value::Object(map) => self.flatten(table, column, map, depth, row, row_id),
            Value::Array(_) if self.nesting_exceeded(depth) => {
                let (data_type, cell) = CellValue::json(value);
                self.set_cell(table, row, column, data_type, cell)
            },
            Value::Array(items) => self.add_children(table, column, items, depth + 1, row_id),
            scalar => match CellValue::from_scalar(scalar) {
                Some((data_type, cell)) => self.set_cell(table, row, column, data_type, cell),
                None => Ok(()),
            },
        }
    }

    fn add_children(
        &mut self,
        parent: &str,
        path: &str,
        items: &[Value],
        depth: usize,
        parent_id: &str,
    ) -> Result<(), LoadError> {
        let child = naming::child_table(parent, path);

        for (idx, item) in items.iter().enumerate() {
            let row_id = new_row_id();
            let mut row = Row::new();

            self.set_cell(
                &child,
                &mut row,
                naming::PARENT_ID_COLUMN,
                ColumnType::Text,
                CellValue::Text(parent_id.to_string()),
            )?;
            self.set_cell(
                &child,
                &mut row,
                naming::LIST_IDX_COLUMN,
                ColumnType::BigInt,
                CellValue::BigInt(idx as i64),
            )?;
            self.set_cell(
                &child,
                &mut row,
                naming::ROW_ID_COLUMN,
                ColumnType::Text,
                CellValue::Text(row_id.clone()),
            )?;

            match item {
                Value::Object(map) => self.flatten(&child, "", map, depth, &mut row, &row_id)?,
                Value::Array(_) => {
                    let (data_type, cell) = CellValue::json(item);
                    self.set_cell(&child, &mut row, naming::VALUE_COLUMN, data_type, cell)?;
                },
                scalar => {
                    self.add_value(&child, naming::VALUE_COLUMN, scalar, depth, &mut row, &row_id)?
                },
            }

            self.push_row(&child, row);
        }

        Ok(())
    }

    fn nesting_exceeded(&self, depth: usize) -> bool {
        matches!(self.max_table_nesting, Some(max) if depth >= max)
    }

    fn set_cell(
        &mut self,
        table: &str,
        row: &mut Row,
        column: &str,
        data_type: ColumnType,
        cell: CellValue,
    ) -> Result<(), LoadError> {
        let (target, target_type) = self.resolve_column(table, column, data_type)?;
        row.insert(target, cell.coerce(target_type));
        Ok(())
    }

    /// Pick the column receiving a value of `data_type`, adding it if needed
    fn resolve_column(
        &mut self,
        table: &str,
        column: &str,
        data_type: ColumnType,
    ) -> Result<(String, ColumnType), LoadError> {
        let schema = self.schema.table_mut(table);

        match schema.column(column).map(|c| c.data_type) {
            None => {
                schema.add_column(Column::new(column, data_type));
                return Ok((column.to_string(), data_type));
            },
            Some(existing) if existing.accepts(data_type) => {
                return Ok((column.to_string(), existing));
            },
            Some(_) => {},
        }

        let variant = naming::variant_column(column, data_type);
        match schema.column(&variant).map(|c| c.data_type) {
            None => {
                debug!(table = %table, column = %variant, "Adding variant column");
                schema.add_column(Column::new(variant.clone(), data_type));
                Ok((variant, data_type))
            },
            Some(existing) if existing.accepts(data_type) => Ok((variant, existing)),
            Some(existing) => Err(LoadError::SchemaConflict {
                table: table.to_string(),
                column: variant,
                expected: existing,
                found: data_type,
            }),
        }
    }

    fn push_row(&mut self, table: &str, row: Row) {
        match self.rows.iter_mut().find(|(name, _)| name == table) {
            Some((_, rows)) => rows.push(row),
            None => self.rows.push((table.to_string(), vec![row])),
        }
    }
}

fn new_row_id() -> String {
    Uuid::new_v4().to_string()
}

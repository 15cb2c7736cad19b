//! SQL text shared by the embedded destinations
//!
//! SQLite and DuckDB agree on double-quoted identifiers, `?` placeholders,
//! schema-qualified names and the type names used here.

use crate::normalize::{naming, Column, ColumnType, TableSchema};

/// Quote an identifier, doubling embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `"dataset"."table"`
pub fn qualified(dataset: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(dataset), quote_ident(table))
}

/// SQL type used to store a column
pub fn sql_type(data_type: ColumnType) -> &'static str {
    match data_type {
        ColumnType::Bool => "BOOLEAN",
        ColumnType::BigInt => "BIGINT",
        ColumnType::Double => "DOUBLE",
        ColumnType::Text | ColumnType::Json => "TEXT",
    }
}

/// Column type for a declared SQL type read back from a catalog
pub fn parse_sql_type(declared: &str) -> ColumnType {
    match declared.trim().to_ascii_uppercase().as_str() {
        "BOOLEAN" | "BOOL" => ColumnType::Bool,
        "BIGINT" | "INTEGER" | "INT" | "INT8" | "INT4" | "HUGEINT" | "SMALLINT" => {
            ColumnType::BigInt
        },
        "DOUBLE" | "REAL" | "FLOAT" | "FLOAT8" | "FLOAT4" => ColumnType::Double,
        "JSON" => ColumnType::Json,
        _ => ColumnType::Text,
    }
}

fn column_definition(column: &Column) -> String {
    format!("{} {}", quote_ident(&column.name), sql_type(column.data_type))
}

pub fn create_table(dataset: &str, table: &TableSchema) -> String {
    let columns = table
        .columns
        .iter()
        .map(column_definition)
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        qualified(dataset, &table.name),
        columns
    )
}

pub fn add_column(dataset: &str, table: &str, column: &Column) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {}",
        qualified(dataset, table),
        column_definition(column)
    )
}

pub fn insert(dataset: &str, table: &str, columns: &[String]) -> String {
    let names = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; columns.len()].join(", ");

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        qualified(dataset, table),
        names,
        placeholders
    )
}

/// Bookkeeping table holding one row per load
pub fn create_loads_table(dataset: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\
         load_id TEXT NOT NULL, \
         pipeline_name TEXT NOT NULL, \
         table_name TEXT NOT NULL, \
         status BIGINT NOT NULL, \
         row_count BIGINT NOT NULL, \
         inserted_at TEXT NOT NULL)",
        qualified(dataset, naming::LOADS_TABLE)
    )
}

pub fn insert_load(dataset: &str) -> String {
    format!(
        "INSERT INTO {} (load_id, pipeline_name, table_name, status, row_count, inserted_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
        qualified(dataset, naming::LOADS_TABLE)
    )
}

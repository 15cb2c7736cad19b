//! Inferred table layout and its evolution between loads

use serde::{Deserialize, Serialize};

/// Logical type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Bool,
    BigInt,
    Double,
    Text,
    /// Nested value serialized as JSON text
    Json,
}

impl ColumnType {
    /// Whether a column of this type can store a value of type `value`
    ///
    /// JSON is stored as text, so text and JSON columns take either.
    pub fn accepts(self, value: ColumnType) -> bool {
        self == value
            || matches!(
                (self, value),
                (ColumnType::Double, ColumnType::BigInt)
                    | (ColumnType::Text, ColumnType::Json)
                    | (ColumnType::Json, ColumnType::Text)
            )
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::Bool => write!(f, "bool"),
            ColumnType::BigInt => write!(f, "bigint"),
            ColumnType::Double => write!(f, "double"),
            ColumnType::Text => write!(f, "text"),
            ColumnType::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Columns of one table, in creation order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<Column>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn add_column(&mut self, column: Column) {
        self.columns.push(column);
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// All tables of a dataset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    tables: Vec<TableSchema>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Add or replace a table
    pub fn insert(&mut self, table: TableSchema) {
        match self.tables.iter_mut().find(|t| t.name == table.name) {
            Some(existing) => *existing = table,
            None => self.tables.push(table),
        }
    }

    /// Table `name`, created empty if missing
    pub fn table_mut(&mut self, name: &str) -> &mut TableSchema {
        let idx = match self.tables.iter().position(|t| t.name == name) {
            Some(idx) => idx,
            None => {
                self.tables.push(TableSchema::new(name));
                self.tables.len() - 1
            },
        };
        &mut self.tables[idx]
    }

    /// What must be created in `base` to reach `self`
    pub fn diff(&self, base: &Schema) -> SchemaChanges {
        let mut changes = SchemaChanges::default();

        for table in &self.tables {
            match base.table(&table.name) {
                None => changes.new_tables.push(table.clone()),
                Some(existing) => {
                    for column in &table.columns {
                        if existing.column(&column.name).is_none() {
                            changes
                                .new_columns
                                .push((table.name.clone(), column.clone()));
                        }
                    }
                },
            }
        }

        changes
    }
}

/// DDL needed before rows can be inserted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaChanges {
    pub new_tables: Vec<TableSchema>,
    /// `(table, column)` pairs added to existing tables
    pub new_columns: Vec<(String, Column)>,
}

impl SchemaChanges {
    pub fn is_empty(&self) -> bool {
        self.new_tables.is_empty() && self.new_columns.is_empty()
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a table registered in an external catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableIdent {
    /// Name of the catalog the table is registered in
    pub catalog: String,
    /// Database (namespace) containing the table
    pub database: String,
    /// Table name
    pub table: String,
}

impl TableIdent {
    /// Create a new [`TableIdent`]
    pub fn new(
        catalog: impl Into<String>,
        database: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            catalog: catalog.into(),
            database: database.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.catalog, self.database, self.table)
    }
}

/// Column types understood by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum PrimitiveType {
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Date,
    Timestamp,
    String,
    Binary,
    Decimal { precision: u8, scale: u8 },
}

/// A column of the logical table schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Column type
    pub data_type: PrimitiveType,
    /// Whether the column accepts nulls
    pub nullable: bool,
}

impl Column {
    /// Create a new [`Column`]
    pub fn new(name: impl Into<String>, data_type: PrimitiveType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }
}

/// A logical table bound to an external catalog entry.
///
/// Handed to the planner by the query analyzer and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReference {
    ident: TableIdent,
    columns: Vec<Column>,
}

impl TableReference {
    /// Create a new [`TableReference`]
    pub fn new(ident: TableIdent, columns: impl IntoIterator<Item = Column>) -> Self {
        Self {
            ident,
            columns: columns.into_iter().collect(),
        }
    }

    /// Catalog identity of the table
    pub fn ident(&self) -> &TableIdent {
        &self.ident
    }

    /// Ordered column schema
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

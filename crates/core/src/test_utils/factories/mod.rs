use crate::kernel::{Column, PrimitiveType, TableIdent, TableReference};

mod tasks;

pub use tasks::*;

pub struct TableFactory;

impl TableFactory {
    pub fn ident() -> TableIdent {
        TableIdent::new("iceberg_catalog", "db", "table")
    }

    /// Table with a single nullable bigint column
    pub fn reference() -> TableReference {
        TableReference::new(
            Self::ident(),
            [Column::new("col1", PrimitiveType::Long, true)],
        )
    }
}

//! Table metadata of record types.

use recordflow_store::TableDef;

/// The table a record type maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableSchema {
    /// Table name.
    pub name: &'static str,
    /// Primary key columns.
    pub primary_key: &'static [&'static str],
    /// Column the store fills on insert.
    pub auto_increment: Option<&'static str>,
}

impl TableSchema {
    /// Declares a table.
    #[must_use]
    pub const fn new(name: &'static str, primary_key: &'static [&'static str]) -> Self {
        Self {
            name,
            primary_key,
            auto_increment: None,
        }
    }

    /// Marks `column` as store-generated.
    #[must_use]
    pub const fn auto_increment(mut self, column: &'static str) -> Self {
        self.auto_increment = Some(column);
        self
    }

    /// The matching in-memory table declaration.
    #[must_use]
    pub fn table_def(&self) -> TableDef {
        let def = TableDef::new(self.name).primary_key(self.primary_key.iter().copied());
        match self.auto_increment {
            Some(column) => def.auto_increment(column),
            None => def,
        }
    }
}

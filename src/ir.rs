//! Schema intermediate representation.
//!
//! The entity graph shared by both parsers and the translator:
//! Database -> Schema -> {Table, Enum, View}, Table -> Column,
//! Column -> ForeignKey. Relationships are derived by the resolver,
//! never authored directly.

use thiserror::Error;

/// Schema that unqualified entities land in.
pub const DEFAULT_SCHEMA: &str = "public";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("duplicate schema \"{0}\" in database")]
    DuplicateSchema(String),
    #[error("duplicate table \"{schema}.{table}\"")]
    DuplicateTable { schema: String, table: String },
    #[error("duplicate column \"{column}\" in table \"{table}\"")]
    DuplicateColumn { table: String, column: String },
    #[error("duplicate value \"{value}\" in enum \"{name}\"")]
    DuplicateEnumValue { name: String, value: String },
}

/// One logical type spelled for each target dialect.
///
/// All three fields are non-empty. A dialect without a native
/// equivalent holds the closest lexical fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct DataType {
    pub dbml: String,
    pub sqlalchemy: String,
    pub sql: String,
}

impl DataType {
    pub fn new(
        dbml: impl Into<String>,
        sqlalchemy: impl Into<String>,
        sql: impl Into<String>,
    ) -> Self {
        Self {
            dbml: dbml.into(),
            sqlalchemy: sqlalchemy.into(),
            sql: sql.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Database {
    pub name: String,
    pub schemas: Vec<Schema>,
    pub note: Option<String>,
}

impl Database {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schemas: Vec::new(),
            note: None,
        }
    }

    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.schemas.iter().find(|s| s.name == name)
    }

    /// Get or create the schema with the given name. Schemas appear in
    /// first-mention order.
    pub fn schema_mut(&mut self, name: &str) -> &mut Schema {
        if let Some(idx) = self.schemas.iter().position(|s| s.name == name) {
            &mut self.schemas[idx]
        } else {
            self.schemas.push(Schema::new(name));
            self.schemas.last_mut().unwrap()
        }
    }

    /// Look up a table by bare name anywhere in the database.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.schemas.iter().find_map(|s| s.table(name))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub name: String,
    pub tables: Vec<Table>,
    pub enums: Vec<Enum>,
    pub views: Vec<View>,
    pub note: Option<String>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
            enums: Vec::new(),
            views: Vec::new(),
            note: None,
        }
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn push_table(&mut self, table: Table) -> Result<(), ValidationError> {
        if self.table(&table.name).is_some() {
            return Err(ValidationError::DuplicateTable {
                schema: self.name.clone(),
                table: table.name,
            });
        }
        self.tables.push(table);
        Ok(())
    }
}

/// Columns keep declaration order; names are unique within the table,
/// enforced by [`Table::push_column`].
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Owning schema name. Informational only; traversal starts at
    /// [`Database`].
    pub schema: String,
    pub name: String,
    pub columns: Vec<Column>,
    /// Filled by the resolver for junction tables.
    pub relationships: Vec<Relationship>,
    pub note: Option<String>,
}

impl Table {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            columns: Vec::new(),
            relationships: Vec::new(),
            note: None,
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Append a column, stamping its owner back-reference.
    pub fn push_column(&mut self, mut column: Column) -> Result<(), ValidationError> {
        if self.column(&column.name).is_some() {
            return Err(ValidationError::DuplicateColumn {
                table: self.name.clone(),
                column: column.name,
            });
        }
        column.owner = self.name.clone();
        self.columns.push(column);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub unique: bool,
    pub default_value: Option<String>,
    /// Raw CHECK predicate, kept verbatim.
    pub check: Option<String>,
    /// Raw EXCLUDE predicate, kept verbatim.
    pub exclude: Option<String>,
    /// Zero or one in practice; composite keys are not modeled.
    pub foreign_keys: Vec<ForeignKey>,
    /// Name of the owning table, set when the column is attached.
    /// Informational only.
    pub owner: String,
    pub note: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            primary_key: false,
            auto_increment: false,
            unique: false,
            default_value: None,
            check: None,
            exclude: None,
            foreign_keys: Vec::new(),
            owner: String::new(),
            note: None,
        }
    }
}

/// A directed edge from the owning column to one (table, column) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
}

/// A derived many-to-many join path between two referenced tables,
/// witnessed by the foreign keys of a junction table.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub table1: String,
    pub table2: String,
    /// Junction columns carrying the witnessing foreign keys.
    pub column1: String,
    pub column2: String,
    pub foreign_keys: Vec<ForeignKey>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enum {
    pub name: String,
    pub values: Vec<String>,
    pub note: Option<String>,
}

impl Enum {
    /// Build an enum, rejecting duplicate values.
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        for (i, value) in values.iter().enumerate() {
            if values[..i].contains(value) {
                return Err(ValidationError::DuplicateEnumValue {
                    name,
                    value: value.clone(),
                });
            }
        }
        Ok(Self {
            name,
            values,
            note: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct View {
    /// Owning schema name, informational as for [`Table`].
    pub schema: String,
    pub name: String,
    /// Opaque SQL text, never interpreted.
    pub query: String,
    /// Explicit view columns, when the source dialect declares them.
    pub columns: Vec<String>,
    pub note: Option<String>,
}

impl View {
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            query: query.into(),
            columns: Vec::new(),
            note: None,
        }
    }
}

/// Borrowed reference to any IR entity: the closed variant set the
/// translator dispatches over.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    DataType(&'a DataType),
    Column(&'a Column),
    Table(&'a Table),
    Schema(&'a Schema),
    Database(&'a Database),
    Enum(&'a Enum),
    View(&'a View),
    Relationship(&'a Relationship),
}

impl Node<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Node::DataType(_) => "data type",
            Node::Column(_) => "column",
            Node::Table(_) => "table",
            Node::Schema(_) => "schema",
            Node::Database(_) => "database",
            Node::Enum(_) => "enum",
            Node::View(_) => "view",
            Node::Relationship(_) => "relationship",
        }
    }
}

macro_rules! impl_node_from {
    ($variant:ident, $ty:ty) => {
        impl<'a> From<&'a $ty> for Node<'a> {
            fn from(value: &'a $ty) -> Self {
                Node::$variant(value)
            }
        }
    };
}

impl_node_from!(DataType, DataType);
impl_node_from!(Column, Column);
impl_node_from!(Table, Table);
impl_node_from!(Schema, Schema);
impl_node_from!(Database, Database);
impl_node_from!(Enum, Enum);
impl_node_from!(View, View);
impl_node_from!(Relationship, Relationship);

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> DataType {
        DataType::new("int", "Integer", "int")
    }

    #[test]
    fn test_push_column_sets_owner() {
        let mut table = Table::new("public", "users");
        table.push_column(Column::new("id", int())).unwrap();
        assert_eq!(table.columns[0].owner, "users");
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let mut table = Table::new("public", "users");
        table.push_column(Column::new("id", int())).unwrap();
        let err = table.push_column(Column::new("id", int())).unwrap_err();
        assert_eq!(
            err,
            ValidationError::DuplicateColumn {
                table: "users".into(),
                column: "id".into(),
            }
        );
    }

    #[test]
    fn test_duplicate_table_rejected() {
        let mut schema = Schema::new("public");
        schema.push_table(Table::new("public", "users")).unwrap();
        let err = schema.push_table(Table::new("public", "users")).unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateTable { .. }));
    }

    #[test]
    fn test_duplicate_enum_value_rejected() {
        let err = Enum::new("status", vec!["active".into(), "active".into()]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::DuplicateEnumValue {
                name: "status".into(),
                value: "active".into(),
            }
        );
    }

    #[test]
    fn test_schema_mut_get_or_create() {
        let mut db = Database::new("app");
        db.schema_mut("public");
        db.schema_mut("audit");
        db.schema_mut("public");
        assert_eq!(db.schemas.len(), 2);
        assert_eq!(db.schemas[0].name, "public");
        assert_eq!(db.schemas[1].name, "audit");
    }

    #[test]
    fn test_database_table_lookup_spans_schemas() {
        let mut db = Database::new("app");
        db.schema_mut("audit")
            .push_table(Table::new("audit", "events"))
            .unwrap();
        assert!(db.table("events").is_some());
        assert!(db.table("missing").is_none());
    }
}

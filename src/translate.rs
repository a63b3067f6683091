//! Stateless rendering of IR nodes into each target dialect.
//!
//! Every function here is a pure structural recursion over its input
//! node; rendering the same node twice yields the same text, and
//! disjoint sub-trees can be rendered independently.

use crate::ir::{Column, DataType, Database, Enum, Node, Schema, Table, View};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Dbml,
    Sql,
    Orm,
}

impl Target {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "dbml" => Some(Self::Dbml),
            "sql" => Some(Self::Sql),
            "orm" | "sqlalchemy" => Some(Self::Orm),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Dbml => "DBML",
            Self::Sql => "SQL",
            Self::Orm => "ORM",
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TranslationError {
    #[error("no {target} rendering for {kind} nodes")]
    Unsupported {
        kind: &'static str,
        target: &'static str,
    },
}

/// Render any IR node into the given dialect.
///
/// Total over the node variant set: the one variant without a textual
/// form is [`Node::Relationship`], derived join metadata, and asking
/// for it is an error rather than silent omission.
pub fn render(node: Node<'_>, target: Target) -> Result<String, TranslationError> {
    match node {
        Node::DataType(dt) => Ok(data_type(dt, target)),
        Node::Column(column) => Ok(column_text(column, target)),
        Node::Table(table) => Ok(table_text(table, target)),
        Node::Schema(schema) => Ok(schema_text(schema, target)),
        Node::Database(database) => Ok(database_text(database, target)),
        Node::Enum(item) => Ok(enum_text(item, target)),
        Node::View(view) => Ok(view_text(view, target)),
        Node::Relationship(_) => Err(TranslationError::Unsupported {
            kind: "relationship",
            target: target.label(),
        }),
    }
}

pub fn to_dbml<'a>(node: impl Into<Node<'a>>) -> Result<String, TranslationError> {
    render(node.into(), Target::Dbml)
}

pub fn to_sql<'a>(node: impl Into<Node<'a>>) -> Result<String, TranslationError> {
    render(node.into(), Target::Sql)
}

pub fn to_orm<'a>(node: impl Into<Node<'a>>) -> Result<String, TranslationError> {
    render(node.into(), Target::Orm)
}

fn data_type(dt: &DataType, target: Target) -> String {
    match target {
        Target::Dbml => dt.dbml.clone(),
        Target::Sql => dt.sql.clone(),
        Target::Orm => dt.sqlalchemy.clone(),
    }
}

/// Flags always render in the same order regardless of how the source
/// spelled them: not-null, then pk, then the remaining settings, then
/// the foreign key.
fn column_text(column: &Column, target: Target) -> String {
    match target {
        Target::Dbml => {
            let mut settings: Vec<String> = Vec::new();
            if !column.nullable {
                settings.push("not null".into());
            }
            if column.primary_key {
                settings.push("pk".into());
            }
            if column.auto_increment {
                settings.push("increment".into());
            }
            if column.unique {
                settings.push("unique".into());
            }
            if let Some(value) = &column.default_value {
                settings.push(format!("default: {}", value));
            }
            for fk in &column.foreign_keys {
                settings.push(format!("ref: > {}.{}", name_text(&fk.table), name_text(&fk.column)));
            }

            let mut out = format!("{} {}", name_text(&column.name), column.data_type.dbml);
            if !settings.is_empty() {
                out.push_str(&format!(" [{}]", settings.join(", ")));
            }
            out
        }
        Target::Sql => {
            let mut out = format!("\"{}\" {}", column.name, column.data_type.sql);
            if !column.nullable {
                out.push_str(" NOT NULL");
            }
            if column.primary_key {
                out.push_str(" PRIMARY KEY");
            }
            if column.unique {
                out.push_str(" UNIQUE");
            }
            if let Some(value) = &column.default_value {
                out.push_str(&format!(" DEFAULT {}", sql_literal(value)));
            }
            if let Some(predicate) = &column.check {
                out.push_str(&format!(" CHECK ({})", predicate));
            }
            for fk in &column.foreign_keys {
                out.push_str(&format!(" REFERENCES {}({})", fk.table, fk.column));
            }
            out
        }
        Target::Orm => {
            let mut out = format!("{} = Column({}", column.name, column.data_type.sqlalchemy);
            if !column.nullable {
                out.push_str(", nullable=False");
            }
            if column.primary_key {
                out.push_str(", primary_key=True");
            }
            if column.unique {
                out.push_str(", unique=True");
            }
            if let Some(value) = &column.default_value {
                out.push_str(&format!(", default={}", value));
            }
            for fk in &column.foreign_keys {
                out.push_str(&format!(", ForeignKey(\"{}.{}\")", fk.table, fk.column));
            }
            out.push(')');
            out
        }
    }
}

fn table_text(table: &Table, target: Target) -> String {
    match target {
        Target::Dbml => {
            let mut out = comment_lines(table.note.as_deref(), "//");
            out.push_str(&format!(
                "Table {}.{} {{\n",
                name_text(&table.schema),
                name_text(&table.name)
            ));
            for column in &table.columns {
                out.push_str(&comment_lines_indented(column.note.as_deref(), "//"));
                out.push_str("    ");
                out.push_str(&column_text(column, target));
                out.push('\n');
            }
            out.push('}');
            out
        }
        Target::Sql => {
            let mut out = comment_lines(table.note.as_deref(), "--");
            let columns: Vec<String> = table
                .columns
                .iter()
                .map(|c| column_text(c, target))
                .collect();
            out.push_str(&format!(
                "CREATE TABLE \"{}\" (\n{}\n);",
                table.name,
                columns.join(",\n")
            ));
            out
        }
        Target::Orm => {
            let mut out = comment_lines(table.note.as_deref(), "#");
            out.push_str(&format!(
                "class {}(Base):\n    __tablename__ = \"{}\"",
                table.name, table.name
            ));
            for column in &table.columns {
                out.push_str("\n    ");
                out.push_str(&column_text(column, target));
            }
            out
        }
    }
}

fn enum_text(item: &Enum, target: Target) -> String {
    match target {
        Target::Dbml => {
            let values: Vec<String> = item
                .values
                .iter()
                .map(|v| format!("\"{}\"", escape_double(v)))
                .collect();
            let mut out = comment_lines(item.note.as_deref(), "//");
            out.push_str(&format!(
                "Enum \"{}\" {{ {} }}",
                escape_double(&item.name),
                values.join(", ")
            ));
            out
        }
        Target::Sql => {
            let values: Vec<String> = item.values.iter().map(|v| format!("'{}'", v)).collect();
            let mut out = comment_lines(item.note.as_deref(), "--");
            out.push_str(&format!(
                "CREATE TYPE {} AS ENUM ({});",
                item.name,
                values.join(", ")
            ));
            out
        }
        Target::Orm => {
            let values: Vec<String> = item.values.iter().map(|v| format!("\"{}\"", v)).collect();
            let mut out = comment_lines(item.note.as_deref(), "#");
            out.push_str(&format!("{} = Enum({})", item.name, values.join(", ")));
            out
        }
    }
}

fn view_text(view: &View, target: Target) -> String {
    match target {
        Target::Dbml => {
            let mut out = comment_lines(view.note.as_deref(), "//");
            out.push_str(&format!(
                "View {}.{} As SQL\n{}\nEnd",
                name_text(&view.schema),
                name_text(&view.name),
                view.query
            ));
            out
        }
        Target::Sql => {
            let mut out = comment_lines(view.note.as_deref(), "--");
            out.push_str(&view.query);
            out
        }
        // A view has no first-class ORM mapping analog; say so
        // instead of failing or dropping it.
        Target::Orm => format!(
            "# No ORM mapping for view \"{}\"; consider a select() construct instead.",
            view.name
        ),
    }
}

fn schema_text(schema: &Schema, target: Target) -> String {
    let mut parts: Vec<String> = Vec::new();
    for item in &schema.enums {
        parts.push(enum_text(item, target));
    }
    for table in &schema.tables {
        parts.push(table_text(table, target));
    }
    for view in &schema.views {
        parts.push(view_text(view, target));
    }

    let separator = match target {
        Target::Dbml | Target::Sql => "\n",
        Target::Orm => "\n\n",
    };
    let mut out = comment_lines(
        schema.note.as_deref(),
        comment_prefix(target),
    );
    out.push_str(&parts.join(separator));
    out
}

fn database_text(database: &Database, target: Target) -> String {
    let mut out = comment_lines(database.note.as_deref(), comment_prefix(target));
    match target {
        Target::Dbml => {
            let schemas: Vec<String> = database
                .schemas
                .iter()
                .map(|s| schema_text(s, target))
                .collect();
            out.push_str(&format!(
                "Project \"{}\" {{\n{}\n}}",
                escape_double(&database.name),
                schemas.join("\n")
            ));
        }
        Target::Sql => {
            let schemas: Vec<String> = database
                .schemas
                .iter()
                .map(|s| schema_text(s, target))
                .collect();
            out.push_str(&schemas.join("\n"));
        }
        Target::Orm => {
            let schemas: Vec<String> = database
                .schemas
                .iter()
                .map(|s| schema_text(s, target))
                .collect();
            out.push_str(&schemas.join("\n\n"));
        }
    }
    out
}

fn comment_prefix(target: Target) -> &'static str {
    match target {
        Target::Dbml => "//",
        Target::Sql => "--",
        Target::Orm => "#",
    }
}

/// Notes pass through as verbatim comment lines, one per source line.
fn comment_lines(note: Option<&str>, prefix: &str) -> String {
    match note {
        Some(note) => note
            .lines()
            .map(|line| format!("{} {}\n", prefix, line))
            .collect(),
        None => String::new(),
    }
}

fn comment_lines_indented(note: Option<&str>, prefix: &str) -> String {
    match note {
        Some(note) => note
            .lines()
            .map(|line| format!("    {} {}\n", prefix, line))
            .collect(),
        None => String::new(),
    }
}

/// Bare identifier when the lexer would read it back as one word,
/// quoted otherwise.
fn name_text(name: &str) -> String {
    let mut chars = name.chars();
    let bare = match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if bare {
        name.to_string()
    } else {
        format!("\"{}\"", escape_double(name))
    }
}

fn escape_double(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Stored defaults keep DBML-style double quotes around string
/// literals; SQL wants single quotes.
fn sql_literal(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        format!("'{}'", &value[1..value.len() - 1])
    } else {
        value.to_string()
    }
}

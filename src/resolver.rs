//! Post-parse reference resolution: foreign-key validation and
//! many-to-many inference from junction tables.

use crate::ir::{Column, Database, ForeignKey, Relationship, Table};
use crate::lexer::Pos;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolutionError {
    #[error("table \"{table}\" has no column \"{column}\" (Ref at {pos})")]
    UnknownColumn {
        table: String,
        column: String,
        pos: Pos,
    },
}

/// A foreign key whose target was not found anywhere in the database.
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedRef {
    pub table: String,
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

/// Outcome of resolution: the best-effort database plus every foreign
/// key that failed to validate. Whether unresolved references are
/// fatal is the caller's decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub database: Database,
    pub unresolved: Vec<UnresolvedRef>,
}

/// Validate every foreign key against the full database and derive
/// junction-table relationships. Runs once, after either parser.
pub fn resolve(mut database: Database) -> Resolution {
    let unresolved = validate_references(&database);
    for schema in &mut database.schemas {
        for table in &mut schema.tables {
            table.relationships = junction_relationships(table);
        }
    }
    Resolution {
        database,
        unresolved,
    }
}

fn validate_references(database: &Database) -> Vec<UnresolvedRef> {
    let mut unresolved = Vec::new();
    for schema in &database.schemas {
        for table in &schema.tables {
            for column in &table.columns {
                for fk in &column.foreign_keys {
                    let found = database
                        .table(&fk.table)
                        .and_then(|t| t.column(&fk.column))
                        .is_some();
                    if !found {
                        log::warn!(
                            "unresolved reference {}.{} -> {}.{}",
                            table.name,
                            column.name,
                            fk.table,
                            fk.column
                        );
                        unresolved.push(UnresolvedRef {
                            table: table.name.clone(),
                            column: column.name.clone(),
                            referenced_table: fk.table.clone(),
                            referenced_column: fk.column.clone(),
                        });
                    }
                }
            }
        }
    }
    unresolved
}

/// A table is a junction candidate only when it has at least two
/// columns and every one of them carries a foreign key. Each distinct
/// unordered pair of referenced tables yields exactly one
/// relationship.
fn junction_relationships(table: &Table) -> Vec<Relationship> {
    if table.columns.len() < 2
        || table.columns.iter().any(|c| c.foreign_keys.is_empty())
    {
        return Vec::new();
    }

    let witnesses: Vec<(&Column, &ForeignKey)> = table
        .columns
        .iter()
        .map(|c| (c, &c.foreign_keys[0]))
        .collect();

    let mut relationships: Vec<Relationship> = Vec::new();
    for (i, (col1, fk1)) in witnesses.iter().enumerate() {
        for (col2, fk2) in &witnesses[i + 1..] {
            if fk1.table == fk2.table {
                continue;
            }
            let seen = relationships.iter().any(|r| {
                (r.table1 == fk1.table && r.table2 == fk2.table)
                    || (r.table1 == fk2.table && r.table2 == fk1.table)
            });
            if seen {
                continue;
            }
            relationships.push(Relationship {
                table1: fk1.table.clone(),
                table2: fk2.table.clone(),
                column1: col1.name.clone(),
                column2: col2.name.clone(),
                foreign_keys: vec![(*fk1).clone(), (*fk2).clone()],
            });
        }
    }
    relationships
}

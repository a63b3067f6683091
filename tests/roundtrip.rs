//! End-to-end properties: DBML round-trip fidelity, rendering
//! determinism, and cross-dialect flows.

use pretty_assertions::assert_eq;
use schemaglot::ir::Node;
use schemaglot::parser::parse_dbml;
use schemaglot::resolver::resolve;
use schemaglot::sql::parse_sql;
use schemaglot::translate::{Target, render, to_dbml, to_sql};
use schemaglot::{SourceFormat, translate};

const EXAMPLE: &str = "Project \"p\" { Table public.users { id int [pk] name text [not null] } }";

#[test]
fn example_parses_into_expected_ir() {
    let db = parse_dbml(EXAMPLE).unwrap();
    assert_eq!(db.name, "p");
    assert_eq!(db.schemas.len(), 1);

    let schema = &db.schemas[0];
    assert_eq!(schema.name, "public");
    assert_eq!(schema.tables.len(), 1);

    let users = &schema.tables[0];
    assert_eq!(users.name, "users");
    assert_eq!(users.columns.len(), 2);

    let id = &users.columns[0];
    assert_eq!(id.name, "id");
    assert_eq!(id.data_type.dbml, "int");
    assert!(id.primary_key);
    assert!(id.nullable);

    let name = &users.columns[1];
    assert_eq!(name.name, "name");
    assert_eq!(name.data_type.dbml, "text");
    assert!(!name.nullable);
    assert!(!name.primary_key);
}

#[test]
fn example_renders_to_expected_sql() {
    let db = parse_dbml(EXAMPLE).unwrap();
    let users = db.table("users").unwrap();
    assert_eq!(
        to_sql(users).unwrap(),
        "CREATE TABLE \"users\" (\n\"id\" int PRIMARY KEY,\n\"name\" text NOT NULL\n);"
    );
}

fn assert_round_trips(input: &str) {
    let first = parse_dbml(input).unwrap();
    let rendered = to_dbml(&first).unwrap();
    let second = parse_dbml(&rendered).unwrap_or_else(|e| {
        panic!("rendered document failed to re-parse: {e}\n{rendered}")
    });
    assert_eq!(first, second, "round-trip changed the IR:\n{rendered}");
}

#[test]
fn round_trip_example() {
    assert_round_trips(EXAMPLE);
}

#[test]
fn round_trip_full_feature_document() {
    assert_round_trips(
        r#"
        Project "shop" {
            Enum "status" { "open", "shipped", "cancelled" }
            Table public.users {
                id int [pk, increment]
                email varchar(255) [not null, unique]
                bio text
                joined timestamp [default: now()]
            }
            Table public.orders {
                id int [pk]
                user_id int [not null]
                state text [default: "open"]
                total decimal(10,2)
                Ref: orders.user_id > users.id
            }
            View public.open_orders As SQL
            SELECT * FROM orders WHERE state = 'open'
            End
        }
    "#,
    );
}

#[test]
fn round_trip_multiple_schemas_and_quoted_names() {
    assert_round_trips(
        r#"
        Project "warehouse" {
            Table stock.items {
                id int [pk]
            }
            Table audit."event log" {
                id int [pk]
                "recorded at" timestamp [not null]
                item_id int [ref: > items.id]
            }
        }
    "#,
    );
}

#[test]
fn rendering_is_deterministic() {
    let db = parse_dbml(EXAMPLE).unwrap();
    for target in [Target::Dbml, Target::Sql, Target::Orm] {
        assert_eq!(
            render(Node::Database(&db), target).unwrap(),
            render(Node::Database(&db), target).unwrap()
        );
    }
}

#[test]
fn junction_table_inference_end_to_end() {
    let input = r#"
        Project "p" {
            Table public.users { id int [pk] }
            Table public.groups { id int [pk] }
            Table public.memberships {
                user_id int [ref: > users.id]
                group_id int [ref: > groups.id]
            }
        }
    "#;
    let resolution = resolve(parse_dbml(input).unwrap());
    assert!(resolution.unresolved.is_empty());

    let memberships = resolution.database.table("memberships").unwrap();
    assert_eq!(memberships.relationships.len(), 1);
    assert_eq!(memberships.relationships[0].table1, "users");
    assert_eq!(memberships.relationships[0].table2, "groups");

    // Non-junction tables derive nothing.
    assert!(resolution.database.table("users").unwrap().relationships.is_empty());
}

#[test]
fn unresolved_references_do_not_abort_resolution() {
    let input = r#"
        Project "p" {
            Table public.orders {
                id int [pk]
                user_id int [ref: > users.id]
                item_id int [ref: > items.id]
            }
            Table public.items { id int [pk] }
        }
    "#;
    let resolution = resolve(parse_dbml(input).unwrap());

    assert_eq!(resolution.unresolved.len(), 1);
    assert_eq!(resolution.unresolved[0].referenced_table, "users");
    // The resolvable reference and the rest of the IR survive.
    assert_eq!(resolution.database.schemas[0].tables.len(), 2);
}

#[test]
fn duplicate_enum_values_are_rejected() {
    let err = parse_dbml("Project \"p\" { Enum \"status\" { \"active\", \"active\" } }")
        .unwrap_err();
    assert!(err.to_string().contains("duplicate value"));
}

#[test]
fn sql_ingestion_feeds_the_same_pipeline() {
    let sql = r#"
        CREATE TYPE status AS ENUM ('open', 'closed');
        CREATE TABLE users (
            id SERIAL PRIMARY KEY,
            email VARCHAR(255) NOT NULL UNIQUE
        );
        CREATE TABLE orders (
            id INT PRIMARY KEY,
            user_id INT NOT NULL REFERENCES users(id)
        );
        CREATE VIEW open_orders AS SELECT * FROM orders;
        CREATE INDEX idx_orders_user ON orders(user_id);
    "#;

    let db = parse_sql(sql).unwrap();
    let rendered = to_dbml(&db).unwrap();
    let reparsed = parse_dbml(&rendered).unwrap();

    let orders = reparsed.table("orders").unwrap();
    let user_id = orders.column("user_id").unwrap();
    assert!(!user_id.nullable);
    assert_eq!(user_id.foreign_keys.len(), 1);
    assert_eq!(user_id.foreign_keys[0].table, "users");

    let status = &reparsed.schema("public").unwrap().enums[0];
    assert_eq!(status.values, vec!["open", "closed"]);

    let view = &reparsed.schema("public").unwrap().views[0];
    assert_eq!(view.query, "SELECT * FROM orders");
}

#[test]
fn translate_surface_covers_both_sources() {
    let from_dbml = translate(EXAMPLE, SourceFormat::Dbml, Target::Sql).unwrap();
    assert!(from_dbml.contains("CREATE TABLE \"users\""));

    let from_sql = translate(
        "CREATE TABLE users (id INT PRIMARY KEY);",
        SourceFormat::Sql,
        Target::Orm,
    )
    .unwrap();
    assert!(from_sql.contains("class users(Base):"));
    assert!(from_sql.contains("primary_key=True"));
}

#[test]
fn notes_survive_every_stage() {
    let mut db = parse_dbml(EXAMPLE).unwrap();
    db.note = Some("authored by the platform team".into());
    db.schemas[0].tables[0].note = Some("one row per account".into());
    db.schemas[0].tables[0].columns[1].note = Some("display name, not unique".into());

    let resolution = resolve(db.clone());
    assert_eq!(resolution.database.note, db.note);
    assert_eq!(
        resolution.database.schemas[0].tables[0].note,
        db.schemas[0].tables[0].note
    );
    assert_eq!(
        resolution.database.schemas[0].tables[0].columns[1].note,
        db.schemas[0].tables[0].columns[1].note
    );

    // Rendered only as verbatim comments.
    let sql = to_sql(&resolution.database).unwrap();
    assert!(sql.contains("-- one row per account"));
    let dbml = to_dbml(&resolution.database).unwrap();
    assert!(dbml.contains("// display name, not unique"));
}

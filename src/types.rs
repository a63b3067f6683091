//! Type token registry: one lookup from a source type token to its
//! spelling in each target dialect.

use crate::ir::DataType;

/// Resolve a type token to its three dialect spellings.
///
/// Known tokens keep their own spelling for DBML and SQL and get the
/// canonical SQLAlchemy type name. Unknown tokens pass through
/// verbatim in all three dialects; an unknown type is representable,
/// not an error.
pub fn resolve(token: &str) -> DataType {
    let lower = token.to_lowercase();
    let base = lower.split('(').next().unwrap_or(&lower).trim();

    let sqlalchemy = match base {
        // Integer family
        "int" | "integer" | "int4" | "mediumint" => "Integer",
        "bigint" | "int8" => "BigInteger",
        "smallint" | "int2" | "tinyint" => "SmallInteger",
        "serial" | "serial4" => "Integer",
        "bigserial" | "serial8" => "BigInteger",
        "smallserial" | "serial2" => "SmallInteger",

        // Floating point
        "real" | "float" | "float4" | "double" | "float8" | "double precision" => "Float",
        "decimal" | "numeric" => "Numeric",

        // Strings
        "varchar" | "character varying" | "char" | "character" | "string" => "String",
        "text" | "tinytext" | "mediumtext" | "longtext" => "Text",

        // Date and time
        "timestamp" | "timestamptz" | "datetime" | "timestamp with time zone"
        | "timestamp without time zone" => "DateTime",
        "date" => "Date",
        "time" | "timetz" => "Time",
        "interval" => "Interval",

        // Misc
        "boolean" | "bool" => "Boolean",
        "uuid" => "Uuid",
        "json" | "jsonb" => "JSON",
        "bytea" | "blob" | "binary" | "varbinary" => "LargeBinary",

        _ => return DataType::new(token, token, token),
    };

    // The dialect spellings stay close to the source token so that
    // authored documents keep their own vocabulary on the way out.
    DataType::new(token, sqlalchemy, token)
}

pub mod ast;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod sql;
pub mod translate;
pub mod types;

use wasm_bindgen::prelude::*;

use ir::Node;
use translate::{Target, render};

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Source dialects this translator ingests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Dbml,
    Sql,
}

impl SourceFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "dbml" => Some(Self::Dbml),
            "sql" | "ddl" => Some(Self::Sql),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] parser::ParseError),
    #[error(transparent)]
    Sql(#[from] sql::SqlParseError),
    #[error(transparent)]
    Translation(#[from] translate::TranslationError),
}

/// Parse `source`, resolve references, and render the whole database
/// into the target dialect. Unresolved foreign keys are reported at
/// warn level and the best-effort result is still rendered.
pub fn translate(source: &str, from: SourceFormat, to: Target) -> Result<String, Error> {
    let database = match from {
        SourceFormat::Dbml => parser::parse_dbml(source)?,
        SourceFormat::Sql => sql::parse_sql(source)?,
    };
    let resolution = resolver::resolve(database);
    Ok(render(Node::Database(&resolution.database), to)?)
}

/// Translate schema source between dialects
#[wasm_bindgen(js_name = "translateSchema")]
pub fn translate_schema(
    source: &str,
    from: Option<String>,
    to: Option<String>,
) -> Result<String, String> {
    let from = from
        .as_deref()
        .and_then(SourceFormat::from_str)
        .unwrap_or(SourceFormat::Dbml);
    let to = to
        .as_deref()
        .and_then(Target::from_str)
        .unwrap_or(Target::Sql);
    translate(source, from, to).map_err(|e| e.to_string())
}

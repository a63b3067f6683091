//! Syntax tree for the schema description language, produced by the
//! parser and lowered into the IR.

use crate::lexer::Pos;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub name: String,
    pub decls: Vec<Decl>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Table(TableDecl),
    View(ViewDecl),
    Enum(EnumDecl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDecl {
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnDecl>,
    /// Standalone `Ref:` lines, applied to named columns after the
    /// column list is built.
    pub refs: Vec<RefDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDecl {
    pub name: String,
    pub type_token: String,
    pub settings: Vec<Setting>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    NotNull,
    Pk,
    Increment,
    Unique,
    Default(String),
    Ref(RefTarget),
}

/// The referenced side of a foreign-key mention.
#[derive(Debug, Clone, PartialEq)]
pub struct RefTarget {
    pub table: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefDecl {
    /// Local column named on the left of the relation symbol.
    pub column: String,
    pub target: RefTarget,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewDecl {
    pub schema: String,
    pub name: String,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub values: Vec<String>,
}

//! Best-effort extraction of schema structure from SQL DDL dumps.
//!
//! Statements are classified by their leading verb; only CREATE TABLE,
//! CREATE TYPE ... AS ENUM and CREATE VIEW are modeled. Everything
//! else in a dump (indexes, grants, inserts) is skipped, not rejected.

use super::lexer::{Lexer, Token};
use crate::ir::{
    Column, DEFAULT_SCHEMA, Database, Enum, ForeignKey, Table, ValidationError, View,
};
use crate::types;

#[derive(Debug, thiserror::Error)]
pub enum SqlParseError {
    #[error("CREATE TABLE \"{0}\" has no parseable columns")]
    EmptyTable(String),
    #[error("unparseable {0} statement")]
    Malformed(&'static str),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Parse a DDL dump into a database. Tables without a schema
/// qualifier land in the default schema.
pub fn parse_sql(input: &str) -> Result<Database, SqlParseError> {
    let mut database = Database::new("database");

    for statement in split_statements(input) {
        let tokens = Lexer::new(&statement).tokenize();
        match classify(&tokens) {
            StatementKind::CreateTable => {
                Cursor::new(&tokens).create_table(&mut database)?;
            }
            StatementKind::CreateType => {
                Cursor::new(&tokens).create_type(&mut database)?;
            }
            StatementKind::CreateView => {
                Cursor::new(&tokens).create_view(&statement, &mut database);
            }
            StatementKind::Other => {
                log::debug!(
                    "skipping statement: {}",
                    statement.lines().next().unwrap_or("").trim()
                );
            }
        }
    }

    Ok(database)
}

/// Split a dump into statements on `;`, ignoring separators inside
/// strings, quoted identifiers and comments.
fn split_statements(input: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' => {
                    quote = Some(c);
                    current.push(c);
                }
                '-' if chars.peek() == Some(&'-') => {
                    current.push(c);
                    for c in chars.by_ref() {
                        current.push(c);
                        if c == '\n' {
                            break;
                        }
                    }
                }
                '/' if chars.peek() == Some(&'*') => {
                    current.push(c);
                    current.push(chars.next().unwrap());
                    let mut prev = ' ';
                    for c in chars.by_ref() {
                        current.push(c);
                        if prev == '*' && c == '/' {
                            break;
                        }
                        prev = c;
                    }
                }
                ';' => {
                    if !current.trim().is_empty() {
                        statements.push(current.trim().to_string());
                    }
                    current.clear();
                }
                _ => current.push(c),
            },
        }
    }
    if !current.trim().is_empty() {
        statements.push(current.trim().to_string());
    }
    statements
}

enum StatementKind {
    CreateTable,
    CreateType,
    CreateView,
    Other,
}

fn classify(tokens: &[Token]) -> StatementKind {
    if tokens.first() != Some(&Token::Create) {
        return StatementKind::Other;
    }
    // Tolerate OR REPLACE, TEMPORARY, MATERIALIZED and similar words
    // between CREATE and the object kind.
    for token in &tokens[1..] {
        match token {
            Token::Table => return StatementKind::CreateTable,
            Token::Type => return StatementKind::CreateType,
            Token::View => return StatementKind::CreateView,
            Token::Ident(_) => continue,
            _ => break,
        }
    }
    StatementKind::Other
}

struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn skip_past(&mut self, token: &Token) {
        while self.current() != token && self.current() != &Token::Eof {
            self.advance();
        }
        self.advance();
    }

    fn skip_if_not_exists(&mut self) {
        if self.current() == &Token::If {
            self.advance();
            if self.current() == &Token::Not {
                self.advance();
            }
            if self.current() == &Token::Exists {
                self.advance();
            }
        }
    }

    fn ident(&mut self) -> Option<String> {
        match self.current() {
            Token::Ident(name) => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        }
    }

    /// `[schema.]name`; the default schema fills in when unqualified.
    fn qualified_name(&mut self) -> Option<(String, String)> {
        let first = self.ident()?;
        if self.current() == &Token::Dot {
            self.advance();
            let name = self.ident()?;
            Some((first, name))
        } else {
            Some((DEFAULT_SCHEMA.to_string(), first))
        }
    }

    fn create_table(&mut self, database: &mut Database) -> Result<(), SqlParseError> {
        self.skip_past(&Token::Table);
        self.skip_if_not_exists();

        let (schema, name) = self
            .qualified_name()
            .ok_or(SqlParseError::Malformed("CREATE TABLE"))?;

        if self.current() != &Token::LParen {
            return Err(SqlParseError::EmptyTable(name));
        }
        self.advance();

        let mut columns: Vec<Column> = Vec::new();
        let mut pk_columns: Vec<String> = Vec::new();
        let mut fk_entries: Vec<(String, ForeignKey)> = Vec::new();

        loop {
            match self.current() {
                Token::RParen => {
                    self.advance();
                    break;
                }
                Token::Comma => self.advance(),
                Token::Primary => {
                    self.advance();
                    if self.current() == &Token::Key {
                        self.advance();
                    }
                    pk_columns.extend(self.column_list());
                }
                Token::Foreign => {
                    if let Some(entry) = self.foreign_key_entry() {
                        fk_entries.push(entry);
                    }
                    self.skip_entry();
                }
                Token::Constraint => {
                    // Named constraint: drop the name, re-dispatch on
                    // the constraint kind.
                    self.advance();
                    self.ident();
                }
                Token::Unique | Token::Check | Token::Exclude | Token::Index | Token::Key => {
                    self.skip_entry();
                }
                Token::Ident(_) => {
                    if let Some(column) = self.column_def() {
                        columns.push(column);
                    } else {
                        self.skip_entry();
                    }
                }
                Token::Eof => break,
                _ => self.advance(),
            }
        }

        if columns.is_empty() {
            return Err(SqlParseError::EmptyTable(name));
        }

        let mut table = Table::new(schema.as_str(), name.as_str());
        for column in columns {
            table.push_column(column)?;
        }
        for pk in pk_columns {
            if let Some(column) = table.column_mut(&pk) {
                column.primary_key = true;
            }
        }
        for (column_name, fk) in fk_entries {
            if let Some(column) = table.column_mut(&column_name) {
                column.foreign_keys.push(fk);
            }
        }

        database.schema_mut(&schema).push_table(table)?;
        Ok(())
    }

    fn column_def(&mut self) -> Option<Column> {
        let name = self.ident()?;

        // Type token run: words plus parenthesized arguments.
        let mut type_token = String::new();
        let mut depth = 0;
        let mut auto_increment = false;
        loop {
            match self.current() {
                Token::Ident(part) => {
                    push_word(&mut type_token, part);
                    self.advance();
                }
                Token::Serial => {
                    push_word(&mut type_token, "serial");
                    auto_increment = true;
                    self.advance();
                }
                Token::LParen => {
                    depth += 1;
                    type_token.push('(');
                    self.advance();
                }
                Token::RParen if depth > 0 => {
                    depth -= 1;
                    type_token.push(')');
                    self.advance();
                }
                Token::Num(n) if depth > 0 => {
                    type_token.push_str(n);
                    self.advance();
                }
                Token::Comma if depth > 0 => {
                    type_token.push(',');
                    self.advance();
                }
                _ => break,
            }
        }

        if type_token.is_empty() {
            return None;
        }

        let mut column = Column::new(name, types::resolve(&type_token));
        column.auto_increment = auto_increment;

        loop {
            match self.current() {
                Token::Primary => {
                    self.advance();
                    if self.current() == &Token::Key {
                        self.advance();
                    }
                    column.primary_key = true;
                }
                Token::Not => {
                    self.advance();
                    if self.current() == &Token::Null {
                        self.advance();
                        column.nullable = false;
                    }
                }
                Token::Null => self.advance(),
                Token::Unique => {
                    self.advance();
                    if self.current() == &Token::Key {
                        self.advance();
                    }
                    column.unique = true;
                }
                Token::Default => {
                    self.advance();
                    column.default_value = Some(self.default_value());
                }
                Token::Check => {
                    self.advance();
                    column.check = self.parenthesized_raw();
                }
                Token::Exclude => {
                    self.advance();
                    column.exclude = self.parenthesized_raw();
                }
                Token::AutoIncrement => {
                    self.advance();
                    column.auto_increment = true;
                }
                Token::References => {
                    self.advance();
                    self.reference_targets(&mut column);
                }
                Token::On => self.skip_on_action(),
                Token::Constraint => {
                    self.advance();
                    self.ident();
                }
                Token::Comma | Token::RParen | Token::Eof => break,
                _ => self.advance(),
            }
        }

        Some(column)
    }

    /// `REFERENCES t(c)` with tolerance for multiple comma-separated
    /// targets; each pair becomes its own foreign key. An unparseable
    /// fragment is dropped from the column, never escalated.
    fn reference_targets(&mut self, column: &mut Column) {
        let Some(fk) = self.reference_pair() else {
            return;
        };
        column.foreign_keys.push(fk);

        while self.current() == &Token::Comma {
            let save = self.pos;
            self.advance();
            match self.strict_reference_pair() {
                Some(fk) => column.foreign_keys.push(fk),
                None => {
                    // The comma opened the next column definition.
                    self.pos = save;
                    break;
                }
            }
        }
    }

    fn reference_pair(&mut self) -> Option<ForeignKey> {
        let mut table = self.ident()?;
        if self.current() == &Token::Dot {
            self.advance();
            if let Some(name) = self.ident() {
                table = name;
            }
        }

        let column = if self.current() == &Token::LParen {
            self.advance();
            let column = match self.current() {
                Token::Ident(c) => c.clone(),
                _ => "id".to_string(),
            };
            self.advance();
            if self.current() == &Token::RParen {
                self.advance();
            }
            column
        } else {
            "id".to_string()
        };

        Some(ForeignKey { table, column })
    }

    /// Exact `ident ( ident )` shape, used after a comma where a bare
    /// identifier would otherwise be the next column's name.
    fn strict_reference_pair(&mut self) -> Option<ForeignKey> {
        let table = self.ident()?;
        if self.current() != &Token::LParen {
            return None;
        }
        self.advance();
        let column = self.ident()?;
        if self.current() != &Token::RParen {
            return None;
        }
        self.advance();
        Some(ForeignKey { table, column })
    }

    fn foreign_key_entry(&mut self) -> Option<(String, ForeignKey)> {
        self.advance(); // FOREIGN
        if self.current() != &Token::Key {
            return None;
        }
        self.advance();

        let columns = self.column_list();
        let first = columns.into_iter().next()?;

        if self.current() != &Token::References {
            return None;
        }
        self.advance();

        let fk = self.reference_pair()?;
        Some((first, fk))
    }

    fn column_list(&mut self) -> Vec<String> {
        let mut columns = Vec::new();
        if self.current() != &Token::LParen {
            return columns;
        }
        self.advance();

        loop {
            match self.current() {
                Token::Ident(name) => {
                    columns.push(name.clone());
                    self.advance();
                }
                Token::Comma => self.advance(),
                Token::RParen => {
                    self.advance();
                    break;
                }
                Token::Eof => break,
                _ => self.advance(),
            }
        }
        columns
    }

    fn default_value(&mut self) -> String {
        match self.current().clone() {
            Token::Str(s) => {
                self.advance();
                format!("\"{}\"", s)
            }
            Token::Num(n) => {
                self.advance();
                n
            }
            Token::Null => {
                self.advance();
                "NULL".to_string()
            }
            Token::Ident(s) => {
                self.advance();
                if self.current() == &Token::LParen {
                    self.advance();
                    let inner = self.collect_until_paren();
                    format!("{}({})", s, inner)
                } else {
                    s
                }
            }
            Token::LParen => {
                self.advance();
                format!("({})", self.collect_until_paren())
            }
            _ => String::new(),
        }
    }

    fn collect_until_paren(&mut self) -> String {
        let mut raw = String::new();
        let mut depth = 1;
        loop {
            match self.current() {
                Token::LParen => {
                    depth += 1;
                    raw.push('(');
                    self.advance();
                }
                Token::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        break;
                    }
                    raw.push(')');
                    self.advance();
                }
                Token::Eof => break,
                token => {
                    push_token(&mut raw, token);
                    self.advance();
                }
            }
        }
        raw
    }

    fn parenthesized_raw(&mut self) -> Option<String> {
        if self.current() != &Token::LParen {
            return None;
        }
        self.advance();
        Some(self.collect_until_paren())
    }

    fn skip_on_action(&mut self) {
        while self.current() == &Token::On {
            self.advance();
            // DELETE or UPDATE
            if matches!(self.current(), Token::Ident(_)) {
                self.advance();
            }
            match self.current() {
                Token::Ident(word) if word.eq_ignore_ascii_case("set") => {
                    self.advance();
                    if matches!(self.current(), Token::Null | Token::Default) {
                        self.advance();
                    }
                }
                Token::Ident(word) if word.eq_ignore_ascii_case("no") => {
                    self.advance();
                    if matches!(self.current(), Token::Ident(_)) {
                        self.advance();
                    }
                }
                Token::Ident(_) => self.advance(),
                _ => {}
            }
        }
    }

    /// Skip to the next top-level comma or the table body's closing
    /// paren, leaving that token for the caller.
    fn skip_entry(&mut self) {
        let mut depth = 0;
        loop {
            match self.current() {
                Token::LParen => {
                    depth += 1;
                    self.advance();
                }
                Token::RParen => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    self.advance();
                }
                Token::Comma if depth == 0 => return,
                Token::Eof => return,
                _ => self.advance(),
            }
        }
    }

    fn create_type(&mut self, database: &mut Database) -> Result<(), SqlParseError> {
        self.skip_past(&Token::Type);
        self.skip_if_not_exists();

        let Some((schema, name)) = self.qualified_name() else {
            log::debug!("skipping CREATE TYPE without a name");
            return Ok(());
        };

        // Only the AS ENUM shape is modeled; composite and range
        // types are skipped.
        if self.current() != &Token::As {
            log::debug!("skipping non-enum type \"{}\"", name);
            return Ok(());
        }
        self.advance();
        if self.current() != &Token::Enum {
            log::debug!("skipping non-enum type \"{}\"", name);
            return Ok(());
        }
        self.advance();

        if self.current() != &Token::LParen {
            return Err(SqlParseError::Malformed("CREATE TYPE"));
        }
        self.advance();

        let mut values = Vec::new();
        loop {
            match self.current().clone() {
                Token::Str(value) => {
                    values.push(value);
                    self.advance();
                }
                Token::Ident(value) => {
                    values.push(value);
                    self.advance();
                }
                Token::Comma => self.advance(),
                Token::RParen | Token::Eof => break,
                _ => self.advance(),
            }
        }

        if values.is_empty() {
            return Err(SqlParseError::Malformed("CREATE TYPE"));
        }

        let item = Enum::new(name, values)?;
        database.schema_mut(&schema).enums.push(item);
        Ok(())
    }

    fn create_view(&mut self, statement: &str, database: &mut Database) {
        self.skip_past(&Token::View);
        self.skip_if_not_exists();

        let Some((schema, name)) = self.qualified_name() else {
            log::debug!("skipping CREATE VIEW without a name");
            return;
        };

        let columns = if self.current() == &Token::LParen {
            self.column_list()
        } else {
            Vec::new()
        };

        // The query is everything after the top-level AS, verbatim.
        let Some(idx) = find_top_level_as(statement) else {
            log::debug!("skipping CREATE VIEW \"{}\" without AS", name);
            return;
        };
        let query = statement[idx..].trim().to_string();

        let mut view = View::new(schema.as_str(), name.as_str(), query);
        view.columns = columns;
        database.schema_mut(&schema).views.push(view);
    }
}

/// Byte index just past the first standalone `AS` outside quotes and
/// parentheses.
fn find_top_level_as(statement: &str) -> Option<usize> {
    let bytes = statement.as_bytes();
    let mut quote: Option<u8> = None;
    let mut depth = 0usize;
    let mut word_start: Option<usize> = None;

    for (i, &b) in bytes.iter().enumerate() {
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            continue;
        }
        if b.is_ascii_alphanumeric() || b == b'_' {
            if word_start.is_none() {
                word_start = Some(i);
            }
            continue;
        }
        // A word just ended; check it before handling the delimiter.
        if let Some(start) = word_start.take() {
            if depth == 0 && statement[start..i].eq_ignore_ascii_case("as") {
                return Some(i);
            }
        }
        match b {
            b'\'' | b'"' | b'`' => quote = Some(b),
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    match word_start {
        Some(start) if depth == 0 && statement[start..].eq_ignore_ascii_case("as") => {
            Some(statement.len())
        }
        _ => None,
    }
}

fn push_word(buffer: &mut String, word: &str) {
    if !buffer.is_empty() && !buffer.ends_with('(') && !buffer.ends_with(',') {
        buffer.push(' ');
    }
    buffer.push_str(word);
}

fn push_token(buffer: &mut String, token: &Token) {
    match token {
        Token::Ident(s) => push_word(buffer, s),
        Token::Str(s) => push_word(buffer, &format!("'{}'", s)),
        Token::Num(n) => push_word(buffer, n),
        Token::Op(c) => push_word(buffer, &c.to_string()),
        Token::Comma => buffer.push(','),
        Token::Dot => buffer.push('.'),
        Token::Not => push_word(buffer, "NOT"),
        Token::Null => push_word(buffer, "NULL"),
        Token::Default => push_word(buffer, "DEFAULT"),
        Token::On => push_word(buffer, "ON"),
        Token::As => push_word(buffer, "AS"),
        _ => {}
    }
}

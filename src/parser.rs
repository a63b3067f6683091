use crate::ast::*;
use crate::ir::{self, DEFAULT_SCHEMA, ValidationError};
use crate::lexer::{LexError, Lexer, Pos, Token};
use crate::resolver::ResolutionError;
use crate::types;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("syntax error at {pos}: found {found:?}, expected {expected}")]
    Syntax {
        found: Token,
        expected: &'static str,
        pos: Pos,
    },
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Parse a schema document and lower it into the IR.
pub fn parse_dbml(input: &str) -> Result<ir::Database, ParseError> {
    let document = Parser::new(input).parse()?;
    lower_document(document)
}

/// Predictive parser over the schema grammar. Tokens are pulled from
/// the lexer on demand with exactly one token of lookahead, so a parse
/// failure always points at a single source position and the lexer can
/// hand over raw view bodies without tokenizing them.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    peeked: Option<(Token, Pos)>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            lexer: Lexer::new(input),
            peeked: None,
        }
    }

    fn peek(&mut self) -> Result<&Token, ParseError> {
        if self.peeked.is_none() {
            self.peeked = Some(self.lexer.next_token()?);
        }
        Ok(&self.peeked.as_ref().unwrap().0)
    }

    fn bump(&mut self) -> Result<(Token, Pos), ParseError> {
        match self.peeked.take() {
            Some(entry) => Ok(entry),
            None => Ok(self.lexer.next_token()?),
        }
    }

    fn unexpected<T>(&self, found: Token, expected: &'static str, pos: Pos) -> Result<T, ParseError> {
        Err(ParseError::Syntax {
            found,
            expected,
            pos,
        })
    }

    fn expect(&mut self, expected: Token, what: &'static str) -> Result<(), ParseError> {
        let (tok, pos) = self.bump()?;
        if tok == expected {
            Ok(())
        } else {
            self.unexpected(tok, what, pos)
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.bump()? {
            (Token::Ident(s), _) => Ok(s),
            (tok, pos) => self.unexpected(tok, "identifier", pos),
        }
    }

    /// A name position accepts a bare identifier or a quoted string.
    fn expect_name(&mut self) -> Result<String, ParseError> {
        match self.bump()? {
            (Token::Ident(s), _) | (Token::Str(s), _) => Ok(s),
            (tok, pos) => self.unexpected(tok, "name", pos),
        }
    }

    fn expect_keyword(&mut self, keyword: &'static str) -> Result<(), ParseError> {
        match self.bump()? {
            (Token::Ident(s), _) if s == keyword => Ok(()),
            (tok, pos) => self.unexpected(tok, keyword, pos),
        }
    }

    fn check_ident(&mut self, keyword: &str) -> Result<bool, ParseError> {
        Ok(matches!(self.peek()?, Token::Ident(s) if s == keyword))
    }

    pub fn parse(&mut self) -> Result<Document, ParseError> {
        self.expect_keyword("Project")?;
        let name = self.expect_name()?;
        self.expect(Token::LBrace, "{")?;

        let mut decls = Vec::new();
        while *self.peek()? != Token::RBrace {
            if self.check_ident("Table")? {
                self.bump()?;
                decls.push(Decl::Table(self.parse_table()?));
            } else if self.check_ident("View")? {
                self.bump()?;
                decls.push(Decl::View(self.parse_view()?));
            } else if self.check_ident("Enum")? {
                self.bump()?;
                decls.push(Decl::Enum(self.parse_enum()?));
            } else {
                let (tok, pos) = self.bump()?;
                return self.unexpected(tok, "Table, View, or Enum", pos);
            }
        }
        self.expect(Token::RBrace, "}")?;

        let (tok, pos) = self.bump()?;
        if tok != Token::Eof {
            return self.unexpected(tok, "end of document", pos);
        }

        Ok(Document { name, decls })
    }

    fn parse_table(&mut self) -> Result<TableDecl, ParseError> {
        let schema = self.expect_name()?;
        self.expect(Token::Dot, ".")?;
        let name = self.expect_name()?;
        self.expect(Token::LBrace, "{")?;

        let mut columns = Vec::new();
        let mut refs = Vec::new();

        while *self.peek()? != Token::RBrace {
            let (tok, pos) = self.bump()?;
            match tok {
                Token::Ident(s) => {
                    // `Ref` opens a foreign-key line only when followed
                    // by a colon; otherwise it is a column named "Ref".
                    if s == "Ref" && *self.peek()? == Token::Colon {
                        self.bump()?;
                        refs.push(self.parse_ref(pos)?);
                    } else {
                        columns.push(self.parse_column(s)?);
                    }
                }
                Token::Str(s) => {
                    columns.push(self.parse_column(s)?);
                }
                tok => return self.unexpected(tok, "column or Ref", pos),
            }
        }
        self.expect(Token::RBrace, "}")?;

        Ok(TableDecl {
            schema,
            name,
            columns,
            refs,
        })
    }

    /// `Ref: <table>.<column> (>|<|-) <table>.<column>`, the left pair
    /// naming a column of the enclosing table.
    fn parse_ref(&mut self, pos: Pos) -> Result<RefDecl, ParseError> {
        let _local_table = self.expect_name()?;
        self.expect(Token::Dot, ".")?;
        let column = self.expect_name()?;

        match self.bump()? {
            (Token::Gt, _) | (Token::Lt, _) | (Token::Dash, _) => {}
            (tok, pos) => return self.unexpected(tok, "relation symbol (>, < or -)", pos),
        }

        let table = self.expect_name()?;
        self.expect(Token::Dot, ".")?;
        let target_column = self.expect_name()?;

        Ok(RefDecl {
            column,
            target: RefTarget {
                table,
                column: target_column,
            },
            pos,
        })
    }

    fn parse_column(&mut self, name: String) -> Result<ColumnDecl, ParseError> {
        let type_token = self.parse_type()?;
        let mut settings = Vec::new();

        if *self.peek()? == Token::LBracket {
            self.bump()?;
            loop {
                settings.push(self.parse_setting()?);
                if *self.peek()? == Token::Comma {
                    self.bump()?;
                } else {
                    self.expect(Token::RBracket, "]")?;
                    break;
                }
            }
        }

        Ok(ColumnDecl {
            name,
            type_token,
            settings,
        })
    }

    fn parse_type(&mut self) -> Result<String, ParseError> {
        let mut type_token = self.expect_ident()?;
        if *self.peek()? == Token::LParen {
            self.bump()?;
            type_token.push('(');
            loop {
                match self.bump()? {
                    (Token::Num(n), _) => type_token.push_str(&n),
                    (tok, pos) => return self.unexpected(tok, "type argument", pos),
                }
                match self.bump()? {
                    (Token::Comma, _) => type_token.push(','),
                    (Token::RParen, _) => {
                        type_token.push(')');
                        break;
                    }
                    (tok, pos) => return self.unexpected(tok, ", or )", pos),
                }
            }
        }
        Ok(type_token)
    }

    fn parse_setting(&mut self) -> Result<Setting, ParseError> {
        let (tok, pos) = self.bump()?;
        let keyword = match tok {
            Token::Ident(s) => s,
            tok => return self.unexpected(tok, "setting", pos),
        };

        match keyword.as_str() {
            "not" => {
                self.expect_keyword("null")?;
                Ok(Setting::NotNull)
            }
            "pk" => Ok(Setting::Pk),
            "increment" => Ok(Setting::Increment),
            "unique" => Ok(Setting::Unique),
            "default" => {
                self.expect(Token::Colon, ":")?;
                Ok(Setting::Default(self.parse_value()?))
            }
            "ref" => {
                self.expect(Token::Colon, ":")?;
                match self.bump()? {
                    (Token::Gt, _) | (Token::Lt, _) | (Token::Dash, _) => {}
                    (tok, pos) => {
                        return self.unexpected(tok, "relation symbol (>, < or -)", pos);
                    }
                }
                let table = self.expect_name()?;
                self.expect(Token::Dot, ".")?;
                let column = self.expect_name()?;
                Ok(Setting::Ref(RefTarget { table, column }))
            }
            _ => self.unexpected(Token::Ident(keyword), "setting", pos),
        }
    }

    /// A default value: string, number, bare word, or call like
    /// `now()`. Strings keep their quotes so the renderers can tell
    /// literals from expressions.
    fn parse_value(&mut self) -> Result<String, ParseError> {
        match self.bump()? {
            (Token::Str(s), _) => Ok(format!("\"{}\"", s)),
            (Token::Num(n), _) => Ok(n),
            (Token::Ident(s), _) => {
                if *self.peek()? == Token::LParen {
                    self.bump()?;
                    let mut args = String::new();
                    loop {
                        match self.bump()? {
                            (Token::RParen, _) => break,
                            (Token::Ident(a), _) => args.push_str(&a),
                            (Token::Num(n), _) => args.push_str(&n),
                            (Token::Str(v), _) => {
                                args.push('"');
                                args.push_str(&v);
                                args.push('"');
                            }
                            (Token::Comma, _) => args.push_str(", "),
                            (tok, pos) => return self.unexpected(tok, "argument or )", pos),
                        }
                    }
                    Ok(format!("{}({})", s, args))
                } else {
                    Ok(s)
                }
            }
            (tok, pos) => self.unexpected(tok, "default value", pos),
        }
    }

    fn parse_view(&mut self) -> Result<ViewDecl, ParseError> {
        let schema = self.expect_name()?;
        self.expect(Token::Dot, ".")?;
        let name = self.expect_name()?;
        self.expect_keyword("As")?;
        self.expect_keyword("SQL")?;
        // The lookahead slot is empty here, so the raw body starts
        // right after the SQL keyword.
        debug_assert!(self.peeked.is_none());
        let query = self.lexer.read_raw_block()?;
        Ok(ViewDecl {
            schema,
            name,
            query,
        })
    }

    fn parse_enum(&mut self) -> Result<EnumDecl, ParseError> {
        let name = self.expect_name()?;
        self.expect(Token::LBrace, "{")?;

        let mut values = vec![self.expect_name()?];
        while *self.peek()? == Token::Comma {
            self.bump()?;
            values.push(self.expect_name()?);
        }
        self.expect(Token::RBrace, "}")?;

        Ok(EnumDecl { name, values })
    }
}

fn lower_document(document: Document) -> Result<ir::Database, ParseError> {
    let mut database = ir::Database::new(document.name);
    for decl in document.decls {
        match decl {
            Decl::Table(decl) => {
                let table = lower_table(decl)?;
                let schema = table.schema.clone();
                database.schema_mut(&schema).push_table(table)?;
            }
            Decl::View(decl) => {
                let view = ir::View::new(decl.schema.as_str(), decl.name, decl.query);
                database.schema_mut(&decl.schema).views.push(view);
            }
            Decl::Enum(decl) => {
                let item = ir::Enum::new(decl.name, decl.values)?;
                database.schema_mut(DEFAULT_SCHEMA).enums.push(item);
            }
        }
    }
    Ok(database)
}

/// Two-phase table build: construct the column list, then apply the
/// standalone ref patches against the completed columns. A ref naming
/// an undeclared column means the document is internally inconsistent,
/// which is fatal.
fn lower_table(decl: TableDecl) -> Result<ir::Table, ParseError> {
    let mut table = ir::Table::new(decl.schema, decl.name);
    for column in decl.columns {
        table.push_column(lower_column(column))?;
    }
    for patch in decl.refs {
        let Some(column) = table.column_mut(&patch.column) else {
            return Err(ResolutionError::UnknownColumn {
                table: table.name.clone(),
                column: patch.column,
                pos: patch.pos,
            }
            .into());
        };
        column.foreign_keys.push(ir::ForeignKey {
            table: patch.target.table,
            column: patch.target.column,
        });
    }
    Ok(table)
}

fn lower_column(decl: ColumnDecl) -> ir::Column {
    let mut column = ir::Column::new(decl.name, types::resolve(&decl.type_token));
    for setting in decl.settings {
        match setting {
            Setting::NotNull => column.nullable = false,
            Setting::Pk => column.primary_key = true,
            Setting::Increment => column.auto_increment = true,
            Setting::Unique => column.unique = true,
            Setting::Default(value) => column.default_value = Some(value),
            Setting::Ref(target) => column.foreign_keys.push(ir::ForeignKey {
                table: target.table,
                column: target.column,
            }),
        }
    }
    column
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_project() {
        let input = r#"
            Project "p" {
                Table public.users {
                    id int [pk]
                    name text [not null]
                }
            }
        "#;
        let db = parse_dbml(input).unwrap();
        assert_eq!(db.name, "p");
        assert_eq!(db.schemas.len(), 1);
        assert_eq!(db.schemas[0].name, "public");

        let users = db.schemas[0].table("users").unwrap();
        assert_eq!(users.columns.len(), 2);

        let id = &users.columns[0];
        assert_eq!(id.name, "id");
        assert_eq!(id.data_type.dbml, "int");
        assert!(id.primary_key);
        assert!(id.nullable);

        let name = &users.columns[1];
        assert_eq!(name.name, "name");
        assert!(!name.nullable);
        assert!(!name.primary_key);
    }

    #[test]
    fn test_parse_settings() {
        let input = r#"
            Project "p" {
                Table public.t {
                    a int [pk, increment]
                    b varchar(255) [unique, not null, default: "x"]
                    c int [default: 0]
                    d timestamp [default: now()]
                }
            }
        "#;
        let db = parse_dbml(input).unwrap();
        let t = db.schemas[0].table("t").unwrap();
        assert!(t.columns[0].auto_increment);
        assert!(t.columns[1].unique);
        assert_eq!(t.columns[1].data_type.dbml, "varchar(255)");
        assert_eq!(t.columns[1].default_value.as_deref(), Some("\"x\""));
        assert_eq!(t.columns[2].default_value.as_deref(), Some("0"));
        assert_eq!(t.columns[3].default_value.as_deref(), Some("now()"));
    }

    #[test]
    fn test_ref_line_patches_column() {
        let input = r#"
            Project "p" {
                Table public.orders {
                    id int [pk]
                    user_id int
                    Ref: orders.user_id > users.id
                }
            }
        "#;
        let db = parse_dbml(input).unwrap();
        let orders = db.schemas[0].table("orders").unwrap();
        let user_id = orders.column("user_id").unwrap();
        assert_eq!(user_id.foreign_keys.len(), 1);
        assert_eq!(user_id.foreign_keys[0].table, "users");
        assert_eq!(user_id.foreign_keys[0].column, "id");
    }

    #[test]
    fn test_inline_ref_setting() {
        let input = r#"
            Project "p" {
                Table public.orders {
                    user_id int [not null, ref: > users.id]
                }
            }
        "#;
        let db = parse_dbml(input).unwrap();
        let user_id = &db.schemas[0].table("orders").unwrap().columns[0];
        assert!(!user_id.nullable);
        assert_eq!(user_id.foreign_keys[0].table, "users");
    }

    #[test]
    fn test_ref_to_unknown_column_is_fatal() {
        let input = r#"
            Project "p" {
                Table public.orders {
                    id int [pk]
                    Ref: orders.user_id > users.id
                }
            }
        "#;
        let err = parse_dbml(input).unwrap_err();
        assert!(matches!(err, ParseError::Resolution(_)));
    }

    #[test]
    fn test_duplicate_table_is_conflict() {
        let input = r#"
            Project "p" {
                Table public.users { id int }
                Table public.users { id int }
            }
        "#;
        let err = parse_dbml(input).unwrap_err();
        assert!(matches!(
            err,
            ParseError::Validation(ValidationError::DuplicateTable { .. })
        ));
    }

    #[test]
    fn test_tables_split_across_schemas() {
        let input = r#"
            Project "p" {
                Table public.users { id int }
                Table audit.users { id int }
            }
        "#;
        let db = parse_dbml(input).unwrap();
        assert_eq!(db.schemas.len(), 2);
        assert!(db.schema("public").unwrap().table("users").is_some());
        assert!(db.schema("audit").unwrap().table("users").is_some());
    }

    #[test]
    fn test_parse_enum() {
        let input = r#"
            Project "p" {
                Enum "status" { "active", "archived" }
            }
        "#;
        let db = parse_dbml(input).unwrap();
        let status = &db.schema("public").unwrap().enums[0];
        assert_eq!(status.name, "status");
        assert_eq!(status.values, vec!["active", "archived"]);
    }

    #[test]
    fn test_duplicate_enum_value() {
        let input = r#"
            Project "p" {
                Enum "status" { "active", "active" }
            }
        "#;
        let err = parse_dbml(input).unwrap_err();
        assert!(matches!(
            err,
            ParseError::Validation(ValidationError::DuplicateEnumValue { .. })
        ));
    }

    #[test]
    fn test_parse_view() {
        let input = "Project \"p\" {\nView public.active_users As SQL\nSELECT * FROM users WHERE active\nEnd\n}";
        let db = parse_dbml(input).unwrap();
        let view = &db.schema("public").unwrap().views[0];
        assert_eq!(view.name, "active_users");
        assert_eq!(view.query, "SELECT * FROM users WHERE active");
    }

    #[test]
    fn test_syntax_error_carries_position() {
        let err = parse_dbml("Project \"p\" {\n  Table public.users ]\n}").unwrap_err();
        match err {
            ParseError::Syntax { pos, .. } => {
                assert_eq!(pos.line, 2);
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_no_partial_ir_on_failure() {
        assert!(parse_dbml("Project \"p\" { Table public.users {").is_err());
    }

    #[test]
    fn test_quoted_names() {
        let input = r#"
            Project "p" {
                Table public."user accounts" {
                    "full name" text
                }
            }
        "#;
        let db = parse_dbml(input).unwrap();
        let table = db.schemas[0].table("user accounts").unwrap();
        assert_eq!(table.columns[0].name, "full name");
    }
}

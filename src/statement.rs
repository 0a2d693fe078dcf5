//! SQL statement classification and bind-placeholder scanning.
//!
//! The statement kind is decided by the first keyword of the minified SQL
//! (block comments, line comments and string literals stripped). The same
//! scan collects `:name` bind placeholders and detects a `RETURNING ... INTO`
//! clause, tracking quote state so neither is matched inside a literal.

use crate::error::{Error, Result};

/// Classified kind of a SQL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// SELECT / WITH query returning rows.
    Query,
    /// Anonymous PL/SQL block or CALL.
    PlSql,
    /// INSERT / UPDATE / DELETE / MERGE.
    Dml,
    /// CREATE / ALTER / DROP and friends; forces a fresh parse every time.
    Ddl,
    /// Re-use of an already-open server cursor.
    Cursor,
    /// Anything else (ALTER SESSION, EXPLAIN, ...).
    Plain,
}

impl StatementKind {
    /// Whether execution may return a result set.
    pub fn is_query(&self) -> bool {
        matches!(self, StatementKind::Query | StatementKind::Cursor)
    }

    /// Whether this is a PL/SQL invocation.
    pub fn is_plsql(&self) -> bool {
        matches!(self, StatementKind::PlSql)
    }

    /// Whether this statement must be re-parsed on every execution.
    pub fn is_ddl(&self) -> bool {
        matches!(self, StatementKind::Ddl)
    }
}

/// A parsed SQL statement ready for execution.
#[derive(Debug, Clone)]
pub struct Statement {
    /// The SQL text as sent on the wire.
    sql: String,
    /// Classified statement kind.
    kind: StatementKind,
    /// Whether a RETURNING ... INTO clause is present.
    is_returning: bool,
    /// Bind placeholder names in order of first appearance.
    bind_names: Vec<String>,
    /// Server-assigned cursor id; 0 until the first execute.
    cursor_id: u16,
    /// Set when the server demands a full re-parse (e.g. after a DDL
    /// invalidation or a DRCP session change).
    requires_full_execute: bool,
    /// Set when the row stream needs a re-define round (LOB conversion).
    requires_define: bool,
}

impl Statement {
    /// Parse and classify a SQL statement.
    pub fn parse(sql: &str) -> Result<Self> {
        let scan = scan_sql(sql)?;
        Ok(Self {
            sql: sql.to_string(),
            kind: scan.kind,
            is_returning: scan.is_returning,
            bind_names: scan.bind_names,
            cursor_id: 0,
            requires_full_execute: false,
            requires_define: false,
        })
    }

    /// Create a statement bound to an existing server cursor.
    pub fn from_cursor(cursor_id: u16) -> Self {
        Self {
            sql: String::new(),
            kind: StatementKind::Cursor,
            is_returning: false,
            bind_names: Vec::new(),
            cursor_id,
            requires_full_execute: false,
            requires_define: false,
        }
    }

    /// The SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The classified kind.
    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    /// Whether a RETURNING ... INTO clause is present.
    pub fn is_returning(&self) -> bool {
        self.is_returning
    }

    /// Bind placeholder names in order of first appearance.
    pub fn bind_names(&self) -> &[String] {
        &self.bind_names
    }

    /// Server cursor id (0 before the first execute).
    pub fn cursor_id(&self) -> u16 {
        self.cursor_id
    }

    pub(crate) fn set_cursor_id(&mut self, cursor_id: u16) {
        self.cursor_id = cursor_id;
    }

    pub(crate) fn requires_full_execute(&self) -> bool {
        self.requires_full_execute
    }

    pub(crate) fn set_requires_full_execute(&mut self, value: bool) {
        self.requires_full_execute = value;
    }

    pub(crate) fn requires_define(&self) -> bool {
        self.requires_define
    }

    pub(crate) fn set_requires_define(&mut self, value: bool) {
        self.requires_define = value;
    }

    /// Whether the executor may use the short re-execute path.
    pub(crate) fn can_reexecute(&self) -> bool {
        self.cursor_id != 0 && !self.requires_full_execute && !self.kind.is_ddl()
    }
}

struct SqlScan {
    kind: StatementKind,
    is_returning: bool,
    bind_names: Vec<String>,
}

/// Scan the SQL text once: strip comments/literals for keyword detection,
/// collect bind names and the RETURNING flag.
fn scan_sql(sql: &str) -> Result<SqlScan> {
    let bytes = sql.as_bytes();
    let mut pos = 0;
    let mut first_keyword: Option<String> = None;
    let mut bind_names: Vec<String> = Vec::new();
    let mut seen_returning = false;
    let mut is_returning = false;

    while pos < bytes.len() {
        let b = bytes[pos];
        match b {
            b'\'' => {
                pos += 1;
                loop {
                    match bytes.get(pos) {
                        Some(b'\'') => {
                            // Doubled quote is an escaped quote inside the literal
                            if bytes.get(pos + 1) == Some(&b'\'') {
                                pos += 2;
                                continue;
                            }
                            pos += 1;
                            break;
                        }
                        Some(_) => pos += 1,
                        None => return Err(Error::MissingEndingQuote),
                    }
                }
            }
            b'"' => {
                pos += 1;
                loop {
                    match bytes.get(pos) {
                        Some(b'"') => {
                            pos += 1;
                            break;
                        }
                        Some(_) => pos += 1,
                        None => return Err(Error::MissingEndingQuote),
                    }
                }
            }
            b'-' if bytes.get(pos + 1) == Some(&b'-') => {
                while pos < bytes.len() && bytes[pos] != b'\n' {
                    pos += 1;
                }
            }
            b'/' if bytes.get(pos + 1) == Some(&b'*') => {
                pos += 2;
                while pos < bytes.len() {
                    if bytes[pos] == b'*' && bytes.get(pos + 1) == Some(&b'/') {
                        pos += 2;
                        break;
                    }
                    pos += 1;
                }
            }
            b':' => {
                pos += 1;
                let start = pos;
                while pos < bytes.len()
                    && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_')
                {
                    pos += 1;
                }
                if pos > start {
                    let name = sql[start..pos].to_uppercase();
                    if !bind_names.contains(&name) {
                        bind_names.push(name);
                    }
                }
            }
            _ if b.is_ascii_alphabetic() => {
                let start = pos;
                while pos < bytes.len()
                    && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_' || bytes[pos] == b'$')
                {
                    pos += 1;
                }
                let word = sql[start..pos].to_uppercase();
                if first_keyword.is_none() {
                    first_keyword = Some(word.clone());
                }
                if word == "RETURNING" || word == "RETURN" {
                    seen_returning = true;
                } else if word == "INTO" && seen_returning {
                    is_returning = true;
                }
            }
            _ => {
                pos += 1;
            }
        }
    }

    let kind = match first_keyword.as_deref() {
        Some("SELECT") | Some("WITH") => StatementKind::Query,
        Some("INSERT") | Some("UPDATE") | Some("DELETE") | Some("MERGE") => StatementKind::Dml,
        Some("BEGIN") | Some("DECLARE") | Some("CALL") => StatementKind::PlSql,
        Some("CREATE") | Some("ALTER") | Some("DROP") | Some("GRANT") | Some("REVOKE")
        | Some("ANALYZE") | Some("AUDIT") | Some("COMMENT") | Some("TRUNCATE") => {
            StatementKind::Ddl
        }
        _ => StatementKind::Plain,
    };

    // ALTER SESSION is not DDL, but ALTER anything-else is; the single
    // keyword cannot tell them apart, and the server treats both as a fresh
    // parse anyway, so the coarse classification stands.

    Ok(SqlScan {
        kind,
        is_returning,
        bind_names,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_query() {
        assert_eq!(
            Statement::parse("SELECT 1 FROM DUAL").unwrap().kind(),
            StatementKind::Query
        );
        assert_eq!(
            Statement::parse("with t as (select 1 from dual) select * from t")
                .unwrap()
                .kind(),
            StatementKind::Query
        );
    }

    #[test]
    fn test_classify_dml() {
        for sql in [
            "INSERT INTO t VALUES (1)",
            "update t set x = 1",
            "DELETE FROM t",
            "MERGE INTO t USING d ON (1=1) WHEN MATCHED THEN UPDATE SET x = 1",
        ] {
            assert_eq!(Statement::parse(sql).unwrap().kind(), StatementKind::Dml);
        }
    }

    #[test]
    fn test_classify_ddl_and_plsql() {
        assert_eq!(
            Statement::parse("CREATE TABLE t (x NUMBER)").unwrap().kind(),
            StatementKind::Ddl
        );
        assert_eq!(
            Statement::parse("TRUNCATE TABLE t").unwrap().kind(),
            StatementKind::Ddl
        );
        assert_eq!(
            Statement::parse("BEGIN NULL; END;").unwrap().kind(),
            StatementKind::PlSql
        );
        assert_eq!(
            Statement::parse("DECLARE x NUMBER; BEGIN NULL; END;")
                .unwrap()
                .kind(),
            StatementKind::PlSql
        );
    }

    #[test]
    fn test_classify_skips_comments() {
        let sql = "/* leading\ncomment */ -- more\nSELECT 1 FROM DUAL";
        assert_eq!(Statement::parse(sql).unwrap().kind(), StatementKind::Query);
    }

    #[test]
    fn test_keyword_inside_literal_ignored() {
        let stmt = Statement::parse("SELECT 'INSERT' FROM DUAL").unwrap();
        assert_eq!(stmt.kind(), StatementKind::Query);
    }

    #[test]
    fn test_bind_names() {
        let stmt = Statement::parse("INSERT INTO t(id, name, age) VALUES(:1, :2, :3)").unwrap();
        assert_eq!(stmt.bind_names(), &["1", "2", "3"]);

        let stmt = Statement::parse("SELECT * FROM t WHERE id = :id AND x = :id").unwrap();
        assert_eq!(stmt.bind_names(), &["ID"]);
    }

    #[test]
    fn test_colon_in_literal_not_a_bind() {
        let stmt = Statement::parse("SELECT ':notabind' FROM t WHERE id = :real").unwrap();
        assert_eq!(stmt.bind_names(), &["REAL"]);
    }

    #[test]
    fn test_returning_flag() {
        let stmt =
            Statement::parse("INSERT INTO t(id) VALUES (:1) RETURNING id INTO :2").unwrap();
        assert!(stmt.is_returning());
        assert_eq!(stmt.kind(), StatementKind::Dml);

        let stmt = Statement::parse("INSERT INTO t(id) VALUES (:1)").unwrap();
        assert!(!stmt.is_returning());

        // RETURNING in a literal does not count
        let stmt = Statement::parse("UPDATE t SET x = 'RETURNING INTO' WHERE id = :1").unwrap();
        assert!(!stmt.is_returning());
    }

    #[test]
    fn test_missing_quote() {
        assert!(matches!(
            Statement::parse("SELECT 'oops FROM DUAL"),
            Err(Error::MissingEndingQuote)
        ));
    }

    #[test]
    fn test_escaped_quote_ok() {
        let stmt = Statement::parse("SELECT 'it''s fine' FROM DUAL").unwrap();
        assert_eq!(stmt.kind(), StatementKind::Query);
    }

    #[test]
    fn test_cursor_statement() {
        let stmt = Statement::from_cursor(42);
        assert_eq!(stmt.kind(), StatementKind::Cursor);
        assert_eq!(stmt.cursor_id(), 42);
        assert!(stmt.can_reexecute());
    }

    #[test]
    fn test_reexecute_gate() {
        let mut stmt = Statement::parse("SELECT 1 FROM DUAL").unwrap();
        assert!(!stmt.can_reexecute());
        stmt.set_cursor_id(7);
        assert!(stmt.can_reexecute());
        stmt.set_requires_full_execute(true);
        assert!(!stmt.can_reexecute());

        let mut ddl = Statement::parse("CREATE TABLE t (x NUMBER)").unwrap();
        ddl.set_cursor_id(8);
        assert!(!ddl.can_reexecute());
    }
}

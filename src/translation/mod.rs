//! SQL text helpers: placeholder rewriting and statement classification.
//!
//! Both helpers run the same lightweight scanner, which skips quoted literals, quoted
//! identifiers, comments and dollar-quoted bodies. It is not a SQL parser; unusual
//! constructs (e.g. Postgres JSON `?` operators) are not recognized.

use std::borrow::Cow;

mod scanner;

use scanner::{Event, scan};

/// Target placeholder style for translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// PostgreSQL-style placeholders like `$1`.
    Postgres,
    /// SQLite-style placeholders like `?1`.
    Sqlite,
}

/// Rough classification of a statement by its leading top-level keyword.
///
/// `WITH` prefixes are looked through, so `WITH x AS (...) INSERT ...` is an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    /// `INSERT` or SQLite's `REPLACE`
    Insert,
    Update,
    Delete,
    Other,
}

/// Rewrite placeholders into the target style.
///
/// For [`PlaceholderStyle::Postgres`], `?NNN` becomes `$NNN` and a bare `?` takes the
/// number one greater than the largest number assigned so far (SQLite's rule), so
/// `a = ? AND b = ?` becomes `a = $1 AND b = $2`. For [`PlaceholderStyle::Sqlite`],
/// `$NNN` becomes `?NNN`.
///
/// Returns a borrowed `Cow` when no changes are needed.
#[must_use]
pub fn translate_placeholders(sql: &str, target: PlaceholderStyle) -> Cow<'_, str> {
    let mut out: Option<String> = None;
    let mut copied_to = 0;
    let mut highest: u32 = 0;

    scan(sql, |event| {
        let (start, end, replacement) = match (target, event) {
            (PlaceholderStyle::Postgres, Event::Placeholder { start, end, digits }) => {
                let number = match digits.and_then(|d| d.parse::<u32>().ok()) {
                    Some(n) => n,
                    None => highest + 1,
                };
                highest = highest.max(number);
                (start, end, format!("${number}"))
            }
            (PlaceholderStyle::Sqlite, Event::DollarPlaceholder { start, end, digits }) => {
                (start, end, format!("?{digits}"))
            }
            _ => return,
        };
        let buf = out.get_or_insert_with(|| String::with_capacity(sql.len() + 8));
        buf.push_str(&sql[copied_to..start]);
        buf.push_str(&replacement);
        copied_to = end;
    });

    match out {
        Some(mut buf) => {
            buf.push_str(&sql[copied_to..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(sql),
    }
}

/// Classify `sql` by its first top-level keyword.
#[must_use]
pub fn statement_kind(sql: &str) -> StatementKind {
    let mut kind = None;
    let mut saw_with = false;
    scan(sql, |event| {
        if kind.is_some() {
            return;
        }
        let Event::Word(word) = event else {
            return;
        };
        let classified = classify_keyword(word);
        if !saw_with && word.eq_ignore_ascii_case("with") {
            saw_with = true;
        } else if saw_with {
            // inside a WITH prefix only a DML keyword ends the search
            if classified != StatementKind::Other {
                kind = Some(classified);
            }
        } else {
            kind = Some(classified);
        }
    });
    kind.unwrap_or(StatementKind::Other)
}

/// Whether `sql` carries a top-level `RETURNING` clause.
#[must_use]
pub fn has_returning_clause(sql: &str) -> bool {
    let mut found = false;
    scan(sql, |event| {
        if let Event::Word(word) = event {
            found |= word.eq_ignore_ascii_case("returning");
        }
    });
    found
}

fn classify_keyword(word: &str) -> StatementKind {
    if word.eq_ignore_ascii_case("select") || word.eq_ignore_ascii_case("values") {
        StatementKind::Select
    } else if word.eq_ignore_ascii_case("insert") || word.eq_ignore_ascii_case("replace") {
        StatementKind::Insert
    } else if word.eq_ignore_ascii_case("update") {
        StatementKind::Update
    } else if word.eq_ignore_ascii_case("delete") {
        StatementKind::Delete
    } else {
        StatementKind::Other
    }
}

//! Composable SQL statements.
//!
//! A [`Statement`] is literal SQL text interleaved with bound parameters. It is
//! dialect agnostic: placeholders and identifier quoting are chosen later by a
//! [`Dialect`](crate::Dialect) when the statement is resolved.
//!
//! What an interpolation means is inferred from the text right before it:
//!
//! | written as                    | value              | result                        |
//! |-------------------------------|--------------------|-------------------------------|
//! | `WHERE id = {}`               | scalar             | bound parameter               |
//! | `FROM "{}"`                   | scalar             | escaped identifier            |
//! | `IN ({})`                     | array              | `$1, $2, ...`                 |
//! | `SELECT "{}" FROM`            | array              | `"a", "b"`                    |
//! | `INSERT INTO t ({})`          | object             | `"a", "b") VALUES ($1, $2`    |
//! | `UPDATE t SET {}`             | object             | `"a" = $1, "b" = $2`          |
//! | `SELECT * FROM t {}`          | statement          | spliced in place              |
//!
//! # Example
//!
//! ```ignore
//! use sqltmpl::{sql, Dialect};
//!
//! let filter = sql!("WHERE \"{}\" = {}", "status", "active")?;
//! let q = sql!("SELECT * FROM \"{}\" {} LIMIT {}", "users", filter, 10)?;
//!
//! let resolved = Dialect::Postgres.resolve(&q)?;
//! assert_eq!(resolved.sql, r#"SELECT * FROM "users" WHERE "status" = $1 LIMIT $2"#);
//! ```

mod fragment;
mod template;


pub use fragment::Fragment;

use crate::error::{DbError, DbResult};
use crate::value::Value;

/// Glyphs that open an identifier when they directly precede an interpolation.
pub const IDENTIFIER_QUOTES: [char; 2] = ['"', '`'];

/// Compose a [`Statement`] from a `{}` template, like `format!`.
///
/// Evaluates to `DbResult<Statement>`.
///
/// ```ignore
/// let q = sql!("SELECT * FROM \"{}\" WHERE id = {}", "users", 42)?;
/// ```
#[macro_export]
macro_rules! sql {
    ($template:expr $(,)?) => {
        $crate::Statement::template($template, ::std::vec::Vec::<$crate::Fragment>::new())
    };
    ($template:expr, $($value:expr),+ $(,)?) => {
        $crate::Statement::template($template, ::std::vec![$($crate::Fragment::from($value)),+])
    };
}

/// Literal SQL fragments interleaved with parameters.
///
/// Invariant: `fragments.len() == parameters.len() + 1`. Parameter `i` sits
/// between `fragments[i]` and `fragments[i + 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    fragments: Vec<String>,
    parameters: Vec<Value>,
}

impl Default for Statement {
    fn default() -> Self {
        Self::new()
    }
}

impl Statement {
    /// An empty statement.
    pub fn new() -> Self {
        Self {
            fragments: vec![String::new()],
            parameters: Vec::new(),
        }
    }

    /// A statement made of literal text only.
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            fragments: vec![text.into()],
            parameters: Vec::new(),
        }
    }

    /// Compose from literal segments and the values between them.
    ///
    /// `literals` must have exactly one more element than `values`.
    pub fn from_parts<S: AsRef<str>>(
        literals: &[S],
        values: impl IntoIterator<Item = Fragment>,
    ) -> DbResult<Self> {
        let values: Vec<Fragment> = values.into_iter().collect();
        if literals.len() != values.len() + 1 {
            return Err(DbError::composition(format!(
                "expected {} interpolated values for {} literal segments, got {}",
                literals.len().saturating_sub(1),
                literals.len(),
                values.len()
            )));
        }

        let mut literals = literals.iter();
        let mut statement = match literals.next() {
            Some(first) => Self::raw(first.as_ref()),
            None => Self::new(),
        };
        for (value, literal) in values.into_iter().zip(literals) {
            statement.append_fragment(value)?;
            statement.append_raw(literal.as_ref());
        }
        Ok(statement)
    }

    /// Compose from a template where each `{}` is an interpolation slot.
    ///
    /// `{{` and `}}` produce literal braces.
    pub fn template(template: &str, values: impl IntoIterator<Item = Fragment>) -> DbResult<Self> {
        let literals = template::split_template(template);
        Self::from_parts(&literals, values)
    }

    /// Build a `"col" = value, ...` assignment list.
    ///
    /// Useful where the list does not follow `SET `, such as MySQL's
    /// `ON DUPLICATE KEY UPDATE`.
    pub fn assignment_list<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> DbResult<Self>
    where
        K: Into<String>,
        V: Into<Fragment>,
    {
        let mut statement = Self::new();
        statement.append_assignments(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )?;
        Ok(statement)
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Value>) {
        (self.fragments, self.parameters)
    }

    /// True when there are no parameters and the text is only whitespace.
    pub fn is_blank(&self) -> bool {
        self.parameters.is_empty() && self.fragments.iter().all(|f| f.trim().is_empty())
    }

    /// Append literal SQL text without creating a parameter slot.
    pub fn append_raw(&mut self, text: &str) -> &mut Self {
        if text.is_empty() {
            return self;
        }

        match self.fragments.last_mut() {
            Some(last) => last.push_str(text),
            None => self.fragments.push(text.to_string()),
        }
        self
    }

    /// Append an interpolated value; see the module docs for how it is read.
    pub fn append(&mut self, value: impl Into<Fragment>) -> DbResult<&mut Self> {
        self.append_fragment(value.into())?;
        Ok(self)
    }

    fn append_fragment(&mut self, fragment: Fragment) -> DbResult<()> {
        match fragment {
            Fragment::Statement(other) => {
                let (fragments, parameters) = other.into_parts();
                let mut fragments = fragments.into_iter();
                if let Some(first) = fragments.next() {
                    self.append_raw(&first);
                    self.fragments.extend(fragments);
                    self.parameters.extend(parameters);
                }
                Ok(())
            }
            Fragment::Scalar(value) => {
                self.push_parameter(value);
                Ok(())
            }
            Fragment::Absent => Ok(()),
            Fragment::Array(items) => self.append_array(items),
            Fragment::Object(pairs) => self.append_object(pairs),
        }
    }

    fn push_parameter(&mut self, value: Value) {
        self.parameters.push(value);
        self.fragments.push(String::new());
    }

    fn last_fragment(&self) -> &str {
        self.fragments.last().map(String::as_str).unwrap_or_default()
    }

    fn trailing_quote(&self) -> Option<char> {
        self.last_fragment()
            .chars()
            .next_back()
            .filter(|c| IDENTIFIER_QUOTES.contains(c))
    }

    fn append_joined(&mut self, items: Vec<Fragment>, separator: &str) -> DbResult<()> {
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                self.append_raw(separator);
            }
            self.append_fragment(item)?;
        }
        Ok(())
    }

    fn append_array(&mut self, items: Vec<Fragment>) -> DbResult<()> {
        if items.first().is_none_or(Fragment::is_statement) {
            return self.append_joined(items, "");
        }

        match self.trailing_quote() {
            Some(quote) => {
                let separator = format!("{quote}, {quote}");
                self.append_joined(items, &separator)
            }
            None => self.append_joined(items, ", "),
        }
    }

    fn append_object(&mut self, pairs: Vec<(String, Fragment)>) -> DbResult<()> {
        let last = self.last_fragment();
        let opens_values = last.ends_with('(');
        let after_set = ends_with_ignore_ascii_case(last, " SET ");

        if !opens_values && !after_set {
            return Err(DbError::composition(format!(
                "objects can only be interpolated after `(` or `SET `, found `{}`",
                tail(last, 32)
            )));
        }
        if !opens_values {
            return self.append_assignments(pairs);
        }
        if pairs.is_empty() {
            return Err(DbError::composition(
                "cannot interpolate an empty object as a column list",
            ));
        }

        let (columns, values): (Vec<String>, Vec<Fragment>) = pairs.into_iter().unzip();
        self.append_raw("\"");
        for (i, column) in columns.into_iter().enumerate() {
            if i > 0 {
                self.append_raw("\", \"");
            }
            self.push_parameter(Value::Text(column));
        }
        self.append_raw("\") VALUES (");
        self.append_joined(values, ", ")
    }

    fn append_assignments(&mut self, pairs: Vec<(String, Fragment)>) -> DbResult<()> {
        if pairs.is_empty() {
            return Err(DbError::composition(
                "cannot interpolate an empty object as an assignment list",
            ));
        }

        for (i, (column, value)) in pairs.into_iter().enumerate() {
            self.append_raw(if i == 0 { "\"" } else { ", \"" });
            self.push_parameter(Value::Text(column));
            self.append_raw("\" = ");
            self.append_fragment(value)?;
        }
        Ok(())
    }
}

fn ends_with_ignore_ascii_case(text: &str, suffix: &str) -> bool {
    let (text, suffix) = (text.as_bytes(), suffix.as_bytes());
    text.len() >= suffix.len() && text[text.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

/// The last `max` bytes of `text`, cut on a char boundary.
fn tail(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

use super::Statement;
use crate::record::Record;
use crate::value::Value;

/// A value interpolated into a [`Statement`].
///
/// The variant decides what [`Statement::append`] does with it; the literal
/// text right before the interpolation decides the rest.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Spliced in place, absorbing its fragments and parameters.
    Statement(Statement),
    /// A bound parameter, or an identifier when wrapped in quote glyphs.
    Scalar(Value),
    /// A value list, identifier list, or a sequence of statements.
    Array(Vec<Fragment>),
    /// Column/value pairs; only valid after `(` or `SET `.
    Object(Vec<(String, Fragment)>),
    /// Appends nothing.
    Absent,
}

impl Fragment {
    /// Build an [`Fragment::Object`] from column/value pairs.
    pub fn object<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Fragment>,
    {
        Fragment::Object(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build an [`Fragment::Array`] from anything convertible.
    pub fn array<T: Into<Fragment>>(items: impl IntoIterator<Item = T>) -> Self {
        Fragment::Array(items.into_iter().map(Into::into).collect())
    }

    pub fn is_statement(&self) -> bool {
        matches!(self, Fragment::Statement(_))
    }
}

impl From<Statement> for Fragment {
    fn from(v: Statement) -> Self {
        Fragment::Statement(v)
    }
}

impl From<Option<Statement>> for Fragment {
    fn from(v: Option<Statement>) -> Self {
        v.map(Fragment::Statement).unwrap_or(Fragment::Absent)
    }
}

impl From<Value> for Fragment {
    fn from(v: Value) -> Self {
        Fragment::Scalar(v)
    }
}

impl From<Record> for Fragment {
    fn from(v: Record) -> Self {
        Fragment::Object(
            v.into_iter()
                .map(|(column, value)| (column, Fragment::Scalar(value)))
                .collect(),
        )
    }
}

impl<T: Into<Fragment>> From<Vec<T>> for Fragment {
    fn from(v: Vec<T>) -> Self {
        Fragment::array(v)
    }
}

macro_rules! impl_scalar_fragment {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Fragment {
                fn from(v: $ty) -> Self {
                    Fragment::Scalar(Value::from(v))
                }
            }

            impl From<Option<$ty>> for Fragment {
                fn from(v: Option<$ty>) -> Self {
                    Fragment::Scalar(Value::from(v))
                }
            }
        )+
    };
}

impl_scalar_fragment!(
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    f32,
    f64,
    bool,
    String,
    &str,
    &String,
    uuid::Uuid,
    chrono::DateTime<chrono::Utc>,
    chrono::NaiveDateTime,
    chrono::NaiveDate,
);

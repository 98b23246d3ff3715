//! Bind values and parameter sets accepted by [`Tx`](crate::Tx) statements.

use std::collections::HashMap;

use crate::builder::{expand, expand_positional, ExpandedStatement};

/// A single scalar value bound to one `?` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

macro_rules! value_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Int(i64::from(value))
                }
            }
        )*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Text(value.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// A parameter: either one value or a list expanded into `?, ?, ...`.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Scalar(Value),
    List(Vec<Value>),
}

impl Param {
    /// Placeholder text this parameter occupies in the expanded SQL.
    pub(crate) fn placeholders(&self) -> String {
        match self {
            Param::Scalar(_) => "?".to_owned(),
            Param::List(values) => vec!["?"; values.len()].join(", "),
        }
    }

    pub(crate) fn values(&self) -> &[Value] {
        match self {
            Param::Scalar(value) => std::slice::from_ref(value),
            Param::List(values) => values,
        }
    }
}

fn list<I>(values: I) -> Param
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    Param::List(values.into_iter().map(Into::into).collect())
}

/// Anything that can turn an SQL template into an [`ExpandedStatement`].
///
/// Implemented by [`NamedParams`] (`:name` references), [`PositionalParams`]
/// (`?` placeholders) and `()` for statements without parameters.
pub trait Params {
    fn expand(&self, template: &str) -> crate::Result<ExpandedStatement>;
}

impl Params for () {
    fn expand(&self, template: &str) -> crate::Result<ExpandedStatement> {
        Ok(ExpandedStatement {
            sql: template.to_owned(),
            parameters: Vec::new(),
        })
    }
}

/// Parameters bound by `:name`.
///
/// # Examples
///
/// ```
/// use sqlx_txman::NamedParams;
///
/// let params = NamedParams::new()
///     .put("value", "abc")
///     .put_list("keys", [123, 456]);
/// assert_eq!(params.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedParams {
    entries: HashMap<String, Param>,
}

impl NamedParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a scalar value to `:name`, replacing any earlier value.
    pub fn put(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(name.into(), Param::Scalar(value.into()));
        self
    }

    /// Binds a list to `:name`; each element gets its own placeholder.
    pub fn put_list<I>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.entries.insert(name.into(), list(values));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Params for NamedParams {
    fn expand(&self, template: &str) -> crate::Result<ExpandedStatement> {
        expand(template, self)
    }
}

/// Parameters bound to `?` placeholders in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionalParams {
    entries: Vec<Param>,
}

impl PositionalParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, value: impl Into<Value>) -> Self {
        self.entries.push(Param::Scalar(value.into()));
        self
    }

    /// Appends a list; its `?` is widened to one placeholder per element.
    pub fn push_list<I>(mut self, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.entries.push(list(values));
        self
    }

    pub fn as_slice(&self) -> &[Param] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Params for PositionalParams {
    fn expand(&self, template: &str) -> crate::Result<ExpandedStatement> {
        expand_positional(template, self)
    }
}

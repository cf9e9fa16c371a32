use serde::{Deserialize, Serialize};

/// A typed partition value.
///
/// Dates are days since the unix epoch, timestamps microseconds since the
/// unix epoch, decimals an unscaled value with its scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum Literal {
    Null,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Date(i32),
    Timestamp(i64),
    String(String),
    Binary(Vec<u8>),
    Decimal { unscaled: i64, scale: u8 },
}

impl Literal {
    /// Whether this literal is the null value
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl<T: Into<Literal>> From<Option<T>> for Literal {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

//! Job parameter values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A nested job parameter: mappings, ordered sequences and scalars.
///
/// Mappings are kept in a `BTreeMap`, so two values built from the same
/// entries compare (and encode) the same whatever order the keys were
/// inserted in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Absent / undefined value
    #[default]
    Null,
    /// Boolean flag
    Bool(bool),
    /// Integer number
    Int(i64),
    /// Floating-point number
    Float(f64),
    /// Text
    String(String),
    /// Ordered sequence
    List(Vec<ParamValue>),
    /// String-keyed mapping
    Map(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    /// Build an empty mapping.
    pub fn map() -> Self {
        ParamValue::Map(BTreeMap::new())
    }

    /// Borrow the text of a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view; strings holding an integer are accepted too.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            ParamValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Strict boolean view.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow the entries of a mapping.
    pub fn as_map(&self) -> Option<&BTreeMap<String, ParamValue>> {
        match self {
            ParamValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Borrow the items of a sequence.
    pub fn as_list(&self) -> Option<&[ParamValue]> {
        match self {
            ParamValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a key when this value is a mapping.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Whether this is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }

    /// Loose truthiness used for flag parameters.
    ///
    /// `Null`, `false`, `0`, `0.0`, `""` and `"0"` are false; everything
    /// else, including empty containers, is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            ParamValue::Null => false,
            ParamValue::Bool(b) => *b,
            ParamValue::Int(i) => *i != 0,
            ParamValue::Float(f) => *f != 0.0,
            ParamValue::String(s) => !(s.is_empty() || s == "0"),
            ParamValue::List(_) | ParamValue::Map(_) => true,
        }
    }

    /// Render for splicing into text: strings verbatim, everything else encoded.
    pub fn to_param_string(&self) -> String {
        match self {
            ParamValue::String(s) => s.clone(),
            other => crate::codec::encode(other),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::String(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::String(s)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Int(i)
    }
}

impl From<f64> for ParamValue {
    fn from(f: f64) -> Self {
        ParamValue::Float(f)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(items: Vec<T>) -> Self {
        ParamValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, ParamValue>> for ParamValue {
    fn from(map: BTreeMap<String, ParamValue>) -> Self {
        ParamValue::Map(map)
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for ParamValue {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        ParamValue::Map(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

//! Block parameters: an opaque ordered map with typed accessors.
//!
//! Params are authored data, not compiled data: the compiler reads them
//! when lowering a block's behavior (e.g. the constant's value, a domain's
//! count) but never writes them.

use indexmap::IndexMap;

/// One parameter value.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    /// A floating-point number.
    Float(f32),
    /// An integer.
    Int(i64),
    /// A boolean flag.
    Bool(bool),
    /// Free text.
    Text(String),
    /// One choice out of an enum block's declared set.
    Choice(String),
}

/// An ordered parameter map. Insertion order is author order and is
/// preserved for display and hashing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params {
    entries: IndexMap<String, ParamValue>,
}

impl Params {
    /// An empty parameter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: ParamValue) -> &mut Self {
        self.entries.insert(key.into(), value);
        self
    }

    /// Builder-style set.
    pub fn with(mut self, key: impl Into<String>, value: ParamValue) -> Self {
        self.set(key, value);
        self
    }

    /// Raw lookup.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.get(key)
    }

    /// A float parameter; `Int` values coerce losslessly.
    pub fn get_f32(&self, key: &str) -> Option<f32> {
        match self.entries.get(key)? {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f32),
            _ => None,
        }
    }

    /// A float parameter with a fallback.
    pub fn f32_or(&self, key: &str, default: f32) -> f32 {
        self.get_f32(key).unwrap_or(default)
    }

    /// An integer parameter.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.entries.get(key)? {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// An integer parameter with a fallback.
    pub fn i64_or(&self, key: &str, default: i64) -> i64 {
        self.get_i64(key).unwrap_or(default)
    }

    /// A boolean parameter.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.entries.get(key)? {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// A text or choice parameter.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.entries.get(key)? {
            ParamValue::Text(v) | ParamValue::Choice(v) => Some(v),
            _ => None,
        }
    }

    /// Iterate `(key, value)` pairs in author order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors() {
        let p = Params::new()
            .with("value", ParamValue::Float(0.5))
            .with("count", ParamValue::Int(5000))
            .with("wrap", ParamValue::Bool(true))
            .with("mode", ParamValue::Choice("byId".into()));
        assert_eq!(p.get_f32("value"), Some(0.5));
        assert_eq!(p.get_f32("count"), Some(5000.0));
        assert_eq!(p.get_i64("count"), Some(5000));
        assert_eq!(p.get_bool("wrap"), Some(true));
        assert_eq!(p.get_str("mode"), Some("byId"));
        assert_eq!(p.get_f32("missing"), None);
        assert_eq!(p.f32_or("missing", 1.0), 1.0);
    }

    #[test]
    fn insertion_order_preserved() {
        let p = Params::new()
            .with("b", ParamValue::Int(1))
            .with("a", ParamValue::Int(2));
        let keys: Vec<&str> = p.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }
}

//! Constant values attached to declarations.

use crate::{Decimal128, Namespace};

/// Initial value of a slot or optional parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Undefined,
    Null,
    Bool(bool),
    Int(i32),
    Uint(u32),
    Double(f64),
    Decimal(Decimal128),
    String(String),
    Namespace(Namespace),
}

/// One `[Name(key="value", value)]` metadata annotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetadataEntry {
    pub id: String,
    pub values: Vec<MetadataValue>,
}

/// A metadata argument. Keyless arguments have `key == None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetadataValue {
    pub key: Option<String>,
    pub value: String,
}

impl MetadataEntry {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: Vec::new(),
        }
    }

    /// Append a `key="value"` argument.
    pub fn with_pair(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.push(MetadataValue {
            key: Some(key.into()),
            value: value.into(),
        });
        self
    }

    /// Append a keyless argument.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.values.push(MetadataValue {
            key: None,
            value: value.into(),
        });
        self
    }

    /// Content key used to share identical annotations between members.
    ///
    /// The id followed by each key and value, in order.
    pub fn content_key(&self) -> String {
        let mut key = self.id.clone();
        for value in &self.values {
            if let Some(k) = &value.key {
                key.push_str(k);
            }
            key.push_str(&value.value);
        }
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_key_concatenates() {
        let entry = MetadataEntry::new("Event")
            .with_pair("name", "change")
            .with_value("x");
        assert_eq!(entry.content_key(), "Eventnamechangex");
    }
}

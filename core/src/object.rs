//! Targets for decoded response objects.

use std::collections::HashMap;

use tracing::debug;

use crate::error::GatewayError;
use crate::parser::{Decoded, Parser};

/// Anything that can receive string properties from a decoded response.
pub trait PropertyBag {
    fn set(&mut self, key: String, value: String);
}

/// A generic remote object: a bag of string properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: HashMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl PropertyBag for Record {
    fn set(&mut self, key: String, value: String) {
        self.fields.insert(key, value);
    }
}

impl PropertyBag for HashMap<String, String> {
    fn set(&mut self, key: String, value: String) {
        self.insert(key, value);
    }
}

/// Decode `raw` as a flat object and copy each field into `target`.
///
/// Returns the number of fields set. Text the parser cannot decode sets
/// nothing and is not an error; a list-shaped body is rejected with
/// `UnsupportedOperation` before anything is written.
pub fn populate<T: PropertyBag + ?Sized>(
    parser: &dyn Parser,
    raw: &str,
    target: &mut T,
) -> Result<usize, GatewayError> {
    match parser.parse(raw) {
        Ok(Decoded::Object(fields)) => {
            let count = fields.len();
            for (key, value) in fields {
                target.set(key, value);
            }
            Ok(count)
        }
        Ok(Decoded::List(len)) => Err(GatewayError::UnsupportedOperation(format!(
            "cannot decode a list of {len} items into a single object"
        ))),
        Err(error) => {
            debug!(%error, "response is not a decodable object; no fields populated");
            Ok(0)
        }
    }
}

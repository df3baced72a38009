//! Errors of the fallible reflection surface.
//!
//! Misuse of the table API itself (erasing an empty slot, a load factor
//! outside `(0, 1]`) panics instead.

use core::fmt;

#[derive(Debug)]
pub enum SerializeError {
    /// serde_json rejected one element.
    Element(serde_json::Error),
    /// A table deserializes only from a JSON array.
    NotAnArray,
    /// The JSON shape does not fit the descriptor (a pair needs a
    /// two-element array).
    TypeMismatch { expected: String },
}

impl fmt::Display for SerializeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializeError::Element(e) => write!(f, "element (de)serialization failed: {e}"),
            SerializeError::NotAnArray => f.write_str("expected a JSON array of elements"),
            SerializeError::TypeMismatch { expected } => {
                write!(f, "JSON value does not match type {expected}")
            }
        }
    }
}

impl std::error::Error for SerializeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SerializeError::Element(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SerializeError {
    fn from(e: serde_json::Error) -> Self {
        SerializeError::Element(e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateName(String),
    UnknownType,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::DuplicateName(name) => write!(f, "type {name:?} is already registered"),
            RegistryError::UnknownType => f.write_str("type handle is not registered"),
        }
    }
}

impl std::error::Error for RegistryError {}

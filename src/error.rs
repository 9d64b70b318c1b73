use std::{fmt, io, string::FromUtf8Error};

use quick_xml::{events::attributes::AttrError, Error as XmlError};
use regex::Error as RegexError;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum ApparatusError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Custom error: {0}")]
    Custom(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("You do not have permission to access this resource")]
    PermissionDenied,
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Document tree error: {0}")]
    Tree(String),
    #[error("XML error: {0}")]
    Xml(String),
}

impl From<toml::de::Error> for ApparatusError {
    fn from(src: toml::de::Error) -> ApparatusError {
        ApparatusError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for ApparatusError {
    fn from(src: toml::ser::Error) -> ApparatusError {
        ApparatusError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for ApparatusError {
    fn from(src: JsonError) -> ApparatusError {
        ApparatusError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<io::Error> for ApparatusError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => ApparatusError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => ApparatusError::PermissionDenied,
            _ => ApparatusError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<fmt::Error> for ApparatusError {
    fn from(x: fmt::Error) -> Self {
        ApparatusError::Custom(format!("{x}"))
    }
}

impl From<RegexError> for ApparatusError {
    fn from(x: RegexError) -> Self {
        ApparatusError::Config(format!("Regex parse failed: {x}"))
    }
}

impl From<XmlError> for ApparatusError {
    fn from(x: XmlError) -> Self {
        ApparatusError::Xml(format!("{x}"))
    }
}

impl From<AttrError> for ApparatusError {
    fn from(x: AttrError) -> Self {
        ApparatusError::Xml(format!("Malformed attribute: {x}"))
    }
}

impl From<FromUtf8Error> for ApparatusError {
    fn from(x: FromUtf8Error) -> Self {
        ApparatusError::Serialization(format!("Output is not valid UTF-8: {x}"))
    }
}

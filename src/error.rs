//! Error type shared by every pipeline stage.
//!
//! No stage recovers locally: the first error aborts the run and is reported
//! by the binary.

use std::fmt;

#[derive(Debug)]
pub enum EtlError {
    /// Database unreachable, authentication failed, or pool checkout failed
    Connection(String),
    /// Unparseable date or numeric value during a transform
    Parse(String),
    /// Missing table, column or primary key at the destination
    Schema(String),
    /// Malformed SQL or constraint violation
    Query(diesel::result::Error),
    /// Missing or invalid environment / settings file
    Config(String),
}

impl EtlError {
    pub fn parse(msg: impl Into<String>) -> Self {
        EtlError::Parse(msg.into())
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        EtlError::Schema(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        EtlError::Config(msg.into())
    }
}

impl fmt::Display for EtlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EtlError::Connection(msg) => write!(f, "Connection error: {}", msg),
            EtlError::Parse(msg) => write!(f, "Parse error: {}", msg),
            EtlError::Schema(msg) => write!(f, "Schema error: {}", msg),
            EtlError::Query(e) => write!(f, "Query error: {}", e),
            EtlError::Config(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for EtlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EtlError::Query(e) => Some(e),
            _ => None,
        }
    }
}

impl From<diesel::result::Error> for EtlError {
    fn from(e: diesel::result::Error) -> Self {
        EtlError::Query(e)
    }
}

impl From<diesel::ConnectionError> for EtlError {
    fn from(e: diesel::ConnectionError) -> Self {
        EtlError::Connection(e.to_string())
    }
}

impl From<r2d2::Error> for EtlError {
    fn from(e: r2d2::Error) -> Self {
        EtlError::Connection(e.to_string())
    }
}

impl From<serde_yaml::Error> for EtlError {
    fn from(e: serde_yaml::Error) -> Self {
        EtlError::Config(format!("invalid settings file: {}", e))
    }
}

impl From<std::io::Error> for EtlError {
    fn from(e: std::io::Error) -> Self {
        EtlError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_kind() {
        assert_eq!(
            EtlError::schema("table 'dim_x' does not exist").to_string(),
            "Schema error: table 'dim_x' does not exist"
        );
        assert!(EtlError::parse("bad date").to_string().starts_with("Parse error"));
    }

    #[test]
    fn test_diesel_error_maps_to_query() {
        let err: EtlError = diesel::result::Error::NotFound.into();
        assert!(matches!(err, EtlError::Query(_)));
    }
}

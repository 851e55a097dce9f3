//! Relationship types - connection classification between two models

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attributes::Attribute;

/// How the rows of two models are connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionType {
    /// `1:1` - both sides point at a single row
    OneToOne,
    /// `1:many` - this side stores the other's key; the other side lists us
    OneToMany,
    /// `many:1` - the other side stores our key in its `via` attribute
    ManyToOne,
    /// `many:many` - rows are linked through a join table
    ManyToMany,
}

impl ConnectionType {
    /// Whether this side's column holds the counterpart's primary key
    pub fn is_stored_locally(self) -> bool {
        matches!(self, ConnectionType::OneToOne | ConnectionType::OneToMany)
    }

    pub fn code(self) -> &'static str {
        match self {
            ConnectionType::OneToOne => "1:1",
            ConnectionType::OneToMany => "1:many",
            ConnectionType::ManyToOne => "many:1",
            ConnectionType::ManyToMany => "many:many",
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A resolved relationship edge seen from the declaring model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub connection_type: ConnectionType,
    pub dominant: bool,
    /// The declaring attribute
    pub attribute: Attribute,
    /// Registry key of the related model
    pub other_model: String,
    /// The reciprocal attribute on the related model
    pub other_attribute: Attribute,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_type_codes() {
        assert_eq!(ConnectionType::OneToOne.to_string(), "1:1");
        assert_eq!(ConnectionType::OneToMany.to_string(), "1:many");
        assert_eq!(ConnectionType::ManyToOne.to_string(), "many:1");
        assert_eq!(ConnectionType::ManyToMany.to_string(), "many:many");
    }

    #[test]
    fn test_locally_stored_types() {
        assert!(ConnectionType::OneToOne.is_stored_locally());
        assert!(ConnectionType::OneToMany.is_stored_locally());
        assert!(!ConnectionType::ManyToOne.is_stored_locally());
        assert!(!ConnectionType::ManyToMany.is_stored_locally());
    }
}

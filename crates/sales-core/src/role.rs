//! Authorization roles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// A coarse-grained permission tag carried in token claims.
///
/// The set is closed: any other string fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Full administrative access.
    #[serde(rename = "ADMIN")]
    Admin,
    /// Regular authenticated user.
    #[serde(rename = "USER")]
    User,
}

impl Role {
    /// Every recognised role.
    pub const ALL: [Self; 2] = [Self::Admin, Self::User];

    /// The wire representation of this role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::User => "USER",
        }
    }
}

impl FromStr for Role {
    type Err = CoreError;

    /// Role names are matched exactly; `"admin"` is not `ADMIN`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Self::Admin),
            "USER" => Ok(Self::User),
            other => Err(CoreError::InvalidRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_roles() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("USER".parse::<Role>().unwrap(), Role::User);
    }

    #[test]
    fn parse_rejects_unknown_and_case_variants() {
        assert_eq!(
            "SUPERUSER".parse::<Role>(),
            Err(CoreError::InvalidRole("SUPERUSER".to_string()))
        );
        assert!("admin".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&vec![Role::Admin, Role::User]).unwrap();
        assert_eq!(json, r#"["ADMIN","USER"]"#);
        let parsed: Vec<Role> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, vec![Role::Admin, Role::User]);
    }

    #[test]
    fn display_matches_wire_name() {
        for role in Role::ALL {
            assert_eq!(role.to_string(), role.as_str());
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }
}

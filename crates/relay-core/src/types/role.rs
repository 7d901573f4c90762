//! User roles carried in identity claims.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role of an authenticated identity. Ordered: `User < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular chat participant.
    User,
    /// Operator allowed to kick users and read system status.
    Admin,
}

impl Role {
    /// Returns `true` if this role is at least as privileged as `required`.
    pub fn has_at_least(&self, required: Role) -> bool {
        *self >= required
    }

    /// Returns `true` if this is the admin role.
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("Invalid role: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privilege_ordering() {
        assert!(Role::Admin > Role::User);
        assert!(Role::Admin.has_at_least(Role::User));
        assert!(!Role::User.has_at_least(Role::Admin));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("USER".parse::<Role>().unwrap(), Role::User);
        assert!("root".parse::<Role>().is_err());
    }
}

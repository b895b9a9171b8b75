//! Environment-variable record shared with the env storage layer.

use serde::{Deserialize, Serialize};

/// A single environment variable bound to an application.
///
/// `public` controls whether the value may be shown back to users; private
/// values are redacted by display layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
    pub public: bool,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            public: true,
        }
    }

    pub fn private(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            public: false,
            ..Self::new(name, value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_vars_keep_name_and_value() {
        let var = EnvVar::private("DATABASE_URL", "postgres://secret");
        assert_eq!(var.name, "DATABASE_URL");
        assert_eq!(var.value, "postgres://secret");
        assert!(!var.public);
    }
}

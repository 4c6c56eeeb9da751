//! Mapper configuration.

use std::env;

/// Options that change how shapes are projected onto the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapperConfig {
    /// Encode every set as `{L: [...]}` instead of `SS`/`NS`/`BS`
    /// (default: false). Also lifts the string/number/binary restriction on
    /// set items.
    pub set_as_list: bool,
    /// Run shape constraints while reading (default: true).
    pub validate_on_read: bool,
}

impl MapperConfig {
    /// Create configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            set_as_list: env_bool("DYNASHAPE_SET_AS_LIST", default.set_as_list),
            validate_on_read: env_bool("DYNASHAPE_VALIDATE_ON_READ", default.validate_on_read),
        }
    }

    /// Same configuration with `set_as_list` switched on.
    #[must_use]
    pub fn with_set_as_list(mut self) -> Self {
        self.set_as_list = true;
        self
    }
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            set_as_list: false,
            validate_on_read: true,
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key).map_or(default, |v| {
        matches!(v.as_str(), "1" | "true" | "yes" | "TRUE" | "YES")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_create_default_config() {
        let config = MapperConfig::default();
        assert!(!config.set_as_list);
        assert!(config.validate_on_read);
    }

    #[test]
    fn test_should_fall_back_to_default_for_unset_variable() {
        assert!(env_bool("DYNASHAPE_TEST_SURELY_UNSET_VARIABLE", true));
        assert!(!env_bool("DYNASHAPE_TEST_SURELY_UNSET_VARIABLE", false));
    }
}

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What to do with a `page[size]` above the schema maximum.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSizePolicy {
    #[default]
    Clamp,
    Reject,
}

/// Query engine limits, the `query:` section of the application config.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryConfig {
    pub max_path_depth: usize,
    pub max_include_paths: usize,
    pub max_sort_keys: usize,
    pub page_size_policy: PageSizePolicy,
    /// Append `id` ascending to every ordering that lacks it.
    pub append_tiebreaker: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_path_depth: 3,
            max_include_paths: 15,
            max_sort_keys: 3,
            page_size_policy: PageSizePolicy::Clamp,
            append_tiebreaker: true,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryConfigError {
    #[error("max_path_depth must be at least 1")]
    ZeroPathDepth,
}

impl QueryConfig {
    /// Rejects limits the parser cannot honor.
    pub fn validate(&self) -> Result<(), QueryConfigError> {
        if self.max_path_depth == 0 {
            return Err(QueryConfigError::ZeroPathDepth);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_path_depth_is_invalid() {
        assert_eq!(QueryConfig::default().validate(), Ok(()));
        let cfg = QueryConfig {
            max_path_depth: 0,
            ..QueryConfig::default()
        };
        assert_eq!(cfg.validate(), Err(QueryConfigError::ZeroPathDepth));
    }
}

//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Success envelope: every 2xx body is `{ "data": … }`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response payload.
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// Wraps a payload.
    #[must_use]
    pub const fn new(data: T) -> Self {
        Self { data }
    }
}

/// Pagination query parameters for list endpoints.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// Maximum number of items (1-200). Defaults to 50.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Number of items to skip. Defaults to 0.
    #[serde(default)]
    pub offset: usize,
}

/// One page of a list together with the total count.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Number of items matching the query.
    pub total: usize,
    /// Page size applied.
    pub limit: usize,
    /// Offset applied.
    pub offset: usize,
}

const MAX_LIMIT: usize = 200;

fn default_limit() -> usize {
    50
}

impl PageParams {
    /// Clamps `limit` to the allowed range.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            limit: self.limit.clamp(1, MAX_LIMIT),
            offset: self.offset,
        }
    }

    /// Builds a page from items and a total count.
    #[must_use]
    pub fn page<T>(&self, items: Vec<T>, total: usize) -> Page<T> {
        Page {
            items,
            total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

/// Deserializes a field that distinguishes "absent" from `null`.
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`:
/// absent gives `None`, `null` gives `Some(None)`.
///
/// # Errors
///
/// Propagates the inner deserializer's error.
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        theme: Option<Option<String>>,
    }

    #[test]
    fn double_option_distinguishes_null_from_absent() {
        let Ok(absent) = serde_json::from_str::<Patch>("{}") else {
            panic!("parse failed");
        };
        let Ok(null) = serde_json::from_str::<Patch>(r#"{"theme":null}"#) else {
            panic!("parse failed");
        };
        let Ok(set) = serde_json::from_str::<Patch>(r#"{"theme":"gold"}"#) else {
            panic!("parse failed");
        };
        assert_eq!(absent.theme, None);
        assert_eq!(null.theme, Some(None));
        assert_eq!(set.theme, Some(Some("gold".to_string())));
    }

    #[test]
    fn page_params_clamp() {
        let params = PageParams {
            limit: 10_000,
            offset: 3,
        }
        .clamped();
        assert_eq!(params.limit, MAX_LIMIT);
        let zero = PageParams {
            limit: 0,
            offset: 0,
        }
        .clamped();
        assert_eq!(zero.limit, 1);
    }
}

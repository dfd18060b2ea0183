//! Offset-based pagination parameters.
//!
//! The ticket listing endpoint uses plain skip/limit pagination over a
//! stable newest-first ordering. Parameters are clamped, not rejected,
//! so malformed bounds degrade to sane pages.

use serde::Deserialize;

/// Maximum page size a caller can request.
pub const MAX_PAGE_SIZE: i64 = 200;

/// Default page size when `limit` is omitted.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Query parameters for `GET /tickets`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageParams {
    /// Clamp to valid bounds: non-negative skip, limit in 1..=MAX_PAGE_SIZE.
    pub fn clamp(self) -> Self {
        Self {
            skip: self.skip.max(0),
            limit: self.limit.clamp(1, MAX_PAGE_SIZE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_bounds() {
        let p = PageParams {
            skip: -5,
            limit: 0,
        }
        .clamp();
        assert_eq!(p.skip, 0);
        assert_eq!(p.limit, 1);

        let p = PageParams {
            skip: 10,
            limit: 10_000,
        }
        .clamp();
        assert_eq!(p.skip, 10);
        assert_eq!(p.limit, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_defaults() {
        let p = PageParams::default();
        assert_eq!(p.skip, 0);
        assert_eq!(p.limit, DEFAULT_PAGE_SIZE);
    }
}

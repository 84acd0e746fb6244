//! Pagination parameters for windowed reads.
//!
//! A [`Pager`] is the skip-offset/page-size pair accepted by
//! [`RecordStore::find`](crate::store::RecordStore::find). Both keys are optional
//! at the type level so that pagers deserialized from caller input can be
//! validated: a pager carrying only one of them is rejected before any query
//! runs, while an empty pager means no pagination.
//!
//! [`PaginationParams`] offers the page-number view (1-indexed) and converts
//! into a pager.

use serde::{Deserialize, Serialize};

use crate::error::{MongophError, MongophResult};

/// A skip-offset/page-size pair controlling windowed reads.
///
/// # Example
///
/// ```ignore
/// use mongoph::page::Pager;
///
/// let pager = Pager::new(20, 10);
/// assert_eq!(pager.window().unwrap(), Some((20, 10)));
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pager {
    /// Number of records to skip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
    /// Maximum number of records in the page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl Pager {
    /// Creates a complete pager.
    pub fn new(skip: u64, limit: u64) -> Self {
        Self {
            skip: Some(skip),
            limit: Some(limit),
        }
    }

    /// Returns the validated `(skip, limit)` window.
    ///
    /// An empty pager (neither key set) selects no window and yields `None`.
    /// A page size of `0` leaves the window unbounded after the skip.
    ///
    /// # Errors
    ///
    /// Returns [`MongophError::Validation`] when exactly one key is missing.
    pub fn window(&self) -> MongophResult<Option<(u64, u64)>> {
        match (self.skip, self.limit) {
            (None, None) => Ok(None),
            (Some(skip), Some(limit)) => Ok(Some((skip, limit))),
            _ => Err(MongophError::Validation(
                "pager should have skip and limit keys".to_string(),
            )),
        }
    }
}

impl From<PaginationParams> for Pager {
    fn from(params: PaginationParams) -> Self {
        Pager::new(params.offset(), params.per_page)
    }
}

/// Page-number pagination parameters.
///
/// Pages are 1-indexed (page 1 is the first page); page 0 is treated as page 1.
///
/// # Example
///
/// ```ignore
/// use mongoph::page::PaginationParams;
///
/// let params = PaginationParams::new(3, 20);
/// assert_eq!(params.offset(), 40);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationParams {
    /// The page number (1-indexed).
    pub page: u64,
    /// Number of records per page.
    pub per_page: u64,
}

impl PaginationParams {
    pub fn new(page: u64, per_page: u64) -> Self {
        Self { page, per_page }
    }

    /// Calculates the number of records to skip for this page.
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }

    /// Returns the pager selecting this page.
    pub fn pager(&self) -> Pager {
        Pager::from(*self)
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, per_page: 10 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_pagers_are_rejected() {
        let missing_skip = Pager { skip: None, limit: Some(2) };
        let missing_limit = Pager { skip: Some(1), limit: None };

        assert!(missing_skip.window().unwrap_err().is_validation());
        assert!(missing_limit.window().unwrap_err().is_validation());
    }

    #[test]
    fn empty_pager_selects_no_window() {
        assert_eq!(Pager::default().window().unwrap(), None);
        assert_eq!(Pager::new(3, 0).window().unwrap(), Some((3, 0)));
    }

    #[test]
    fn deserialized_pager_keeps_missing_keys() {
        let pager: Pager = serde_json::from_str(r#"{"limit": 5}"#).unwrap();

        assert_eq!(pager, Pager { skip: None, limit: Some(5) });
    }

    #[test]
    fn first_page_starts_at_zero() {
        assert_eq!(PaginationParams::new(1, 25).pager(), Pager::new(0, 25));
        assert_eq!(PaginationParams::new(0, 25).offset(), 0);
    }
}

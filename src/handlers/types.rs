//! Response envelopes shared by the record handlers.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One page of a keyset-paginated listing
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    /// Pass back as `cursor` to continue after the last item; null on the last page
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, next_cursor: Option<String>) -> Self {
        Self {
            has_more: next_cursor.is_some(),
            data,
            next_cursor,
        }
    }
}

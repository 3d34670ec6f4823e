use serde_json::Value;

use super::{BackendError, DataApi, SelectQuery};

/// Rows per page for bulk reads.
pub const PAGE_SIZE: usize = 1000;

/// Read every row of `query` in pages of [`PAGE_SIZE`].
///
/// # Errors
///
/// Returns the first page error; rows read before it are discarded.
pub fn fetch_all<A: DataApi + ?Sized>(
    api: &A,
    query: &SelectQuery,
) -> Result<Vec<Value>, BackendError> {
    fetch_all_with(api, query, PAGE_SIZE)
}

/// [`fetch_all`] with an explicit page size. Paging stops after the first
/// page shorter than `page_size`.
///
/// # Errors
///
/// Returns the first page error.
pub fn fetch_all_with<A: DataApi + ?Sized>(
    api: &A,
    query: &SelectQuery,
    page_size: usize,
) -> Result<Vec<Value>, BackendError> {
    let page_size = page_size.max(1);
    let mut rows = Vec::new();
    let mut offset = 0;

    loop {
        let page = api.select_page(query, offset, page_size)?;
        let len = page.len();
        rows.extend(page);
        tracing::trace!(table = %query.table, offset, len, "fetched page");

        if len < page_size {
            break;
        }
        offset += page_size;
    }

    tracing::debug!(table = %query.table, rows = rows.len(), "bulk read complete");
    Ok(rows)
}

//! Helper for native list APIs that are called once to learn the required
//! buffer size and again to fill it.

use thiserror::Error;

/// Attempts before giving up on a list that keeps growing between calls
pub const MAX_LIST_ATTEMPTS: usize = 4;

/// What a single call of a two-phase list API reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStatus {
    /// The buffer held everything; `count` entries are valid
    Complete { count: usize },
    /// The buffer is too small; `needed` entries are required
    MoreData { needed: usize },
    /// The call failed with a native error code
    Failed(u32),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListFetchError {
    #[error("native list call failed with code {0}")]
    Failed(u32),

    #[error("list size kept changing after {0} attempts")]
    Unstable(usize),
}

/// Drive `call` until it reports a complete list.
///
/// The first call gets an empty buffer; each `MoreData` reallocates to
/// exactly the reported size.
pub fn fetch_list<T, F>(mut call: F) -> Result<Vec<T>, ListFetchError>
where
    T: Clone + Default,
    F: FnMut(&mut [T]) -> ListStatus,
{
    let mut buffer: Vec<T> = Vec::new();

    for _ in 0..MAX_LIST_ATTEMPTS {
        match call(&mut buffer) {
            ListStatus::Complete { count } => {
                buffer.truncate(count);
                return Ok(buffer);
            }
            ListStatus::MoreData { needed } => {
                buffer = vec![T::default(); needed];
            }
            ListStatus::Failed(code) => return Err(ListFetchError::Failed(code)),
        }
    }

    Err(ListFetchError::Unstable(MAX_LIST_ATTEMPTS))
}

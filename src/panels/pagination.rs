// Pure pagination math
//
// These functions are the only place page arithmetic lives; panels and the
// focus controller both call through here so page/index conversions cannot
// drift apart.

/// Number of pages for a hit count. Unknown or zero hits means zero pages.
pub fn page_count(page_size: u64, hit_count: Option<u64>) -> u64 {
    match hit_count {
        None | Some(0) => 0,
        Some(n) => n.div_ceil(page_size),
    }
}

/// Whether pagination controls are warranted at all. A view whose entire
/// result set fits on one page must not show pagination.
pub fn needs_pagination(page_size: u64, hit_count: Option<u64>) -> bool {
    hit_count.is_some_and(|n| n > page_size)
}

/// 1-based page containing the element at the given 0-based ordinal index
pub fn page_of_index(index: u64, page_size: u64) -> u64 {
    index / page_size + 1
}

/// 0-based start index of a 1-based page, for the `start_idx` query parameter
pub fn start_index(page: u64, page_size: u64) -> u64 {
    (page - 1) * page_size
}

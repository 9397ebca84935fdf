use std::ops::RangeInclusive;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const PAGE_SIZES: [usize; 4] = [5, 10, 25, 50];
pub const PAGER_BUTTONS: usize = 5;

/// The visible window of a sequence. `start..end` indexes the full sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSlice<T> {
    pub rows: Vec<T>,
    pub page: usize,
    pub total_pages: usize,
    pub total_records: usize,
    pub start: usize,
    pub end: usize,
}

/// At least one page, even for an empty sequence.
pub fn total_pages(len: usize, page_size: usize) -> usize {
    len.div_ceil(page_size.max(1)).max(1)
}

pub fn clamp_page(page: usize, total_pages: usize) -> usize {
    page.clamp(1, total_pages.max(1))
}

pub fn paginate<T: Clone>(records: &[T], page: usize, page_size: usize) -> PageSlice<T> {
    let page_size = page_size.max(1);
    let total = total_pages(records.len(), page_size);
    let page = clamp_page(page, total);
    let start = ((page - 1) * page_size).min(records.len());
    let end = (start + page_size).min(records.len());
    PageSlice {
        rows: records[start..end].to_vec(),
        page,
        total_pages: total,
        total_records: records.len(),
        start,
        end,
    }
}

/// Page numbers offered by the pager, centred on `current` where possible.
pub fn page_window(current: usize, total_pages: usize, max_buttons: usize) -> RangeInclusive<usize> {
    let total_pages = total_pages.max(1);
    let max_buttons = max_buttons.max(1);
    let mut first = current.saturating_sub(max_buttons / 2).max(1);
    let last = (first + max_buttons - 1).min(total_pages);
    if last + 1 - first < max_buttons {
        first = (last + 1).saturating_sub(max_buttons).max(1);
    }
    first..=last
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageState {
    pub current_page: usize,
    pub page_size: usize,
}

impl Default for PageState {
    fn default() -> Self {
        PageState::new(DEFAULT_PAGE_SIZE)
    }
}

impl PageState {
    pub fn new(page_size: usize) -> Self {
        PageState {
            current_page: 1,
            page_size: page_size.max(1),
        }
    }

    /// A new page size always starts over at the first page.
    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.current_page = 1;
    }

    /// Next entry of `PAGE_SIZES`, wrapping around.
    pub fn cycle_page_size(&mut self) {
        let next = PAGE_SIZES
            .iter()
            .copied()
            .find(|&s| s > self.page_size)
            .unwrap_or(PAGE_SIZES[0]);
        self.set_page_size(next);
    }

    pub fn clamp(&mut self, len: usize) {
        self.current_page = clamp_page(self.current_page, total_pages(len, self.page_size));
    }

    pub fn go_to(&mut self, page: usize, len: usize) {
        self.current_page = page;
        self.clamp(len);
    }

    pub fn next(&mut self, len: usize) {
        self.go_to(self.current_page + 1, len);
    }

    pub fn prev(&mut self, len: usize) {
        self.go_to(self.current_page.saturating_sub(1), len);
    }

    pub fn first(&mut self) {
        self.current_page = 1;
    }

    pub fn last(&mut self, len: usize) {
        self.current_page = total_pages(len, self.page_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_has_one_empty_page() {
        let slice = paginate::<u32>(&[], 1, 10);
        assert_eq!(slice.total_pages, 1);
        assert_eq!(slice.page, 1);
        assert!(slice.rows.is_empty());
        assert_eq!((slice.start, slice.end), (0, 0));
    }

    #[test]
    fn pages_cover_the_sequence_exactly() {
        let data: Vec<u32> = (0..23).collect();
        for page_size in [1, 4, 5, 10, 23, 50] {
            let total = total_pages(data.len(), page_size);
            let joined: Vec<u32> = (1..=total)
                .flat_map(|p| paginate(&data, p, page_size).rows)
                .collect();
            assert_eq!(joined, data, "page size {page_size}");
        }
    }

    #[test]
    fn out_of_range_pages_are_clamped() {
        let data: Vec<u32> = (0..12).collect();
        let last = paginate(&data, 99, 5);
        assert_eq!(last.page, 3);
        assert_eq!(last.rows, vec![10, 11]);
        assert_eq!(paginate(&data, 0, 5).page, 1);
    }

    #[test]
    fn page_size_change_resets_to_first_page() {
        let mut state = PageState::new(5);
        state.go_to(3, 20);
        assert_eq!(state.current_page, 3);
        state.set_page_size(10);
        assert_eq!(state.current_page, 1);
        state.cycle_page_size();
        assert_eq!(state.page_size, 25);
        state.page_size = 50;
        state.cycle_page_size();
        assert_eq!(state.page_size, 5);
    }

    #[test]
    fn navigation_stays_in_bounds() {
        let mut state = PageState::new(10);
        state.prev(35);
        assert_eq!(state.current_page, 1);
        state.last(35);
        assert_eq!(state.current_page, 4);
        state.next(35);
        assert_eq!(state.current_page, 4);
        // rows deleted under the cursor
        state.clamp(12);
        assert_eq!(state.current_page, 2);
    }

    #[test]
    fn pager_window_is_centred() {
        assert_eq!(page_window(1, 10, 5), 1..=5);
        assert_eq!(page_window(6, 10, 5), 4..=8);
        assert_eq!(page_window(10, 10, 5), 6..=10);
        assert_eq!(page_window(2, 3, 5), 1..=3);
    }
}

//! Splitting a worksheet into bounded pages
//!
//! Two policies are available: [`FixedSizeStrategy`] slices the used range into
//! row bands that fit a cell budget, and [`PrintLayoutStrategy`] follows the
//! print area and its horizontal page breaks. [`select_strategy`] picks one
//! per worksheet; [`PagingRangeService`] walks the resulting sequence.

use crate::error::{Error, Result};
use crate::range::{parse_area_reference, Range};

/// Budget used when the caller passes zero
pub const DEFAULT_PAGE_CELLS: usize = 5000;

/// Which policy produced a page sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingKind {
    FixedSize,
    PrintLayout,
}

/// A page-slicing policy bound to one worksheet
pub trait PagingStrategy {
    /// Ordered, non-overlapping pages; empty when nothing can be paged
    fn calculate_paging_ranges(&self) -> Vec<Range>;

    /// Area the pages are cut from
    fn bounds(&self) -> Option<Range>;

    fn kind(&self) -> PagingKind;

    /// Check that `range` may be served as one page
    fn validate_range(&self, range: &Range) -> Result<()>;
}

/// Row bands whose cell count fits a budget
#[derive(Debug, Clone)]
pub struct FixedSizeStrategy {
    budget: usize,
    dimension: Option<Range>,
}

impl FixedSizeStrategy {
    /// `dimension` is the used range, `None` when it could not be determined
    pub fn new(budget: usize, dimension: Option<Range>) -> Self {
        let budget = if budget == 0 {
            DEFAULT_PAGE_CELLS
        } else {
            budget
        };
        Self { budget, dimension }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Rows per page, never below one even if a single row exceeds the budget
    pub fn rows_per_page(&self) -> u32 {
        let columns = self.dimension.map_or(1, |d| d.columns()) as usize;
        (self.budget / columns).clamp(1, u32::MAX as usize) as u32
    }
}

impl PagingStrategy for FixedSizeStrategy {
    fn calculate_paging_ranges(&self) -> Vec<Range> {
        let Some(dim) = self.dimension else {
            return Vec::new();
        };
        let step = self.rows_per_page();
        let mut pages = Vec::new();
        let mut row = dim.start_row;
        loop {
            let end = row.saturating_add(step - 1).min(dim.end_row);
            pages.push(Range {
                start_col: dim.start_col,
                start_row: row,
                end_col: dim.end_col,
                end_row: end,
            });
            if end >= dim.end_row {
                break;
            }
            row = end + 1;
        }
        pages
    }

    fn bounds(&self) -> Option<Range> {
        self.dimension
    }

    fn kind(&self) -> PagingKind {
        PagingKind::FixedSize
    }

    /// Any range inside the used range fits as long as it stays within the budget
    fn validate_range(&self, range: &Range) -> Result<()> {
        let dim = self.dimension.ok_or(Error::NoPages)?;
        range.validate_within(&dim)?;
        let cells = range.cell_count();
        if cells > self.budget as u64 {
            return Err(Error::PageTooLarge {
                range: range.to_string(),
                cells,
                budget: self.budget,
            });
        }
        Ok(())
    }
}

/// Row bands taken from the print area and its horizontal page breaks
#[derive(Debug, Clone)]
pub struct PrintLayoutStrategy {
    print_area: Option<Range>,
    breaks: Vec<u32>,
}

impl PrintLayoutStrategy {
    /// `page_break_rows` holds the first row of each new page
    pub fn new(print_area: &str, page_break_rows: impl IntoIterator<Item = u32>) -> Self {
        let mut breaks: Vec<u32> = page_break_rows.into_iter().collect();
        breaks.sort_unstable();
        breaks.dedup();
        Self {
            print_area: parse_area_reference(print_area),
            breaks,
        }
    }

    pub fn page_breaks(&self) -> &[u32] {
        &self.breaks
    }
}

impl PagingStrategy for PrintLayoutStrategy {
    fn calculate_paging_ranges(&self) -> Vec<Range> {
        let Some(area) = self.print_area else {
            return Vec::new();
        };
        let band = |start_row: u32, end_row: u32| Range {
            start_row,
            end_row,
            ..area
        };

        let mut pages = Vec::new();
        let mut current = area.start_row;
        for &brk in &self.breaks {
            if brk <= area.start_row || brk > area.end_row {
                continue;
            }
            pages.push(band(current, brk - 1));
            current = brk;
        }
        pages.push(band(current, area.end_row));
        pages
    }

    fn bounds(&self) -> Option<Range> {
        self.print_area
    }

    fn kind(&self) -> PagingKind {
        PagingKind::PrintLayout
    }

    fn validate_range(&self, range: &Range) -> Result<()> {
        let area = self.print_area.ok_or(Error::NoPages)?;
        range.validate_within(&area)?;
        if !self.calculate_paging_ranges().contains(range) {
            return Err(Error::NotAPage(range.to_string()));
        }
        Ok(())
    }
}

/// Pick the print layout when a print area is configured, fixed-size otherwise
pub fn select_strategy(
    print_area: Option<&str>,
    page_break_rows: Vec<u32>,
    dimension: Option<Range>,
    budget: usize,
) -> Box<dyn PagingStrategy> {
    match print_area.map(str::trim).filter(|area| !area.is_empty()) {
        Some(area) => Box::new(PrintLayoutStrategy::new(area, page_break_rows)),
        None => Box::new(FixedSizeStrategy::new(budget, dimension)),
    }
}

/// Walks the page sequence of one strategy
pub struct PagingRangeService {
    strategy: Box<dyn PagingStrategy>,
}

impl PagingRangeService {
    pub fn new(strategy: Box<dyn PagingStrategy>) -> Self {
        Self { strategy }
    }

    pub fn kind(&self) -> PagingKind {
        self.strategy.kind()
    }

    /// Full ordered page sequence
    pub fn pages(&self) -> Vec<Range> {
        self.strategy.calculate_paging_ranges()
    }

    /// Full ordered page sequence in A1 notation
    pub fn paging_ranges(&self) -> Vec<String> {
        self.pages().iter().map(Range::to_string).collect()
    }

    /// Successor of `current` in `all`; empty when `current` is last or absent
    pub fn find_next_range(&self, all: &[String], current: &str) -> String {
        let current = canonical(current);
        all.iter()
            .position(|r| canonical(r) == current)
            .and_then(|i| all.get(i + 1))
            .cloned()
            .unwrap_or_default()
    }

    /// Entries of `all` not in `known`, in the order of `all`
    pub fn filter_remaining_paging_ranges(&self, all: &[String], known: &[String]) -> Vec<String> {
        let known: Vec<String> = known.iter().map(|k| canonical(k)).collect();
        all.iter()
            .filter(|r| !known.contains(&canonical(r)))
            .cloned()
            .collect()
    }

    /// Parse `range` and check the strategy would serve it as a page
    ///
    /// Fixed-size paging accepts any in-bounds range within the cell budget;
    /// print layout only accepts its own pages.
    pub fn validate_page(&self, range: &str) -> Result<Range> {
        let requested = Range::parse(range)?;
        self.strategy.validate_range(&requested)?;
        Ok(requested)
    }
}

fn canonical(range: &str) -> String {
    Range::parse(range)
        .map(|r| r.to_string())
        .unwrap_or_else(|_| range.trim().to_string())
}

//! Template sections: capture, replication and placeholder substitution.

pub mod replicate;
pub mod section;
pub mod substitute;
pub mod tokens;

use crate::utils::{cell_address, parse_range_bounds};
use std::fmt;

pub use replicate::{ReplicatedInstance, SectionReplicator};
pub use section::{CapturedCell, TemplateSection};
pub use substitute::{PlaceholderSubstitutionEngine, SubstitutionOutcome};
pub use tokens::{Token, TokenValue, TokenVocabulary};

/// Inclusive, one-based worksheet row range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowRange {
    pub start: u32,
    pub end: u32,
}

impl RowRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    pub fn height(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn contains(&self, row: u32) -> bool {
        (self.start..=self.end).contains(&row)
    }

    pub fn offset(&self, by: u32) -> Self {
        Self::new(self.start + by, self.end + by)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }
}

impl fmt::Display for RowRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Inclusive, one-based column span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnSpan {
    pub first: u32,
    pub last: u32,
}

impl ColumnSpan {
    pub fn new(first: u32, last: u32) -> Self {
        Self {
            first: first.min(last),
            last: first.max(last),
        }
    }

    pub fn contains(&self, col: u32) -> bool {
        (self.first..=self.last).contains(&col)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> {
        self.first..=self.last
    }
}

/// A merged rectangle, in absolute worksheet coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MergeRegion {
    pub top: u32,
    pub left: u32,
    pub bottom: u32,
    pub right: u32,
}

impl MergeRegion {
    pub fn parse(range: &str) -> Option<Self> {
        let (top, left, bottom, right) = parse_range_bounds(range)?;
        Some(Self {
            top,
            left,
            bottom,
            right,
        })
    }

    pub fn anchor(&self) -> (u32, u32) {
        (self.left, self.top)
    }

    pub fn covers(&self, col: u32, row: u32) -> bool {
        (self.left..=self.right).contains(&col) && (self.top..=self.bottom).contains(&row)
    }

    pub fn overlaps(&self, other: &MergeRegion) -> bool {
        self.left <= other.right
            && other.left <= self.right
            && self.top <= other.bottom
            && other.top <= self.bottom
    }

    pub fn within_rows(&self, rows: RowRange) -> bool {
        rows.contains(self.top) && rows.contains(self.bottom)
    }

    pub fn shifted(&self, rows: i64) -> Option<Self> {
        let top = i64::from(self.top) + rows;
        let bottom = i64::from(self.bottom) + rows;
        if top < 1 {
            return None;
        }
        Some(Self {
            top: u32::try_from(top).ok()?,
            bottom: u32::try_from(bottom).ok()?,
            ..*self
        })
    }

    pub fn is_single_cell(&self) -> bool {
        self.top == self.bottom && self.left == self.right
    }

    pub fn to_range(&self) -> String {
        format!(
            "{}:{}",
            cell_address(self.left, self.top),
            cell_address(self.right, self.bottom)
        )
    }
}

/// Merges currently declared on a worksheet.
pub fn sheet_merges(sheet: &umya_spreadsheet::Worksheet) -> Vec<MergeRegion> {
    sheet
        .get_merge_cells()
        .iter()
        .filter_map(|range| MergeRegion::parse(&range.get_range()))
        .collect()
}

/// Adds a merge unless an identical or overlapping one already exists.
pub fn add_merge_once(sheet: &mut umya_spreadsheet::Worksheet, region: MergeRegion) -> bool {
    if region.is_single_cell() {
        return false;
    }
    if sheet_merges(sheet)
        .iter()
        .any(|existing| existing == &region || existing.overlaps(&region))
    {
        return false;
    }
    sheet.add_merge_cells(region.to_range());
    true
}

/// Drops every merge whose rows fall entirely within `rows`.
pub fn drop_merges_within(sheet: &mut umya_spreadsheet::Worksheet, rows: RowRange) {
    sheet.get_merge_cells_mut().retain(|range| {
        MergeRegion::parse(&range.get_range())
            .map(|region| !region.within_rows(rows))
            .unwrap_or(true)
    });
}

#[cfg(test)]
pub(crate) fn cell_text(sheet: &umya_spreadsheet::Worksheet, address: &str) -> String {
    sheet
        .get_cell(address)
        .map(|cell| cell.get_value().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_regions_parse_and_overlap() {
        let region = MergeRegion::parse("B10:H10").unwrap();
        assert_eq!(region.anchor(), (2, 10));
        assert!(region.covers(8, 10));
        assert!(!region.covers(1, 10));
        assert!(region.overlaps(&MergeRegion::parse("H9:I12").unwrap()));
        assert!(!region.overlaps(&MergeRegion::parse("A11:H11").unwrap()));
        assert_eq!(region.shifted(4).unwrap().to_range(), "B14:H14");
        assert!(region.shifted(-10).is_none());
    }

    #[test]
    fn merges_are_added_once() {
        let mut book = umya_spreadsheet::new_file();
        let sheet = book.get_sheet_by_name_mut("Sheet1").unwrap();
        let region = MergeRegion::parse("A1:C1").unwrap();
        assert!(add_merge_once(sheet, region));
        assert!(!add_merge_once(sheet, region));
        assert!(!add_merge_once(sheet, MergeRegion::parse("B1:D1").unwrap()));
        assert_eq!(sheet_merges(sheet), vec![region]);

        drop_merges_within(sheet, RowRange::new(1, 1));
        assert!(sheet_merges(sheet).is_empty());
    }

    #[test]
    fn row_ranges_offset_and_display() {
        let rows = RowRange::new(8, 10);
        assert_eq!(rows.height(), 3);
        assert_eq!(rows.offset(4), RowRange::new(12, 14));
        assert_eq!(rows.to_string(), "8-10");
    }
}

//! Style adjustments applied to rendered report cells.

use umya_spreadsheet::Style;
use umya_spreadsheet::structs::{HorizontalAlignmentValues, VerticalAlignmentValues};

const BOUNDARY_BORDER: &str = "thick";

/// The heavy right-hand rule that closes each section on its boundary column.
pub fn apply_boundary_border(style: &mut Style) {
    style
        .get_borders_mut()
        .get_right_border_mut()
        .set_border_style(BOUNDARY_BORDER);
}

pub fn has_boundary_border(style: &Style) -> bool {
    style
        .get_borders()
        .map(|borders| borders.get_right_border().get_border_style() == BOUNDARY_BORDER)
        .unwrap_or(false)
}

/// Tour titles sit centred in their merged banner.
pub fn align_title(style: &mut Style) {
    let alignment = style.get_alignment_mut();
    alignment.set_horizontal(HorizontalAlignmentValues::Center);
    alignment.set_vertical(VerticalAlignmentValues::Center);
}

/// Notes read top-left and wrap inside their merged block.
pub fn align_notes(style: &mut Style) {
    let alignment = style.get_alignment_mut();
    alignment.set_horizontal(HorizontalAlignmentValues::Left);
    alignment.set_vertical(VerticalAlignmentValues::Top);
    alignment.set_wrap_text(true);
}

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use dispatch_reports::TourRecord;
use tempfile::{TempDir, tempdir};
use umya_spreadsheet::{Spreadsheet, Worksheet};

pub fn write_workbook_to_path<F>(path: &Path, f: F)
where
    F: FnOnce(&mut Spreadsheet),
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create dir");
    }
    let mut book = umya_spreadsheet::new_file();
    f(&mut book);
    umya_spreadsheet::writer::xlsx::write(&book, path).expect("write workbook");
}

pub fn read_workbook(path: &Path) -> Spreadsheet {
    umya_spreadsheet::reader::xlsx::read(path).expect("read workbook")
}

/// Display text of a cell, empty when the cell does not exist.
pub fn text(sheet: &Worksheet, address: &str) -> String {
    sheet
        .get_cell(address)
        .map(|cell| cell.get_value().to_string())
        .unwrap_or_default()
}

/// Every non-empty value in `A..=H` of rows `1..=last_row`, row-major.
pub fn grid(sheet: &Worksheet, last_row: u32) -> Vec<(String, String)> {
    let mut cells = Vec::new();
    for row in 1..=last_row {
        for col in ["A", "B", "C", "D", "E", "F", "G", "H"] {
            let address = format!("{col}{row}");
            let value = text(sheet, &address);
            if !value.is_empty() {
                cells.push((address, value));
            }
        }
    }
    cells
}

pub struct TestWorkspace {
    _tempdir: TempDir,
    root: PathBuf,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let tempdir = tempdir().expect("tempdir");
        let root = tempdir.path().to_path_buf();
        Self {
            _tempdir: tempdir,
            root,
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn create_workbook<F>(&self, name: &str, f: F) -> PathBuf
    where
        F: FnOnce(&mut Spreadsheet),
    {
        let path = self.path(name);
        write_workbook_to_path(&path, f);
        path
    }

    pub fn eod_template(&self) -> PathBuf {
        self.create_workbook("eod_template.xlsx", build_eod_template)
    }

    pub fn pax_template(&self) -> PathBuf {
        self.create_workbook("pax_template.xlsx", build_pax_template)
    }

    pub fn dispatch(&self, name: &str, date: &str, records: &[TourRecord]) -> PathBuf {
        let records = records.to_vec();
        let date = date.to_string();
        self.create_workbook(name, move |book| build_dispatch(book, &date, &records))
    }
}

pub fn glacier() -> TourRecord {
    TourRecord::new("Glacier Walk")
        .with_departure("09:30")
        .with_counts(2, 1, 0)
        .with_notes("Bring jackets")
}

pub fn kayak() -> TourRecord {
    TourRecord::new("Harbour Kayak")
        .with_departure("11:00")
        .with_counts(0, 0, 0)
}

pub fn whales() -> TourRecord {
    TourRecord::new("Whale Watch")
        .with_departure("14:15")
        .with_counts(5, 0, 1)
        .with_notes("Seasick bags")
}

/// The three-row EOD section at rows 8..=10 and totals tokens on row 12.
pub fn build_eod_template(book: &mut Spreadsheet) {
    let sheet = book.get_sheet_by_name_mut("Sheet1").expect("default sheet");
    sheet.set_name("EOD");
    sheet.get_cell_mut("A1").set_value("END OF DAY REPORT");
    sheet.get_cell_mut("A2").set_value("Ship");
    sheet.get_cell_mut("A4").set_value("Date");

    sheet.get_cell_mut("A8").set_value("{{tour_name}}");
    sheet.add_merge_cells("A8:H8");
    sheet.get_cell_mut("A9").set_value("Departure");
    sheet.get_cell_mut("B9").set_value("{{departure_time}}");
    sheet.get_cell_mut("C9").set_value("{{num_adult}}");
    sheet.get_cell_mut("D9").set_value("{{num_chd}}");
    sheet.get_cell_mut("E9").set_value("{{num_comp}}");
    sheet.get_cell_mut("F9").set_formula("SUM(C9:E9)");
    sheet.get_cell_mut("A10").set_value("Notes");
    sheet.get_cell_mut("B10").set_value("{{notes}}");
    sheet.add_merge_cells("B10:H10");

    sheet.get_cell_mut("B12").set_value("TOTAL");
    sheet.get_cell_mut("C12").set_value("{{total_adult}}");
    sheet.get_cell_mut("D12").set_value("{{total_chd}}");
    sheet.get_cell_mut("E12").set_value("{{total_comp}}");
}

fn pax_tab(sheet: &mut Worksheet) {
    sheet.get_cell_mut("A1").set_value("PAX REPORT");
    sheet.get_cell_mut("A3").set_value("Date");
    sheet.get_cell_mut("B3").set_value("Tour");
    sheet.get_cell_mut("C3").set_value("Departure");
    sheet.get_cell_mut("D3").set_value("Adults");
    sheet.get_cell_mut("E3").set_value("Children");
    sheet.get_cell_mut("F3").set_value("Comp");
    sheet.get_cell_mut("G3").set_value("Notes");
    sheet.get_cell_mut("B4").set_value("{{tour_name}}");
    sheet.get_cell_mut("C4").set_value("{{departure_time}}");
    sheet.get_cell_mut("D4").set_value("{{num_adult}}");
    sheet.get_cell_mut("E4").set_value("{{num_chd}}");
    sheet.get_cell_mut("F4").set_value("{{num_comp}}");
    sheet.get_cell_mut("G4").set_value("{{notes}}");
    sheet.get_cell_mut("C6").set_value("TOTAL");
    sheet.get_cell_mut("D6").set_value("{{total_adult}}");
    sheet.get_cell_mut("E6").set_value("{{total_chd}}");
    sheet.get_cell_mut("F6").set_value("{{total_comp}}");
}

/// Monthly tabs `Jan 25`, `Oct 25`, `Nov 25` and `Dec 25`, each a pristine PAX section.
pub fn build_pax_template(book: &mut Spreadsheet) {
    book.get_sheet_by_name_mut("Sheet1")
        .expect("default sheet")
        .set_name("Jan 25");
    for name in ["Oct 25", "Nov 25", "Dec 25"] {
        book.new_sheet(name).expect("new sheet");
    }
    for name in ["Jan 25", "Oct 25", "Nov 25", "Dec 25"] {
        pax_tab(book.get_sheet_by_name_mut(name).expect("tab"));
    }
}

/// A dispatch sheet in the default source layout: header cells in columns B
/// and E, a label row at 8 and one tour per row from 9.
pub fn build_dispatch(book: &mut Spreadsheet, date: &str, records: &[TourRecord]) {
    let sheet = book.get_sheet_by_name_mut("Sheet1").expect("default sheet");
    sheet.get_cell_mut("B1").set_value("Norway");
    sheet.get_cell_mut("B2").set_value("Nordic Lines");
    sheet.get_cell_mut("B3").set_value("MS Aurora");
    sheet.get_cell_mut("B4").set_value("Bergen");
    sheet.get_cell_mut("B5").set_value(date);
    sheet.get_cell_mut("E2").set_value("Fjord Tours AS");
    sheet.get_cell_mut("E3").set_value("Ingrid Berg");
    sheet.get_cell_mut("E4").set_value("Ola Nordmann");

    for (col, label) in ["Tour Name", "Departure", "Adults", "Children", "Comp", "Notes"]
        .into_iter()
        .enumerate()
    {
        sheet
            .get_cell_mut((col as u32 + 1, 8))
            .set_value(label);
    }

    for (index, record) in records.iter().enumerate() {
        let row = 9 + index as u32;
        sheet.get_cell_mut((1, row)).set_value(record.name.clone());
        sheet
            .get_cell_mut((2, row))
            .set_value(record.departure_time.clone());
        sheet
            .get_cell_mut((3, row))
            .set_value_number(record.adult_count);
        sheet
            .get_cell_mut((4, row))
            .set_value_number(record.child_count);
        sheet
            .get_cell_mut((5, row))
            .set_value_number(record.comp_count);
        if !record.notes.is_empty() {
            sheet.get_cell_mut((6, row)).set_value(record.notes.clone());
        }
    }
}

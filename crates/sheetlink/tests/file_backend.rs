//! Open, edit, save and reopen workbooks through the session selector

use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use sheetlink::prelude::*;
use sheetlink::{BorderStyle, BorderType, FillShading, FillType};
use sheetlink_xlsx::Document;

fn file_only() -> SessionConfig {
    SessionConfig {
        backend: BackendPreference::FileOnly,
        ..Default::default()
    }
}

fn new_workbook(dir: &Path) -> PathBuf {
    let path = dir.join("book.xlsx");
    Document::new().write_file(&path).unwrap();
    path
}

#[test]
fn test_edits_survive_save_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = new_workbook(dir.path());

    {
        let (workbook, mut cleanup) = open_file_with(&path, &file_only()).unwrap();
        workbook.create_new_sheet("Data").unwrap();
        let sheet = workbook.find_sheet("data").unwrap();
        sheet
            .write_range(
                "A1",
                &[
                    vec!["Item".into(), "Qty".into()],
                    vec!["Bolts".into(), CellValue::Number(40.0)],
                    vec!["Nuts".into(), CellValue::Number(2.0)],
                ],
            )
            .unwrap();
        sheet.set_formula("B4", "SUM(B2:B3)").unwrap();
        sheet.add_table("A1:B3", "Stock").unwrap();
        assert_eq!(workbook.copy_sheet("Data", "Data").unwrap(), "Data (2)");
        workbook.save().unwrap();
        sheet.release().unwrap();
        cleanup.run().unwrap();
    }

    let (workbook, _cleanup) = open_file_with(&path, &file_only()).unwrap();
    assert_eq!(
        workbook.sheet_names().unwrap(),
        vec!["Sheet1", "Data", "Data (2)"]
    );
    let sheet = workbook.find_sheet("Data").unwrap();
    assert_eq!(
        sheet.read_range("A1:B3").unwrap(),
        vec![
            vec!["Item".to_string(), "Qty".to_string()],
            vec!["Bolts".to_string(), "40".to_string()],
            vec!["Nuts".to_string(), "2".to_string()],
        ]
    );
    assert_eq!(sheet.get_formula("B4").unwrap(), "SUM(B2:B3)");
    assert_eq!(sheet.dimension().unwrap().to_string(), "A1:B4");

    let tables = sheet.tables().unwrap();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].to_string(), "Stock A1:B3");

    let copy = workbook.find_sheet("Data (2)").unwrap();
    assert_eq!(copy.get_value("A2").unwrap(), "Bolts");
    assert!(copy.tables().unwrap().is_empty());
}

#[test]
fn test_styles_survive_save_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = new_workbook(dir.path());
    let style = CellStyle {
        border: vec![sheetlink::Border {
            border_type: BorderType::Bottom,
            style: Some(BorderStyle::Double),
            color: Some("#FF0000".to_string()),
        }],
        font: Some(FontStyle {
            italic: Some(true),
            color: Some("#1F4E78".to_string()),
            ..Default::default()
        }),
        fill: Some(FillStyle {
            fill_type: Some(FillType::Gradient),
            color: vec!["#FFFFFF".to_string(), "#4472C4".to_string()],
            shading: Some(FillShading::Vertical),
            ..Default::default()
        }),
        num_fmt: Some("0.00%".to_string()),
        decimal_places: None,
    };

    {
        let (workbook, _cleanup) = open_file_with(&path, &file_only()).unwrap();
        let sheet = workbook.find_sheet("Sheet1").unwrap();
        sheet.set_value("C3", CellValue::Number(0.25)).unwrap();
        sheet.set_cell_style("C3", &style).unwrap();
        workbook.save().unwrap();
    }

    let (workbook, _cleanup) = open_file_with(&path, &file_only()).unwrap();
    let sheet = workbook.find_sheet("Sheet1").unwrap();
    let read = sheet.cell_style("C3").unwrap();
    assert_eq!(read.font, style.font);
    assert_eq!(read.fill, style.fill);
    assert_eq!(read.border, style.border);
    assert_eq!(read.num_fmt.as_deref(), Some("0.00%"));
    assert_eq!(read.decimal_places, Some(2));
}

#[test]
fn test_pages_cover_the_used_region() {
    let dir = tempfile::tempdir().unwrap();
    let path = new_workbook(dir.path());
    let (workbook, _cleanup) = open_file_with(&path, &file_only()).unwrap();
    let sheet = workbook.find_sheet("Sheet1").unwrap();
    sheet.set_value("A1", "top".into()).unwrap();
    sheet.set_value("D1000", "bottom".into()).unwrap();

    let service = PagingRangeService::new(sheet.paging_strategy(1000).unwrap());
    let pages = service.paging_ranges();
    assert_eq!(pages.first().map(String::as_str), Some("A1:D250"));
    assert_eq!(pages.last().map(String::as_str), Some("A751:D1000"));
    assert_eq!(pages.len(), 4);
}

proptest! {
    #[test]
    fn written_blocks_read_back(
        col in 1u32..30,
        row in 1u32..200,
        block in prop::collection::vec(prop::collection::vec(-1.0e6f64..1.0e6, 1..5), 1..5),
    ) {
        let workbook = sheetlink::FileWorkbook::from_document(Document::new(), "/tmp/unused.xlsx");
        let sheet = workbook.find_sheet("Sheet1").unwrap();
        let values: Vec<Vec<CellValue>> = block
            .iter()
            .map(|r| r.iter().map(|n| CellValue::Number(n.round())).collect())
            .collect();
        let width = values.iter().map(Vec::len).max().unwrap() as u32;
        let top_left = sheetlink_core::cell_name(col, row).unwrap();
        let bottom_right = sheetlink_core::cell_name(col + width - 1, row + values.len() as u32 - 1).unwrap();

        sheet.write_range(&top_left, &values).unwrap();
        let read = sheet.read_range(&format!("{top_left}:{bottom_right}")).unwrap();

        prop_assert_eq!(read.len(), values.len());
        for (read_row, written) in read.iter().zip(&values) {
            prop_assert_eq!(read_row.len(), width as usize);
            for (i, text) in read_row.iter().enumerate() {
                let expected = written.get(i).map(ToString::to_string).unwrap_or_default();
                prop_assert_eq!(text, &expected);
            }
        }
    }
}

use domain::error::LoadError;
use infrastructure::document_loader::DocumentLoader;
use infrastructure::extractors::DocumentExtractor;
use tempfile::tempdir;
use tests::fixtures::{write_pdf, write_xlsx};
use tests::write_document;

#[test]
fn pdf_pages_become_numbered_units() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("report.pdf");
    write_pdf(&path, &["First page about revenue", "Second page about costs"], None);

    let units = DocumentExtractor::Pdf.extract(&path).unwrap();

    assert_eq!(units.len(), 2);
    assert!(units[0].text.contains("revenue"));
    assert!(units[1].text.contains("costs"));
    assert_eq!(units[0].metadata.page, Some(1));
    assert_eq!(units[1].metadata.page, Some(2));
    for unit in &units {
        assert_eq!(unit.metadata.source, path.to_string_lossy());
    }
}

#[test]
fn pdf_that_crashes_the_parser_is_an_extract_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("odd-font.pdf");
    write_pdf(&path, &["unreadable"], Some("BogusEncoding"));

    let err = DocumentExtractor::Pdf.extract(&path).unwrap_err();
    assert!(matches!(err, LoadError::Extract { .. }));
}

#[test]
fn pdf_that_crashes_the_parser_does_not_stop_the_loader() {
    let dir = tempdir().unwrap();
    write_pdf(&dir.path().join("odd-font.pdf"), &["unreadable"], Some("BogusEncoding"));
    write_document(dir.path(), "keep.txt", "Still indexed.");

    let chunks = DocumentLoader::default().process_documents(dir.path());

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "Still indexed.");
}

#[test]
fn spreadsheet_sheets_become_tab_separated_units() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("budget.xlsx");
    let budget: &[&[&str]] = &[&["Item", "Cost"], &["Rent", "500"]];
    let staff: &[&[&str]] = &[&["Name"], &["Ada"]];
    let empty: &[&[&str]] = &[];
    write_xlsx(&path, &[("Budget", budget), ("Staff", staff), ("Blank", empty)]);

    let units = DocumentExtractor::Spreadsheet.extract(&path).unwrap();

    assert_eq!(units.len(), 2);
    assert_eq!(units[0].text, "Item\tCost\nRent\t500");
    assert_eq!(units[0].metadata.extra.get("sheet").map(String::as_str), Some("Budget"));
    assert_eq!(units[1].text, "Name\nAda");
    assert_eq!(units[1].metadata.extra.get("sheet").map(String::as_str), Some("Staff"));
    assert!(units.iter().all(|u| u.metadata.source == path.to_string_lossy()));
}

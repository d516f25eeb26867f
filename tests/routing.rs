mod support;

use assert_matches::assert_matches;
use dispatch_reports::{
    BaseDocument, CellValue, DateTabRouter, EngineConfig, FileWorkbookStore, GenerationMode,
    ReportEngine, ReportError, ReportKind, ReportRequest, TotalsAccumulator, generate,
};
use support::{TestWorkspace, glacier, kayak, read_workbook, text, whales};

fn pax_request(workspace: &TestWorkspace, date: &str, records: &[dispatch_reports::TourRecord]) -> ReportRequest {
    let output = workspace.path("pax.xlsx");
    ReportRequest {
        ship_id: "aurora".to_string(),
        kind: ReportKind::Pax,
        source: workspace.dispatch(&format!("dispatch-{}.xlsx", date.replace('/', "-")), date, records),
        base: BaseDocument::ExistingOrTemplate {
            existing: output.clone(),
            template: workspace.path("pax_template.xlsx"),
        },
        output,
        report_date: None,
    }
}

#[test]
fn router_maps_dates_to_month_tabs() {
    let workspace = TestWorkspace::new();
    let book = read_workbook(&workspace.pax_template());
    let config = EngineConfig::default();
    let router = DateTabRouter::new(&config.pax.tabs, &config.pax.default_tab);

    let route = |raw: CellValue| router.route(&book, &raw).unwrap();
    assert_eq!(route(CellValue::Text("22/12/2025".into())).tab_name, "Dec 25");
    assert_eq!(route(CellValue::Text("10/oct/2025".into())).tab_name, "Oct 25");
    assert_eq!(route(CellValue::Number(45_992.0)).tab_name, "Dec 25");

    let fallback = route(CellValue::Text("someday".into()));
    assert_eq!(fallback.tab_name, "Jan 25");
    assert_eq!(fallback.warnings.len(), 1);

    // Routing is a pure function of the date.
    assert_eq!(
        route(CellValue::Text("22/12/2025".into())),
        route(CellValue::Text("22/12/2025".into()))
    );
}

#[test]
fn pax_days_append_into_their_month_tab() {
    let workspace = TestWorkspace::new();
    workspace.pax_template();
    let config = EngineConfig::default();

    let day_one = pax_request(&workspace, "22/12/2025", &[glacier(), whales()]);
    let summary = generate(&config, &FileWorkbookStore, &day_one).unwrap();
    assert_eq!(summary.mode, GenerationMode::Fresh);
    assert_eq!(summary.tab_name.as_deref(), Some("Dec 25"));
    assert_eq!(summary.totals, TotalsAccumulator::new(7, 1, 1));

    let day_two = pax_request(&workspace, "23/12/2025", &[kayak()]);
    let summary = generate(&config, &FileWorkbookStore, &day_two).unwrap();
    assert_eq!(summary.mode, GenerationMode::Append);
    assert_eq!(summary.totals, TotalsAccumulator::new(7, 1, 1));

    let book = read_workbook(&day_two.output);
    let december = book.get_sheet_by_name("Dec 25").unwrap();
    assert_eq!(text(december, "A4"), "22/12/2025");
    assert_eq!(text(december, "B4"), "Glacier Walk");
    assert_eq!(text(december, "A6"), "22/12/2025");
    assert_eq!(text(december, "B6"), "Whale Watch");
    assert_eq!(text(december, "A8"), "23/12/2025");
    assert_eq!(text(december, "B8"), "Harbour Kayak");
    assert_eq!(text(december, "C8"), "11:00");
    assert_eq!(text(december, "C10"), "TOTAL");
    assert_eq!(text(december, "D10"), "7");
    assert_eq!(text(december, "F10"), "1");

    // Other months keep their template section.
    let november = book.get_sheet_by_name("Nov 25").unwrap();
    assert_eq!(text(november, "B4"), "{{tour_name}}");
}

#[test]
fn pax_merges_duplicate_tours() {
    let workspace = TestWorkspace::new();
    workspace.pax_template();
    let request = pax_request(
        &workspace,
        "10/oct/2025",
        &[glacier(), whales(), glacier().with_notes("Lunch included")],
    );

    let summary = generate(&EngineConfig::default(), &FileWorkbookStore, &request).unwrap();
    assert_eq!(summary.record_count, 2);
    assert_eq!(summary.tab_name.as_deref(), Some("Oct 25"));
    assert_eq!(summary.totals, TotalsAccumulator::new(9, 2, 1));

    let book = read_workbook(&request.output);
    let october = book.get_sheet_by_name("Oct 25").unwrap();
    assert_eq!(text(october, "D4"), "4");
    assert_eq!(text(october, "G4"), "Bring jackets; Lunch included");
    assert_eq!(text(october, "A4"), "10/10/2025");
}

#[test]
fn date_override_and_unparseable_dates() {
    let workspace = TestWorkspace::new();
    workspace.pax_template();

    let mut request = pax_request(&workspace, "someday", &[glacier()]);
    let summary = generate(&EngineConfig::default(), &FileWorkbookStore, &request).unwrap();
    assert_eq!(summary.tab_name.as_deref(), Some("Jan 25"));
    assert!(summary.warnings.iter().any(|warning| warning.starts_with("tab routing")));

    request.report_date = Some("05/11/2025".to_string());
    let summary = generate(&EngineConfig::default(), &FileWorkbookStore, &request).unwrap();
    assert_eq!(summary.tab_name.as_deref(), Some("Nov 25"));
    assert_eq!(summary.mode, GenerationMode::Fresh);
}

#[test]
fn missing_month_tab_is_a_structure_error() {
    let workspace = TestWorkspace::new();
    workspace.pax_template();
    let request = pax_request(&workspace, "15/03/2026", &[glacier()]);

    let err = generate(&EngineConfig::default(), &FileWorkbookStore, &request).unwrap_err();
    assert_matches!(err, ReportError::DocumentStructure { ref path, .. } if path.ends_with("pax_template.xlsx"));
    assert!(!request.output.exists());
}

#[test]
fn template_check_lists_missing_tabs() {
    let workspace = TestWorkspace::new();
    let template = workspace.pax_template();
    let engine = ReportEngine::new(EngineConfig::default());

    let missing = engine.check_pax_template(&template).unwrap();
    assert_eq!(missing.len(), 20);
    assert!(missing.contains(&"Feb 25".to_string()));
    assert!(!missing.contains(&"Dec 25".to_string()));
}

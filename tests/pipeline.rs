//! Batch behaviour with a scripted extractor standing in for the model.
//!
//! No network and no pdfium: inputs are small generated PNG/JPEG images, and
//! each call to the extractor returns the next scripted reply.

use appropriation_extract::{
    export, extract_documents, extract_files, extract_to_xlsx, Column, ExtractError,
    ExtractionConfig, ExtractionProgressCallback, ExtractionResponse, FieldValue, FileError,
    ServiceError, SourceDocument, VisionExtractor,
};
use calamine::{Data, Reader, Xlsx};
use edgequake_llm::ImageData;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Replies in call order; records the instruction and image of each call.
struct ScriptedExtractor {
    replies: Vec<Result<&'static str, &'static str>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<(String, ImageData)>>,
}

impl ScriptedExtractor {
    fn new(replies: Vec<Result<&'static str, &'static str>>) -> Self {
        Self {
            replies,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl VisionExtractor for ScriptedExtractor {
    async fn extract(
        &self,
        image: ImageData,
        instruction: &str,
    ) -> Result<ExtractionResponse, ServiceError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((instruction.to_string(), image));
        match self.replies.get(n) {
            Some(Ok(text)) => Ok(ExtractionResponse {
                text: text.to_string(),
                input_tokens: 100,
                output_tokens: 20,
            }),
            Some(Err(msg)) => Err(ServiceError::new(*msg)),
            None => Err(ServiceError::new("no scripted reply left")),
        }
    }
}

fn image_bytes(format: ImageFormat) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 30, Rgb([250, 250, 245])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

fn doc(name: &str) -> SourceDocument {
    SourceDocument::from_bytes(name, image_bytes(ImageFormat::Png)).unwrap()
}

fn read_rows(bytes: Vec<u8>, sheet: &str) -> Vec<Vec<Data>> {
    let mut xlsx: Xlsx<_> = Xlsx::new(Cursor::new(bytes)).unwrap();
    let range = xlsx.worksheet_range(sheet).unwrap();
    range.rows().map(|r| r.to_vec()).collect()
}

const SHEET_A: &str = r#"```json
{"DATE": "04/03/2024", "SERVICE_FRONT": "Frente 1", "STATION": "E120", "MATERIAL": "Brita", "UNIT": "m3", "QUANTITY": "12,5"}
```"#;

const SHEET_B: &str = r#"{"DATE": "05/03/2024", "STATION": "E121", "QUANTITY": 8, "OBS": "chuva à tarde"}"#;

// ── Batch outcomes ───────────────────────────────────────────────────────────

#[tokio::test]
async fn zero_inputs_is_empty_input_and_calls_nothing() {
    let extractor = ScriptedExtractor::new(vec![]);
    let err = extract_documents(vec![], &extractor, &ExtractionConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::EmptyInput));
    assert_eq!(extractor.calls(), 0);
}

#[tokio::test]
async fn empty_input_writes_no_workbook() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.xlsx");
    let extractor = ScriptedExtractor::new(vec![]);
    let inputs: [&str; 0] = [];

    let err = extract_to_xlsx(&inputs, &path, &extractor, &ExtractionConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::EmptyInput));
    assert!(!path.exists());
}

#[tokio::test]
async fn one_valid_one_unparsable_gives_one_row_one_failure() {
    let extractor = ScriptedExtractor::new(vec![Ok(SHEET_A), Ok("I could not read this sheet.")]);
    let output = extract_documents(
        vec![doc("ficha_01.png"), doc("ficha_02.png")],
        &extractor,
        &ExtractionConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(output.table.len(), 1);
    assert_eq!(output.failures.len(), 1);
    assert!(
        matches!(&output.failures[0], FileError::Parse { file, .. } if file == "ficha_02.png")
    );
    assert_eq!(output.stats.documents, 2);
    assert_eq!(output.stats.succeeded, 1);
    assert_eq!(output.stats.failed, 1);
    assert_eq!(output.stats.total_input_tokens, 200);
}

#[tokio::test]
async fn service_failure_names_the_file_and_batch_continues() {
    let extractor = ScriptedExtractor::new(vec![
        Err("429 quota exceeded"),
        Ok(SHEET_B),
    ]);
    let output = extract_documents(
        vec![doc("a.png"), doc("b.png")],
        &extractor,
        &ExtractionConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(extractor.calls(), 2);
    assert_eq!(output.table.len(), 1);
    match &output.failures[0] {
        FileError::ExtractionCall { file, detail } => {
            assert_eq!(file, "a.png");
            assert!(detail.contains("429"));
        }
        other => panic!("expected ExtractionCall, got {other:?}"),
    }
    assert_eq!(
        output.table.rows()[0].get(Column::Station),
        &FieldValue::Text("E121".into())
    );
}

#[tokio::test]
async fn all_failed_is_no_records_with_every_failure() {
    let extractor = ScriptedExtractor::new(vec![Ok("[]"), Err("timeout")]);
    let err = extract_documents(
        vec![doc("x.png"), doc("y.png")],
        &extractor,
        &ExtractionConfig::default(),
    )
    .await
    .unwrap_err();

    match err {
        ExtractError::NoRecords {
            total,
            first_error,
            failures,
        } => {
            assert_eq!(total, 2);
            assert!(first_error.starts_with("x.png"));
            let files: Vec<&str> = failures.iter().map(FileError::file).collect();
            assert_eq!(files, ["x.png", "y.png"]);
        }
        other => panic!("expected NoRecords, got {other:?}"),
    }
}

#[tokio::test]
async fn unsupported_and_missing_files_are_reported_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("ficha.jpg");
    std::fs::write(&good, image_bytes(ImageFormat::Jpeg)).unwrap();
    let text = dir.path().join("notes.txt");
    std::fs::write(&text, "not an image").unwrap();
    let missing = dir.path().join("gone.png");

    let inputs = vec![
        text.display().to_string(),
        good.display().to_string(),
        missing.display().to_string(),
    ];
    let extractor = ScriptedExtractor::new(vec![Ok(SHEET_B)]);
    let output = extract_files(&inputs, &extractor, &ExtractionConfig::default())
        .await
        .unwrap();

    assert_eq!(extractor.calls(), 1);
    assert_eq!(output.table.len(), 1);
    assert_eq!(
        output.failures,
        vec![
            FileError::UnsupportedFormat {
                file: "notes.txt".into()
            },
            FileError::NotFound {
                file: "gone.png".into()
            },
        ]
    );
}

// ── Table contents ───────────────────────────────────────────────────────────

#[tokio::test]
async fn rows_follow_upload_order_with_canonical_columns() {
    let extractor = ScriptedExtractor::new(vec![Ok(SHEET_B), Ok(SHEET_A), Ok("{}")]);
    let output = extract_documents(
        vec![doc("1.png"), doc("2.png"), doc("3.png")],
        &extractor,
        &ExtractionConfig::default(),
    )
    .await
    .unwrap();

    let rows = output.table.rows();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].get(Column::Station).to_string(), "E121");
    assert_eq!(rows[1].get(Column::Station).to_string(), "E120");
    assert!(rows[2].values().iter().all(FieldValue::is_empty));

    // alias key and numeric coercion
    assert_eq!(
        rows[0].get(Column::Notes),
        &FieldValue::Text("chuva à tarde".into())
    );
    assert_eq!(rows[1].get(Column::Quantity), &FieldValue::Number(12.5));
    assert!(rows[1].get(Column::Direction).is_empty());
}

#[tokio::test]
async fn json_rows_keep_canonical_column_order() {
    let extractor = ScriptedExtractor::new(vec![Ok(SHEET_B)]);
    let output = extract_documents(vec![doc("a.png")], &extractor, &ExtractionConfig::default())
        .await
        .unwrap();

    let json = output.table.to_json();
    let keys: Vec<&str> = json[0]
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    let expected: Vec<&str> = Column::ALL.iter().map(|c| c.name()).collect();
    assert_eq!(keys, expected);
    assert_eq!(json[0]["QUANTITY"], 8.0);
}

#[tokio::test]
async fn default_instruction_and_png_image_are_sent() {
    let extractor = ScriptedExtractor::new(vec![Ok("{}")]);
    extract_documents(vec![doc("a.png")], &extractor, &ExtractionConfig::default())
        .await
        .unwrap();

    let seen = extractor.seen.lock().unwrap();
    let (instruction, image) = &seen[0];
    for col in Column::ALL {
        assert!(instruction.contains(col.name()));
    }
    assert_eq!(image.mime_type, "image/png");
}

#[tokio::test]
async fn custom_instruction_overrides_default() {
    let extractor = ScriptedExtractor::new(vec![Ok("{}")]);
    let config = ExtractionConfig::builder()
        .instruction("Return {} only.")
        .build()
        .unwrap();
    extract_documents(vec![doc("a.png")], &extractor, &config)
        .await
        .unwrap();
    assert_eq!(extractor.seen.lock().unwrap()[0].0, "Return {} only.");
}

// ── Export ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn exported_workbook_has_header_and_one_row_per_record() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("f1.png");
    let bad = dir.path().join("f2.png");
    let good2 = dir.path().join("f3.png");
    for p in [&good, &bad, &good2] {
        std::fs::write(p, image_bytes(ImageFormat::Png)).unwrap();
    }
    let out = dir.path().join("fichas.xlsx");

    let extractor = ScriptedExtractor::new(vec![Ok(SHEET_A), Ok("oops"), Ok(SHEET_B)]);
    let config = ExtractionConfig::builder()
        .sheet_name("Fichas")
        .build()
        .unwrap();
    let inputs = [&good, &bad, &good2].map(|p| p.display().to_string());
    let output = extract_to_xlsx(&inputs, &out, &extractor, &config)
        .await
        .unwrap();
    assert_eq!(output.failures.len(), 1);

    let rows = read_rows(std::fs::read(&out).unwrap(), "Fichas");
    assert_eq!(rows.len(), 3);
    let header: Vec<String> = rows[0].iter().map(|d| d.to_string()).collect();
    let expected: Vec<String> = Column::ALL.iter().map(|c| c.name().to_string()).collect();
    assert_eq!(header, expected);

    let station = Column::Station.index();
    assert_eq!(rows[1][station], Data::String("E120".into()));
    assert_eq!(rows[2][station], Data::String("E121".into()));
    assert_eq!(rows[1][Column::Quantity.index()], Data::Float(12.5));
}

#[test]
fn export_bytes_roundtrip_in_memory() {
    let extractor = ScriptedExtractor::new(vec![Ok(SHEET_A), Ok(SHEET_B)]);
    let output = tokio_test::block_on(extract_documents(
        vec![doc("a.png"), doc("b.png")],
        &extractor,
        &ExtractionConfig::default(),
    ))
    .unwrap();

    let bytes = export(&output.table, "Appropriation").unwrap();
    let rows = read_rows(bytes, "Appropriation");
    assert_eq!(rows.len(), 1 + output.table.len());
    assert!(rows.iter().all(|r| r.len() == Column::ALL.len()));
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl ExtractionProgressCallback for Recorder {
    fn on_batch_start(&self, total_files: usize) {
        self.events.lock().unwrap().push(format!("start {total_files}"));
    }
    fn on_document_complete(&self, label: &str) {
        self.events.lock().unwrap().push(format!("ok {label}"));
    }
    fn on_document_error(&self, label: &str, _error: &str) {
        self.events.lock().unwrap().push(format!("err {label}"));
    }
    fn on_file_complete(&self, completed: usize, total: usize, _file: &str) {
        let f = appropriation_extract::progress::progress_fraction(completed, total);
        self.events.lock().unwrap().push(format!("{f:.2}"));
    }
    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {success_count}/{total_documents}"));
    }
}

#[tokio::test]
async fn progress_reports_every_file_in_order() {
    let recorder = Arc::new(Recorder::default());
    let config = ExtractionConfig::builder()
        .progress_callback(recorder.clone() as Arc<dyn ExtractionProgressCallback>)
        .build()
        .unwrap();
    let extractor = ScriptedExtractor::new(vec![Ok("{}"), Ok("nope"), Ok("{}"), Ok("{}")]);
    extract_documents(
        vec![doc("1.png"), doc("2.png"), doc("3.png"), doc("4.png")],
        &extractor,
        &config,
    )
    .await
    .unwrap();

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        [
            "start 4", "ok 1.png", "0.25", "err 2.png", "0.50", "ok 3.png", "0.75", "ok 4.png",
            "1.00", "done 3/4",
        ]
    );
}

//! Batch entry points: uploaded sheets in, normalized table out.
//!
//! Files are processed one at a time in upload order. Each file runs through
//! load → decode → encode → extract → parse and ends as a
//! [`DocumentOutcome`]; a failure at any step is recorded against that file
//! and the batch moves on. Outcomes are partitioned at the end: records feed
//! the [`RecordAggregator`], failures are returned alongside the table.

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, FileError};
use crate::output::{partition, BatchOutput, BatchStats, DocumentOutcome};
use crate::pipeline::aggregate::RecordAggregator;
use crate::pipeline::input::{self, SourceDocument};
use crate::pipeline::llm::VisionExtractor;
use crate::pipeline::{encode, export, parse, render};
use crate::prompts::default_instruction;
use crate::record::FieldRecord;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One batch slot: either still a path/URL, or bytes the caller already has.
enum Pending<'a> {
    Input(&'a str),
    Loaded(SourceDocument),
}

impl Pending<'_> {
    fn name(&self) -> String {
        match self {
            Pending::Input(s) => input::input_name(s),
            Pending::Loaded(doc) => doc.name.clone(),
        }
    }
}

/// Extract every local path or URL in `inputs`.
///
/// # Errors
/// Returns `Err` only when there is nothing to export:
/// - [`ExtractError::EmptyInput`] if `inputs` is empty
/// - [`ExtractError::NoRecords`] if every file failed
///
/// Partial failures are reported in [`BatchOutput::failures`].
pub async fn extract_files<E, S>(
    inputs: &[S],
    extractor: &E,
    config: &ExtractionConfig,
) -> Result<BatchOutput, ExtractError>
where
    E: VisionExtractor,
    S: AsRef<str>,
{
    let pending: Vec<Pending<'_>> = inputs
        .iter()
        .map(|s| Pending::Input(s.as_ref()))
        .collect();
    run_batch(pending, extractor, config).await
}

/// Extract documents already held in memory (e.g. from an upload widget).
///
/// Same contract as [`extract_files`].
pub async fn extract_documents<E: VisionExtractor>(
    documents: Vec<SourceDocument>,
    extractor: &E,
    config: &ExtractionConfig,
) -> Result<BatchOutput, ExtractError> {
    let pending: Vec<Pending<'_>> = documents.into_iter().map(Pending::Loaded).collect();
    run_batch(pending, extractor, config).await
}

/// Extract `inputs` and write the workbook to `output_path`.
///
/// Nothing is written when the batch returns `Err`.
pub async fn extract_to_xlsx<E, S>(
    inputs: &[S],
    output_path: impl AsRef<Path>,
    extractor: &E,
    config: &ExtractionConfig,
) -> Result<BatchOutput, ExtractError>
where
    E: VisionExtractor,
    S: AsRef<str>,
{
    let output = extract_files(inputs, extractor, config).await?;
    export::write_xlsx(&output.table, output_path, &config.sheet_name).await?;
    Ok(output)
}

async fn run_batch<E: VisionExtractor>(
    pending: Vec<Pending<'_>>,
    extractor: &E,
    config: &ExtractionConfig,
) -> Result<BatchOutput, ExtractError> {
    if pending.is_empty() {
        warn!("No files to process");
        return Err(ExtractError::EmptyInput);
    }

    let total_start = Instant::now();
    let total = pending.len();
    let instruction = config
        .instruction
        .clone()
        .unwrap_or_else(default_instruction);
    let cb = config.progress_callback.as_ref();

    info!("Processing {} files", total);
    if let Some(cb) = cb {
        cb.on_batch_start(total);
    }

    let mut stats = BatchStats {
        files: total,
        ..Default::default()
    };
    let mut outcomes: Vec<DocumentOutcome> = Vec::with_capacity(total);

    for (i, item) in pending.into_iter().enumerate() {
        let name = item.name();
        if let Some(cb) = cb {
            cb.on_file_start(i + 1, total, &name);
        }

        let loaded = match item {
            Pending::Input(s) => input::load_document(s, config.download_timeout_secs).await,
            Pending::Loaded(doc) => Ok(doc),
        };
        let file_outcomes = match loaded {
            Ok(doc) => process_document(&doc, extractor, config, &instruction, &mut stats).await,
            Err(e) => vec![DocumentOutcome {
                source: name.clone(),
                result: Err(e),
            }],
        };

        for outcome in &file_outcomes {
            match &outcome.result {
                Ok(_) => {
                    debug!("{}: extracted", outcome.source);
                    if let Some(cb) = cb {
                        cb.on_document_complete(&outcome.source);
                    }
                }
                Err(e) => {
                    warn!("{}", e);
                    if let Some(cb) = cb {
                        cb.on_document_error(&outcome.source, &e.to_string());
                    }
                }
            }
        }
        outcomes.extend(file_outcomes);

        if let Some(cb) = cb {
            cb.on_file_complete(i + 1, total, &name);
        }
    }

    stats.documents = outcomes.len();
    stats.succeeded = outcomes.iter().filter(|o| o.is_success()).count();
    stats.failed = stats.documents - stats.succeeded;
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    if let Some(cb) = cb {
        cb.on_batch_complete(stats.documents, stats.succeeded);
    }

    let (records, failures) = partition(outcomes);
    if records.is_empty() {
        let first_error = failures
            .first()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(ExtractError::NoRecords {
            total: failures.len(),
            first_error,
            failures,
        });
    }

    let mut aggregator = RecordAggregator::new();
    for record in records {
        aggregator.accumulate(record);
    }
    let table = aggregator.finalize();

    info!(
        "Batch complete: {}/{} documents, {}ms total",
        stats.succeeded, stats.documents, stats.total_duration_ms
    );

    Ok(BatchOutput {
        table,
        failures,
        stats,
    })
}

/// Run one loaded file through the pipeline.
///
/// Returns one outcome per document: a single outcome for images and for
/// PDFs in first-page mode, one per page otherwise.
async fn process_document<E: VisionExtractor>(
    doc: &SourceDocument,
    extractor: &E,
    config: &ExtractionConfig,
    instruction: &str,
    stats: &mut BatchStats,
) -> Vec<DocumentOutcome> {
    let pages = match render::decode_document(doc, config).await {
        Ok(pages) => pages,
        Err(e) => {
            return vec![DocumentOutcome {
                source: doc.name.clone(),
                result: Err(e),
            }]
        }
    };

    let mut outcomes = Vec::with_capacity(pages.len());
    for page in pages {
        let result = extract_page(&page, extractor, instruction, stats).await;
        outcomes.push(DocumentOutcome {
            source: page.label,
            result,
        });
    }
    outcomes
}

async fn extract_page<E: VisionExtractor>(
    page: &render::DecodedPage,
    extractor: &E,
    instruction: &str,
    stats: &mut BatchStats,
) -> Result<FieldRecord, FileError> {
    let image = encode::encode_sheet(page)?;

    let llm_start = Instant::now();
    let response = extractor.extract(image, instruction).await;
    stats.llm_duration_ms += llm_start.elapsed().as_millis() as u64;

    let response = response.map_err(|e| FileError::ExtractionCall {
        file: page.label.clone(),
        detail: e.to_string(),
    })?;
    stats.total_input_tokens += response.input_tokens;
    stats.total_output_tokens += response.output_tokens;

    parse::parse(&response.text).map_err(|e| FileError::Parse {
        file: page.label.clone(),
        cause: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::pipeline::llm::ExtractionResponse;
    use edgequake_llm::ImageData;

    struct Fixed(&'static str);

    impl VisionExtractor for Fixed {
        async fn extract(
            &self,
            _image: ImageData,
            _instruction: &str,
        ) -> Result<ExtractionResponse, ServiceError> {
            Ok(ExtractionResponse::from_text(self.0))
        }
    }

    #[tokio::test]
    async fn empty_input_is_rejected_before_any_work() {
        let inputs: Vec<String> = vec![];
        let err = extract_files(&inputs, &Fixed("{}"), &ExtractionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::EmptyInput));
    }

    #[tokio::test]
    async fn load_failures_are_per_file() {
        let inputs = ["/no/such/a.jpg", "/no/such/b.png"];
        let err = extract_files(&inputs, &Fixed("{}"), &ExtractionConfig::default())
            .await
            .unwrap_err();
        match err {
            ExtractError::NoRecords { total, failures, .. } => {
                assert_eq!(total, 2);
                assert_eq!(failures[0], FileError::NotFound { file: "a.jpg".into() });
                assert_eq!(failures[1], FileError::NotFound { file: "b.png".into() });
            }
            other => panic!("expected NoRecords, got {other:?}"),
        }
    }
}

//! Batch pipeline for the nitrogen map toolchain.
//!
//! Chains scan -> load -> extract -> analyze -> write. Each step reports
//! through a [`ProgressCallback`], so the same run can drive `indicatif`
//! bars on a terminal or stay silent in tests.

use std::path::PathBuf;
use std::time::Instant;

use nitrogen_map_analysis::{AnalysisError, analyze};
use nitrogen_map_cli_utils::{MultiProgress, PipelineBars};
use nitrogen_map_generate::{OutputError, OutputPaths, write_outputs};
use nitrogen_map_ingest::{
    IngestError, ProgressCallback, load_first_fields, load_first_waters, load_management_docs,
    scan_workspace,
};
use thiserror::Error;

use crate::config::PipelineConfig;

/// Number of steps reported on the steps bar.
const STEP_COUNT: u64 = 5;

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The workspace could not be scanned or documents could not be read.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Analysis failed on a configuration error. No output is written.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// The outputs could not be written.
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Inputs of a single run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Directory searched for vector layers. Also the base of the default
    /// documents directory.
    pub root: PathBuf,
    /// Directory receiving the dataset files. Excluded from the scan.
    pub out_dir: PathBuf,
    /// Effective configuration after flags and file are merged.
    pub config: PipelineConfig,
}

/// What a run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSummary {
    /// Number of analyzed fields.
    pub field_count: usize,
    /// Number of water geometries used for distances.
    pub water_count: usize,
    /// Number of nitrogen records extracted from documents.
    pub record_count: usize,
    /// Written files.
    pub outputs: OutputPaths,
}

/// Runs the pipeline, reporting step progress to `steps` and document
/// extraction to `documents`.
///
/// # Errors
///
/// Returns [`PipelineError`] if the scan, the analysis or writing the
/// outputs fails. Unreadable individual inputs are skipped instead.
pub fn run_with_progress(
    options: &PipelineOptions,
    steps: &dyn ProgressCallback,
    documents: &dyn ProgressCallback,
) -> Result<PipelineSummary, PipelineError> {
    let PipelineOptions {
        root,
        out_dir,
        config,
    } = options;

    steps.set_total(STEP_COUNT);

    // --- 1. Scan ---
    steps.set_message("Scanning workspace".to_string());
    let scan = scan_workspace(root, std::slice::from_ref(out_dir))?;
    log::info!(
        "Found {} shapefiles, {} geopackages, {} GeoJSON files and {} PDFs under {}",
        scan.shapefiles.len(),
        scan.geopackages.len(),
        scan.geojson.len(),
        scan.pdfs.len(),
        root.display()
    );
    steps.inc(1);

    // --- 2. Load vectors ---
    steps.set_message("Loading fields and waters".to_string());
    let fields = load_first_fields(&scan.field_candidates());
    let waters = load_first_waters(&scan.water_candidates());
    if fields.is_empty() {
        log::warn!("No field layer found under {}", root.display());
    }
    if waters.is_empty() {
        log::warn!("No water layer found; distances will be undefined");
    }
    steps.inc(1);

    // --- 3. Extract nitrogen records ---
    steps.set_message("Extracting nitrogen records".to_string());
    let documents_dir = config.ingest.documents_dir_for(root);
    let records = load_management_docs(&documents_dir, documents)?;
    steps.inc(1);

    // --- 4. Analyze ---
    steps.set_message("Analyzing".to_string());
    let field_count = fields.len();
    let water_count = waters.geometries.len();
    let analyzed = analyze(fields, &waters, &records, &config.analysis)?;
    steps.inc(1);

    // --- 5. Write ---
    steps.set_message("Writing outputs".to_string());
    let outputs = write_outputs(&analyzed, out_dir)?;
    steps.inc(1);

    steps.finish(format!("Wrote {field_count} fields to {}", out_dir.display()));

    Ok(PipelineSummary {
        field_count,
        water_count,
        record_count: records.len(),
        outputs,
    })
}

/// Runs the pipeline with `indicatif` bars attached to `multi`.
///
/// # Errors
///
/// Returns [`PipelineError`] if any step fails.
pub fn run(
    options: &PipelineOptions,
    multi: &MultiProgress,
) -> Result<PipelineSummary, PipelineError> {
    let start = Instant::now();

    let bars = PipelineBars::new(multi, STEP_COUNT);
    let summary = run_with_progress(options, bars.steps.as_ref(), bars.documents.as_ref())?;

    log::info!(
        "Pipeline finished in {:.1}s: {} fields, {} water geometries, {} nitrogen records",
        start.elapsed().as_secs_f64(),
        summary.field_count,
        summary.water_count,
        summary.record_count
    );
    log::info!("CSV: {}", summary.outputs.csv.display());
    log::info!("GeoJSON: {}", summary.outputs.geojson.display());

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;

    use nitrogen_map_field_models::{Crs, columns};
    use nitrogen_map_ingest::{null_progress, read_fields_geojson};

    use super::*;

    fn run_quiet(options: &PipelineOptions) -> Result<PipelineSummary, PipelineError> {
        let progress = null_progress();
        run_with_progress(options, progress.as_ref(), progress.as_ref())
    }

    const FIELDS: &str = r#"{
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3857"}},
        "features": [
            {
                "type": "Feature",
                "properties": {"id": "near", "area_ha": 10.0, "kultur": "Mais"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 500.0], [100.0, 500.0], [100.0, 600.0], [0.0, 600.0], [0.0, 500.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": {"id": "far", "area_ha": 10.0},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 2500.0], [100.0, 2500.0], [100.0, 2600.0], [0.0, 2600.0], [0.0, 2500.0]]]
                }
            }
        ]
    }"#;

    const WATERS: &str = r#"{
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": "EPSG:3857"}},
        "features": [
            {
                "type": "Feature",
                "properties": {"name": "Bach"},
                "geometry": {"type": "LineString", "coordinates": [[-2000.0, 0.0], [2000.0, 0.0]]}
            }
        ]
    }"#;

    fn workspace(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "nitrogen_map_pipeline_{name}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join("layers")).unwrap();
        fs::write(root.join("layers").join("felder.geojson"), FIELDS).unwrap();
        fs::write(root.join("layers").join("gewaesser.geojson"), WATERS).unwrap();
        root
    }

    fn options(root: &Path) -> PipelineOptions {
        PipelineOptions {
            root: root.to_path_buf(),
            out_dir: root.join("out"),
            config: PipelineConfig::default(),
        }
    }

    #[test]
    fn writes_analyzed_dataset() {
        let root = workspace("analyzed");
        let summary = run_quiet(&options(&root)).unwrap();

        assert_eq!(summary.field_count, 2);
        assert_eq!(summary.water_count, 1);
        assert_eq!(summary.record_count, 0);
        assert!(summary.outputs.csv.is_file());

        let written = read_fields_geojson(&summary.outputs.geojson).unwrap();
        assert_eq!(written.crs, Crs::WEB_MERCATOR);
        assert_eq!(written.len(), 2);

        let near = &written.fields[0];
        assert_eq!(near.id, "near");
        assert!((near.dist_to_water_m.unwrap() - 500.0).abs() < 1e-6);
        assert!(near.policy_rate_kg_ha.unwrap().abs() < f64::EPSILON);
        assert!(near.applied_rate_kg_ha.is_none());
        assert_eq!(near.properties["kultur"], "Mais");

        let far = &written.fields[1];
        assert!((far.dist_to_water_m.unwrap() - 2500.0).abs() < 1e-6);
        assert!((far.policy_rate_kg_ha.unwrap() - 50.0).abs() < f64::EPSILON);

        fs::remove_dir_all(&root).unwrap();
    }

    /// Remembers the document totals reported during a run.
    #[derive(Default)]
    struct DocumentTotals(Mutex<Vec<u64>>);

    impl ProgressCallback for DocumentTotals {
        fn set_total(&self, total: u64) {
            self.0.lock().unwrap().push(total);
        }
        fn inc(&self, _delta: u64) {}
        fn set_message(&self, _msg: String) {}
        fn finish(&self, _msg: String) {}
    }

    fn document_totals(options: &PipelineOptions) -> Vec<u64> {
        let totals = DocumentTotals::default();
        run_with_progress(options, null_progress().as_ref(), &totals).unwrap();
        totals.0.into_inner().unwrap()
    }

    #[test]
    fn only_management_folder_pdfs_are_read() {
        let root = workspace("stray_pdf");
        fs::write(root.join("duengeverordnung.pdf"), b"N 170 kg/ha").unwrap();
        fs::write(root.join("layers").join("anhang.pdf"), b"N 170 kg/ha").unwrap();

        // No management folder: nothing is read.
        assert!(document_totals(&options(&root)).is_empty());

        let docs = root.join("Bewirtschaftungsdokumentation-PDF");
        fs::create_dir_all(&docs).unwrap();
        fs::write(docs.join("schlag_1.pdf"), b"not a pdf").unwrap();
        assert_eq!(document_totals(&options(&root)), [1]);

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn reads_records_from_documents_dir() {
        let root = workspace("documents");
        let docs = root.join("docs");
        fs::create_dir_all(&docs).unwrap();
        // Unreadable PDFs contribute no records.
        fs::write(docs.join("broken.pdf"), b"not a pdf").unwrap();

        let mut options = options(&root);
        options.config.ingest.documents_dir = Some(docs);
        let summary = run_quiet(&options).unwrap();

        assert_eq!(summary.record_count, 0);
        let written = read_fields_geojson(&summary.outputs.geojson).unwrap();
        assert!(written.fields.iter().all(|f| f.estimated_to_water_kg.is_none()));

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn second_run_ignores_previous_outputs() {
        let root = workspace("rerun");
        run_quiet(&options(&root)).unwrap();
        let summary = run_quiet(&options(&root)).unwrap();

        assert_eq!(summary.field_count, 2);
        let csv = fs::read_to_string(&summary.outputs.csv).unwrap();
        assert!(csv.starts_with(columns::ID));
        assert_eq!(csv.lines().count(), 3);

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn invalid_runoff_coefficient_writes_nothing() {
        let root = workspace("invalid");
        let mut options = options(&root);
        options.config.analysis.runoff_coefficient = 1.5;

        let err = run_quiet(&options).unwrap_err();
        assert!(matches!(err, PipelineError::Analysis(_)));
        assert!(!options.out_dir.exists());

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn empty_workspace_writes_empty_dataset() {
        let root = std::env::temp_dir().join(format!(
            "nitrogen_map_pipeline_empty_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();

        let summary = run_quiet(&options(&root)).unwrap();
        assert_eq!(summary.field_count, 0);
        assert!(read_fields_geojson(&summary.outputs.geojson).unwrap().is_empty());

        fs::remove_dir_all(&root).unwrap();
    }
}

//! Nitrogen application figures from management documents.
//!
//! Farm management PDFs state applied nitrogen as free text ("N: 60
//! kg/ha", "N 45,5 kg ha-1"). Text is pulled out with [`pdf_extract`] and
//! every figure matching [`N_RATE_PATTERN`] becomes a [`NitrogenRecord`].

use std::path::{Path, PathBuf};

use nitrogen_map_field_models::NitrogenRecord;
use regex::Regex;

use crate::{IngestError, ProgressCallback};

/// Matches an `N` token followed by a rate, with an optional unit.
/// Group 1 is the number; a decimal comma is accepted.
pub const N_RATE_PATTERN: &str =
    r"(?i)\bN[:\s]*([0-9]{1,4}(?:[.,][0-9]+)?)\s*(?:kg/ha|kg per ha|kg ha-1)?";

/// Extracts every nitrogen rate mentioned in `text`.
///
/// # Errors
///
/// Returns [`IngestError::Regex`] if the built-in pattern fails to
/// compile.
pub fn extract_records_from_text(
    source: &str,
    text: &str,
) -> Result<Vec<NitrogenRecord>, IngestError> {
    let re = Regex::new(N_RATE_PATTERN)?;

    let records = re
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let rate = caps.get(1)?.as_str().replace(',', ".").parse::<f64>().ok()?;
            Some(NitrogenRecord {
                source: source.to_owned(),
                rate_kg_per_ha: rate,
                raw_text: whole.as_str().trim().to_owned(),
            })
        })
        .collect::<Vec<_>>();

    log::debug!("Matched {} nitrogen figures in {source}", records.len());

    Ok(records)
}

fn pdf_text(path: &Path) -> Result<String, IngestError> {
    // pdf-extract panics on some malformed documents.
    std::panic::catch_unwind(|| pdf_extract::extract_text(path))
        .map_err(|_| IngestError::Pdf(format!("extractor panicked on {}", path.display())))?
        .map_err(|e| {
            IngestError::Pdf(format!("failed to extract text from {}: {e}", path.display()))
        })
}

/// Extracts nitrogen records from one PDF.
///
/// An unreadable document is logged and yields no records.
///
/// # Errors
///
/// Returns [`IngestError::Regex`] if the built-in pattern fails to
/// compile.
pub fn extract_records_from_pdf(path: &Path) -> Result<Vec<NitrogenRecord>, IngestError> {
    let text = match pdf_text(path) {
        Ok(text) => text,
        Err(e) => {
            log::warn!("{e}");
            return Ok(Vec::new());
        }
    };
    log::debug!("Extracted {} characters from {}", text.len(), path.display());

    extract_records_from_text(&path.display().to_string(), &text)
}

/// Extracts nitrogen records from each PDF in `paths`, in order.
///
/// # Errors
///
/// Returns [`IngestError::Regex`] if the built-in pattern fails to
/// compile.
pub fn extract_records_from_pdfs(
    paths: &[PathBuf],
    progress: &dyn ProgressCallback,
) -> Result<Vec<NitrogenRecord>, IngestError> {
    progress.set_total(paths.len() as u64);

    let mut records = Vec::new();
    for path in paths {
        if let Some(name) = path.file_name() {
            progress.set_message(name.to_string_lossy().into_owned());
        }
        records.extend(extract_records_from_pdf(path)?);
        progress.inc(1);
    }

    progress.finish(format!(
        "Extracted {} nitrogen records from {} documents",
        records.len(),
        paths.len()
    ));
    log::info!(
        "Extracted {} nitrogen records from {} documents",
        records.len(),
        paths.len()
    );

    Ok(records)
}

/// Extracts nitrogen records from every `.pdf` directly inside `dir`,
/// sorted by path.
///
/// A missing directory is logged and yields no records.
///
/// # Errors
///
/// Returns [`IngestError`] if the directory cannot be listed or the
/// built-in pattern fails to compile.
pub fn load_management_docs(
    dir: &Path,
    progress: &dyn ProgressCallback,
) -> Result<Vec<NitrogenRecord>, IngestError> {
    if !dir.is_dir() {
        log::warn!("Documents directory {} not found", dir.display());
        progress.finish("No documents".to_string());
        return Ok(Vec::new());
    }

    let mut pdfs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if is_pdf && path.is_file() {
            pdfs.push(path);
        }
    }
    pdfs.sort();

    extract_records_from_pdfs(&pdfs, progress)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::NullProgress;

    #[test]
    fn extracts_rates_with_units_and_decimal_commas() {
        let text = "Gabe 1: N 60 kg/ha\nGabe 2: N: 45,5 kg ha-1\nNmin 30\nDüngung n120";
        let records = extract_records_from_text("plan.pdf", text).unwrap();

        let rates = records.iter().map(|r| r.rate_kg_per_ha).collect::<Vec<_>>();
        assert_eq!(rates, [60.0, 45.5, 120.0]);
        assert_eq!(records[0].raw_text, "N 60 kg/ha");
        assert_eq!(records[1].raw_text, "N: 45,5 kg ha-1");
        assert!(records.iter().all(|r| r.source == "plan.pdf"));
    }

    #[test]
    fn ignores_n_inside_words() {
        let records = extract_records_from_text("doc", "in 5 Tagen, Ernte 2024").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn missing_documents_directory_yields_nothing() {
        let dir = std::env::temp_dir().join("nitrogen_map_docs_definitely_missing");
        assert!(load_management_docs(&dir, &NullProgress).unwrap().is_empty());
    }

    #[test]
    fn unreadable_pdf_yields_no_records() {
        let dir = std::env::temp_dir().join(format!("nitrogen_map_docs_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("broken.pdf"), b"this is not a pdf").unwrap();
        fs::write(dir.join("notes.txt"), b"N 60 kg/ha").unwrap();

        let records = load_management_docs(&dir, &NullProgress).unwrap();
        assert!(records.is_empty());

        fs::remove_dir_all(&dir).unwrap();
    }
}

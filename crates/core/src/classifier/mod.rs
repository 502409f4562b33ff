//! Heuristic log-to-progress classification.
//!
//! Worker scripts report their position in the pipeline through marker
//! strings in their output. This module maps a single output line to a
//! coarse stage and completion percentage. It is a pure lookup with no
//! state, so the stage runner can feed it arbitrary lines as they
//! arrive.

/// Result of classifying one output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Completion percentage, if the line matched a known marker.
    pub percent: Option<u8>,
    /// Stage token after this line. Unmatched lines keep the current stage.
    pub stage: String,
}

struct Rule {
    markers: &'static [&'static str],
    percent: u8,
    stage: &'static str,
}

/// Marker table, ordered by ascending pipeline position. The first rule
/// whose marker appears in the line wins, so a line carrying markers
/// from two stages resolves to the earlier one.
const RULES: &[Rule] = &[
    Rule {
        markers: &["Starting download", "Downloading"],
        percent: 15,
        stage: "downloading",
    },
    Rule {
        markers: &["EDITOR_START", "Opening image editor"],
        percent: 25,
        stage: "image_editing",
    },
    Rule {
        markers: &["EDITOR_COMPLETE", "Image editing complete"],
        percent: 55,
        stage: "uploading",
    },
    Rule {
        markers: &["UPLOAD_COMPLETE", "Uploaded to storage"],
        percent: 65,
        stage: "pdf_generation",
    },
    Rule {
        markers: &["PDF_START", "Starting PDF generation"],
        percent: 70,
        stage: "wrapping_pdf",
    },
    Rule {
        markers: &["PDF_WRAPPING_COMPLETE", "Wrapping paper PDF complete"],
        percent: 80,
        stage: "panel_pdf",
    },
    Rule {
        markers: &["PDF_PANELS_COMPLETE", "Panel PDF complete"],
        percent: 90,
        stage: "catalog_update",
    },
    Rule {
        markers: &["CATALOG_UPDATE_START", "Starting catalog update"],
        percent: 95,
        stage: "catalog_update",
    },
    Rule {
        markers: &["CATALOG_UPDATE_COMPLETE", "Catalog update complete"],
        percent: 100,
        stage: "completed",
    },
];

/// Classify one line of worker output against the marker table.
///
/// Returns `percent: None` with the unchanged stage when no marker
/// matches, meaning the line should be logged without moving progress.
pub fn classify_line(line: &str, current_stage: &str) -> Classification {
    for rule in RULES {
        if rule.markers.iter().any(|marker| line.contains(marker)) {
            return Classification {
                percent: Some(rule.percent),
                stage: rule.stage.to_string(),
            };
        }
    }

    Classification {
        percent: None,
        stage: current_stage.to_string(),
    }
}

//! Combined 2x2 figure

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use svg::node::element::Image;
use svg::parser::Event;
use svg::Document;

use crate::error::{ReportError, Result};
use crate::render::{placeholder_document, ArtifactKind, CANVAS_HEIGHT, CANVAS_WIDTH};

pub const REPORT_FILE: &str = "combined_figures.svg";

/// How one panel ended up in the report
#[derive(Debug, Clone, PartialEq)]
pub enum PanelState {
    Embedded,
    Missing,
    Corrupt(String),
}

#[derive(Debug, Clone)]
pub struct ReportSummary {
    pub path: PathBuf,
    pub panels: Vec<(ArtifactKind, PanelState)>,
}

/// Ok when `content` parses as an SVG document
fn check_svg(content: &str) -> std::result::Result<(), String> {
    let parser = svg::read(content).map_err(|e| e.to_string())?;
    let mut root_seen = false;
    for event in parser {
        match event {
            Event::Error(e) => return Err(e.to_string()),
            Event::Tag(name, _, _) if name == "svg" => root_seen = true,
            _ => {}
        }
    }
    if root_seen {
        Ok(())
    } else {
        Err("no <svg> root element".to_string())
    }
}

fn load_panel(path: &Path) -> (PanelState, Option<String>) {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return (PanelState::Missing, None),
        Err(e) => return (PanelState::Corrupt(e.to_string()), None),
    };
    let content = match String::from_utf8(bytes) {
        Ok(c) => c,
        Err(e) => return (PanelState::Corrupt(e.to_string()), None),
    };
    match check_svg(&content) {
        Ok(()) => {
            let uri = format!("data:image/svg+xml;base64,{}", STANDARD.encode(content.as_bytes()));
            (PanelState::Embedded, Some(uri))
        }
        Err(reason) => (PanelState::Corrupt(reason), None),
    }
}

/// Compose heatmap, volcano, GO and KEGG panels from `dir` into [`REPORT_FILE`].
///
/// Missing or unreadable panels are replaced by placeholders. Errors only
/// when the combined file cannot be written.
pub fn assemble_report(dir: &Path) -> Result<ReportSummary> {
    let (w, h) = (CANVAS_WIDTH, CANVAS_HEIGHT);
    let mut doc = Document::new()
        .set("viewBox", (0, 0, 2 * w, 2 * h))
        .set("width", 2 * w)
        .set("height", 2 * h);

    let mut panels = Vec::with_capacity(ArtifactKind::ALL.len());
    for (i, kind) in ArtifactKind::ALL.into_iter().enumerate() {
        let x = (i as u32 % 2) * w;
        let y = (i as u32 / 2) * h;
        let (state, uri) = load_panel(&dir.join(kind.file_name()));

        match (&state, uri) {
            (PanelState::Embedded, Some(uri)) => {
                doc = doc.add(
                    Image::new()
                        .set("x", x)
                        .set("y", y)
                        .set("width", w)
                        .set("height", h)
                        .set("preserveAspectRatio", "xMidYMid meet")
                        .set("href", uri),
                );
            }
            _ => {
                let message = match &state {
                    PanelState::Corrupt(reason) => format!("{} is corrupt: {}", kind.file_name(), reason),
                    _ => format!("{} is missing", kind.file_name()),
                };
                log::warn!("report panel replaced: {}", message);
                doc = doc.add(placeholder_document(kind.title(), &message, w, h).set("x", x).set("y", y));
            }
        }
        panels.push((kind, state));
    }

    let path = dir.join(REPORT_FILE);
    svg::save(&path, &doc).map_err(|e| ReportError::Assembly {
        reason: format!("{}: {}", path.display(), e),
    })?;
    log::info!("wrote {}", path.display());
    Ok(ReportSummary { path, panels })
}

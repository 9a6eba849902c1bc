//! Figure artifacts
//!
//! Every artifact has a fixed file name and ends up on disk either as a
//! drawn figure or as a placeholder panel explaining why it is empty.

mod cluster;
mod dotplot;
mod heatmap;
mod placeholder;
mod volcano;

pub use cluster::{complete_linkage, Dendrogram, Merge};
pub use dotplot::draw_dotplot;
pub use heatmap::{draw_heatmap, prepare_heatmap, HeatmapData, MAX_HEATMAP_GENES};
pub use placeholder::{placeholder_document, write_placeholder};
pub use volcano::{draw_volcano, volcano_points, VolcanoPoint};

use std::path::{Path, PathBuf};

use crate::enrichment::Ontology;
use crate::error::{ReportError, Result};

/// Default canvas for charts and placeholders
pub const CANVAS_WIDTH: u32 = 800;
pub const CANVAS_HEIGHT: u32 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Heatmap,
    Volcano,
    GoDotplot,
    KeggDotplot,
}

impl ArtifactKind {
    /// Report panel order
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::Heatmap,
        ArtifactKind::Volcano,
        ArtifactKind::GoDotplot,
        ArtifactKind::KeggDotplot,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactKind::Heatmap => "heatmap.svg",
            ArtifactKind::Volcano => "volcano.svg",
            ArtifactKind::GoDotplot => "go_dotplot.svg",
            ArtifactKind::KeggDotplot => "kegg_dotplot.svg",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ArtifactKind::Heatmap => "Significant genes heatmap",
            ArtifactKind::Volcano => "Volcano plot",
            ArtifactKind::GoDotplot => "GO biological process enrichment",
            ArtifactKind::KeggDotplot => "KEGG pathway enrichment",
        }
    }

    pub fn for_ontology(ontology: Ontology) -> Self {
        match ontology {
            Ontology::BiologicalProcess => ArtifactKind::GoDotplot,
            Ontology::Pathway => ArtifactKind::KeggDotplot,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactOutcome {
    Content,
    /// Placeholder panel with the reason it was written
    Placeholder(String),
}

#[derive(Debug, Clone)]
pub struct RenderedArtifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub outcome: ArtifactOutcome,
}

impl RenderedArtifact {
    pub fn is_placeholder(&self) -> bool {
        matches!(self.outcome, ArtifactOutcome::Placeholder(_))
    }
}

/// Map a drawing backend error onto a render error for `kind`
pub(crate) fn render_error<E: std::fmt::Display>(kind: ArtifactKind) -> impl Fn(E) -> ReportError {
    move |e| ReportError::Render {
        artifact: kind.file_name().to_string(),
        reason: e.to_string(),
    }
}

/// Write `kind` into `out_dir`.
///
/// With `no_data` set a placeholder carrying that reason is written without
/// calling `draw`. A failing `draw` is replaced by a placeholder carrying the
/// error message. Never fails.
pub fn render_or_placeholder<F>(kind: ArtifactKind, out_dir: &Path, no_data: Option<String>, draw: F) -> RenderedArtifact
where
    F: FnOnce(&Path) -> Result<()>,
{
    let path = out_dir.join(kind.file_name());
    let reason = match no_data {
        Some(reason) => reason,
        None => match draw(&path) {
            Ok(()) => {
                log::info!("wrote {}", path.display());
                return RenderedArtifact {
                    kind,
                    path,
                    outcome: ArtifactOutcome::Content,
                };
            }
            Err(e) => {
                log::warn!("{} could not be drawn: {}", kind.file_name(), e);
                e.to_string()
            }
        },
    };

    if let Err(e) = write_placeholder(&path, kind.title(), &reason) {
        log::warn!("placeholder for {} not written: {}", kind.file_name(), e);
    } else {
        log::info!("wrote placeholder {} ({})", path.display(), reason);
    }
    RenderedArtifact {
        kind,
        path,
        outcome: ArtifactOutcome::Placeholder(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_data_skips_drawing() {
        let dir = tempfile::tempdir().unwrap();
        let art = render_or_placeholder(ArtifactKind::GoDotplot, dir.path(), Some("nothing".into()), |_| {
            panic!("must not draw")
        });
        assert_eq!(art.outcome, ArtifactOutcome::Placeholder("nothing".into()));
        let svg = std::fs::read_to_string(dir.path().join("go_dotplot.svg")).unwrap();
        assert!(svg.contains("nothing"));
    }

    #[test]
    fn test_draw_failure_becomes_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let art = render_or_placeholder(ArtifactKind::Heatmap, dir.path(), None, |_| {
            Err(render_error(ArtifactKind::Heatmap)("backend exploded"))
        });
        match &art.outcome {
            ArtifactOutcome::Placeholder(reason) => assert!(reason.contains("backend exploded")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(art.path.exists());
    }

    #[test]
    fn test_successful_draw_is_content() {
        let dir = tempfile::tempdir().unwrap();
        let art = render_or_placeholder(ArtifactKind::Volcano, dir.path(), None, |p| {
            std::fs::write(p, "<svg/>")?;
            Ok(())
        });
        assert_eq!(art.outcome, ArtifactOutcome::Content);
        assert!(!art.is_placeholder());
    }
}

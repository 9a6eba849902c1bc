//! Volcano plot: log2 fold change against -log10 adjusted p-value

use std::path::Path;

use plotters::prelude::*;

use super::{render_error, ArtifactKind, CANVAS_HEIGHT, CANVAS_WIDTH};
use crate::error::Result;
use crate::io::DeResult;
use crate::ranking::RankingPolicy;

/// Floor applied before taking -log10 so zeros stay finite
const MIN_PVALUE: f64 = 1e-300;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolcanoPoint {
    pub x: f64,
    pub y: f64,
    pub significant: bool,
}

/// One point per row with a finite fold change. y uses padj, else pvalue, else 1.
pub fn volcano_points(result: &DeResult, policy: &RankingPolicy) -> Vec<VolcanoPoint> {
    let dropped = result.rows.iter().filter(|r| !r.log2_fold_change.is_finite()).count();
    if dropped > 0 {
        log::debug!("volcano: {} genes without a finite log2 fold change left out", dropped);
    }
    result
        .rows
        .iter()
        .filter(|r| r.log2_fold_change.is_finite())
        .map(|r| {
            let v = r.padj.or(r.pvalue).filter(|v| !v.is_nan()).unwrap_or(1.0);
            VolcanoPoint {
                x: r.log2_fold_change,
                y: -(v.max(MIN_PVALUE).log10()),
                significant: policy.is_strict_significant(r),
            }
        })
        .collect()
}

pub fn draw_volcano(path: &Path, points: &[VolcanoPoint], policy: &RankingPolicy) -> Result<()> {
    let err = render_error(ArtifactKind::Volcano);

    let x_max = points
        .iter()
        .map(|p| p.x.abs())
        .fold(policy.strict_lfc + 1.0, f64::max)
        * 1.1;
    let y_threshold = -policy.strict_padj.max(MIN_PVALUE).log10();
    let y_max = points.iter().map(|p| p.y).fold(y_threshold + 1.0, f64::max) * 1.05;

    let root = SVGBackend::new(path, (CANVAS_WIDTH, CANVAS_HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(&err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(ArtifactKind::Volcano.title(), ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(45)
        .y_label_area_size(55)
        .build_cartesian_2d(-x_max..x_max, 0.0..y_max)
        .map_err(&err)?;

    chart
        .configure_mesh()
        .x_desc("log2 fold change")
        .y_desc("-log10 adjusted p-value")
        .draw()
        .map_err(&err)?;

    let guide = BLACK.mix(0.35).stroke_width(1);
    chart
        .draw_series(LineSeries::new(vec![(-x_max, y_threshold), (x_max, y_threshold)], guide))
        .map_err(&err)?;
    for x in [-policy.strict_lfc, policy.strict_lfc] {
        chart
            .draw_series(LineSeries::new(vec![(x, 0.0), (x, y_max)], guide))
            .map_err(&err)?;
    }

    let grey = RGBColor(160, 160, 160);
    let red = RGBColor(200, 30, 45);
    chart
        .draw_series(
            points
                .iter()
                .filter(|p| !p.significant)
                .map(|p| Circle::new((p.x, p.y), 2, grey.filled())),
        )
        .map_err(&err)?
        .label("NS")
        .legend(move |(x, y)| Circle::new((x, y), 3, grey.filled()));
    chart
        .draw_series(
            points
                .iter()
                .filter(|p| p.significant)
                .map(|p| Circle::new((p.x, p.y), 3, red.filled())),
        )
        .map_err(&err)?
        .label("significant")
        .legend(move |(x, y)| Circle::new((x, y), 3, red.filled()));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.85))
        .border_style(&BLACK)
        .position(SeriesLabelPosition::UpperLeft)
        .draw()
        .map_err(&err)?;

    root.present().map_err(&err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::DeRow;

    fn row(id: &str, lfc: f64, pvalue: Option<f64>, padj: Option<f64>) -> DeRow {
        DeRow {
            gene_id: id.to_string(),
            base_mean: 100.0,
            log2_fold_change: lfc,
            lfc_se: 0.2,
            stat: 1.0,
            pvalue,
            padj,
        }
    }

    #[test]
    fn test_y_falls_back_and_stays_finite() {
        let result = DeResult::new(
            vec![
                row("a", 3.0, Some(1e-10), Some(0.0)),
                row("b", -0.5, Some(0.2), None),
                row("c", 0.0, None, None),
            ],
            "group_b_vs_a".into(),
            "none".into(),
        );
        let points = volcano_points(&result, &RankingPolicy::default());
        assert_eq!(points.len(), 3);
        assert!(points.iter().all(|p| p.y.is_finite()));
        assert!((points[0].y - 300.0).abs() < 1e-9);
        assert!(points[0].significant);
        assert!((points[1].y - (-(0.2f64).log10())).abs() < 1e-12);
        assert_eq!(points[2].y, 0.0);
        assert!(!points[2].significant);
    }

    #[test]
    fn test_non_finite_fold_change_left_out() {
        let result = DeResult::new(
            vec![row("a", f64::NAN, Some(0.5), Some(0.6)), row("b", 1.0, Some(0.5), Some(0.6))],
            "group_b_vs_a".into(),
            "ashr".into(),
        );
        let points = volcano_points(&result, &RankingPolicy::default());
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].x, 1.0);
    }

    #[test]
    fn test_draw_writes_svg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("volcano.svg");
        let points = vec![
            VolcanoPoint { x: 2.0, y: 5.0, significant: true },
            VolcanoPoint { x: -0.1, y: 0.1, significant: false },
        ];
        draw_volcano(&path, &points, &RankingPolicy::default()).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Volcano plot"));
    }

    #[test]
    fn test_draw_without_points() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("volcano.svg");
        draw_volcano(&path, &[], &RankingPolicy::default()).unwrap();
        assert!(path.exists());
    }
}

//! Heatmap of the strict significant genes, row scaled, columns clustered

use std::path::Path;

use ndarray::Array2;
use plotters::prelude::*;

use super::cluster::{complete_linkage, Dendrogram};
use super::{render_error, ArtifactKind};
use crate::engine::NormalizationContext;
use crate::error::{ReportError, Result};
use crate::io::DeRow;
use crate::stats::cmp_nan_last;
use crate::transform::{normalize_for_heatmap, TransformKind};

pub const MAX_HEATMAP_GENES: usize = 50;

/// Colour scale saturates at this |z|
const Z_LIMIT: f64 = 2.5;

const WIDTH: i32 = 900;
const LABEL_WIDTH: i32 = 150;
const COLORBAR_AREA: i32 = 90;
const TITLE_HEIGHT: i32 = 45;
const DENDRO_HEIGHT: i32 = 100;
const CELL_HEIGHT: i32 = 14;
const FOOTER_HEIGHT: i32 = 50;

/// Matrix ready to draw
#[derive(Debug, Clone)]
pub struct HeatmapData {
    pub genes: Vec<String>,
    pub samples: Vec<String>,
    /// Row z-scores, genes x samples in input sample order
    pub values: Array2<f64>,
    pub dendrogram: Dendrogram,
    pub transform: TransformKind,
}

/// Centre and scale each row; constant rows become zeros
fn scale_rows(m: &mut Array2<f64>) {
    let n = m.ncols() as f64;
    for mut row in m.rows_mut() {
        let mean = row.sum() / n;
        let sd = (row.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0).max(1.0)).sqrt();
        if sd > 0.0 && sd.is_finite() {
            row.mapv_inplace(|v| (v - mean) / sd);
        } else {
            row.fill(0.0);
        }
    }
}

/// Pick at most [`MAX_HEATMAP_GENES`] strict genes by padj, transform, scale and cluster
pub fn prepare_heatmap(strict: &[DeRow], context: &NormalizationContext) -> Result<HeatmapData> {
    let mut ranked: Vec<&DeRow> = strict.iter().collect();
    ranked.sort_by(|a, b| cmp_nan_last(a.padj.unwrap_or(f64::NAN), b.padj.unwrap_or(f64::NAN)));

    let selected: Vec<(String, usize)> = ranked
        .into_iter()
        .filter_map(|r| context.gene_index(&r.gene_id).map(|i| (r.gene_id.clone(), i)))
        .take(MAX_HEATMAP_GENES)
        .collect();
    if selected.is_empty() {
        return Err(ReportError::Render {
            artifact: ArtifactKind::Heatmap.file_name().to_string(),
            reason: "no significant gene is present in the normalized matrix".to_string(),
        });
    }

    let (transform, transformed) = normalize_for_heatmap(&context.transform_input())?;
    log::debug!("heatmap: {} genes, {} transform", selected.len(), transform.label());

    let n_samples = transformed.ncols();
    let mut values = Array2::from_shape_fn((selected.len(), n_samples), |(g, j)| transformed[[selected[g].1, j]]);
    scale_rows(&mut values);

    let columns: Vec<Vec<f64>> = (0..n_samples).map(|j| values.column(j).to_vec()).collect();
    let dendrogram = complete_linkage(&columns);

    Ok(HeatmapData {
        genes: selected.into_iter().map(|(id, _)| id).collect(),
        samples: context.sample_ids.clone(),
        values,
        dendrogram,
        transform,
    })
}

/// Blue, white, red
fn diverging_color(z: f64) -> RGBColor {
    let t = (z.clamp(-Z_LIMIT, Z_LIMIT) / Z_LIMIT + 1.0) / 2.0;
    let lerp = |a: u8, b: u8, t: f64| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    if t < 0.5 {
        let s = t / 0.5;
        RGBColor(lerp(49, 255, s), lerp(54, 255, s), lerp(149, 255, s))
    } else {
        let s = (t - 0.5) / 0.5;
        RGBColor(lerp(255, 165, s), lerp(255, 0, s), lerp(255, 38, s))
    }
}

fn truncate(label: &str, max_chars: usize) -> String {
    if label.chars().count() <= max_chars {
        label.to_string()
    } else {
        let mut s: String = label.chars().take(max_chars.saturating_sub(1)).collect();
        s.push('~');
        s
    }
}

pub fn draw_heatmap(path: &Path, data: &HeatmapData) -> Result<()> {
    let err = render_error(ArtifactKind::Heatmap);
    let (n_genes, n_samples) = data.values.dim();
    let grid_left = LABEL_WIDTH;
    let grid_top = TITLE_HEIGHT + DENDRO_HEIGHT;
    let grid_width = WIDTH - LABEL_WIDTH - COLORBAR_AREA;
    let cell_width = grid_width as f64 / n_samples.max(1) as f64;
    let height = grid_top + CELL_HEIGHT * n_genes as i32 + FOOTER_HEIGHT;

    let root = SVGBackend::new(path, (WIDTH as u32, height as u32)).into_drawing_area();
    root.fill(&WHITE).map_err(&err)?;

    root.draw(&Text::new(
        format!(
            "Top {} significant genes ({}, row scaled)",
            n_genes,
            data.transform.label()
        ),
        (grid_left, 12),
        ("sans-serif", 20).into_font().color(&BLACK),
    ))
    .map_err(&err)?;

    // Leaf position of every sample
    let mut slot = vec![0usize; n_samples];
    for (pos, &leaf) in data.dendrogram.order.iter().enumerate() {
        slot[leaf] = pos;
    }
    let column_x = |pos: usize| grid_left as f64 + pos as f64 * cell_width;

    for g in 0..n_genes {
        let y0 = grid_top + CELL_HEIGHT * g as i32;
        for j in 0..n_samples {
            let x0 = column_x(slot[j]);
            root.draw(&Rectangle::new(
                [(x0 as i32, y0), ((x0 + cell_width) as i32, y0 + CELL_HEIGHT)],
                diverging_color(data.values[[g, j]]).filled(),
            ))
            .map_err(&err)?;
        }
        root.draw(&Text::new(
            truncate(&data.genes[g], 22),
            (6, y0 + 1),
            ("sans-serif", 11).into_font().color(&BLACK),
        ))
        .map_err(&err)?;
    }

    let label_chars = ((cell_width / 6.5) as usize).max(3);
    for (j, sample) in data.samples.iter().enumerate() {
        let x = column_x(slot[j]) as i32 + 2;
        root.draw(&Text::new(
            truncate(sample, label_chars),
            (x, grid_top + CELL_HEIGHT * n_genes as i32 + 6),
            ("sans-serif", 10).into_font().color(&BLACK),
        ))
        .map_err(&err)?;
    }

    // Dendrogram: (x, y) of every node, leaves first
    let max_height = data.dendrogram.max_height();
    let baseline = (grid_top - 4) as f64;
    let scale = if max_height > 0.0 { (DENDRO_HEIGHT - 12) as f64 / max_height } else { 0.0 };
    let mut nodes: Vec<(f64, f64)> = (0..n_samples)
        .map(|leaf| (column_x(slot[leaf]) + cell_width / 2.0, baseline))
        .collect();
    let branch = BLACK.stroke_width(1);
    for merge in &data.dendrogram.merges {
        let (xl, yl) = nodes[merge.left];
        let (xr, yr) = nodes[merge.right];
        let y = baseline - merge.height * scale;
        root.draw(&PathElement::new(
            vec![
                (xl as i32, yl as i32),
                (xl as i32, y as i32),
                (xr as i32, y as i32),
                (xr as i32, yr as i32),
            ],
            branch,
        ))
        .map_err(&err)?;
        nodes.push(((xl + xr) / 2.0, y));
    }

    // Colour bar
    let bar_x = WIDTH - COLORBAR_AREA + 25;
    let bar_height = (CELL_HEIGHT * n_genes as i32).max(100);
    let steps = 50;
    for i in 0..steps {
        let z = Z_LIMIT - 2.0 * Z_LIMIT * i as f64 / (steps - 1) as f64;
        let y0 = grid_top + bar_height * i / steps;
        let y1 = grid_top + bar_height * (i + 1) / steps;
        root.draw(&Rectangle::new([(bar_x, y0), (bar_x + 15, y1)], diverging_color(z).filled()))
            .map_err(&err)?;
    }
    for (label, y) in [
        (format!("{}", Z_LIMIT), grid_top),
        ("0".to_string(), grid_top + bar_height / 2 - 5),
        (format!("-{}", Z_LIMIT), grid_top + bar_height - 10),
    ] {
        root.draw(&Text::new(label, (bar_x + 20, y), ("sans-serif", 10).into_font().color(&BLACK)))
            .map_err(&err)?;
    }
    root.draw(&Text::new(
        "z-score",
        (bar_x - 5, grid_top - 18),
        ("sans-serif", 11).into_font().color(&BLACK),
    ))
    .map_err(&err)?;

    root.present().map_err(&err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispersion::DispersionTrend;

    fn context() -> NormalizationContext {
        let counts = ndarray::array![
            [10.0, 12.0, 9.0, 200.0, 210.0, 190.0],
            [300.0, 280.0, 310.0, 20.0, 25.0, 18.0],
            [50.0, 55.0, 45.0, 52.0, 48.0, 50.0],
            [100.0, 90.0, 110.0, 95.0, 105.0, 100.0],
        ];
        NormalizationContext {
            counts,
            gene_ids: vec!["g0".into(), "g1".into(), "g2".into(), "g3".into()],
            sample_ids: (1..=6).map(|i| format!("s{}", i)).collect(),
            size_factors: vec![1.0; 6],
            trend: DispersionTrend::Mean(0.05),
            trended_dispersions: vec![0.05; 4],
        }
    }

    fn strict_row(id: &str, padj: f64) -> DeRow {
        DeRow {
            gene_id: id.to_string(),
            base_mean: 100.0,
            log2_fold_change: 4.0,
            lfc_se: 0.3,
            stat: 10.0,
            pvalue: Some(padj / 10.0),
            padj: Some(padj),
        }
    }

    #[test]
    fn test_scale_rows() {
        let mut m = ndarray::array![[1.0, 2.0, 3.0], [5.0, 5.0, 5.0]];
        scale_rows(&mut m);
        assert!((m[[0, 0]] + 1.0).abs() < 1e-12);
        assert!((m[[0, 2]] - 1.0).abs() < 1e-12);
        assert_eq!(m.row(1).to_vec(), vec![0.0; 3]);
    }

    #[test]
    fn test_prepare_orders_by_padj_and_skips_unknown() {
        let strict = vec![strict_row("g1", 1e-3), strict_row("zz", 1e-9), strict_row("g0", 1e-6)];
        let data = prepare_heatmap(&strict, &context()).unwrap();
        assert_eq!(data.genes, vec!["g0", "g1"]);
        assert_eq!(data.values.dim(), (2, 6));
        assert_eq!(data.dendrogram.order.len(), 6);
        for row in data.values.rows() {
            assert!(row.sum().abs() < 1e-9);
        }
    }

    #[test]
    fn test_clusters_separate_groups() {
        let data = prepare_heatmap(&[strict_row("g0", 1e-6), strict_row("g1", 1e-5)], &context()).unwrap();
        let first_half: Vec<usize> = data.dendrogram.order[..3].to_vec();
        let same_group = first_half.iter().all(|&s| s < 3) || first_half.iter().all(|&s| s >= 3);
        assert!(same_group, "order {:?}", data.dendrogram.order);
    }

    #[test]
    fn test_no_known_gene_is_error() {
        assert!(prepare_heatmap(&[strict_row("zz", 0.01)], &context()).is_err());
        assert!(prepare_heatmap(&[], &context()).is_err());
    }

    #[test]
    fn test_draw_heatmap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heatmap.svg");
        let data = prepare_heatmap(&[strict_row("g0", 1e-6)], &context()).unwrap();
        draw_heatmap(&path, &data).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("g0"));
        assert!(svg.contains("<rect"));
    }

    #[test]
    fn test_diverging_color_ends() {
        let rgb = |z: f64| {
            let RGBColor(r, g, b) = diverging_color(z);
            (r, g, b)
        };
        assert_eq!(rgb(0.0), (255, 255, 255));
        assert_eq!(rgb(-10.0), (49, 54, 149));
        assert_eq!(rgb(10.0), (165, 0, 38));
    }
}

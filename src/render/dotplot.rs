//! Enrichment dot-plot: gene ratio on x, one row per term

use std::path::Path;

use plotters::prelude::*;

use super::{render_error, ArtifactKind, CANVAS_HEIGHT, CANVAS_WIDTH};
use crate::enrichment::EnrichedTerm;
use crate::error::Result;

/// Terms shown per plot
pub const MAX_DOTPLOT_TERMS: usize = 10;

const MIN_RADIUS: f64 = 4.0;
const MAX_RADIUS: f64 = 12.0;

fn radius(count: usize, min: usize, max: usize) -> i32 {
    if max <= min {
        return ((MIN_RADIUS + MAX_RADIUS) / 2.0) as i32;
    }
    let t = (count - min) as f64 / (max - min) as f64;
    (MIN_RADIUS + t * (MAX_RADIUS - MIN_RADIUS)).round() as i32
}

/// Red for the smallest adjusted p-value, blue for the largest
fn padj_color(padj: f64, lo: f64, hi: f64) -> RGBColor {
    let score = |p: f64| -p.max(1e-300).log10();
    let (s_lo, s_hi) = (score(hi), score(lo));
    let t = if s_hi > s_lo { (score(padj) - s_lo) / (s_hi - s_lo) } else { 1.0 };
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    RGBColor(lerp(40, 220), lerp(80, 40), lerp(200, 40))
}

fn short_name(term: &EnrichedTerm) -> String {
    let name = if term.term_name.is_empty() { &term.term_id } else { &term.term_name };
    if name.chars().count() > 45 {
        let mut s: String = name.chars().take(44).collect();
        s.push('~');
        s
    } else {
        name.clone()
    }
}

/// Draw the first [`MAX_DOTPLOT_TERMS`] of `terms` (already ranked), best term on top
pub fn draw_dotplot(path: &Path, kind: ArtifactKind, terms: &[EnrichedTerm]) -> Result<()> {
    let err = render_error(kind);
    let shown = &terms[..terms.len().min(MAX_DOTPLOT_TERMS)];
    let n = shown.len();
    let names: Vec<String> = shown.iter().rev().map(short_name).collect();

    let max_ratio = shown.iter().map(|t| t.gene_ratio()).fold(0.0, f64::max).max(0.01);
    let min_count = shown.iter().map(|t| t.count).min().unwrap_or(0);
    let max_count = shown.iter().map(|t| t.count).max().unwrap_or(0);
    let lo_padj = shown.iter().map(|t| t.adjusted_pvalue).fold(f64::INFINITY, f64::min);
    let hi_padj = shown.iter().map(|t| t.adjusted_pvalue).fold(0.0, f64::max);

    let root = SVGBackend::new(path, (CANVAS_WIDTH, CANVAS_HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(&err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(kind.title(), ("sans-serif", 22))
        .margin(15)
        .margin_right(150)
        .x_label_area_size(40)
        .y_label_area_size(290)
        .build_cartesian_2d(0.0..max_ratio * 1.15, (0..n as i32).into_segmented())
        .map_err(&err)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_label_formatter(&|_| String::new())
        .x_desc("Gene ratio")
        .draw()
        .map_err(&err)?;

    let font = ("sans-serif", 12).into_font().color(&BLACK);
    for (i, name) in names.iter().enumerate() {
        let (_, y) = chart.backend_coord(&(0.0, SegmentValue::CenterOf(i as i32)));
        root.draw(&Text::new(name.clone(), (10, y - 6), font.clone()))
            .map_err(&err)?;
    }

    chart
        .draw_series(shown.iter().rev().enumerate().map(|(i, t)| {
            Circle::new(
                (t.gene_ratio(), SegmentValue::CenterOf(i as i32)),
                radius(t.count, min_count, max_count),
                padj_color(t.adjusted_pvalue, lo_padj, hi_padj).filled(),
            )
        }))
        .map_err(&err)?;

    // Legend on the right margin
    let legend_x = CANVAS_WIDTH as i32 - 140;
    root.draw(&Text::new("Count", (legend_x, 80), font.clone())).map_err(&err)?;
    for (row, count) in [min_count, max_count].into_iter().enumerate() {
        let y = 110 + row as i32 * 35;
        root.draw(&Circle::new((legend_x + 12, y), radius(count, min_count, max_count), BLACK.mix(0.4).filled()))
            .map_err(&err)?;
        root.draw(&Text::new(count.to_string(), (legend_x + 32, y - 6), font.clone()))
            .map_err(&err)?;
    }
    root.draw(&Text::new("p.adjust", (legend_x, 200), font.clone())).map_err(&err)?;
    for (row, padj) in [lo_padj, hi_padj].into_iter().enumerate() {
        let y = 230 + row as i32 * 30;
        root.draw(&Circle::new((legend_x + 12, y), 7, padj_color(padj, lo_padj, hi_padj).filled()))
            .map_err(&err)?;
        root.draw(&Text::new(format!("{:.2e}", padj), (legend_x + 32, y - 6), font.clone()))
            .map_err(&err)?;
    }

    root.present().map_err(&err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(id: &str, count: usize, padj: f64) -> EnrichedTerm {
        EnrichedTerm {
            term_id: id.to_string(),
            term_name: format!("{} process", id),
            count,
            query_size: 20,
            set_size: 50,
            universe_size: 2000,
            pvalue: padj / 5.0,
            adjusted_pvalue: padj,
            gene_ids: (0..count as u64).collect(),
        }
    }

    #[test]
    fn test_radius_bounds() {
        assert_eq!(radius(2, 2, 10), MIN_RADIUS as i32);
        assert_eq!(radius(10, 2, 10), MAX_RADIUS as i32);
        assert_eq!(radius(5, 5, 5), 8);
    }

    #[test]
    fn test_padj_color_extremes() {
        let RGBColor(r, _, b) = padj_color(1e-8, 1e-8, 1e-2);
        assert!(r > b);
        let RGBColor(r, _, b) = padj_color(1e-2, 1e-8, 1e-2);
        assert!(b > r);
    }

    #[test]
    fn test_draw_keeps_top_terms() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("go_dotplot.svg");
        let terms: Vec<EnrichedTerm> = (0..12).map(|i| term(&format!("T{:02}", i), 3 + i, 1e-6 * (i + 1) as f64)).collect();
        draw_dotplot(&path, ArtifactKind::GoDotplot, &terms).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("T00 process"));
        assert!(svg.contains("T09 process"));
        assert!(!svg.contains("T11 process"));
    }
}

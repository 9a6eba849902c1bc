//! Benjamini-Hochberg false discovery rate adjustment

use crate::stats::cmp_nan_last;

/// BH-adjusted p-values. NaN inputs stay NaN and do not count toward the number of tests.
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    let n = pvalues.len();
    let m = pvalues.iter().filter(|p| p.is_finite()).count();
    let mut padj = vec![f64::NAN; n];
    if m == 0 {
        return padj;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| cmp_nan_last(pvalues[a], pvalues[b]));

    // Walk from the largest finite p-value down, keeping a running minimum
    let mut running = f64::INFINITY;
    for (rank, &i) in order[..m].iter().enumerate().rev() {
        let adj = (pvalues[i] * m as f64 / (rank + 1) as f64).min(1.0);
        running = running.min(adj);
        padj[i] = running;
    }
    padj
}

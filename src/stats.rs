//! Small statistical helpers shared by dispersion, shrinkage and transforms

use std::cmp::Ordering;

/// Upper 97.5% point of the standard normal
const Z_975: f64 = 1.959963984540054;

/// NaN-last total order for sorting floating point values
pub fn cmp_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Median of the finite values in `values`; NaN when there are none
pub fn median(values: &[f64]) -> f64 {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
    if v.is_empty() {
        return f64::NAN;
    }
    v.sort_by(|a, b| cmp_nan_last(*a, *b));
    let n = v.len();
    if n % 2 == 0 {
        (v[n / 2 - 1] + v[n / 2]) / 2.0
    } else {
        v[n / 2]
    }
}

/// Squared median absolute deviation with the usual normal consistency constant
pub fn mad_squared(values: &[f64]) -> f64 {
    let center = median(values);
    if !center.is_finite() {
        return 0.0;
    }
    let deviations: Vec<f64> = values.iter().map(|&x| (x - center).abs()).collect();
    let mad = median(&deviations) * 1.4826;
    mad * mad
}

/// Linear-interpolation quantile on an ascending slice (the "type 7" definition)
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted[0];
    }
    let h = (n - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Trigamma function by recurrence and asymptotic expansion
pub fn trigamma(x: f64) -> f64 {
    if x <= 0.0 && x == x.floor() {
        return f64::INFINITY;
    }
    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).powi(2) - trigamma(1.0 - x);
    }
    let mut acc = 0.0;
    let mut z = x;
    while z < 8.0 {
        acc += 1.0 / (z * z);
        z += 1.0;
    }
    let z2 = z * z;
    acc + 1.0 / z + 0.5 / z2 + 1.0 / (6.0 * z2 * z) - 1.0 / (30.0 * z2 * z2 * z)
        + 1.0 / (42.0 * z2 * z2 * z2 * z)
}

/// Weighted quantile with weights normalised to the number of observations.
///
/// Ties in `x` are merged before the cumulative weights are built; the
/// quantile interpolates between the right-continuous step values at
/// `floor(order)` and `floor(order) + 1`, where `order = 1 + (n - 1) * prob`.
pub fn weighted_quantile(x: &[f64], weights: &[f64], prob: f64) -> f64 {
    let mut pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(weights)
        .filter(|(xi, wi)| xi.is_finite() && wi.is_finite() && **wi > 0.0)
        .map(|(&xi, &wi)| (xi, wi))
        .collect();
    if pairs.is_empty() {
        return 0.0;
    }
    pairs.sort_by(|a, b| cmp_nan_last(a.0, b.0));

    let scale = pairs.len() as f64 / pairs.iter().map(|p| p.1).sum::<f64>();
    let mut values: Vec<f64> = Vec::new();
    let mut cumulative: Vec<f64> = Vec::new();
    let mut running = 0.0;
    for (xi, wi) in pairs {
        running += wi * scale;
        if values.last() == Some(&xi) {
            if let Some(last) = cumulative.last_mut() {
                *last = running;
            }
        } else {
            values.push(xi);
            cumulative.push(running);
        }
    }

    let n = running;
    let order = 1.0 + (n - 1.0) * prob;
    let low = order.floor().max(1.0);
    let high = (low + 1.0).min(n);
    let frac = order - order.floor();

    let step = |target: f64| -> f64 {
        cumulative
            .iter()
            .position(|&c| c >= target)
            .map(|i| values[i])
            .unwrap_or(values[values.len() - 1])
    };
    (1.0 - frac) * step(low) + frac * step(high)
}

/// Prior variance whose normal upper `upper_quantile` tail matches the
/// weighted upper quantile of `|x|`.
pub fn match_weighted_upper_quantile_for_variance(
    x: &[f64],
    weights: &[f64],
    upper_quantile: f64,
) -> f64 {
    let abs_x: Vec<f64> = x.iter().map(|v| v.abs()).collect();
    let q = weighted_quantile(&abs_x, weights, 1.0 - upper_quantile);
    let sd = q / Z_975;
    let var = sd * sd;
    log::debug!("Weighted upper quantile {:.6}, prior variance {:.6}", q, var);
    if var.is_finite() && var > 0.0 {
        var
    } else {
        1e-6
    }
}

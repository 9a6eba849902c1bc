//! Robust locally weighted scatterplot smoothing (lowess)

use crate::stats::median;

fn tricube(u: f64) -> f64 {
    let t = 1.0 - u * u * u;
    t * t * t
}

fn bisquare(u: f64) -> f64 {
    let t = 1.0 - u * u;
    t * t
}

/// Weighted local linear fit at `x[i]` over the window `[left, right]`
fn local_fit(x: &[f64], y: &[f64], robustness: &[f64], i: usize, left: usize, right: usize) -> Option<f64> {
    let xs = x[i];
    let h = (xs - x[left]).max(x[right] - xs);
    let range = x[x.len() - 1] - x[0];

    let mut w = vec![0.0; x.len()];
    let mut total = 0.0;
    for j in left..x.len() {
        let r = (x[j] - xs).abs();
        if r > 0.999 * h {
            if x[j] > xs {
                break;
            }
            continue;
        }
        w[j] = if r <= 0.001 * h { 1.0 } else { tricube(r / h) } * robustness[j];
        total += w[j];
    }
    if total <= 0.0 {
        return None;
    }
    w.iter_mut().for_each(|v| *v /= total);

    if h > 0.0 {
        let center: f64 = w.iter().zip(x).map(|(wj, xj)| wj * xj).sum();
        let spread: f64 = w.iter().zip(x).map(|(wj, xj)| wj * (xj - center).powi(2)).sum();
        if spread.sqrt() > 0.001 * range {
            let slope = (xs - center) / spread;
            for (wj, xj) in w.iter_mut().zip(x) {
                *wj *= slope * (xj - center) + 1.0;
            }
        }
    }
    Some(w.iter().zip(y).map(|(wj, yj)| wj * yj).sum())
}

/// Smooth `y` against sorted `x` using a span fraction `f` and `iterations` robustness passes
pub fn lowess(x: &[f64], y: &[f64], f: f64, iterations: usize) -> Vec<f64> {
    let n = x.len();
    if n < 2 {
        return y.to_vec();
    }
    let span = ((f * n as f64 + 1e-7) as usize).clamp(2, n);
    let mut robustness = vec![1.0; n];
    let mut fitted = vec![0.0; n];

    for pass in 0..=iterations {
        let mut left = 0;
        let mut right = span - 1;
        for i in 0..n {
            while right < n - 1 && x[i] - x[left] > x[right + 1] - x[i] {
                left += 1;
                right += 1;
            }
            fitted[i] = local_fit(x, y, &robustness, i, left, right).unwrap_or(y[i]);
        }
        if pass == iterations {
            break;
        }

        let residuals: Vec<f64> = y.iter().zip(&fitted).map(|(a, b)| a - b).collect();
        let mean_abs = residuals.iter().map(|r| r.abs()).sum::<f64>() / n as f64;
        let abs: Vec<f64> = residuals.iter().map(|r| r.abs()).collect();
        let cmad = 6.0 * median(&abs);
        if cmad < 1e-7 * mean_abs || cmad == 0.0 {
            break;
        }
        for (w, r) in robustness.iter_mut().zip(&residuals) {
            let r = r.abs();
            *w = if r <= 0.001 * cmad {
                1.0
            } else if r <= 0.999 * cmad {
                bisquare(r / cmad)
            } else {
                0.0
            };
        }
    }
    fitted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowess_reproduces_line() {
        let x: Vec<f64> = (0..11).map(|i| i as f64 / 10.0).collect();
        let y: Vec<f64> = (0..11).map(|i| i as f64 * 10.0).collect();
        let fit = lowess(&x, &y, 0.5, 3);
        for (i, v) in fit.iter().enumerate() {
            assert!((v - i as f64 * 10.0).abs() < 1e-6, "index {}: {}", i, v);
        }
    }

    #[test]
    fn test_lowess_resists_outlier() {
        let x: Vec<f64> = (0..11).map(|i| i as f64 / 10.0).collect();
        let mut y: Vec<f64> = (0..11).map(|i| 10.0 + 2.0 * i as f64).collect();
        y[3] = 50.0;
        let plain = lowess(&x, &y, 0.5, 0);
        let robust = lowess(&x, &y, 0.5, 3);
        assert!((robust[3] - 16.0).abs() <= (plain[3] - 16.0).abs());
    }

    #[test]
    fn test_lowess_tiny_inputs() {
        assert_eq!(lowess(&[1.0], &[42.0], 0.5, 3), vec![42.0]);
        assert!(lowess(&[], &[], 0.5, 3).is_empty());
    }
}

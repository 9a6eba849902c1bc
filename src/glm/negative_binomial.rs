//! Negative binomial building blocks (mean/dispersion parameterisation)

use statrs::function::gamma::ln_gamma;

/// Lower bound on fitted means inside the IRLS weights
pub const MIN_MU: f64 = 0.5;

/// Coefficients beyond this magnitude stop the IRLS loop
pub const MAX_BETA: f64 = 30.0;

/// Linear predictor clamp that keeps `exp` finite
pub const MAX_ETA: f64 = 700.0;

/// mu = size_factor * exp(eta)
pub fn nb_mean(eta: f64, size_factor: f64) -> f64 {
    size_factor * eta.clamp(-MAX_ETA, MAX_ETA).exp()
}

/// Log probability of `y` under NB(mean `mu`, dispersion `alpha`)
pub fn nb_log_likelihood(y: f64, mu: f64, alpha: f64) -> f64 {
    if mu <= 0.0 || alpha <= 0.0 {
        return if y == 0.0 && mu <= 0.0 { 0.0 } else { f64::NEG_INFINITY };
    }
    let size = 1.0 / alpha;
    let log_p = (size / (size + mu)).ln();
    let log_q = (mu / (size + mu)).ln();
    ln_gamma(y + size) - ln_gamma(size) - ln_gamma(y + 1.0) + size * log_p + y * log_q
}

/// IRLS working weight mu / (1 + alpha * mu)
pub fn nb_weight(mu: f64, alpha: f64) -> f64 {
    mu / (1.0 + alpha * mu)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nb_mean() {
        assert!((nb_mean(2.0, 1.5) - 1.5 * 2.0_f64.exp()).abs() < 1e-10);
        assert!(nb_mean(1e6, 1.0).is_finite());
    }

    #[test]
    fn test_nb_log_likelihood_near_poisson() {
        // Poisson(5) at k = 5 has log pmf -1.7403
        let ll = nb_log_likelihood(5.0, 5.0, 1e-8);
        assert!((ll - (-1.7403)).abs() < 1e-3);
    }

    #[test]
    fn test_nb_weight() {
        assert!((nb_weight(10.0, 0.1) - 5.0).abs() < 1e-12);
    }
}

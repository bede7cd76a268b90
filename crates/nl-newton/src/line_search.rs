//! Backtracking damped-Newton line search.

use crate::error::NewtonResult;
use crate::options::NewtonOptions;
use nalgebra::DVector;
use nl_core::{Mapping, Real};
use serde::{Deserialize, Serialize};
use tracing::trace;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LineSearchOptions {
    /// Maximum step halvings per direction
    pub max_truncations: usize,
    /// Squared-residual ratio below which a step is accepted outright
    pub accept_ratio: Real,
}

impl Default for LineSearchOptions {
    fn default() -> Self {
        Self {
            max_truncations: 10,
            accept_ratio: 0.8,
        }
    }
}

/// Result of one search: the damping factor and the residual already
/// evaluated at the accepted point (zero damping means no progress was
/// possible in either direction).
#[derive(Clone, Debug)]
pub struct LineSearchOutcome {
    pub alpha: Real,
    pub residual: DVector<Real>,
    pub probes: usize,
}

#[derive(Clone, Debug, Default)]
pub struct LineSearch {
    options: LineSearchOptions,
}

struct Probe {
    ratio: Real,
    alpha: Real,
    residual: DVector<Real>,
}

impl LineSearch {
    pub fn new(options: LineSearchOptions) -> Self {
        Self { options }
    }

    pub fn from_options(options: &NewtonOptions) -> Self {
        Self::new(LineSearchOptions {
            max_truncations: options.max_truncations,
            ..LineSearchOptions::default()
        })
    }

    /// Find a damping factor along `direction` that sufficiently reduces the
    /// residual norm.
    ///
    /// Starts at the full step and halves up to `max_truncations` times,
    /// accepting the first damping whose squared-norm ratio against `f0`
    /// drops below `accept_ratio` and otherwise remembering the best
    /// improving probe. Only when the entire forward sweep improves nothing
    /// at all is the same sweep retried with negated damping; if that also
    /// fails the outcome carries `alpha == 0`, signalling divergence to the
    /// caller.
    pub fn search(
        &self,
        mapping: &mut dyn Mapping,
        x0: &DVector<Real>,
        f0: &DVector<Real>,
        direction: &DVector<Real>,
    ) -> NewtonResult<LineSearchOutcome> {
        let f0_sq = f0.norm_squared();
        let mut probes = 0;

        for sign in [1.0, -1.0] {
            let mut best: Option<Probe> = None;
            let mut alpha = sign;
            for _ in 0..=self.options.max_truncations {
                let x = x0 + direction * alpha;
                let f = mapping.map(&x)?;
                probes += 1;
                let ratio = f.norm_squared() / f0_sq;
                trace!(alpha, ratio, "line search probe");

                if ratio < self.options.accept_ratio {
                    return Ok(LineSearchOutcome {
                        alpha,
                        residual: f,
                        probes,
                    });
                }
                // NaN ratios fail both comparisons and fall through.
                if ratio < 1.0 && best.as_ref().is_none_or(|b| ratio < b.ratio) {
                    best = Some(Probe {
                        ratio,
                        alpha,
                        residual: f,
                    });
                }
                alpha *= 0.5;
            }

            if let Some(b) = best {
                return Ok(LineSearchOutcome {
                    alpha: b.alpha,
                    residual: b.residual,
                    probes,
                });
            }
        }

        Ok(LineSearchOutcome {
            alpha: 0.0,
            residual: f0.clone(),
            probes,
        })
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use nl_core::FnMapping;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn nonzero_damping_always_reduces_the_residual(
            start in -4.0_f64..4.0,
            dir in -6.0_f64..6.0,
        ) {
            prop_assume!(dir.abs() > 1e-3);
            let mut mapping = FnMapping::new(1, |x: &DVector<Real>| {
                Ok(DVector::from_element(1, x[0] * x[0] - 2.0))
            });
            let search = LineSearch::default();
            let x0 = DVector::from_element(1, start);
            let f0 = mapping.map(&x0).unwrap();
            prop_assume!(f0.norm_squared() > 1e-9);
            let direction = DVector::from_element(1, dir);

            let outcome = search.search(&mut mapping, &x0, &f0, &direction).unwrap();
            if outcome.alpha != 0.0 {
                prop_assert!(outcome.residual.norm_squared() < f0.norm_squared());
            }
        }
    }
}

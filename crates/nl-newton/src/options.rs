//! Solver configuration with a string-keyed reflection surface.

use crate::error::{NewtonError, NewtonResult};
use nl_core::Real;
use serde::{Deserialize, Serialize};

/// Newton solver configuration.
///
/// Every field is also reachable by name through [`NewtonOptions::set_param`]
/// and enumerable through [`NewtonOptions::params`], so callers can surface
/// the parameters in help output or wire them to external configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewtonOptions {
    /// Maximum iterations per run (the budget restarts after a hard reset)
    pub max_iterations: usize,
    /// Absolute residual tolerance (inf-norm)
    pub abs_tol: Real,
    /// Relative step tolerance (inf-norm ratio against the previous iterate)
    pub rel_tol: Real,
    /// Residual or relative step beyond this classifies as diverged
    pub divergence_limit: Real,
    /// Finite-difference perturbation for Jacobian probes
    pub fd_delta: Real,
    /// Maximum step halvings per line-search direction
    pub max_truncations: usize,
    /// Iterations between buffered-update applications (lazy strategy)
    pub lazy_iterations: usize,
    /// Descent strategy key, resolved through the registry
    pub descent: String,
    /// Jacobian trimmer key: "none", "band" or "threshold"
    pub trimmer: String,
    /// Half bandwidth kept by the band trimmer
    pub trim_half_bandwidth: usize,
    /// Magnitude floor applied by the threshold trimmer
    pub trim_min_magnitude: Real,
}

impl Default for NewtonOptions {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            abs_tol: 1e-6,
            rel_tol: 1e-6,
            divergence_limit: 1e8,
            fd_delta: 1e-7,
            max_truncations: 10,
            lazy_iterations: 4,
            descent: "simple".to_string(),
            trimmer: "none".to_string(),
            trim_half_bandwidth: 1,
            trim_min_magnitude: 1e-12,
        }
    }
}

/// One named parameter, for reflection/help purposes.
#[derive(Clone, Debug)]
pub struct ParamInfo {
    pub key: &'static str,
    pub description: &'static str,
    pub value: String,
}

fn parse_usize(key: &str, value: &str) -> NewtonResult<usize> {
    value.parse().map_err(|_| NewtonError::Config {
        what: format!("invalid value '{value}' for '{key}'"),
    })
}

fn parse_real(key: &str, value: &str) -> NewtonResult<Real> {
    value.parse().map_err(|_| NewtonError::Config {
        what: format!("invalid value '{value}' for '{key}'"),
    })
}

impl NewtonOptions {
    /// Set one parameter by name from its string representation.
    pub fn set_param(&mut self, key: &str, value: &str) -> NewtonResult<()> {
        match key {
            "max_iterations" => self.max_iterations = parse_usize(key, value)?,
            "abs_tol" => self.abs_tol = parse_real(key, value)?,
            "rel_tol" => self.rel_tol = parse_real(key, value)?,
            "divergence_limit" => self.divergence_limit = parse_real(key, value)?,
            "fd_delta" => self.fd_delta = parse_real(key, value)?,
            "max_truncations" => self.max_truncations = parse_usize(key, value)?,
            "lazy_iterations" => self.lazy_iterations = parse_usize(key, value)?,
            "descent" => self.descent = value.to_string(),
            "trimmer" => self.trimmer = value.to_string(),
            "trim_half_bandwidth" => self.trim_half_bandwidth = parse_usize(key, value)?,
            "trim_min_magnitude" => self.trim_min_magnitude = parse_real(key, value)?,
            _ => {
                return Err(NewtonError::Config {
                    what: format!("unknown parameter '{key}'"),
                });
            }
        }
        Ok(())
    }

    /// Enumerate all parameters with their current values.
    pub fn params(&self) -> Vec<ParamInfo> {
        vec![
            ParamInfo {
                key: "max_iterations",
                description: "maximum iterations per run",
                value: self.max_iterations.to_string(),
            },
            ParamInfo {
                key: "abs_tol",
                description: "absolute residual tolerance (inf-norm)",
                value: self.abs_tol.to_string(),
            },
            ParamInfo {
                key: "rel_tol",
                description: "relative step tolerance",
                value: self.rel_tol.to_string(),
            },
            ParamInfo {
                key: "divergence_limit",
                description: "residual/step threshold classifying divergence",
                value: self.divergence_limit.to_string(),
            },
            ParamInfo {
                key: "fd_delta",
                description: "finite-difference perturbation",
                value: self.fd_delta.to_string(),
            },
            ParamInfo {
                key: "max_truncations",
                description: "maximum line-search halvings per direction",
                value: self.max_truncations.to_string(),
            },
            ParamInfo {
                key: "lazy_iterations",
                description: "iterations between lazy update applications",
                value: self.lazy_iterations.to_string(),
            },
            ParamInfo {
                key: "descent",
                description: "descent strategy key",
                value: self.descent.clone(),
            },
            ParamInfo {
                key: "trimmer",
                description: "Jacobian trimmer key",
                value: self.trimmer.clone(),
            },
            ParamInfo {
                key: "trim_half_bandwidth",
                description: "half bandwidth kept by the band trimmer",
                value: self.trim_half_bandwidth.to_string(),
            },
            ParamInfo {
                key: "trim_min_magnitude",
                description: "magnitude floor of the threshold trimmer",
                value: self.trim_min_magnitude.to_string(),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_param_updates_fields() {
        let mut opts = NewtonOptions::default();
        opts.set_param("max_iterations", "17").unwrap();
        opts.set_param("abs_tol", "1e-9").unwrap();
        opts.set_param("descent", "hart").unwrap();
        assert_eq!(opts.max_iterations, 17);
        assert_eq!(opts.abs_tol, 1e-9);
        assert_eq!(opts.descent, "hart");
    }

    #[test]
    fn set_param_rejects_unknown_key_and_bad_value() {
        let mut opts = NewtonOptions::default();
        assert!(opts.set_param("no_such_key", "1").is_err());
        assert!(opts.set_param("max_iterations", "three").is_err());
    }

    #[test]
    fn params_cover_every_settable_key() {
        let mut opts = NewtonOptions::default();
        for info in opts.clone().params() {
            opts.set_param(info.key, &info.value).unwrap();
        }
    }
}

//! Name-to-constructor registries for configuration-driven assembly.

use crate::descent::{
    Broyden, ConstantJacobian, DescentDirection, FakeBroyden, Hart, LazyFakeBroyden, SimpleNewton,
};
use crate::error::{NewtonError, NewtonResult};
use crate::estimator::ErrorEstimator;
use crate::iteration::IterationPerformer;
use crate::line_search::LineSearch;
use crate::options::NewtonOptions;
use nl_jacobian::{
    BandTrimmer, DenseFdProvider, JacobianProvider, JacobianTrimmer, SparseFdProvider,
    ThresholdTrimmer,
};
use std::collections::HashMap;

type DescentBuilder = Box<dyn Fn(&NewtonOptions) -> NewtonResult<Box<dyn DescentDirection>>>;

/// Resolve a trimmer key from the options, `None` for "none".
pub fn build_trimmer(options: &NewtonOptions) -> NewtonResult<Option<Box<dyn JacobianTrimmer>>> {
    match options.trimmer.as_str() {
        "none" => Ok(None),
        "band" => Ok(Some(Box::new(BandTrimmer {
            half_bandwidth: options.trim_half_bandwidth,
        }))),
        "threshold" => Ok(Some(Box::new(ThresholdTrimmer {
            min_magnitude: options.trim_min_magnitude,
        }))),
        other => Err(NewtonError::Config {
            what: format!("unknown trimmer '{other}' (expected none, band or threshold)"),
        }),
    }
}

fn sparse_provider(options: &NewtonOptions) -> NewtonResult<Box<dyn JacobianProvider>> {
    Ok(Box::new(
        SparseFdProvider::new(options.fd_delta).with_trimmer(build_trimmer(options)?),
    ))
}

fn dense_provider(options: &NewtonOptions) -> NewtonResult<Box<dyn JacobianProvider>> {
    Ok(Box::new(
        DenseFdProvider::new(options.fd_delta).with_trimmer(build_trimmer(options)?),
    ))
}

/// Runtime registry mapping a strategy key to a constructor closure.
///
/// [`DescentRegistry::with_defaults`] registers the built-in strategies;
/// callers may register additional ones under their own keys.
pub struct DescentRegistry {
    builders: HashMap<String, DescentBuilder>,
}

impl Default for DescentRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl DescentRegistry {
    pub fn empty() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("simple", |opts| {
            Ok(Box::new(SimpleNewton::new(dense_provider(opts)?)))
        });
        registry.register("constant", |opts| {
            Ok(Box::new(ConstantJacobian::new(sparse_provider(opts)?)))
        });
        registry.register("broyden", |opts| {
            Ok(Box::new(Broyden::new(sparse_provider(opts)?)))
        });
        registry.register("fake_broyden", |opts| {
            Ok(Box::new(FakeBroyden::new(sparse_provider(opts)?)))
        });
        registry.register("lazy_fake_broyden", |opts| {
            Ok(Box::new(LazyFakeBroyden::new(
                sparse_provider(opts)?,
                opts.lazy_iterations,
            )))
        });
        registry.register("hart", |opts| {
            Ok(Box::new(Hart::new(sparse_provider(opts)?)))
        });
        registry
    }

    pub fn register(
        &mut self,
        key: impl Into<String>,
        builder: impl Fn(&NewtonOptions) -> NewtonResult<Box<dyn DescentDirection>> + 'static,
    ) {
        self.builders.insert(key.into(), Box::new(builder));
    }

    /// Registered keys, sorted for help output.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.builders.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Build the descent strategy selected by `options.descent`.
    pub fn build(&self, options: &NewtonOptions) -> NewtonResult<Box<dyn DescentDirection>> {
        match self.builders.get(&options.descent) {
            Some(builder) => builder(options),
            None => Err(NewtonError::Config {
                what: format!(
                    "unknown descent strategy '{}' (known: {})",
                    options.descent,
                    self.keys().join(", ")
                ),
            }),
        }
    }

    /// Assemble a full iteration performer for `options`.
    pub fn performer(&self, options: &NewtonOptions) -> NewtonResult<IterationPerformer> {
        Ok(IterationPerformer::new(
            self.build(options)?,
            LineSearch::from_options(options),
            ErrorEstimator::from_options(options),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_all_strategies() {
        let registry = DescentRegistry::with_defaults();
        assert_eq!(
            registry.keys(),
            vec![
                "broyden",
                "constant",
                "fake_broyden",
                "hart",
                "lazy_fake_broyden",
                "simple"
            ]
        );
    }

    #[test]
    fn unknown_strategy_is_a_config_error() {
        let registry = DescentRegistry::with_defaults();
        let mut options = NewtonOptions::default();
        options.descent = "steepest".to_string();
        let err = match registry.build(&options) {
            Ok(_) => panic!("expected an error for unknown descent strategy"),
            Err(err) => err,
        };
        assert!(matches!(err, NewtonError::Config { .. }));
        assert!(format!("{err}").contains("steepest"));
    }

    #[test]
    fn unknown_trimmer_is_a_config_error() {
        let mut options = NewtonOptions::default();
        options.trimmer = "sieve".to_string();
        assert!(build_trimmer(&options).is_err());
    }

    #[test]
    fn custom_registration_wins() {
        let mut registry = DescentRegistry::empty();
        registry.register("simple", |opts| {
            Ok(Box::new(SimpleNewton::new(dense_provider(opts)?)))
        });
        assert!(registry.build(&NewtonOptions::default()).is_ok());
    }
}

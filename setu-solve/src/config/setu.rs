//! Main SolveConfig and conversion methods.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::sections::{CheckpointSection, MergeSection, SolverSection, StackSection};
use crate::engine::graph::{InclusionConfig, RuleEffect};
use crate::engine::merge::ReconcileConfig;
use crate::engine::solve::SolverConfig;
use crate::error::{Error, Result};

/// Full solver configuration loaded from TOML
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SolveConfig {
    /// Stack and range
    #[serde(default)]
    pub stack: StackSection,

    /// Relaxation settings
    #[serde(default)]
    pub solver: SolverSection,

    /// Reconciliation settings
    #[serde(default)]
    pub merge: MergeSection,

    /// Pair inclusion policy
    #[serde(default)]
    pub inclusion: InclusionConfig,

    /// Checkpoint settings
    #[serde(default)]
    pub checkpoint: CheckpointSection,
}

impl SolveConfig {
    /// Load and validate configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&contents)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate from a TOML string
    pub fn from_toml(toml: &str) -> Result<Self> {
        let config: Self = basic_toml::from_str(toml)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the solver cannot run with
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::Config(msg));

        if self.stack.min_z > self.stack.max_z {
            return fail(format!(
                "stack.min_z ({}) is greater than stack.max_z ({})",
                self.stack.min_z, self.stack.max_z
            ));
        }
        if self.solver.threads == 0 || self.solver.block_threads == 0 {
            return fail("solver.threads and solver.block_threads must be at least 1".into());
        }
        if self.solver.stages.is_empty() {
            return fail("solver.stages must not be empty".into());
        }
        for (i, stage) in self.solver.stages.iter().enumerate() {
            if stage.iterations == 0 {
                return fail(format!("solver.stages[{i}]: iterations must be positive"));
            }
            if !(0.0..=1.0).contains(&stage.lambda) {
                return fail(format!(
                    "solver.stages[{i}]: lambda {} is outside [0, 1]",
                    stage.lambda
                ));
            }
            if i > 0 && stage.lambda > self.solver.stages[i - 1].lambda {
                return fail(format!(
                    "solver.stages[{i}]: lambda {} is above the previous stage's {}",
                    stage.lambda,
                    self.solver.stages[i - 1].lambda
                ));
            }
        }
        if !(self.solver.damp > 0.0 && self.solver.damp <= 1.0) {
            return fail(format!("solver.damp {} is outside (0, 1]", self.solver.damp));
        }
        if self.merge.overlap_top < 2 || self.merge.overlap_bottom < 2 {
            return fail("merge.overlap_top and merge.overlap_bottom must be at least 2".into());
        }
        if self.merge.samples_per_dimension < 2 {
            return fail("merge.samples_per_dimension must be at least 2".into());
        }
        if self.merge.reconcile_iterations == 0 {
            return fail("merge.reconcile_iterations must be positive".into());
        }
        for (i, rule) in self.inclusion.rules.iter().enumerate() {
            if rule.effect == RuleEffect::KeepAtMost && rule.max_pairs.is_none() {
                return fail(format!(
                    "inclusion.rules[{i}]: effect \"keep_at_most\" needs max_pairs"
                ));
            }
        }
        Ok(())
    }

    /// Relaxation settings for block solves
    pub fn solver_config(&self) -> SolverConfig {
        SolverConfig {
            stages: self.solver.stages.clone(),
            max_allowed_error: self.solver.max_allowed_error,
            damp: self.solver.damp,
            threads: self.solver.threads,
        }
    }

    /// Reconciliation settings
    pub fn reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig {
            overlap_top: self.merge.overlap_top,
            overlap_bottom: self.merge.overlap_bottom,
            samples_per_dimension: self.merge.samples_per_dimension,
            iterations: self.merge.reconcile_iterations,
            damp: self.solver.damp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::RegularizerKind;

    #[test]
    fn test_defaults() {
        let config = SolveConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.solver.stages.len(), 4);
        assert_eq!(config.solver.stages[0].lambda, 1.0);
        assert_eq!(config.solver.stages[3].iterations, 20);
        assert_eq!(config.solver.max_allowed_error, 0.0);
        assert_eq!(config.merge.samples_per_dimension, 5);
        assert_eq!(config.checkpoint.min_entries, 3);
        assert!(config.checkpoint.directory.is_none());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = SolveConfig::from_toml("").unwrap();
        assert_eq!(config.stack.block_size, 500);
        assert_eq!(config.merge.overlap_top, 25);
    }

    #[test]
    fn test_full_toml() {
        let toml = r#"
            [stack]
            stack = "v1_acquire"
            min_z = 1
            max_z = 1200
            block_size = 100

            [solver]
            threads = 8
            block_threads = 2
            regularizer = "translation"
            max_allowed_error = 0.5
            damp = 0.8
            stages = [
                { lambda = 1.0, iterations = 200, plateau_width = 50 },
                { lambda = 0.0, iterations = 100, plateau_width = 25 },
            ]

            [merge]
            overlap_top = 10
            overlap_bottom = 12

            [inclusion]
            exclude_tile_ids = ["_0-1-1."]

            [[inclusion.rules]]
            layers = [1000]
            cross_layer_only = true
            effect = "reject"

            [checkpoint]
            directory = "/tmp/setu"
            min_entries = 5
        "#;
        let config = SolveConfig::from_toml(toml).unwrap();
        assert_eq!(config.stack.max_z, 1200);
        assert_eq!(config.solver.regularizer, RegularizerKind::Translation);
        assert_eq!(config.solver.stages[1].plateau_width, 25);
        assert_eq!(config.merge.overlap_bottom, 12);
        assert_eq!(config.merge.samples_per_dimension, 5);
        assert_eq!(config.inclusion.rules[0].effect, RuleEffect::Reject);
        assert_eq!(config.checkpoint.min_entries, 5);

        let solver = config.solver_config();
        assert_eq!(solver.threads, 8);
        assert_eq!(solver.damp, 0.8);
        let reconcile = config.reconcile_config();
        assert_eq!(reconcile.overlap_top, 10);
    }

    #[test]
    fn test_validation_failures() {
        let cases = [
            "[stack]\nmin_z = 5\nmax_z = 1",
            "[solver]\nstages = []",
            "[solver]\nthreads = 0",
            "[solver]\ndamp = 0.0",
            "[solver]\ndamp = 1.5",
            "[solver]\nstages = [{ lambda = 1.0, iterations = 0, plateau_width = 0 }]",
            "[solver]\nstages = [{ lambda = 2.0, iterations = 10, plateau_width = 0 }]",
            "[merge]\noverlap_top = 1",
            "[merge]\nsamples_per_dimension = 1",
            "[solver]\nstages = [\n{ lambda = 0.1, iterations = 10, plateau_width = 0 },\n{ lambda = 0.5, iterations = 10, plateau_width = 0 },\n]",
            "[[inclusion.rules]]\nlayers = [3]\neffect = \"keep_at_most\"",
        ];
        for toml in cases {
            assert!(
                matches!(SolveConfig::from_toml(toml), Err(Error::Config(_))),
                "accepted: {toml}"
            );
        }
    }

    #[test]
    fn test_keep_at_most_rule_from_toml() {
        let toml = r#"
            [[inclusion.rules]]
            layers = [20]
            partner_layers = [21]
            effect = "keep_at_most"
            max_pairs = 2
        "#;
        let config = SolveConfig::from_toml(toml).unwrap();
        let rule = &config.inclusion.rules[0];
        assert_eq!(rule.effect, RuleEffect::KeepAtMost);
        assert_eq!(rule.max_pairs, Some(2));
        assert_eq!(rule.partner_layers.as_deref(), Some(&[21][..]));
    }

    #[test]
    fn test_equal_lambdas_are_accepted() {
        let toml = "[solver]\nstages = [\n{ lambda = 0.5, iterations = 10, plateau_width = 0 },\n{ lambda = 0.5, iterations = 10, plateau_width = 0 },\n]";
        assert!(SolveConfig::from_toml(toml).is_ok());
    }

    #[test]
    fn test_unknown_regularizer_is_rejected() {
        let result = SolveConfig::from_toml("[solver]\nregularizer = \"similarity\"");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}

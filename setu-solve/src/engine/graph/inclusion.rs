//! Inclusion policy for tile pairs.
//!
//! Decides, before an edge is created, whether a correspondence between two
//! tiles takes part in a solve. Checks run in a fixed order:
//!
//! 1. both tiles inside the block's z-range
//! 2. neither tile id matches an exclusion pattern
//! 3. per-layer z-distance limits
//! 4. the ordered [`LinkRule`] table, first matching rule decides

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::types::TileSpec;

/// Maximum z-distance for pairs touching one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZLimit {
    /// Layer the limit applies to
    pub z: i64,
    /// Largest allowed `|qz - pz|`
    pub max_z_distance: f64,
}

/// What a matching rule does with the pair.
///
/// Written as a plain string in TOML: `"reject"` or `"keep_at_most"`. The
/// cap of `keep_at_most` comes from [`LinkRule::max_pairs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleEffect {
    /// Drop the pair
    Reject,
    /// Keep the first `max_pairs` matching pairs, drop the rest
    KeepAtMost,
}

/// One entry of the ordered rule table.
///
/// The predicate matches when one tile of the pair lies in `layers` and the
/// other satisfies the optional restrictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRule {
    /// Layers one side of the pair must be in
    pub layers: Vec<i64>,

    /// Layers the other side must be in (any when absent)
    #[serde(default)]
    pub partner_layers: Option<Vec<i64>>,

    /// Only match pairs spanning two layers
    #[serde(default)]
    pub cross_layer_only: bool,

    /// Only match pairs where a tile id contains this substring
    #[serde(default)]
    pub tile_id_pattern: Option<String>,

    /// Effect when the predicate matches
    pub effect: RuleEffect,

    /// Cap of a `keep_at_most` rule
    #[serde(default)]
    pub max_pairs: Option<usize>,
}

impl LinkRule {
    /// Whether the predicate holds for the pair.
    pub fn matches(&self, p: &TileSpec, q: &TileSpec) -> bool {
        let (pz, qz) = (p.layer(), q.layer());

        if self.cross_layer_only && pz == qz {
            return false;
        }

        if let Some(pattern) = &self.tile_id_pattern
            && !p.tile_id.contains(pattern.as_str())
            && !q.tile_id.contains(pattern.as_str())
        {
            return false;
        }

        self.anchored(pz, qz) || self.anchored(qz, pz)
    }

    fn anchored(&self, anchor: i64, partner: i64) -> bool {
        self.layers.contains(&anchor)
            && self
                .partner_layers
                .as_ref()
                .is_none_or(|layers| layers.contains(&partner))
    }
}

/// Inclusion settings, loaded from the `[inclusion]` config section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InclusionConfig {
    /// Tile id substrings to exclude
    pub exclude_tile_ids: Vec<String>,

    /// Per-layer z-distance limits
    pub z_limits: Vec<ZLimit>,

    /// Ordered rule table
    pub rules: Vec<LinkRule>,
}

/// Why a pair was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RejectReason {
    /// A tile lies outside the block's z-range
    OutsideRange,
    /// A tile id matches an exclusion pattern
    Excluded,
    /// The pair exceeds a layer's z-distance limit
    ZDistance,
    /// Rejected by the rule at this index
    Rule(usize),
    /// Over the cap of the `KeepAtMost` rule at this index
    RuleCap(usize),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::OutsideRange => write!(f, "outside z-range"),
            RejectReason::Excluded => write!(f, "excluded tile id"),
            RejectReason::ZDistance => write!(f, "z-distance limit"),
            RejectReason::Rule(i) => write!(f, "rule {i}"),
            RejectReason::RuleCap(i) => write!(f, "rule {i} cap"),
        }
    }
}

/// Outcome of evaluating one pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Create the edge
    Keep,
    /// Skip the pair
    Reject(RejectReason),
}

/// Stateful evaluator for one block.
///
/// `KeepAtMost` rules count the pairs they let through, so one policy is
/// used per block and pairs are evaluated in ingestion order.
#[derive(Debug)]
pub struct InclusionPolicy<'a> {
    config: &'a InclusionConfig,
    min_z: i64,
    max_z: i64,
    z_limits: HashMap<i64, f64>,
    kept_by_rule: HashMap<usize, usize>,
    seen: HashSet<(String, String)>,
}

impl<'a> InclusionPolicy<'a> {
    /// Create a policy for the range `[min_z, max_z]`.
    pub fn new(config: &'a InclusionConfig, min_z: i64, max_z: i64) -> Self {
        let z_limits = config
            .z_limits
            .iter()
            .map(|limit| (limit.z, limit.max_z_distance))
            .collect();
        Self {
            config,
            min_z,
            max_z,
            z_limits,
            kept_by_rule: HashMap::new(),
            seen: HashSet::new(),
        }
    }

    /// Evaluate a pair.
    pub fn evaluate(&mut self, p: &TileSpec, q: &TileSpec) -> Decision {
        let (pz, qz) = (p.layer(), q.layer());
        let in_range = |z: i64| z >= self.min_z && z <= self.max_z;
        if !in_range(pz) || !in_range(qz) {
            return Decision::Reject(RejectReason::OutsideRange);
        }

        let excluded = |id: &str| {
            self.config
                .exclude_tile_ids
                .iter()
                .any(|pattern| id.contains(pattern.as_str()))
        };
        if excluded(&p.tile_id) || excluded(&q.tile_id) {
            return Decision::Reject(RejectReason::Excluded);
        }

        let dz = (q.z - p.z).abs();
        for z in [pz, qz] {
            if let Some(&max) = self.z_limits.get(&z)
                && dz > max
            {
                return Decision::Reject(RejectReason::ZDistance);
            }
        }

        let Some((index, rule)) = self
            .config
            .rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.matches(p, q))
        else {
            return Decision::Keep;
        };

        match rule.effect {
            RuleEffect::Reject => Decision::Reject(RejectReason::Rule(index)),
            RuleEffect::KeepAtMost => {
                let cap = rule.max_pairs.unwrap_or(0);
                // The same tile pair seen again does not use up the cap
                let key = if p.tile_id <= q.tile_id {
                    (p.tile_id.clone(), q.tile_id.clone())
                } else {
                    (q.tile_id.clone(), p.tile_id.clone())
                };
                if self.seen.contains(&key) {
                    return Decision::Keep;
                }
                let kept = self.kept_by_rule.entry(index).or_insert(0);
                if *kept >= cap {
                    Decision::Reject(RejectReason::RuleCap(index))
                } else {
                    *kept += 1;
                    self.seen.insert(key);
                    Decision::Keep
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(id: &str, z: f64) -> TileSpec {
        TileSpec::new(id, &format!("{z:.1}"), z, 100.0, 100.0)
    }

    #[test]
    fn test_range_check_first() {
        let config = InclusionConfig::default();
        let mut policy = InclusionPolicy::new(&config, 0, 5);
        assert_eq!(policy.evaluate(&tile("a", 0.0), &tile("b", 5.0)), Decision::Keep);
        assert_eq!(
            policy.evaluate(&tile("a", 0.0), &tile("b", 6.0)),
            Decision::Reject(RejectReason::OutsideRange)
        );
    }

    #[test]
    fn test_exclusion_pattern() {
        let config = InclusionConfig {
            exclude_tile_ids: vec!["_bad_".to_string()],
            ..Default::default()
        };
        let mut policy = InclusionPolicy::new(&config, 0, 5);
        assert_eq!(
            policy.evaluate(&tile("r1_bad_c2", 1.0), &tile("b", 1.0)),
            Decision::Reject(RejectReason::Excluded)
        );
    }

    #[test]
    fn test_z_distance_limit() {
        let config = InclusionConfig {
            z_limits: vec![ZLimit {
                z: 3,
                max_z_distance: 1.0,
            }],
            ..Default::default()
        };
        let mut policy = InclusionPolicy::new(&config, 0, 10);
        assert_eq!(policy.evaluate(&tile("a", 3.0), &tile("b", 4.0)), Decision::Keep);
        assert_eq!(
            policy.evaluate(&tile("a", 3.0), &tile("b", 5.0)),
            Decision::Reject(RejectReason::ZDistance)
        );
        // unrestricted layers are unaffected
        assert_eq!(policy.evaluate(&tile("a", 6.0), &tile("b", 9.0)), Decision::Keep);
    }

    #[test]
    fn test_first_matching_rule_decides() {
        let config = InclusionConfig {
            rules: vec![
                LinkRule {
                    layers: vec![4],
                    partner_layers: Some(vec![5]),
                    cross_layer_only: true,
                    tile_id_pattern: None,
                    effect: RuleEffect::KeepAtMost,
                    max_pairs: Some(1),
                },
                LinkRule {
                    layers: vec![4],
                    partner_layers: None,
                    cross_layer_only: true,
                    tile_id_pattern: None,
                    effect: RuleEffect::Reject,
                    max_pairs: None,
                },
            ],
            ..Default::default()
        };
        let mut policy = InclusionPolicy::new(&config, 0, 10);

        // 4 → 5 passes the cap once, either orientation
        assert_eq!(policy.evaluate(&tile("b", 5.0), &tile("a", 4.0)), Decision::Keep);
        assert_eq!(policy.evaluate(&tile("a", 4.0), &tile("b", 5.0)), Decision::Keep);
        assert_eq!(
            policy.evaluate(&tile("c", 4.0), &tile("d", 5.0)),
            Decision::Reject(RejectReason::RuleCap(0))
        );
        // 4 → 3 falls through to the reject rule
        assert_eq!(
            policy.evaluate(&tile("c", 4.0), &tile("e", 3.0)),
            Decision::Reject(RejectReason::Rule(1))
        );
        // montage pairs in layer 4 match no rule
        assert_eq!(policy.evaluate(&tile("c", 4.0), &tile("f", 4.0)), Decision::Keep);
    }

    #[test]
    fn test_tile_id_pattern() {
        let rule = LinkRule {
            layers: vec![1],
            partner_layers: None,
            cross_layer_only: false,
            tile_id_pattern: Some("cam2".to_string()),
            effect: RuleEffect::Reject,
            max_pairs: None,
        };
        assert!(rule.matches(&tile("x_cam2", 1.0), &tile("y", 1.0)));
        assert!(!rule.matches(&tile("x_cam1", 1.0), &tile("y", 1.0)));
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
            exclude_tile_ids = ["_0-0-0"]

            [[z_limits]]
            z = 12
            max_z_distance = 2.0

            [[rules]]
            layers = [20]
            partner_layers = [21]
            effect = "keep_at_most"
            max_pairs = 2

            [[rules]]
            layers = [20]
            cross_layer_only = true
            effect = "reject"
        "#;
        let config: InclusionConfig = basic_toml::from_str(toml).unwrap();
        assert_eq!(config.z_limits[0].z, 12);
        assert_eq!(config.rules[0].effect, RuleEffect::KeepAtMost);
        assert_eq!(config.rules[0].max_pairs, Some(2));
        assert_eq!(config.rules[1].max_pairs, None);
        assert_eq!(config.rules[1].effect, RuleEffect::Reject);
        assert!(config.rules[1].cross_layer_only);
    }
}

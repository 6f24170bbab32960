//! Stitching reconciled blocks into one set of models.
//!
//! Blocks are reconciled top to bottom. Each block first inherits the
//! correction of the block above it (the "carry"), so the untouched geometry
//! it anchors to is the geometry that block already moved. The block's own
//! bottom correction, composed with its carry, is handed further down.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use super::reconciler::{Reconciler, Reconciliation};
use crate::core::model::AffineModel2D;
use crate::engine::solve::{SolveSet, SolvedBlock};
use crate::error::{Error, Result};

/// Final models of a whole solve set.
#[derive(Debug, Clone, PartialEq)]
pub struct Stitched {
    /// Final model per tile
    pub final_models: BTreeMap<String, AffineModel2D>,

    /// Correction for untouched layers below the solved range
    pub below_correction: AffineModel2D,

    /// Reconciliation of every block, by block id
    pub reconciliations: BTreeMap<u64, Reconciliation>,
}

impl Stitched {
    /// Final models grouped by layer.
    pub fn models_by_layer(
        &self,
        blocks: &[SolvedBlock],
    ) -> BTreeMap<i64, BTreeMap<String, AffineModel2D>> {
        let mut layers: BTreeMap<i64, BTreeMap<String, AffineModel2D>> = BTreeMap::new();
        for block in blocks {
            for (tile_id, spec) in &block.tile_specs {
                if let Some(model) = self.final_models.get(tile_id) {
                    layers
                        .entry(spec.layer())
                        .or_default()
                        .insert(tile_id.clone(), *model);
                }
            }
        }
        layers
    }
}

/// Block ranking for carries and the below correction: lowest reach, then
/// most tiles, then lowest id.
fn rank(block: &SolvedBlock) -> (i64, usize, Reverse<u64>) {
    (block.max_z, block.num_tiles(), Reverse(block.id))
}

/// Reconcile every block of the set and merge the results.
pub fn stitch(reconciler: &Reconciler, set: &SolveSet<SolvedBlock>) -> Result<Stitched> {
    let blocks = set.blocks();
    let mut carries: Vec<Option<AffineModel2D>> = vec![None; blocks.len()];
    let mut owners: HashMap<String, u64> = HashMap::new();
    let mut final_models = BTreeMap::new();
    let mut reconciliations = BTreeMap::new();

    for (i, block) in blocks.iter().enumerate() {
        let carry = incoming_carry(set, &carries, i);

        let mut carried = block.clone();
        for model in carried.previous_models.values_mut() {
            *model = model.pre_concatenate(&carry);
        }

        let reconciliation = match reconciler.reconcile(&carried) {
            Ok(r) => r,
            Err(e) => {
                log::error!(
                    "Merge failed at block {} [{}, {}]: {}",
                    block.id,
                    block.min_z,
                    block.max_z,
                    e
                );
                return Err(e);
            }
        };

        for (tile_id, model) in &reconciliation.final_models {
            if let Some(&first_block) = owners.get(tile_id) {
                return Err(Error::DuplicateTile {
                    tile_id: tile_id.clone(),
                    first_block,
                    second_block: block.id,
                });
            }
            owners.insert(tile_id.clone(), block.id);
            final_models.insert(tile_id.clone(), *model);
        }

        carries[i] = Some(carry.pre_concatenate(&reconciliation.bottom));
        reconciliations.insert(block.id, reconciliation);
    }

    let below_correction = blocks
        .iter()
        .enumerate()
        .max_by_key(|(_, b)| rank(b))
        .and_then(|(i, _)| carries[i])
        .unwrap_or_else(AffineModel2D::identity);

    log::info!(
        "Stitched {} blocks into {} tile models",
        blocks.len(),
        final_models.len()
    );

    Ok(Stitched {
        final_models,
        below_correction,
        reconciliations,
    })
}

/// Carry for block `i` from the already processed blocks above it.
///
/// Adjacent blocks are preferred; otherwise the nearest block above is used.
fn incoming_carry(
    set: &SolveSet<SolvedBlock>,
    carries: &[Option<AffineModel2D>],
    i: usize,
) -> AffineModel2D {
    let blocks = set.blocks();
    let min_z = blocks[i].min_z;
    let above = |j: &usize| carries[*j].is_some() && blocks[*j].max_z < min_z;

    let adjacent = set.adjacent(i).into_iter().filter(above).max_by_key(|&j| rank(&blocks[j]));
    let source = adjacent.or_else(|| (0..i).filter(above).max_by_key(|&j| rank(&blocks[j])));

    source
        .and_then(|j| carries[j])
        .unwrap_or_else(AffineModel2D::identity)
}

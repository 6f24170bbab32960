//! Ordered block collections with adjacency.

use super::block::{Block, ZRange};

/// Blocks covering a contiguous z-range, ordered by `(min_z, id)`.
#[derive(Debug, Clone)]
pub struct SolveSet<B: ZRange> {
    blocks: Vec<B>,
}

impl<B: ZRange> SolveSet<B> {
    /// Wrap blocks, sorting them by `(min_z, id)`.
    pub fn new(mut blocks: Vec<B>) -> Self {
        blocks.sort_by_key(|b| (b.min_z(), b.id()));
        Self { blocks }
    }

    /// Blocks in order.
    pub fn blocks(&self) -> &[B] {
        &self.blocks
    }

    /// Take ownership of the blocks.
    pub fn into_blocks(self) -> Vec<B> {
        self.blocks
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether there are no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Indices of blocks whose range overlaps or directly follows block `i`.
    pub fn adjacent(&self, i: usize) -> Vec<usize> {
        let Some(block) = self.blocks.get(i) else {
            return Vec::new();
        };
        self.blocks
            .iter()
            .enumerate()
            .filter(|&(j, other)| j != i && block.touches(other))
            .map(|(j, _)| j)
            .collect()
    }
}

impl SolveSet<Block> {
    /// Cut `[min_z, max_z]` into consecutive blocks of `block_size` layers.
    ///
    /// Blocks are numbered from `first_id` upwards. The last block may be
    /// shorter. A `block_size` of 0 yields one block.
    pub fn from_range(min_z: i64, max_z: i64, block_size: usize, first_id: u64) -> Self {
        let mut blocks = Vec::new();
        if min_z > max_z {
            return Self { blocks };
        }

        let size = if block_size == 0 {
            max_z - min_z + 1
        } else {
            block_size as i64
        };

        let mut start = min_z;
        let mut id = first_id;
        while start <= max_z {
            let end = (start + size - 1).min(max_z);
            blocks.push(Block::new(id, start, end));
            id += 1;
            start = end + 1;
        }

        log::info!(
            "Solve set [{}, {}]: {} blocks of up to {} layers",
            min_z,
            max_z,
            blocks.len(),
            size
        );
        Self { blocks }
    }
}

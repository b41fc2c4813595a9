use crate::{Error, Result};
use rand::Rng;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Split {
    Train,
    Val,
}

impl Split {
    pub fn name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
        }
    }
}

/// An encoded corpus cut into a training prefix and a validation suffix.
pub struct TextDataset {
    train: Vec<usize>,
    val: Vec<usize>,
}

/// `batch_size` windows of `block_size` ids, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
    pub batch_size: usize,
    pub block_size: usize,
    pub inputs: Vec<usize>,
    pub targets: Vec<usize>,
}

impl TextDataset {
    pub fn new(mut ids: Vec<usize>, train_fraction: f64) -> Self {
        let n = (train_fraction * ids.len() as f64) as usize;
        let val = ids.split_off(n.min(ids.len()));
        Self { train: ids, val }
    }

    pub fn split(&self, split: Split) -> &[usize] {
        match split {
            Split::Train => &self.train,
            Split::Val => &self.val,
        }
    }

    /// Checks that both halves are long enough to cut a window out of.
    pub fn check(&self, block_size: usize) -> Result<()> {
        for split in [Split::Train, Split::Val] {
            let len = self.split(split).len();
            if len <= block_size {
                return Err(Error::SplitTooShort {
                    split: split.name(),
                    len,
                    block_size,
                });
            }
        }
        Ok(())
    }

    pub fn sample_batch<R: Rng>(
        &self,
        split: Split,
        batch_size: usize,
        block_size: usize,
        rng: &mut R,
    ) -> Result<Batch> {
        let data = self.split(split);
        if data.len() <= block_size {
            return Err(Error::SplitTooShort {
                split: split.name(),
                len: data.len(),
                block_size,
            });
        }

        let mut inputs = Vec::with_capacity(batch_size * block_size);
        let mut targets = Vec::with_capacity(batch_size * block_size);
        for _ in 0..batch_size {
            let start = rng.gen_range(0..data.len() - block_size);
            inputs.extend_from_slice(&data[start..start + block_size]);
            targets.extend_from_slice(&data[start + 1..start + block_size + 1]);
        }

        Ok(Batch {
            batch_size,
            block_size,
            inputs,
            targets,
        })
    }
}

impl Batch {
    /// Dense `(batch, block, vocab)` target distribution for the cross entropy.
    pub fn one_hot_targets(&self, vocab: usize) -> Vec<f32> {
        let mut one_hot = vec![0.0; self.targets.len() * vocab];
        for (row, &t) in self.targets.iter().enumerate() {
            one_hot[row * vocab + t] = 1.0;
        }
        one_hot
    }
}

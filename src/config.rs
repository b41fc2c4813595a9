use crate::{
    model::{BigramConfig, BigramModel},
    Error, Result,
};
use dfdx::prelude::*;
use rand_distr::{uniform::SampleUniform, Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Model hyperparameters, stored as `config.json` next to the checkpoints.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub vocab: usize,
    pub block_size: usize,
    pub n_embd: usize,
    pub head_size: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            vocab: 0,
            block_size: 8,
            n_embd: 32,
            head_size: 32,
        }
    }
}

impl ModelConfig {
    pub fn with_vocab(self, vocab: usize) -> Self {
        Self { vocab, ..self }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("vocab", self.vocab),
            ("block_size", self.block_size),
            ("n_embd", self.n_embd),
            ("head_size", self.head_size),
        ] {
            if v == 0 {
                return Err(Error::InvalidConfig(format!("{name} must be positive")));
            }
        }
        Ok(())
    }

    pub fn build<E: Dtype, D: Device<E>>(self, dev: &D) -> BigramModel<E, D>
    where
        E: SampleUniform + num_traits::Float,
        StandardNormal: Distribution<E>,
    {
        let m = BigramConfig {
            vocab: self.vocab,
            block_size: self.block_size,
            n_embd: self.n_embd,
            head_size: self.head_size,
        };

        dev.build_module(m)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(Error::io(path))?;
        serde_json::from_str(&json).map_err(Error::json(path))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(Error::json(path))?;
        fs::write(path, json).map_err(Error::io(path))
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TrainConfig {
    pub batch_size: usize,
    pub max_iters: usize,
    pub eval_interval: usize,
    pub eval_iters: usize,
    pub learning_rate: f64,
    pub weight_decay: f64,
    pub train_fraction: f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            max_iters: 5000,
            eval_interval: 300,
            eval_iters: 200,
            learning_rate: 1e-3,
            weight_decay: 0.01,
            train_fraction: 0.9,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("batch_size", self.batch_size),
            ("max_iters", self.max_iters),
            ("eval_interval", self.eval_interval),
            ("eval_iters", self.eval_iters),
        ] {
            if v == 0 {
                return Err(Error::InvalidConfig(format!("{name} must be positive")));
            }
        }
        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "train_fraction {} is not in (0, 1)",
                self.train_fraction
            )));
        }
        if self.learning_rate <= 0.0 {
            return Err(Error::InvalidConfig("learning rate must be positive".into()));
        }
        if !(self.weight_decay.is_finite() && self.weight_decay >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "weight_decay {} must be finite and non-negative",
                self.weight_decay
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let conf: ModelConfig = serde_json::from_str(r#"{"n_embd": 64}"#).unwrap();
        assert_eq!(conf.n_embd, 64);
        assert_eq!(conf.block_size, 8);
        assert_eq!(conf.head_size, 32);
    }

    #[test]
    fn vocab_must_be_set() {
        assert!(ModelConfig::default().validate().is_err());
        assert!(ModelConfig::default().with_vocab(65).validate().is_ok());
    }

    #[test]
    fn train_fraction_bounds() {
        let conf = TrainConfig {
            train_fraction: 1.0,
            ..Default::default()
        };
        assert!(matches!(conf.validate(), Err(Error::InvalidConfig(_))));
        assert!(TrainConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_iters_and_negative_decay_are_rejected() {
        let no_steps = TrainConfig {
            max_iters: 0,
            ..Default::default()
        };
        assert!(matches!(no_steps.validate(), Err(Error::InvalidConfig(_))));

        for weight_decay in [-0.01, f64::NAN] {
            let conf = TrainConfig {
                weight_decay,
                ..Default::default()
            };
            assert!(matches!(conf.validate(), Err(Error::InvalidConfig(_))));
        }

        let no_decay = TrainConfig {
            weight_decay: 0.0,
            ..Default::default()
        };
        assert!(no_decay.validate().is_ok());
    }
}

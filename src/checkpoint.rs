//! Save directories hold `config.json`, `vocab.json` and one
//! `<step>.safetensors` per checkpoint.

use crate::{
    config::ModelConfig, model::BigramModel, tokenize::CharTokenizer, Error, Result, D, E,
};
use dfdx::nn::{LoadSafeTensors, SaveSafeTensors};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

pub const CONFIG_FILE: &str = "config.json";
pub const VOCAB_FILE: &str = "vocab.json";

pub struct Checkpoints {
    dir: PathBuf,
}

impl Checkpoints {
    pub fn create<P: AsRef<Path>>(
        dir: P,
        conf: &ModelConfig,
        tokenizer: &CharTokenizer,
    ) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(Error::io(&dir))?;
        conf.save(dir.join(CONFIG_FILE))?;
        tokenizer.save(dir.join(VOCAB_FILE))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, step: usize) -> PathBuf {
        self.dir.join(format!("{step}.safetensors"))
    }

    pub fn save(&self, m: &BigramModel<E, D>, step: usize) -> Result<PathBuf> {
        let path = self.path_for(step);
        m.save_safetensors(&path).map_err(Error::tensor)?;
        info!(path = %path.display(), "saved checkpoint");
        Ok(path)
    }
}

/// Optimizer steps behind a checkpoint, read from its file stem.
pub fn step_from_path(path: &Path) -> Result<usize> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| Error::InvalidCheckpointName(path.to_path_buf()))
}

pub fn load_weights(m: &mut BigramModel<E, D>, path: &Path) -> Result<()> {
    info!(path = %path.display(), "load from checkpoint");
    m.load_safetensors(path).map_err(Error::tensor)
}

/// Rebuilds a model, its config and tokenizer from a `<step>.safetensors`
/// file inside a save directory.
pub fn load(dev: &D, path: &Path) -> Result<(BigramModel<E, D>, ModelConfig, CharTokenizer)> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let conf = ModelConfig::load(dir.join(CONFIG_FILE))?;
    conf.validate()?;
    let tokenizer = CharTokenizer::load(dir.join(VOCAB_FILE))?;
    if tokenizer.vocab_size() != conf.vocab {
        return Err(Error::InvalidConfig(format!(
            "vocabulary has {} chars but the model expects {}",
            tokenizer.vocab_size(),
            conf.vocab
        )));
    }

    let mut m = conf.build(dev);
    load_weights(&mut m, path)?;
    Ok((m, conf, tokenizer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_is_the_file_stem() {
        assert_eq!(step_from_path(Path::new("save/300.safetensors")).unwrap(), 300);
        assert!(matches!(
            step_from_path(Path::new("save/best.safetensors")),
            Err(Error::InvalidCheckpointName(_))
        ));
    }
}

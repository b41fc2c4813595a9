use std::{fmt::Debug, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("vocabulary is empty")]
    EmptyVocabulary,
    #[error("character {0:?} appears twice in the vocabulary")]
    DuplicateChar(char),
    #[error("character {0:?} is not in the vocabulary")]
    UnknownChar(char),
    #[error("token id {0} is not in the vocabulary")]
    UnknownId(usize),
    #[error("{split} split has {len} tokens, need more than block size {block_size}")]
    SplitTooShort {
        split: &'static str,
        len: usize,
        block_size: usize,
    },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("checkpoint file name {0:?} is not `<step>.safetensors`")]
    InvalidCheckpointName(PathBuf),
    #[error("model produced non-finite logits")]
    NonFiniteLogits,
    #[error("tensor operation failed: {0}")]
    Tensor(String),
    #[error("{path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path:?}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl Error {
    /// dfdx error types differ between the tensor, optimizer and safetensors
    /// layers; they all end up here by their debug rendering.
    pub(crate) fn tensor(err: impl Debug) -> Self {
        Self::Tensor(format!("{err:?}"))
    }

    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }

    pub(crate) fn json(path: impl Into<PathBuf>) -> impl FnOnce(serde_json::Error) -> Self {
        let path = path.into();
        move |source| Self::Json { path, source }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

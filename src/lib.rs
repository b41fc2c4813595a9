#![allow(clippy::type_complexity)]
//! A character-level bigram language model with one causal self-attention
//! head, trained and sampled on top of dfdx.

pub mod checkpoint;
pub mod config;
pub mod dataset;
pub mod error;
pub mod generate;
pub mod model;
pub mod tokenize;
pub mod train;

pub use error::{Error, Result};

use dfdx::tensor::AutoDevice;

pub type E = f32;
pub type D = AutoDevice;

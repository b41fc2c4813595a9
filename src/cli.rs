use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "char_gpt", about = "Character-level bigram model with causal self-attention")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,

    #[arg(long, default_value_t = 1337)]
    pub(crate) seed: u64,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Train on a text file and print a sample at the end.
    Train {
        #[arg(short, long, default_value = "input.txt")]
        input: PathBuf,

        /// Model config JSON; fields left out take their defaults. A resumed
        /// run keeps the config saved next to its checkpoint.
        #[arg(short, long, conflicts_with = "resume")]
        config: Option<PathBuf>,

        #[arg(long, default_value = "save")]
        save_dir: PathBuf,

        /// Continue from `<step>.safetensors` in `save_dir`.
        #[arg(long)]
        resume: Option<PathBuf>,

        #[arg(long, default_value_t = 32)]
        batch_size: usize,

        #[arg(long, default_value_t = 5000)]
        max_iters: usize,

        #[arg(long, default_value_t = 300)]
        eval_interval: usize,

        #[arg(long, default_value_t = 200)]
        eval_iters: usize,

        #[arg(long, default_value_t = 1e-3)]
        lr: f64,

        #[arg(long, default_value_t = 0.01)]
        weight_decay: f64,

        #[arg(long, default_value_t = 500)]
        sample_tokens: usize,
    },

    /// Sample from a saved checkpoint.
    Generate {
        /// `<step>.safetensors` inside a save directory.
        #[arg(short, long)]
        model: PathBuf,

        #[arg(short, long, default_value = "")]
        prompt: String,

        #[arg(short, long, default_value_t = 500)]
        num_tokens: usize,

        #[arg(long, default_value_t = false)]
        greedy: bool,

        #[arg(long)]
        top_k: Option<usize>,

        #[arg(long, default_value_t = 1.0)]
        temperature: f32,

        #[arg(long, default_value_t = false)]
        bench: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_keeps_the_saved_config() {
        let err = Cli::try_parse_from([
            "char_gpt",
            "train",
            "--config",
            "model.json",
            "--resume",
            "save/300.safetensors",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);

        let cli = Cli::try_parse_from(["char_gpt", "train", "--resume", "save/300.safetensors"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Train {
                config: None,
                resume: Some(_),
                ..
            }
        ));
    }
}

mod cli;

use anyhow::{ensure, Context, Result};
use char_gpt::{
    checkpoint::{self, Checkpoints},
    config::{ModelConfig, TrainConfig},
    dataset::TextDataset,
    generate::{generate, print_metrics, GenerateOption},
    tokenize::CharTokenizer,
    train::train,
};
use clap::Parser;
use cli::{Cli, Commands};
use dfdx::tensor::AutoDevice;
use rand::prelude::{SeedableRng, StdRng};
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("char_gpt=info".parse()?),
        )
        .init();

    let args = Cli::parse();

    let dev = AutoDevice::seed_from_u64(args.seed);
    let mut rng = StdRng::seed_from_u64(args.seed);

    match args.command {
        Commands::Train {
            input,
            config,
            save_dir,
            resume,
            batch_size,
            max_iters,
            eval_interval,
            eval_iters,
            lr,
            weight_decay,
            sample_tokens,
        } => {
            let text = std::fs::read_to_string(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;

            let (mut m, conf, tokenizer, step_base) = match resume {
                Some(path) => {
                    let (m, conf, tokenizer) = checkpoint::load(&dev, &path)
                        .with_context(|| format!("failed to resume from {}", path.display()))?;
                    let step_base = checkpoint::step_from_path(&path)?;
                    (m, conf, tokenizer, step_base)
                }
                None => {
                    let tokenizer = CharTokenizer::from_text(&text)?;
                    let conf = match config {
                        Some(path) => ModelConfig::load(&path)?,
                        None => ModelConfig::default(),
                    }
                    .with_vocab(tokenizer.vocab_size());
                    conf.validate()?;
                    (conf.build(&dev), conf, tokenizer, 0)
                }
            };
            info!(
                vocab = conf.vocab,
                block_size = conf.block_size,
                n_embd = conf.n_embd,
                "model ready"
            );

            let ids = tokenizer
                .encode(&text)
                .context("input contains characters the vocabulary lacks")?;
            let train_conf = TrainConfig {
                batch_size,
                max_iters,
                eval_interval,
                eval_iters,
                learning_rate: lr,
                weight_decay,
                ..Default::default()
            };
            let data = TextDataset::new(ids, train_conf.train_fraction);
            let checkpoints = Checkpoints::create(&save_dir, &conf, &tokenizer)?;

            train(
                &mut rng,
                &dev,
                &mut m,
                &data,
                &train_conf,
                step_base,
                Some(&checkpoints),
            )?;

            let sample = generate(
                &tokenizer,
                &mut rng,
                &dev,
                &m,
                "",
                sample_tokens,
                &Default::default(),
            )?;
            println!("{sample}");
        }
        Commands::Generate {
            model,
            prompt,
            num_tokens,
            greedy,
            top_k,
            temperature,
            bench,
        } => {
            ensure!(temperature > 0.0, "temperature must be positive");
            let (m, _, tokenizer) = checkpoint::load(&dev, &model)
                .with_context(|| format!("failed to load {}", model.display()))?;

            let gen_opt = GenerateOption {
                greedy,
                top_k,
                temperature,
                verbose: true,
            };

            let start = std::time::Instant::now();
            let _ = generate(
                &tokenizer, &mut rng, &dev, &m, &prompt, num_tokens, &gen_opt,
            )?;
            if bench {
                print_metrics(start.elapsed(), num_tokens);
            } else {
                println!();
            }
        }
    }

    Ok(())
}

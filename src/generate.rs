use crate::{model::BigramModel, tokenize::CharTokenizer, Error, Result, D, E};
use dfdx::prelude::*;
use rand::Rng;
use std::io::Write;

pub struct GenerateOption {
    pub greedy: bool,
    /// Keep only the `top_k` most likely tokens; `None` samples the full distribution.
    pub top_k: Option<usize>,
    pub temperature: f32,
    pub verbose: bool,
}

impl Default for GenerateOption {
    fn default() -> Self {
        Self {
            greedy: false,
            top_k: None,
            temperature: 1.0,
            verbose: false,
        }
    }
}

/// Continues `prompt` by `gen_num` characters. An empty prompt starts from token 0.
pub fn generate<R: Rng>(
    tokenizer: &CharTokenizer,
    rng: &mut R,
    dev: &D,
    m: &BigramModel<E, D>,
    prompt: &str,
    gen_num: usize,
    opt: &GenerateOption,
) -> Result<String> {
    let mut seq = tokenizer.encode(prompt)?;
    if seq.is_empty() {
        seq.push(0);
    }

    if opt.verbose {
        print!("{}", tokenizer.decode(&seq)?);
        let _ = std::io::stdout().flush();
    }

    generate_ids(dev, m, &mut seq, gen_num, opt, rng, |id| {
        if opt.verbose {
            if let Ok(s) = tokenizer.decode(&[id]) {
                print!("{s}");
                let _ = std::io::stdout().flush();
            }
        }
    })?;

    tokenizer.decode(&seq)
}

/// Appends `gen_num` sampled ids to `seq`, calling `on_token` for each one.
pub fn generate_ids<R: Rng, F: FnMut(usize)>(
    dev: &D,
    m: &BigramModel<E, D>,
    seq: &mut Vec<usize>,
    gen_num: usize,
    opt: &GenerateOption,
    rng: &mut R,
    mut on_token: F,
) -> Result<()> {
    if seq.is_empty() {
        return Err(Error::InvalidConfig("generation needs a non-empty context".into()));
    }

    for _ in 0..gen_num {
        let context = &seq[seq.len().saturating_sub(m.block_size())..];
        let t = context.len();
        let x = dev.tensor_from_vec(context.to_vec(), (1usize, t));
        let logits = m.try_forward(x).map_err(Error::tensor)?.as_vec();
        let vocab = logits.len() / t;
        let last = &logits[(t - 1) * vocab..];

        let next_idx = if opt.greedy {
            if last.iter().any(|l| !l.is_finite()) {
                return Err(Error::NonFiniteLogits);
            }
            greedy(last)
        } else {
            sample(&probabilities(last, opt.temperature, opt.top_k)?, rng)
        };
        seq.push(next_idx);
        on_token(next_idx);
    }

    Ok(())
}

/// Softmax of `logits / temperature`, with everything outside the `top_k`
/// largest logits zeroed. Ties are broken by index, so at most `top_k`
/// entries are non-zero.
pub fn probabilities(logits: &[f32], temperature: f32, top_k: Option<usize>) -> Result<Vec<f32>> {
    if logits.iter().any(|l| !l.is_finite()) {
        return Err(Error::NonFiniteLogits);
    }
    let temperature = temperature.max(f32::EPSILON);

    let mut keep = vec![true; logits.len()];
    if let Some(k) = top_k.filter(|&k| k > 0 && k < logits.len()) {
        let mut order: Vec<usize> = (0..logits.len()).collect();
        order.sort_by(|&a, &b| logits[b].total_cmp(&logits[a]));
        for &i in &order[k..] {
            keep[i] = false;
        }
    }

    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut probs: Vec<f32> = logits
        .iter()
        .zip(&keep)
        .map(|(&l, &kept)| {
            if kept {
                ((l - max) / temperature).exp()
            } else {
                0.0
            }
        })
        .collect();
    let total: f32 = probs.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(Error::NonFiniteLogits);
    }
    probs.iter_mut().for_each(|p| *p /= total);
    Ok(probs)
}

/// Multinomial draw of one index.
pub fn sample<R: Rng>(probs: &[f32], rng: &mut R) -> usize {
    let total: f32 = probs.iter().sum();
    let target: f32 = rng.gen_range(0.0..total);
    let mut accum = 0.0;
    for (i, &p) in probs.iter().enumerate() {
        accum += p;
        if accum > target {
            return i;
        }
    }

    // rounding left `accum` just short of `total`; take the last live token
    probs.iter().rposition(|&p| p > 0.0).unwrap_or(0)
}

fn greedy<T: PartialOrd>(probs: &[T]) -> usize {
    probs
        .iter()
        .enumerate()
        .max_by(|x, y| x.1.partial_cmp(y.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|x| x.0)
        .unwrap_or(0)
}

pub fn print_metrics(elapsed: std::time::Duration, num_tokens_generated: usize) {
    let elapsed_s = elapsed.as_secs_f64();
    let tokens_per_s = num_tokens_generated as f64 / elapsed_s;
    let ms_per_token = 1000.0 * elapsed_s / num_tokens_generated as f64;

    println!();
    println!(
        "*Generated {} tokens in {:.3?} ({tokens_per_s:.3} tokens/s, {ms_per_token:.0} ms/token)*",
        num_tokens_generated, elapsed
    );
}

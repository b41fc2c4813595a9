use crate::{
    checkpoint::Checkpoints,
    config::TrainConfig,
    dataset::{Split, TextDataset},
    model::BigramModel,
    Error, Result, D, E,
};
use dfdx::{nn::optim::Adam, prelude::*};
use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EvalPoint {
    pub step: usize,
    pub train_loss: E,
    pub val_loss: E,
}

#[derive(Clone, Debug, Default)]
pub struct TrainReport {
    pub evals: Vec<EvalPoint>,
    /// Optimizer steps taken in total, counting those before a resume.
    pub steps_done: usize,
}

impl TrainReport {
    pub fn final_eval(&self) -> Option<&EvalPoint> {
        self.evals.last()
    }
}

/// Mean untraced loss over `eval_iters` random batches of each split.
pub fn estimate_loss<R: Rng>(
    rng: &mut R,
    dev: &D,
    m: &BigramModel<E, D>,
    data: &TextDataset,
    conf: &TrainConfig,
) -> Result<(E, E)> {
    let mut out = [0.0; 2];
    for (slot, split) in out.iter_mut().zip([Split::Train, Split::Val]) {
        let mut total: E = 0.0;
        for _ in 0..conf.eval_iters {
            let (x, y) = batch_tensors(rng, dev, m, data, split, conf.batch_size)?;
            let logits = m.try_forward(x).map_err(Error::tensor)?;
            total += cross_entropy_with_logits_loss(logits, y).array();
        }
        *slot = total / conf.eval_iters as E;
    }
    Ok((out[0], out[1]))
}

/// Runs `conf.max_iters` AdamW steps, numbering them from `step_base`.
///
/// Checkpoint `<n>.safetensors` holds the weights after `n` steps.
pub fn train<R: Rng>(
    rng: &mut R,
    dev: &D,
    m: &mut BigramModel<E, D>,
    data: &TextDataset,
    conf: &TrainConfig,
    step_base: usize,
    checkpoints: Option<&Checkpoints>,
) -> Result<TrainReport> {
    conf.validate()?;
    data.check(m.block_size())?;

    let mut grads = m.alloc_grads();
    let mut opt = Adam::new(
        &*m,
        AdamConfig {
            lr: conf.learning_rate,
            weight_decay: Some(WeightDecay::Decoupled(conf.weight_decay)),
            ..Default::default()
        },
    );

    let mut report = TrainReport {
        evals: Vec::new(),
        steps_done: step_base,
    };
    let bar = ProgressBar::new(conf.max_iters as u64);
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}") {
        bar.set_style(style);
    }

    for iter in 0..conf.max_iters {
        let step = step_base + iter;

        if iter % conf.eval_interval == 0 {
            let point = evaluate(rng, dev, m, data, conf, step)?;
            bar.suspend(|| log_eval(&point));
            report.evals.push(point);
            // the weights at `step_base` are already on disk
            if let Some(checkpoints) = checkpoints.filter(|_| iter > 0) {
                bar.suspend(|| checkpoints.save(m, step))?;
            }
        }

        let (x, y) = batch_tensors(rng, dev, m, data, Split::Train, conf.batch_size)?;
        let logits = m.try_forward_mut(x.traced(grads)).map_err(Error::tensor)?;
        let loss = cross_entropy_with_logits_loss(logits, y);
        bar.set_message(format!("loss {:.4}", loss.array()));

        grads = loss.backward();
        opt.update(m, &grads).map_err(Error::tensor)?;
        m.zero_grads(&mut grads);

        bar.inc(1);
        report.steps_done = step + 1;
    }
    bar.finish_and_clear();

    let point = evaluate(rng, dev, m, data, conf, report.steps_done)?;
    log_eval(&point);
    report.evals.push(point);
    if let Some(checkpoints) = checkpoints {
        checkpoints.save(m, report.steps_done)?;
    }

    Ok(report)
}

fn log_eval(point: &EvalPoint) {
    info!(
        "Step {}: train loss {:.4}, val loss {:.4}",
        point.step, point.train_loss, point.val_loss
    );
}

fn evaluate<R: Rng>(
    rng: &mut R,
    dev: &D,
    m: &BigramModel<E, D>,
    data: &TextDataset,
    conf: &TrainConfig,
    step: usize,
) -> Result<EvalPoint> {
    let (train_loss, val_loss) = estimate_loss(rng, dev, m, data, conf)?;
    Ok(EvalPoint {
        step,
        train_loss,
        val_loss,
    })
}

fn batch_tensors<R: Rng>(
    rng: &mut R,
    dev: &D,
    m: &BigramModel<E, D>,
    data: &TextDataset,
    split: Split,
    batch_size: usize,
) -> Result<(
    Tensor<(usize, usize), usize, D>,
    Tensor<(usize, usize, usize), E, D>,
)> {
    let block_size = m.block_size();
    let vocab = m.vocab();
    let batch = data.sample_batch(split, batch_size, block_size, rng)?;
    let targets = batch.one_hot_targets(vocab);
    Ok((
        dev.tensor_from_vec(batch.inputs, (batch_size, block_size)),
        dev.tensor_from_vec(targets, (batch_size, block_size, vocab)),
    ))
}

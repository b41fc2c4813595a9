use char_gpt::{config::ModelConfig, model::BigramModel, D, E};
use dfdx::prelude::*;

fn small_model(dev: &D) -> BigramModel<E, D> {
    ModelConfig {
        vocab: 11,
        block_size: 6,
        n_embd: 16,
        head_size: 8,
    }
    .build(dev)
}

fn logits(dev: &D, m: &BigramModel<E, D>, batch: usize, ids: Vec<usize>) -> Vec<E> {
    let seq = ids.len() / batch;
    m.forward(dev.tensor_from_vec(ids, (batch, seq))).as_vec()
}

#[test]
#[should_panic(expected = "longer than block size")]
fn context_longer_than_block_size_panics() {
    let dev = D::seed_from_u64(0);
    let m = small_model(&dev);
    let _ = logits(&dev, &m, 1, vec![0, 1, 2, 3, 4, 5, 6]);
}

#[test]
fn attention_projections_are_plain_matmuls() {
    let dev = D::seed_from_u64(0);
    let m = small_model(&dev);
    for proj in [&m.attention.key, &m.attention.query, &m.attention.value] {
        assert_eq!(*proj.weight.shape(), (8, 16));
    }
}

#[test]
fn logits_have_one_row_per_position() {
    let dev = D::seed_from_u64(0);
    let m = small_model(&dev);
    let x = dev.tensor_from_vec(vec![1usize, 2, 3, 4, 5, 6, 7, 8], (2usize, 4usize));
    let y = m.forward(x);
    assert_eq!(*y.shape(), (2, 4, 11));
}

#[test]
fn positions_do_not_see_the_future() {
    let dev = D::seed_from_u64(1);
    let m = small_model(&dev);

    let a = logits(&dev, &m, 1, vec![3, 1, 4, 1, 5, 9]);
    let b = logits(&dev, &m, 1, vec![3, 1, 4, 2, 6, 5]);

    // first three positions share their prefix
    for (x, y) in a[..3 * 11].iter().zip(&b[..3 * 11]) {
        assert!((x - y).abs() < 1e-5, "{x} != {y}");
    }
    assert!(a[3 * 11..]
        .iter()
        .zip(&b[3 * 11..])
        .any(|(x, y)| (x - y).abs() > 1e-6));
}

#[test]
fn shorter_context_than_block_size() {
    let dev = D::seed_from_u64(2);
    let m = small_model(&dev);
    let full = logits(&dev, &m, 1, vec![7, 8, 9]);
    let one = logits(&dev, &m, 1, vec![7]);
    for (x, y) in one.iter().zip(&full[..11]) {
        assert!((x - y).abs() < 1e-5);
    }
}

#[test]
fn one_step_lowers_the_loss_on_its_batch() {
    let dev = D::seed_from_u64(3);
    let mut m = small_model(&dev);
    let mut grads = m.alloc_grads();
    let mut opt = dfdx::nn::optim::Adam::new(
        &m,
        AdamConfig {
            lr: 1e-2,
            ..Default::default()
        },
    );

    let x: Tensor<(usize, usize), usize, D> =
        dev.tensor_from_vec(vec![0usize, 1, 2, 3, 4, 5], (1, 6));
    let mut targets = vec![0.0; 6 * 11];
    for (t, next) in [1, 2, 3, 4, 5, 6].into_iter().enumerate() {
        targets[t * 11 + next] = 1.0;
    }
    let y: Tensor<(usize, usize, usize), E, D> = dev.tensor_from_vec(targets, (1, 6, 11));

    let before = cross_entropy_with_logits_loss(m.forward(x.clone()), y.clone()).array();
    for _ in 0..20 {
        let logits = m.forward_mut(x.clone().traced(grads));
        let loss = cross_entropy_with_logits_loss(logits, y.clone());
        grads = loss.backward();
        opt.update(&mut m, &grads).unwrap();
        m.zero_grads(&mut grads);
    }
    let after = cross_entropy_with_logits_loss(m.forward(x), y).array();
    assert!(after < before, "{after} >= {before}");
}

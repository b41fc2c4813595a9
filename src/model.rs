use dfdx::prelude::*;

/// Builds an [`AttentionHead`].
#[derive(Clone, Copy, Debug)]
pub struct AttentionHeadConfig {
    pub n_embd: usize,
    pub head_size: usize,
}

impl<E: Dtype, D: Device<E>> BuildOnDevice<E, D> for AttentionHeadConfig {
    type Built = AttentionHead<E, D>;

    fn try_build_on_device(&self, dev: &D) -> Result<Self::Built, dfdx_core::tensor::Error> {
        let proj = MatMulConfig {
            inp: self.n_embd,
            out: self.head_size,
        };
        Ok(AttentionHead {
            key: proj.try_build_on_device(dev)?,
            query: proj.try_build_on_device(dev)?,
            value: proj.try_build_on_device(dev)?,
            head_size: self.head_size,
        })
    }
}

/// One causal self-attention head. The projections carry no bias.
#[derive(Clone, Debug, ZeroGrads, UpdateParams, ResetParams, SaveSafeTensors, LoadSafeTensors)]
pub struct AttentionHead<E: Dtype, D: Device<E>> {
    #[module]
    #[serialize]
    pub key: MatMul<usize, usize, E, D>,
    #[module]
    #[serialize]
    pub query: MatMul<usize, usize, E, D>,
    #[module]
    #[serialize]
    pub value: MatMul<usize, usize, E, D>,
    head_size: usize,
}

impl<E, D: Device<E>, T: Tape<E, D>> Module<Tensor<(usize, usize, usize), E, D, T>>
    for AttentionHead<E, D>
where
    E: Dtype + num_traits::Float,
{
    type Output = Tensor<(usize, usize, usize), E, D, T>;

    fn try_forward(
        &self,
        x: Tensor<(usize, usize, usize), E, D, T>,
    ) -> Result<Self::Output, dfdx_core::tensor::Error> {
        let dev = x.dev().clone();
        let (batch, seq, _) = *x.shape();

        // the tape hops from projection to projection so that every op lands on it
        let (x, tape) = x.split_tape();
        let (k, tape) = self.key.try_forward(x.clone().put_tape(tape))?.split_tape();
        let (v, tape) = self.value.try_forward(x.clone().put_tape(tape))?.split_tape();
        let q = self.query.try_forward(x.put_tape(tape))?;

        let scale = (self.head_size as f32).sqrt().recip();
        let att = q.try_matmul(k.try_permute::<_, Axes3<0, 2, 1>>()?)? * scale;

        let mask = dev.upper_tri_like(&(seq, seq), <E as num_traits::Float>::min_value(), 1);
        let att = att + mask.broadcast_like::<_, Axis<0>>(&(batch, seq, seq));
        let att = att.try_softmax::<Axis<2>>()?;

        att.try_matmul(v)
    }
}

/// Builds a [`BigramModel`].
#[derive(Clone, Copy, Debug)]
pub struct BigramConfig {
    pub vocab: usize,
    pub block_size: usize,
    pub n_embd: usize,
    pub head_size: usize,
}

impl<E: Dtype, D: Device<E>> BuildOnDevice<E, D> for BigramConfig {
    type Built = BigramModel<E, D>;

    fn try_build_on_device(&self, dev: &D) -> Result<Self::Built, dfdx_core::tensor::Error> {
        Ok(BigramModel {
            token_embedding: EmbeddingConfig {
                vocab: self.vocab,
                model: self.n_embd,
            }
            .try_build_on_device(dev)?,
            position_embedding: EmbeddingConfig {
                vocab: self.block_size,
                model: self.n_embd,
            }
            .try_build_on_device(dev)?,
            attention: AttentionHeadConfig {
                n_embd: self.n_embd,
                head_size: self.head_size,
            }
            .try_build_on_device(dev)?,
            lm_header: LinearConfig {
                inp: self.head_size,
                out: self.vocab,
            }
            .try_build_on_device(dev)?,
            vocab: self.vocab,
            block_size: self.block_size,
            n_embd: self.n_embd,
        })
    }
}

/// Token and position embeddings, one attention head, and a projection back
/// onto the vocabulary.
#[derive(Clone, Debug, ZeroGrads, UpdateParams, ResetParams, SaveSafeTensors, LoadSafeTensors)]
pub struct BigramModel<E: Dtype, D: Device<E>> {
    #[module]
    #[serialize]
    pub token_embedding: Embedding<usize, usize, E, D>,
    #[module]
    #[serialize]
    pub position_embedding: Embedding<usize, usize, E, D>,
    #[module]
    #[serialize]
    pub attention: AttentionHead<E, D>,
    #[module]
    #[serialize]
    pub lm_header: Linear<usize, usize, E, D>,
    vocab: usize,
    block_size: usize,
    n_embd: usize,
}

impl<E: Dtype, D: Device<E>> BigramModel<E, D> {
    pub fn vocab(&self) -> usize {
        self.vocab
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }
}

/// `(batch, time)` token ids to `(batch, time, vocab)` logits.
///
/// # Panics
///
/// When `time` exceeds the block size; callers crop the context first.
impl<E, D: Device<E>, T: Tape<E, D>> Module<Tensor<(usize, usize), usize, D, T>>
    for BigramModel<E, D>
where
    E: Dtype + num_traits::Float,
{
    type Output = Tensor<(usize, usize, usize), E, D, T>;

    fn try_forward(
        &self,
        idx: Tensor<(usize, usize), usize, D, T>,
    ) -> Result<Self::Output, dfdx_core::tensor::Error> {
        let (batch, seq) = *idx.shape();
        assert!(
            seq <= self.block_size,
            "context of {seq} tokens is longer than block size {}",
            self.block_size
        );
        let (idx, tape) = idx.split_tape();

        let pos = idx.dev().tensor_from_vec((0..seq).collect::<Vec<usize>>(), (seq,));
        let (pos, tape) = self
            .position_embedding
            .try_forward(pos.put_tape(tape))?
            .split_tape();
        let tok = self.token_embedding.try_forward(idx.put_tape(tape))?;

        let x = tok + pos.broadcast_like::<_, Axis<0>>(&(batch, seq, self.n_embd));
        let x = self.attention.try_forward(x)?;
        self.lm_header.try_forward(x)
    }
}

//! The message-passing network and its per-atom readout heads.
//!
//! The forward path is: one-hot species rows through a linear embedding, a
//! shared two-layer update applied for a fixed number of rounds (each round
//! consumes the current node state concatenated with the adjacency-summed
//! neighbor states), then two independent two-layer heads mapping the final
//! node state to electronegativity and hardness. The hardness head ends in a
//! softplus with a small floor so the downstream solver can always divide.

use super::dense::Dense;
use crate::batch::GraphBatch;
use crate::config::{Activation, Hyperparameters, NetworkConfig};
use crate::error::QeqNetError;
use faer::Mat;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Lower bound on the emitted hardness. Keeps the solver's divisor away from
/// zero even when the softplus saturates toward its asymptote.
pub const HARDNESS_FLOOR: f64 = 1e-3;

/// Numerically stable `ln(1 + e^z)`.
#[inline]
fn softplus(z: f64) -> f64 {
    if z > 30.0 { z } else { z.exp().ln_1p() }
}

#[inline]
fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn map_mat(m: &Mat<f64>, f: impl Fn(f64) -> f64) -> Mat<f64> {
    Mat::from_fn(m.nrows(), m.ncols(), |i, j| f(m[(i, j)]))
}

/// All trainable layers of the network.
///
/// The same struct doubles as the gradient and optimizer-moment container via
/// `zeros_like`, so every consumer walks the tensors in the same order.
#[derive(Debug, Clone)]
pub struct GnParams {
    /// One-hot species rows to the initial node state.
    pub embed: Dense,
    /// First layer of the shared update, `(2 · node_dim, update_units)`.
    pub update_hidden: Dense,
    /// Second layer of the shared update, back to `node_dim`.
    pub update_out: Dense,
    /// Hidden layer of the electronegativity head.
    pub head_e0: Dense,
    /// Output layer of the electronegativity head.
    pub head_e1: Dense,
    /// Hidden layer of the hardness head.
    pub head_s0: Dense,
    /// Output layer of the hardness head (pre-softplus).
    pub head_s1: Dense,
}

impl GnParams {
    /// Random initialization of every layer.
    pub fn init(config: &NetworkConfig, rng: &mut StdRng) -> Self {
        GnParams {
            embed: Dense::init(config.species, config.node_dim, rng),
            update_hidden: Dense::init(2 * config.node_dim, config.update_units, rng),
            update_out: Dense::init(config.update_units, config.node_dim, rng),
            head_e0: Dense::init(config.node_dim, config.head_units, rng),
            head_e1: Dense::init(config.head_units, 1, rng),
            head_s0: Dense::init(config.node_dim, config.head_units, rng),
            head_s1: Dense::init(config.head_units, 1, rng),
        }
    }

    /// An all-zero parameter set with the same shapes.
    pub fn zeros_like(config: &NetworkConfig) -> Self {
        GnParams {
            embed: Dense::zeros(config.species, config.node_dim),
            update_hidden: Dense::zeros(2 * config.node_dim, config.update_units),
            update_out: Dense::zeros(config.update_units, config.node_dim),
            head_e0: Dense::zeros(config.node_dim, config.head_units),
            head_e1: Dense::zeros(config.head_units, 1),
            head_s0: Dense::zeros(config.node_dim, config.head_units),
            head_s1: Dense::zeros(config.head_units, 1),
        }
    }

    /// Total number of trainable scalars.
    pub fn parameter_count(&self) -> usize {
        self.embed.parameter_count()
            + self.update_hidden.parameter_count()
            + self.update_out.parameter_count()
            + self.head_e0.parameter_count()
            + self.head_e1.parameter_count()
            + self.head_s0.parameter_count()
            + self.head_s1.parameter_count()
    }
}

/// Every intermediate the backward pass needs, recorded by `forward`.
///
/// `node_states[r]` is the state entering round `r`; the last entry is the
/// state consumed by the heads. The per-round vectors are indexed by round.
pub struct ForwardCache {
    one_hot: Mat<f64>,
    node_states: Vec<Mat<f64>>,
    concats: Vec<Mat<f64>>,
    update_pre: Vec<Mat<f64>>,
    update_hidden: Vec<Mat<f64>>,
    head_e_pre: Mat<f64>,
    head_e_hidden: Mat<f64>,
    head_s_pre: Mat<f64>,
    head_s_hidden: Mat<f64>,
    hardness_pre: Mat<f64>,
}

/// The graph network: configuration plus parameters.
pub struct GraphNetwork {
    config: NetworkConfig,
    activation: Activation,
    params: GnParams,
}

impl GraphNetwork {
    /// Builds a freshly initialized network from the hyperparameters.
    ///
    /// Initialization draws from a `StdRng` seeded with the configured seed,
    /// so two networks built from the same hyperparameters are identical.
    pub fn new(hyperparameters: &Hyperparameters) -> Self {
        let mut rng = StdRng::seed_from_u64(hyperparameters.training.seed);
        let config = hyperparameters.network.clone();
        let params = GnParams::init(&config, &mut rng);
        GraphNetwork {
            activation: config.activation,
            config,
            params,
        }
    }

    /// The architecture this network was built with.
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Read access to the parameters.
    pub fn params(&self) -> &GnParams {
        &self.params
    }

    /// Mutable access to the parameters (used by the optimizer).
    pub fn params_mut(&mut self) -> &mut GnParams {
        &mut self.params
    }

    /// Number of trainable scalars.
    pub fn parameter_count(&self) -> usize {
        self.params.parameter_count()
    }

    /// Runs the network over every atom row of the batch.
    ///
    /// Returns per-atom electronegativity and hardness in the full (untrimmed)
    /// row layout — output length always equals the batch's atom-row count —
    /// together with the cache consumed by `backward`. The hardness vector is
    /// strictly positive by construction.
    ///
    /// # Errors
    ///
    /// Returns `QeqNetError::ShapeMismatch` if an atom's species index falls
    /// outside the configured vocabulary.
    pub fn forward(
        &self,
        batch: &GraphBatch,
    ) -> Result<(Vec<f64>, Vec<f64>, ForwardCache), QeqNetError> {
        let n = batch.atom_rows();
        let rounds = self.config.message_rounds;
        let node_dim = self.config.node_dim;
        let act = self.activation;

        for (row, &species) in batch.atom_types.iter().enumerate() {
            if species >= self.config.species {
                return Err(QeqNetError::ShapeMismatch {
                    context: format!("species index of atom row {}", row),
                    expected: self.config.species,
                    found: species,
                });
            }
        }

        let one_hot = Mat::from_fn(n, self.config.species, |i, j| {
            if batch.atom_types[i] == j { 1.0 } else { 0.0 }
        });

        let mut node_states = vec![self.params.embed.forward(&one_hot)];
        let mut concats = Vec::with_capacity(rounds);
        let mut update_pre = Vec::with_capacity(rounds);
        let mut update_hidden = Vec::with_capacity(rounds);

        for _ in 0..rounds {
            let state = node_states.last().expect("at least the embedding state");
            let messages = batch.adjacency.as_ref() * state.as_ref();
            let concat = Mat::from_fn(n, 2 * node_dim, |i, j| {
                if j < node_dim {
                    state[(i, j)]
                } else {
                    messages[(i, j - node_dim)]
                }
            });
            let pre = self.params.update_hidden.forward(&concat);
            let hidden = map_mat(&pre, |z| act.apply(z));
            let next = self.params.update_out.forward(&hidden);

            concats.push(concat);
            update_pre.push(pre);
            update_hidden.push(hidden);
            node_states.push(next);
        }

        let final_state = node_states.last().expect("final node state");

        let head_e_pre = self.params.head_e0.forward(final_state);
        let head_e_hidden = map_mat(&head_e_pre, |z| act.apply(z));
        let e_out = self.params.head_e1.forward(&head_e_hidden);

        let head_s_pre = self.params.head_s0.forward(final_state);
        let head_s_hidden = map_mat(&head_s_pre, |z| act.apply(z));
        let hardness_pre = self.params.head_s1.forward(&head_s_hidden);

        let electronegativity: Vec<f64> = (0..n).map(|i| e_out[(i, 0)]).collect();
        let hardness: Vec<f64> = (0..n)
            .map(|i| softplus(hardness_pre[(i, 0)]) + HARDNESS_FLOOR)
            .collect();

        let cache = ForwardCache {
            one_hot,
            node_states,
            concats,
            update_pre,
            update_hidden,
            head_e_pre,
            head_e_hidden,
            head_s_pre,
            head_s_hidden,
            hardness_pre,
        };

        Ok((electronegativity, hardness, cache))
    }

    /// Hand-written reverse pass.
    ///
    /// Consumes the cache from `forward` plus the loss gradients with respect
    /// to the emitted electronegativity and hardness (full row layout), and
    /// returns the gradient for every parameter. The shared update layers
    /// accumulate their contributions across rounds.
    pub fn backward(
        &self,
        batch: &GraphBatch,
        cache: &ForwardCache,
        d_electronegativity: &[f64],
        d_hardness: &[f64],
    ) -> GnParams {
        let n = cache.one_hot.nrows();
        let rounds = self.config.message_rounds;
        let node_dim = self.config.node_dim;
        let act = self.activation;

        let mut grads = GnParams::zeros_like(&self.config);

        // Hardness head: softplus' = sigmoid.
        let d_hardness_pre = Mat::from_fn(n, 1, |i, _| {
            d_hardness[i] * sigmoid(cache.hardness_pre[(i, 0)])
        });
        let d_head_s_hidden =
            self.params
                .head_s1
                .backward(&cache.head_s_hidden, &d_hardness_pre, &mut grads.head_s1);
        let d_head_s_pre = Mat::from_fn(n, self.config.head_units, |i, j| {
            d_head_s_hidden[(i, j)] * act.derivative(cache.head_s_pre[(i, j)])
        });
        let final_state = cache.node_states.last().expect("final node state");
        let d_final_from_s =
            self.params
                .head_s0
                .backward(final_state, &d_head_s_pre, &mut grads.head_s0);

        // Electronegativity head.
        let d_e_out = Mat::from_fn(n, 1, |i, _| d_electronegativity[i]);
        let d_head_e_hidden =
            self.params
                .head_e1
                .backward(&cache.head_e_hidden, &d_e_out, &mut grads.head_e1);
        let d_head_e_pre = Mat::from_fn(n, self.config.head_units, |i, j| {
            d_head_e_hidden[(i, j)] * act.derivative(cache.head_e_pre[(i, j)])
        });
        let d_final_from_e =
            self.params
                .head_e0
                .backward(final_state, &d_head_e_pre, &mut grads.head_e0);

        let mut d_state = Mat::from_fn(n, node_dim, |i, j| {
            d_final_from_s[(i, j)] + d_final_from_e[(i, j)]
        });

        // Rounds in reverse; the adjacency is symmetric, so the transpose in
        // the message backward is the adjacency itself.
        for r in (0..rounds).rev() {
            let d_hidden = self.params.update_out.backward(
                &cache.update_hidden[r],
                &d_state,
                &mut grads.update_out,
            );
            let d_pre = Mat::from_fn(n, self.config.update_units, |i, j| {
                d_hidden[(i, j)] * act.derivative(cache.update_pre[r][(i, j)])
            });
            let d_concat = self.params.update_hidden.backward(
                &cache.concats[r],
                &d_pre,
                &mut grads.update_hidden,
            );

            let d_messages = Mat::from_fn(n, node_dim, |i, j| d_concat[(i, node_dim + j)]);
            let d_from_messages = batch.adjacency.as_ref() * d_messages.as_ref();
            d_state = Mat::from_fn(n, node_dim, |i, j| {
                d_concat[(i, j)] + d_from_messages[(i, j)]
            });
        }

        self.params
            .embed
            .backward(&cache.one_hot, &d_state, &mut grads.embed);

        grads
    }
}

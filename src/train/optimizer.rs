//! Adam optimizer over the network's parameter tensors.
//!
//! Moment buffers reuse `GnParams` as their container so they are shaped
//! exactly like the parameters and walked in the same order. Bias correction
//! uses precomputed inverses shared by every tensor of a step.

use crate::config::NetworkConfig;
use crate::net::{Dense, GnParams};

/// Adam hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdamConfig {
    /// Exponential decay of the first moment.
    pub beta1: f64,
    /// Exponential decay of the second moment.
    pub beta2: f64,
    /// Denominator offset guarding against division by a vanishing second moment.
    pub epsilon: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        AdamConfig {
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

/// Adam state: configuration, both moment sets and the update counter.
pub struct Adam {
    config: AdamConfig,
    first_moment: GnParams,
    second_moment: GnParams,
    updates: u64,
}

/// One Adam step on a single layer's weight and bias.
fn step_dense(
    config: &AdamConfig,
    bc1_inv: f64,
    bc2_inv: f64,
    learning_rate: f64,
    params: &mut Dense,
    grads: &Dense,
    m: &mut Dense,
    v: &mut Dense,
) {
    let mut apply = |p: &mut f64, g: f64, m: &mut f64, v: &mut f64| {
        *m = config.beta1 * *m + (1.0 - config.beta1) * g;
        *v = config.beta2 * *v + (1.0 - config.beta2) * g * g;
        let m_hat = *m * bc1_inv;
        let v_hat = *v * bc2_inv;
        *p -= learning_rate * m_hat / (v_hat.sqrt() + config.epsilon);
    };

    for i in 0..params.weight.nrows() {
        for j in 0..params.weight.ncols() {
            apply(
                &mut params.weight[(i, j)],
                grads.weight[(i, j)],
                &mut m.weight[(i, j)],
                &mut v.weight[(i, j)],
            );
        }
    }
    for j in 0..params.bias.nrows() {
        apply(
            &mut params.bias[j],
            grads.bias[j],
            &mut m.bias[j],
            &mut v.bias[j],
        );
    }
}

impl Adam {
    /// Creates zeroed optimizer state for a network of the given architecture.
    pub fn new(network: &NetworkConfig, config: AdamConfig) -> Self {
        Adam {
            config,
            first_moment: GnParams::zeros_like(network),
            second_moment: GnParams::zeros_like(network),
            updates: 0,
        }
    }

    /// Number of steps taken so far.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Applies one update to every parameter tensor.
    pub fn step(&mut self, params: &mut GnParams, grads: &GnParams, learning_rate: f64) {
        self.updates += 1;
        let t = self.updates as f64;
        let bc1_inv = 1.0 / (1.0 - self.config.beta1.powf(t));
        let bc2_inv = 1.0 / (1.0 - self.config.beta2.powf(t));

        let c = &self.config;
        step_dense(c, bc1_inv, bc2_inv, learning_rate,
            &mut params.embed, &grads.embed,
            &mut self.first_moment.embed, &mut self.second_moment.embed);
        step_dense(c, bc1_inv, bc2_inv, learning_rate,
            &mut params.update_hidden, &grads.update_hidden,
            &mut self.first_moment.update_hidden, &mut self.second_moment.update_hidden);
        step_dense(c, bc1_inv, bc2_inv, learning_rate,
            &mut params.update_out, &grads.update_out,
            &mut self.first_moment.update_out, &mut self.second_moment.update_out);
        step_dense(c, bc1_inv, bc2_inv, learning_rate,
            &mut params.head_e0, &grads.head_e0,
            &mut self.first_moment.head_e0, &mut self.second_moment.head_e0);
        step_dense(c, bc1_inv, bc2_inv, learning_rate,
            &mut params.head_e1, &grads.head_e1,
            &mut self.first_moment.head_e1, &mut self.second_moment.head_e1);
        step_dense(c, bc1_inv, bc2_inv, learning_rate,
            &mut params.head_s0, &grads.head_s0,
            &mut self.first_moment.head_s0, &mut self.second_moment.head_s0);
        step_dense(c, bc1_inv, bc2_inv, learning_rate,
            &mut params.head_s1, &grads.head_s1,
            &mut self.first_moment.head_s1, &mut self.second_moment.head_s1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn test_config() -> NetworkConfig {
        NetworkConfig {
            species: 3,
            node_dim: 4,
            message_rounds: 1,
            update_units: 4,
            head_units: 4,
            activation: crate::config::Activation::Sigmoid,
        }
    }

    #[test]
    fn test_step_moves_parameters() {
        let cfg = test_config();
        let mut rng = StdRng::seed_from_u64(3);
        let mut params = GnParams::init(&cfg, &mut rng);
        let mut grads = GnParams::zeros_like(&cfg);
        grads.embed.weight[(0, 0)] = 1.0;

        let before = params.embed.weight[(0, 0)];
        let untouched = params.embed.weight[(1, 1)];
        let mut opt = Adam::new(&cfg, AdamConfig::default());
        opt.step(&mut params, &grads, 1e-2);

        assert!((params.embed.weight[(0, 0)] - before).abs() > 1e-10);
        assert_eq!(params.embed.weight[(1, 1)], untouched);
        assert_eq!(opt.updates(), 1);
    }

    #[test]
    fn test_constant_gradient_descends() {
        let cfg = test_config();
        let mut rng = StdRng::seed_from_u64(4);
        let mut params = GnParams::init(&cfg, &mut rng);
        let mut grads = GnParams::zeros_like(&cfg);
        grads.head_e1.bias[0] = 1.0;

        let initial = params.head_e1.bias[0];
        let mut opt = Adam::new(&cfg, AdamConfig::default());
        for _ in 0..100 {
            opt.step(&mut params, &grads, 1e-2);
        }
        assert!(
            params.head_e1.bias[0] < initial,
            "a constant positive gradient should push the parameter down"
        );
    }
}

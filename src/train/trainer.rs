//! The training context: network, optimizer and the per-batch chain.
//!
//! One `Trainer` is constructed per run and owns all mutable state; there are
//! no process-wide globals. Each training batch runs the full differentiable
//! chain — network forward, total-charge aggregation, trimmed gather, batched
//! equilibration, mean-squared error — and then replays it in reverse through
//! the hand-written gradients before taking an Adam step.

use super::metrics::{mean_squared_error, r_squared};
use super::optimizer::{Adam, AdamConfig};
use crate::batch::{GraphBatch, total_per_molecule};
use crate::config::Hyperparameters;
use crate::error::QeqNetError;
use crate::net::{GnParams, GraphNetwork};
use crate::solver::{equilibrate_batch, equilibrate_batch_vjp};
use crate::types::EvaluationReport;

/// Owns the network and optimizer for one training run.
pub struct Trainer {
    config: Hyperparameters,
    network: GraphNetwork,
    optimizer: Adam,
}

impl Trainer {
    /// Builds a trainer with a freshly initialized network.
    pub fn new(config: &Hyperparameters) -> Self {
        let network = GraphNetwork::new(config);
        let optimizer = Adam::new(&config.network, AdamConfig::default());
        Trainer {
            config: config.clone(),
            network,
            optimizer,
        }
    }

    /// The network being trained.
    pub fn network(&self) -> &GraphNetwork {
        &self.network
    }

    /// Mutable access to the network (gradient-check harnesses perturb
    /// parameters through this).
    pub fn network_mut(&mut self) -> &mut GraphNetwork {
        &mut self.network
    }

    /// Runs the forward chain on one batch without touching any state.
    ///
    /// Returns the trimmed-layout reference charges and predictions, aligned
    /// pairwise.
    pub fn forward_batch(&self, batch: &GraphBatch) -> Result<(Vec<f64>, Vec<f64>), QeqNetError> {
        batch.validate()?;

        let trimmed = batch.atom_in_mol.trim();
        let totals = total_per_molecule(&batch.ref_charges, &batch.atom_in_mol)?;

        let (e_full, s_full, _) = self.network.forward(batch)?;
        let e = trimmed.gather(&e_full)?;
        let s = trimmed.gather(&s_full)?;
        let q_ref = trimmed.gather(&batch.ref_charges)?;

        let q_hat = equilibrate_batch(&e, &s, &totals, &trimmed)?;
        Ok((q_ref, q_hat))
    }

    /// Computes the batch loss and the gradient of every parameter.
    ///
    /// This is the full differentiable chain of one training step, without
    /// the optimizer update — exposed separately so gradient checks can run
    /// it against finite differences.
    pub fn loss_and_gradients(
        &self,
        batch: &GraphBatch,
    ) -> Result<(f64, GnParams), QeqNetError> {
        batch.validate()?;

        let trimmed = batch.atom_in_mol.trim();
        let totals = total_per_molecule(&batch.ref_charges, &batch.atom_in_mol)?;

        let (e_full, s_full, cache) = self.network.forward(batch)?;
        let e = trimmed.gather(&e_full)?;
        let s = trimmed.gather(&s_full)?;
        let q_ref = trimmed.gather(&batch.ref_charges)?;

        let q_hat = equilibrate_batch(&e, &s, &totals, &trimmed)?;
        let loss = mean_squared_error(&q_ref, &q_hat);

        let count = q_hat.len() as f64;
        let upstream: Vec<f64> = q_hat
            .iter()
            .zip(&q_ref)
            .map(|(&predicted, &reference)| 2.0 * (predicted - reference) / count)
            .collect();

        let (de_trimmed, ds_trimmed) = equilibrate_batch_vjp(&s, &q_hat, &upstream, &trimmed)?;
        let d_electronegativity = trimmed.scatter_to_full(&de_trimmed)?;
        let d_hardness = trimmed.scatter_to_full(&ds_trimmed)?;

        let grads = self
            .network
            .backward(batch, &cache, &d_electronegativity, &d_hardness);
        Ok((loss, grads))
    }

    /// One gradient-descent step on one batch; returns the batch loss.
    pub fn train_batch(&mut self, batch: &GraphBatch) -> Result<f64, QeqNetError> {
        let (loss, grads) = self.loss_and_gradients(batch)?;
        self.optimizer.step(
            self.network.params_mut(),
            &grads,
            self.config.training.learning_rate,
        );
        Ok(loss)
    }

    /// One pass over all batches; returns the mean batch loss.
    ///
    /// Batches are processed strictly in order. Any solver or validation
    /// fault aborts the epoch — there is no retry, since re-running an
    /// algebraic fault on the same inputs cannot succeed.
    pub fn train_epoch(&mut self, batches: &[GraphBatch]) -> Result<f64, QeqNetError> {
        if batches.is_empty() {
            return Err(QeqNetError::EmptyBatch);
        }
        let mut total = 0.0;
        for (idx, batch) in batches.iter().enumerate() {
            let loss = self.train_batch(batch)?;
            log::debug!("batch {} loss {:.6e}", idx, loss);
            total += loss;
        }
        Ok(total / batches.len() as f64)
    }

    /// Evaluates the current network on held-out batches.
    ///
    /// Repeats the forward path without gradient computation, concatenates
    /// the reference and predicted charges across batches and reports global
    /// mean squared error, R² and the parameter count.
    pub fn evaluate(&self, batches: &[GraphBatch]) -> Result<EvaluationReport, QeqNetError> {
        if batches.is_empty() {
            return Err(QeqNetError::EmptyBatch);
        }

        let mut y_true = Vec::new();
        let mut y_pred = Vec::new();
        for batch in batches {
            let (q_ref, q_hat) = self.forward_batch(batch)?;
            y_true.extend(q_ref);
            y_pred.extend(q_hat);
        }

        let mse = mean_squared_error(&y_true, &y_pred);
        let r2 = r_squared(&y_true, &y_pred);
        log::info!(
            "evaluation: {} atoms, mse {:.6e}, r2 {:.4}",
            y_true.len(),
            mse,
            r2
        );

        Ok(EvaluationReport {
            y_true,
            y_pred,
            mse,
            r_squared: r2,
            parameter_count: self.network.parameter_count(),
        })
    }
}

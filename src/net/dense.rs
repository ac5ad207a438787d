//! A fully connected layer over faer matrices.

use faer::{Col, Mat};
use rand::Rng;
use rand::rngs::StdRng;

/// A dense affine layer, `y = x W + b`.
///
/// Rows of `x` are atoms; the same weights apply to every row. The layer is
/// also used as its own gradient container: `backward` accumulates `dW`/`db`
/// into a zero-initialized `Dense` of matching shape, which lets the shared
/// message-passing update sum its contributions across rounds.
#[derive(Debug, Clone)]
pub struct Dense {
    /// Weight matrix, `(input, output)`.
    pub weight: Mat<f64>,
    /// Bias, one entry per output column.
    pub bias: Col<f64>,
}

impl Dense {
    /// Glorot-style uniform initialization.
    pub fn init(input: usize, output: usize, rng: &mut StdRng) -> Self {
        let scale = (6.0 / (input + output) as f64).sqrt();
        let mut weight = Mat::zeros(input, output);
        for i in 0..input {
            for j in 0..output {
                weight[(i, j)] = rng.gen_range(-scale..scale);
            }
        }
        Dense {
            weight,
            bias: Col::zeros(output),
        }
    }

    /// An all-zero layer of the given shape, used for gradients and moments.
    pub fn zeros(input: usize, output: usize) -> Self {
        Dense {
            weight: Mat::zeros(input, output),
            bias: Col::zeros(output),
        }
    }

    /// Input width.
    pub fn input_dim(&self) -> usize {
        self.weight.nrows()
    }

    /// Output width.
    pub fn output_dim(&self) -> usize {
        self.weight.ncols()
    }

    /// Applies the layer to a row-per-atom matrix.
    pub fn forward(&self, x: &Mat<f64>) -> Mat<f64> {
        let mut y = x.as_ref() * self.weight.as_ref();
        for i in 0..y.nrows() {
            for j in 0..y.ncols() {
                y[(i, j)] += self.bias[j];
            }
        }
        y
    }

    /// Chain-rule step: accumulates `dW = xᵀ d_out` and `db = Σ_rows d_out`
    /// into `grad`, and returns `dx = d_out Wᵀ`.
    pub fn backward(&self, x: &Mat<f64>, d_out: &Mat<f64>, grad: &mut Dense) -> Mat<f64> {
        debug_assert_eq!(x.nrows(), d_out.nrows());
        debug_assert_eq!(x.ncols(), self.weight.nrows());
        debug_assert_eq!(d_out.ncols(), self.weight.ncols());

        let d_weight = x.transpose() * d_out.as_ref();
        for i in 0..grad.weight.nrows() {
            for j in 0..grad.weight.ncols() {
                grad.weight[(i, j)] += d_weight[(i, j)];
            }
        }
        for j in 0..grad.bias.nrows() {
            for i in 0..d_out.nrows() {
                grad.bias[j] += d_out[(i, j)];
            }
        }

        d_out.as_ref() * self.weight.transpose()
    }

    /// Number of trainable scalars in the layer.
    pub fn parameter_count(&self) -> usize {
        self.weight.nrows() * self.weight.ncols() + self.bias.nrows()
    }
}

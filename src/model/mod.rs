//! Recurrent cell engine
//!
//! Stacked LSTM layers with manual backpropagation through time, a dense
//! projection head, and [`SequenceModel`], which pairs a network with its own
//! Adam optimizer.

mod cell;
mod config;
mod layers;
mod network;
mod sequence;

pub use cell::{CellBackward, CellTrace, Gate, GateParams, LstmCell, StepActivations};
pub use config::{NetworkConfig, WeightInit};
pub use layers::Dense;
pub use network::{LayerState, LstmNetwork, NetworkTrace, RecurrentState};
pub use sequence::SequenceModel;

use crate::error::Result;
use crate::linalg::Window;

/// A model trained one window at a time
pub trait OnlineModel {
    /// Post-processed scalar output for `window`
    fn predict(&self, window: &[f64]) -> Result<f64>;

    /// One forward + backward + optimizer update; returns the loss
    fn train_step(&mut self, window: &[f64], target: &[f64], learning_rate: f64) -> Result<f64>;

    /// Offline training over a fixed dataset; returns the mean loss per epoch
    fn train_epochs(&mut self, dataset: &[Window], epochs: usize, learning_rate: f64) -> Result<Vec<f64>>;

    /// Underlying network, optimizer and state
    fn sequence_model(&self) -> &SequenceModel;
}

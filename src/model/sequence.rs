//! A network bundled with its optimizer and carried recurrent state
//!
//! This is the unit both the value predictor and the threshold generator are
//! built from: one forward pass, one BPTT pass and one Adam update per
//! training step.

use super::config::NetworkConfig;
use super::network::{LstmNetwork, RecurrentState};
use crate::error::{Error, Result};
use crate::linalg::{mse_loss, mse_loss_gradient, Window};
use crate::optim::{clip_value, Adam, AdamConfig, Parameters};
use ndarray::{Array1, ArrayView1};
use rand::Rng;
use tracing::{debug, trace};

/// Network + optimizer + state, fed flat windows of `lookback_len` steps
#[derive(Debug, Clone)]
pub struct SequenceModel {
    network: LstmNetwork,
    optimizer: Adam,
    state: RecurrentState,
    lookback_len: usize,
    stateful: bool,
}

impl SequenceModel {
    /// Build a freshly initialized model.
    ///
    /// # Arguments
    ///
    /// * `config` - Network shape
    /// * `lookback_len` - Time steps per window
    /// * `optimizer` - Adam hyperparameters
    /// * `stateful` - Start each window from the carried state instead of zeros
    /// * `rng` - Source for weight initialization
    pub fn new<R: Rng + ?Sized>(
        config: NetworkConfig,
        lookback_len: usize,
        optimizer: AdamConfig,
        stateful: bool,
        rng: &mut R,
    ) -> Result<Self> {
        if lookback_len == 0 {
            return Err(Error::InvalidConfiguration(
                "lookback_len must be positive".to_string(),
            ));
        }
        optimizer.validate()?;
        let network = LstmNetwork::new(config, rng)?;
        let state = network.initial_state();

        Ok(Self {
            network,
            optimizer: Adam::new(optimizer),
            state,
            lookback_len,
            stateful,
        })
    }

    pub fn network(&self) -> &LstmNetwork {
        &self.network
    }

    pub fn optimizer(&self) -> &Adam {
        &self.optimizer
    }

    /// State carried over from the last training step
    pub fn state(&self) -> &RecurrentState {
        &self.state
    }

    pub fn lookback_len(&self) -> usize {
        self.lookback_len
    }

    pub fn is_stateful(&self) -> bool {
        self.stateful
    }

    /// Expected length of a flat window
    pub fn window_len(&self) -> usize {
        self.lookback_len * self.network.config().input_size
    }

    pub fn reset_state(&mut self) {
        self.state = self.network.initial_state();
    }

    fn to_sequence(&self, window: &[f64]) -> Result<Vec<Array1<f64>>> {
        if window.len() != self.window_len() {
            return Err(Error::dimension("model window", self.window_len(), window.len()));
        }
        let input_size = self.network.config().input_size;
        Ok(window
            .chunks(input_size)
            .map(|step| Array1::from(step.to_vec()))
            .collect())
    }

    fn start_state(&self) -> RecurrentState {
        if self.stateful {
            self.state.clone()
        } else {
            self.network.initial_state()
        }
    }

    /// Head output for `window`. Does not touch parameters or state.
    pub fn forward(&self, window: &[f64]) -> Result<Array1<f64>> {
        let sequence = self.to_sequence(window)?;
        let trace = self.network.forward(&sequence, &self.start_state())?;
        Ok(trace.output().clone())
    }

    /// One forward pass, one BPTT pass and one Adam update. Returns the MSE
    /// loss measured before the update.
    pub fn train_step(&mut self, window: &[f64], target: &[f64], learning_rate: f64) -> Result<f64> {
        let sequence = self.to_sequence(window)?;
        let target = ArrayView1::from(target);
        let trace = self.network.forward(&sequence, &self.start_state())?;

        let loss = mse_loss(trace.output().view(), target)?;
        let clip = self.optimizer.config().clip_value;
        let d_output = mse_loss_gradient(trace.output().view(), target)?.mapv(|g| clip_value(g, clip));

        let mut grads = self.network.backward(&trace, d_output.view())?;
        grads.clip(clip);

        self.optimizer.ensure_initialized(&self.network);
        self.optimizer.step(&mut self.network, &grads, learning_rate)?;
        self.state = trace.final_state();

        trace!(loss, step = self.optimizer.step_count(), "train step");
        Ok(loss)
    }

    /// Train on every window `epochs` times, in order. Returns the mean loss
    /// of each epoch.
    pub fn train_epochs(&mut self, windows: &[Window], epochs: usize, learning_rate: f64) -> Result<Vec<f64>> {
        let mut history = Vec::with_capacity(epochs);
        if windows.is_empty() {
            return Ok(history);
        }

        for epoch in 0..epochs {
            let mut total = 0.0;
            for window in windows {
                total += self.train_step(&window.input, &window.target, learning_rate)?;
            }
            let mean = total / windows.len() as f64;
            debug!(epoch, loss = mean, "epoch complete");
            history.push(mean);
        }

        Ok(history)
    }
}

//! Stacked LSTM layers followed by a dense projection head

use super::cell::{CellTrace, LstmCell};
use super::config::NetworkConfig;
use super::layers::Dense;
use crate::error::{Error, Result};
use crate::optim::Parameters;
use ndarray::{Array1, ArrayView1, ArrayViewD, ArrayViewMutD};
use rand::Rng;

/// Hidden and cell state of one layer
#[derive(Debug, Clone, PartialEq)]
pub struct LayerState {
    pub hidden: Array1<f64>,
    pub cell: Array1<f64>,
}

/// Recurrent state of the whole stack, bottom layer first
#[derive(Debug, Clone, PartialEq)]
pub struct RecurrentState {
    layers: Vec<LayerState>,
}

impl RecurrentState {
    pub fn zeros(num_layers: usize, hidden_size: usize) -> Self {
        Self {
            layers: (0..num_layers)
                .map(|_| LayerState {
                    hidden: Array1::zeros(hidden_size),
                    cell: Array1::zeros(hidden_size),
                })
                .collect(),
        }
    }

    pub fn layers(&self) -> &[LayerState] {
        &self.layers
    }

    /// Hidden state of the top layer
    pub fn top_hidden(&self) -> Option<&Array1<f64>> {
        self.layers.last().map(|l| &l.hidden)
    }

    pub fn is_zero(&self) -> bool {
        self.layers
            .iter()
            .all(|l| l.hidden.iter().chain(l.cell.iter()).all(|&v| v == 0.0))
    }
}

/// Everything the backward pass needs from one forward pass
#[derive(Debug, Clone)]
pub struct NetworkTrace {
    layers: Vec<CellTrace>,
    top_hidden: Array1<f64>,
    output: Array1<f64>,
}

impl NetworkTrace {
    /// Head output for the last time step
    pub fn output(&self) -> &Array1<f64> {
        &self.output
    }

    /// State of every layer after the last time step
    pub fn final_state(&self) -> RecurrentState {
        RecurrentState {
            layers: self
                .layers
                .iter()
                .filter_map(|t| t.final_state())
                .map(|(h, c)| LayerState {
                    hidden: h.clone(),
                    cell: c.clone(),
                })
                .collect(),
        }
    }

    pub fn layer(&self, index: usize) -> Option<&CellTrace> {
        self.layers.get(index)
    }
}

/// Stacked LSTM with a projection head on the last hidden state
#[derive(Debug, Clone, PartialEq)]
pub struct LstmNetwork {
    config: NetworkConfig,
    layers: Vec<LstmCell>,
    head: Dense,
}

impl LstmNetwork {
    pub fn new<R: Rng + ?Sized>(config: NetworkConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;

        let mut layers = Vec::with_capacity(config.num_layers);
        for layer in 0..config.num_layers {
            let input_size = if layer == 0 {
                config.input_size
            } else {
                config.hidden_size
            };
            layers.push(LstmCell::new(
                input_size,
                config.hidden_size,
                config.weight_init,
                rng,
            )?);
        }
        let head = Dense::new(config.hidden_size, config.output_size, config.weight_init, rng)?;

        Ok(Self {
            config,
            layers,
            head,
        })
    }

    /// Same shape, every parameter zero
    pub fn zeros_like(&self) -> Self {
        Self {
            config: self.config.clone(),
            layers: self.layers.iter().map(LstmCell::zeros_like).collect(),
            head: self.head.zeros_like(),
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn layers(&self) -> &[LstmCell] {
        &self.layers
    }

    pub fn head(&self) -> &Dense {
        &self.head
    }

    pub fn initial_state(&self) -> RecurrentState {
        RecurrentState::zeros(self.config.num_layers, self.config.hidden_size)
    }

    /// Run `sequence` through the stack starting from `state`.
    ///
    /// Layer `l + 1` consumes the hidden states of layer `l`; the head maps
    /// the top layer's final hidden state to the output.
    pub fn forward(&self, sequence: &[Array1<f64>], state: &RecurrentState) -> Result<NetworkTrace> {
        if sequence.is_empty() {
            return Err(Error::EmptyInput("network input sequence"));
        }
        if state.layers.len() != self.layers.len() {
            return Err(Error::dimension(
                "recurrent state layers",
                self.layers.len(),
                state.layers.len(),
            ));
        }

        let mut inputs = sequence.to_vec();
        let mut traces = Vec::with_capacity(self.layers.len());
        for (cell, layer_state) in self.layers.iter().zip(&state.layers) {
            let trace = cell.forward(&inputs, layer_state.hidden.view(), layer_state.cell.view())?;
            inputs = trace.hidden_states();
            traces.push(trace);
        }

        let top_hidden = inputs
            .pop()
            .ok_or(Error::EmptyInput("network hidden states"))?;
        let output = self.head.forward(top_hidden.view())?;

        Ok(NetworkTrace {
            layers: traces,
            top_hidden,
            output,
        })
    }

    /// Gradients of the loss with respect to every parameter, given
    /// `d_output = dL/d output`.
    pub fn backward(&self, trace: &NetworkTrace, d_output: ArrayView1<f64>) -> Result<LstmNetwork> {
        if trace.layers.len() != self.layers.len() {
            return Err(Error::dimension(
                "network trace layers",
                self.layers.len(),
                trace.layers.len(),
            ));
        }

        let mut grads = self.zeros_like();
        let (head_grads, d_top) = self.head.backward(trace.top_hidden.view(), d_output)?;
        grads.head = head_grads;

        let steps = trace.layers.first().map_or(0, CellTrace::len);
        let mut dh_seq = vec![Array1::zeros(self.config.hidden_size); steps];
        if let Some(last) = dh_seq.last_mut() {
            *last = d_top;
        }

        for (index, cell) in self.layers.iter().enumerate().rev() {
            let back = cell.backward(&trace.layers[index], &dh_seq)?;
            grads.layers[index] = back.grads;
            dh_seq = back.dx;
        }

        Ok(grads)
    }
}

impl Parameters for LstmNetwork {
    fn tensors(&self) -> Vec<ArrayViewD<'_, f64>> {
        let mut tensors: Vec<_> = self.layers.iter().flat_map(|l| l.tensors()).collect();
        tensors.extend(self.head.tensors());
        tensors
    }

    fn tensors_mut(&mut self) -> Vec<ArrayViewMutD<'_, f64>> {
        let Self { layers, head, .. } = self;
        let mut tensors: Vec<_> = layers.iter_mut().flat_map(|l| l.tensors_mut()).collect();
        tensors.extend(head.tensors_mut());
        tensors
    }
}

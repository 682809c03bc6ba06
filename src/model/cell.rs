//! LSTM layer with an explicit forward trace and backpropagation through time
//!
//! Every gate owns its own input-to-gate and hidden-to-gate weights plus two
//! bias vectors. The forward pass over a window records one [`TraceStep`] per
//! time step; the backward pass walks that record in reverse, so it never has
//! to recompute an activation.

use super::config::WeightInit;
use crate::activation::{sigmoid_derivative, sigmoid_vec, tanh_derivative, tanh_vec};
use crate::error::{Error, Result};
use crate::linalg::{matrix_vector_mul, matrix_vector_mul_transpose, outer_product};
use crate::optim::Parameters;
use ndarray::{Array1, Array2, ArrayView1, ArrayViewD, ArrayViewMutD};
use rand::Rng;

/// One of the four LSTM gates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Input,
    Forget,
    Output,
    Candidate,
}

impl Gate {
    /// Storage order of the gates inside a cell
    pub const ALL: [Gate; 4] = [Gate::Input, Gate::Forget, Gate::Output, Gate::Candidate];

    fn index(self) -> usize {
        self as usize
    }
}

/// Weights and biases of a single gate
#[derive(Debug, Clone, PartialEq)]
pub struct GateParams {
    /// input -> gate, `[hidden_size][input_size]`
    pub w_ih: Array2<f64>,
    /// hidden -> gate, `[hidden_size][hidden_size]`
    pub w_hh: Array2<f64>,
    pub b_ih: Array1<f64>,
    pub b_hh: Array1<f64>,
}

impl GateParams {
    fn zeros(input_size: usize, hidden_size: usize) -> Self {
        Self {
            w_ih: Array2::zeros((hidden_size, input_size)),
            w_hh: Array2::zeros((hidden_size, hidden_size)),
            b_ih: Array1::zeros(hidden_size),
            b_hh: Array1::zeros(hidden_size),
        }
    }

    fn random<R: Rng + ?Sized>(
        input_size: usize,
        hidden_size: usize,
        init: WeightInit,
        rng: &mut R,
    ) -> Result<Self> {
        Ok(Self {
            w_ih: init.sample(hidden_size, input_size, hidden_size, rng)?,
            w_hh: init.sample(hidden_size, hidden_size, hidden_size, rng)?,
            b_ih: Array1::zeros(hidden_size),
            b_hh: Array1::zeros(hidden_size),
        })
    }

    /// `W_ih·x + W_hh·h_prev + b_ih + b_hh`
    fn preactivation(&self, x: ArrayView1<f64>, h_prev: ArrayView1<f64>) -> Result<Array1<f64>> {
        let from_input = matrix_vector_mul(self.w_ih.view(), x)?;
        let from_hidden = matrix_vector_mul(self.w_hh.view(), h_prev)?;
        Ok(from_input + from_hidden + &self.b_ih + &self.b_hh)
    }

    /// Add one time step's contribution for gate delta `d`.
    fn accumulate(&mut self, d: &Array1<f64>, x: ArrayView1<f64>, h_prev: ArrayView1<f64>) {
        self.w_ih += &outer_product(d.view(), x);
        self.w_hh += &outer_product(d.view(), h_prev);
        self.b_ih += d;
        self.b_hh += d;
    }
}

/// Gate activations and new state produced by one time step
#[derive(Debug, Clone, PartialEq)]
pub struct StepActivations {
    pub input: Array1<f64>,
    pub forget: Array1<f64>,
    pub output: Array1<f64>,
    pub candidate: Array1<f64>,
    pub cell: Array1<f64>,
    pub hidden: Array1<f64>,
}

#[derive(Debug, Clone)]
struct TraceStep {
    x: Array1<f64>,
    h_prev: Array1<f64>,
    c_prev: Array1<f64>,
    activations: StepActivations,
}

/// Forward-pass record of one window, indexed by time step
#[derive(Debug, Clone)]
pub struct CellTrace {
    steps: Vec<TraceStep>,
}

impl CellTrace {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Activations recorded at time step `t`
    pub fn step(&self, t: usize) -> Option<&StepActivations> {
        self.steps.get(t).map(|s| &s.activations)
    }

    /// Hidden state after every time step
    pub fn hidden_states(&self) -> Vec<Array1<f64>> {
        self.steps
            .iter()
            .map(|s| s.activations.hidden.clone())
            .collect()
    }

    /// `(h_final, c_final)`, `None` for an empty window
    pub fn final_state(&self) -> Option<(&Array1<f64>, &Array1<f64>)> {
        self.steps
            .last()
            .map(|s| (&s.activations.hidden, &s.activations.cell))
    }
}

/// Result of backpropagating through one window
#[derive(Debug, Clone)]
pub struct CellBackward {
    /// Parameter gradients, laid out like the cell itself
    pub grads: LstmCell,
    /// Gradient with respect to each time step's input
    pub dx: Vec<Array1<f64>>,
    /// Gradient with respect to the initial hidden state
    pub dh0: Array1<f64>,
    /// Gradient with respect to the initial cell state
    pub dc0: Array1<f64>,
}

/// A single LSTM layer
#[derive(Debug, Clone, PartialEq)]
pub struct LstmCell {
    input_size: usize,
    hidden_size: usize,
    gates: [GateParams; 4],
}

impl LstmCell {
    /// Create a randomly initialized cell.
    ///
    /// Biases start at zero except the forget gate's input bias, which starts
    /// at 1 so the cell initially keeps its memory.
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        hidden_size: usize,
        init: WeightInit,
        rng: &mut R,
    ) -> Result<Self> {
        let mut gates = [
            GateParams::random(input_size, hidden_size, init, rng)?,
            GateParams::random(input_size, hidden_size, init, rng)?,
            GateParams::random(input_size, hidden_size, init, rng)?,
            GateParams::random(input_size, hidden_size, init, rng)?,
        ];
        gates[Gate::Forget.index()].b_ih.fill(1.0);

        Ok(Self {
            input_size,
            hidden_size,
            gates,
        })
    }

    /// All-zero cell, used as a gradient accumulator
    pub fn zeros(input_size: usize, hidden_size: usize) -> Self {
        Self {
            input_size,
            hidden_size,
            gates: [
                GateParams::zeros(input_size, hidden_size),
                GateParams::zeros(input_size, hidden_size),
                GateParams::zeros(input_size, hidden_size),
                GateParams::zeros(input_size, hidden_size),
            ],
        }
    }

    pub fn zeros_like(&self) -> Self {
        Self::zeros(self.input_size, self.hidden_size)
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn gate(&self, gate: Gate) -> &GateParams {
        &self.gates[gate.index()]
    }

    pub fn gate_mut(&mut self, gate: Gate) -> &mut GateParams {
        &mut self.gates[gate.index()]
    }

    /// Zero hidden and cell state
    pub fn init_state(&self) -> (Array1<f64>, Array1<f64>) {
        (
            Array1::zeros(self.hidden_size),
            Array1::zeros(self.hidden_size),
        )
    }

    /// One time step.
    ///
    /// ```text
    /// i = σ(W_ii x + W_hi h + b)    f = σ(W_if x + W_hf h + b)
    /// o = σ(W_io x + W_ho h + b)    g = tanh(W_ig x + W_hg h + b)
    /// c' = f ⊙ c + i ⊙ g            h' = o ⊙ tanh(c')
    /// ```
    pub fn forward_step(
        &self,
        x: ArrayView1<f64>,
        h_prev: ArrayView1<f64>,
        c_prev: ArrayView1<f64>,
    ) -> Result<StepActivations> {
        if x.len() != self.input_size {
            return Err(Error::dimension("lstm step input", self.input_size, x.len()));
        }
        if h_prev.len() != self.hidden_size {
            return Err(Error::dimension("lstm hidden state", self.hidden_size, h_prev.len()));
        }
        if c_prev.len() != self.hidden_size {
            return Err(Error::dimension("lstm cell state", self.hidden_size, c_prev.len()));
        }

        let gate = |g: Gate| self.gates[g.index()].preactivation(x, h_prev);
        let input = sigmoid_vec(gate(Gate::Input)?.view());
        let forget = sigmoid_vec(gate(Gate::Forget)?.view());
        let output = sigmoid_vec(gate(Gate::Output)?.view());
        let candidate = tanh_vec(gate(Gate::Candidate)?.view());

        let cell = &forget * &c_prev + &input * &candidate;
        let hidden = &output * &tanh_vec(cell.view());

        Ok(StepActivations {
            input,
            forget,
            output,
            candidate,
            cell,
            hidden,
        })
    }

    /// Run the window through the cell starting from `(h0, c0)`.
    pub fn forward(
        &self,
        inputs: &[Array1<f64>],
        h0: ArrayView1<f64>,
        c0: ArrayView1<f64>,
    ) -> Result<CellTrace> {
        let mut steps = Vec::with_capacity(inputs.len());
        let mut h = h0.to_owned();
        let mut c = c0.to_owned();

        for x in inputs {
            let activations = self.forward_step(x.view(), h.view(), c.view())?;
            let next_h = activations.hidden.clone();
            let next_c = activations.cell.clone();
            steps.push(TraceStep {
                x: x.clone(),
                h_prev: h,
                c_prev: c,
                activations,
            });
            h = next_h;
            c = next_c;
        }

        Ok(CellTrace { steps })
    }

    /// Backpropagate through every step of `trace`.
    ///
    /// `dh_seq[t]` is the loss gradient arriving at `h_t` from outside the cell
    /// (the layer above, or the head at the last step). Gradients from all time
    /// steps are summed into the shared weights.
    pub fn backward(&self, trace: &CellTrace, dh_seq: &[Array1<f64>]) -> Result<CellBackward> {
        if dh_seq.len() != trace.len() {
            return Err(Error::dimension("bptt gradient sequence", trace.len(), dh_seq.len()));
        }

        let mut grads = self.zeros_like();
        let mut dx = vec![Array1::zeros(self.input_size); trace.len()];
        let mut dh_next = Array1::<f64>::zeros(self.hidden_size);
        let mut dc_next = Array1::<f64>::zeros(self.hidden_size);

        for t in (0..trace.len()).rev() {
            let step = &trace.steps[t];
            let a = &step.activations;
            if dh_seq[t].len() != self.hidden_size {
                return Err(Error::dimension("bptt hidden gradient", self.hidden_size, dh_seq[t].len()));
            }

            let dh = &dh_seq[t] + &dh_next;
            let tanh_c = tanh_vec(a.cell.view());

            let d_output = &dh * &tanh_c * &a.output.mapv(sigmoid_derivative);
            let dc = &dc_next + &(&dh * &a.output * &tanh_c.mapv(tanh_derivative));
            let d_input = &dc * &a.candidate * &a.input.mapv(sigmoid_derivative);
            let d_forget = &dc * &step.c_prev * &a.forget.mapv(sigmoid_derivative);
            let d_candidate = &dc * &a.input * &a.candidate.mapv(tanh_derivative);

            // same order as Gate::ALL
            let deltas = [d_input, d_forget, d_output, d_candidate];

            let mut dh_prev = Array1::<f64>::zeros(self.hidden_size);
            let mut dx_t = Array1::<f64>::zeros(self.input_size);
            for ((params, grad), delta) in self.gates.iter().zip(grads.gates.iter_mut()).zip(&deltas) {
                grad.accumulate(delta, step.x.view(), step.h_prev.view());
                dh_prev += &matrix_vector_mul_transpose(params.w_hh.view(), delta.view())?;
                dx_t += &matrix_vector_mul_transpose(params.w_ih.view(), delta.view())?;
            }

            dx[t] = dx_t;
            dh_next = dh_prev;
            dc_next = &dc * &a.forget;
        }

        Ok(CellBackward {
            grads,
            dx,
            dh0: dh_next,
            dc0: dc_next,
        })
    }
}

impl Parameters for LstmCell {
    fn tensors(&self) -> Vec<ArrayViewD<'_, f64>> {
        self.gates
            .iter()
            .flat_map(|g| {
                [
                    g.w_ih.view().into_dyn(),
                    g.w_hh.view().into_dyn(),
                    g.b_ih.view().into_dyn(),
                    g.b_hh.view().into_dyn(),
                ]
            })
            .collect()
    }

    fn tensors_mut(&mut self) -> Vec<ArrayViewMutD<'_, f64>> {
        self.gates
            .iter_mut()
            .flat_map(|g| {
                let GateParams {
                    w_ih,
                    w_hh,
                    b_ih,
                    b_hh,
                } = g;
                [
                    w_ih.view_mut().into_dyn(),
                    w_hh.view_mut().into_dyn(),
                    b_ih.view_mut().into_dyn(),
                    b_hh.view_mut().into_dyn(),
                ]
            })
            .collect()
    }
}

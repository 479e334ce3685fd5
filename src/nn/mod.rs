//! # Neural Network Layers Module
//!
//! Building blocks with explicit forward and backward passes. Every layer
//! caches what its backward pass needs during forward and exposes its
//! trainable state through [`Parameterized`].
//!
//! ## Available Layers
//!
//! ### Core Layers
//! - [`Affine`], [`MatMul`]: Fully connected projections
//! - [`TimeAffine`]: Affine applied at every time step
//! - [`Embedding`], [`TimeEmbedding`]: Row lookup tables
//! - [`EmbeddingDot`]: Per-row dot product with looked-up rows
//!
//! ### Activations
//! - [`Sigmoid`], [`ReLU`], [`Softmax`]
//!
//! ### Recurrent
//! - [`Rnn`]: Single tanh cell
//! - [`TimeRnn`]: Cell unrolled over a sequence, optionally stateful
//!
//! ### Losses
//! - [`NegativeSamplingLoss`]: Binary scoring of the target against sampled negatives

pub mod activations;
pub mod embedding;
pub mod layer;
pub mod linear;
pub mod negative_sampling;
pub mod rnn;

pub use activations::{ReLU, Sigmoid, Softmax};
pub use embedding::{Embedding, EmbeddingDot, TimeEmbedding};
pub use layer::{Layer, LossLayer, ParamSet, Parameterized};
pub use linear::{Affine, MatMul, TimeAffine};
pub use negative_sampling::NegativeSamplingLoss;
pub use rnn::{Rnn, TimeRnn};

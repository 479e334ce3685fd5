//! # Data Module
//!
//! Corpus preprocessing, mini-batch index sampling and the unigram
//! negative sampler.

pub mod corpus;
pub mod sampler;
pub mod unigram;

pub use corpus::{convert_one_hot, create_contexts_target, one_hot, preprocess, Vocabulary};
pub use sampler::{BatchSampler, RandomSampler, Sampler};
pub use unigram::{NegativeSampler, UniformSource, UnigramSampler};

//! # RustyNLP: word embeddings with hand-written backward passes
//!
//! Layers carry explicit `forward`/`backward` implementations over
//! `ndarray` matrices. Models compose them, and the [`trainer::Trainer`]
//! drives mini-batch optimisation. Weights that several layers share
//! (all CBOW context slots read one input embedding) are `Arc`s, so the
//! trainer can recognise the aliases and update each tensor exactly once.
//!
//! ## Usage Example
//!
//! ```no_run
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use rustynlp::data::{create_contexts_target, preprocess};
//! use rustynlp::metrics::most_similar;
//! use rustynlp::models::Cbow;
//! use rustynlp::optimizers::Adam;
//! use rustynlp::trainer::Trainer;
//!
//! let (corpus, vocab) = preprocess("You say goodbye and I say hello.");
//! let (contexts, target) = create_contexts_target(&corpus, 1)?;
//!
//! let mut rng = StdRng::seed_from_u64(0);
//! let model = Cbow::with_sampling(vocab.len(), 5, 1, &corpus, 2, 0.75, &mut rng)?;
//! let mut trainer = Trainer::new(model, Adam::default()).seed(0);
//! trainer.fit(&contexts, &target, 1000, 3)?;
//!
//! let vecs = trainer.model().word_vecs();
//! for (word, score) in most_similar("you", &vocab, &vecs, 5)? {
//!     println!("{}: {:.3}", word, score);
//! }
//! # Ok::<(), rustynlp::error::NnError>(())
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod losses;
pub mod metrics;
pub mod models;
pub mod nn;
pub mod optimizers;
pub mod params;
pub mod trainer;

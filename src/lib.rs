//! mediation-analyzer: bootstrap mediation analysis.
//!
//! Estimates the a (X→M), b (M→Y) and c (X→Y) paths of a single-mediator
//! model, bootstraps their distribution and reports how much of the total
//! effect of the predictor runs through the mediator.

pub mod backend;
pub mod bootstrap;
pub mod config;
pub mod data;
pub mod descriptive;
pub mod error;
pub mod mediation;
pub mod plot;
pub mod regression;
pub mod report;
pub mod sem;
pub mod stats;
pub mod types;

//! Random concurrent histories for exercising the checkers.
//!
//! Stands in for a test driver: threads are simulated against a sequential
//! reference object, and the resulting call/return stream is recorded as
//! [`linmon_core::Event`]s.

pub mod generator;

pub use generator::{
    generate_mult_histories, generate_single_history, GenParams, GeneratedHistory, ObjectKind,
};

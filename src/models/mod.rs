//! Data models for the separation pipeline

pub mod job;

pub use job::{JobRecord, JobState, StemRefs, StemRole};

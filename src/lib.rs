//! Expert Finder: conversational requirement gathering and expert matching.

pub mod config;
pub mod error;
pub mod finder;
pub mod llm;

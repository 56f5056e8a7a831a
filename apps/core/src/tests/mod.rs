//! Test Module
//!
//! Cross-module test suite for the NIXIN engine.
//!
//! ## Test Categories
//! - `brain_tests`: rule matching, entity extraction and planning together
//! - `dispatcher_tests`: backend selection, fallback, timeouts, comparison mode
//! - `memory_tests`: interaction log, preferences and recall
//! - `integration_tests`: full request pipeline
//! - `chaos_test`: concurrency and resilience

mod support;

pub mod brain_tests;
pub mod memory_tests;

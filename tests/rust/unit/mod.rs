//! Unit tests - parser robustness and value handling
//!
//! These tests exercise the public parsing API with malformed and edge-case
//! input and do not touch any data.

mod parser_robustness_tests;

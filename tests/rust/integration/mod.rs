//! Integration tests - search expressions run end to end
//!
//! These tests parse expressions against the library schema fixture, build
//! criteria queries and execute them with the in-memory database.

mod common;
mod filter_tests;
mod grammar_tests;
mod projection_tests;

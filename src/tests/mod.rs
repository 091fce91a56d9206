//! Test suite for the block hub
//!
//! Tests are grouped by concern: the building blocks on their own, the page
//! scheduler's concurrency guarantees, an end-to-end run against an on-disk
//! content store, and property tests for the catalog and export rules.

#[cfg(test)]
mod support;
#[cfg(test)]
mod integration;

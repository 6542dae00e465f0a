//! Note list queries.
//!
//! # Responsibility
//! - Derive filtered views and tag listings from the in-memory collection.
//! - Substring matching only; no ranking or index.

pub mod filter;

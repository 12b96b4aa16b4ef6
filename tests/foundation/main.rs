//! Integration tests for the foundation layer
//!
//! Tests for entity ids, bitfields, values and content hashing.

mod ids;

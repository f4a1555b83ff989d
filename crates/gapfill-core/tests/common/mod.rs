//! Shared helpers for gapfill-core integration tests.

#![allow(dead_code)]

pub mod fixtures;

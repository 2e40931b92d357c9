//! Infrastructure layer - pluggable storage backends

pub mod storage;

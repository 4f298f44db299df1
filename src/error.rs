//! Error types returned by cache construction and insertion.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors surfaced to callers of the cache.
///
/// Internal races between buffered records and the drainer are self-healing
/// and never show up here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
	/// A configuration value or argument is out of range.
	#[error("invalid argument: {0}")]
	InvalidArgument(&'static str),

	/// A single entry is heavier than the whole cache and can never fit.
	#[error("entry weight {weight} exceeds cache capacity {capacity}")]
	CapacityImpossible { weight: u64, capacity: u64 },
}

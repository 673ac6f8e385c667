//! Error taxonomy for the nesting engine.
//!
//! Only preconditions that can be checked before any placement occurs are
//! represented here. Post-pack assertion failures are programming errors and abort
//! the call via `panic!` rather than a `Result`, after a `tracing::error!`
//! diagnostic; per-piece tube infeasibility is not an error at all, and is
//! carried in [`crate::TubePlan::infeasible_pieces`] instead.

use thiserror::Error;

/// Errors raised synchronously before any placement takes place.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// A piece's width or drop was not strictly positive.
    #[error("piece {index} has non-positive dimension: w={w}, h={h}")]
    NonPositiveDimension { index: usize, w: i64, h: i64 },

    /// A piece is wider than the roll it would be packed onto.
    #[error("piece width {width} exceeds roll width {roll_width}")]
    PieceWiderThanRoll { width: u32, roll_width: u32 },

    /// More pieces were supplied than the hard cap for the call allows.
    #[error("{count} pieces exceeds the cap of {limit} for this call")]
    TooManyPieces { count: usize, limit: usize },

    /// A piece's across-roll extent exceeds the domain limit.
    #[error("piece width {width} exceeds the domain limit of {limit}")]
    WidthExceedsDomainLimit { width: u32, limit: u32 },

    /// A piece's along-roll extent exceeds the domain limit.
    #[error("piece drop {drop} exceeds the domain limit of {limit}")]
    DropExceedsDomainLimit { drop: u32, limit: u32 },

    /// The inter-piece gap was negative.
    #[error("gap must be non-negative, got {gap}")]
    NegativeGap { gap: f64 },

    /// More lines were supplied to the efficiency aggregator than its cap.
    #[error("{count} lines exceeds the cap of {limit} per request")]
    TooManyLines { count: usize, limit: usize },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;

//! nesting-engine computes material-utilization plans for the cutting
//! problems that arise in roller-blind manufacturing: fabric nesting onto a
//! continuous roll, segmentation of a fabric layout into fixed-length
//! markers, and 1-D cutting-stock planning for aluminium tubes.
//!
//! The crate is a pure computation library: it performs no I/O, owns no
//! request/response schema, and makes no network or persistence calls.
//! Hosting those concerns (HTTP surface, auth, rate limiting, config
//! loading, log sinks) is left entirely to the caller; this crate exposes
//! only the engines themselves.

#![deny(missing_docs)]

mod config;
mod efficiency;
mod error;
mod geometry;
mod marker;
mod packer;
mod tubes;

pub use config::{
    EngineConfig, APPLY_GAPS_TO_LENGTH, BOUNDARY_EPS, MARKER_ROLL_LENGTH, SAFETY_GAP_X,
    SAFETY_GAP_Y, TUBE_KERF, TUBE_STOCK_LENGTH,
};
pub use efficiency::{compute_efficiency, MAX_LINES};
pub use error::{EngineError, Result};
pub use geometry::{
    CombinedLayout, Layout, LayoutMeta, Line, LineResult, Marker, MarkerPlacedRect, PerLineLayout,
    Placement, Shelf, Totals, TubeCut, TubePattern, TubePlan,
};
pub use marker::{build_markers_from_layout, build_markers_from_layout_with_config, clear_marker_cache};
pub use packer::{
    compute_layout, compute_layout_per_line, compute_layout_with_order, LineSpec, PieceOrder,
};
pub use tubes::{compute_tube_plan, dedupe_patterns, improve_pair_swaps, pack_bfd, validate_pieces};

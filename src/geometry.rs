//! Pure value types shared by the packer, segmenter, tube planner, and
//! efficiency aggregator. Nothing in this module owns mutable state or
//! outlives the call that produced it.

/// A single piece placed on the roll.
///
/// Coordinate convention (load-bearing, do not swap): `x` runs along the
/// roll length (what gets consumed), `y` runs across the roll width. `w` is
/// the piece's across-roll extent, `h` is its along-roll extent (the
/// "drop").
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Placement {
    /// Along-roll position; equal to `shelf(level).x0`.
    pub x: f64,
    /// Across-roll position.
    pub y: f64,
    /// Across-roll extent.
    pub w: f64,
    /// Along-roll extent (the drop).
    pub h: f64,
    /// 0-based shelf index this piece was placed on.
    pub level: usize,
    /// Index into the input piece list before packing.
    pub item_id: usize,
    /// Which input line this placement came from, when packed via
    /// [`crate::compute_layout_per_line`]. `None` for single-layout calls.
    pub line_id: Option<usize>,
}

/// A horizontal strip of the roll at `x ∈ [x0, x0 + height]`. Pieces on a
/// shelf share `x = x0` and are laid out in `y` from 0 upward.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Shelf {
    /// Along-roll start of this shelf.
    pub x0: f64,
    /// Shelf height, i.e. the drop of the tallest piece placed on it.
    pub height: f64,
    /// Across-roll extent already consumed by placed pieces.
    pub used_y: f64,
}

/// Diagnostic metadata returned alongside a [`crate::Layout`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct LayoutMeta {
    /// Name of the packing algorithm used.
    pub algo: &'static str,
    /// Wall-clock time spent inside the packer call, in microseconds.
    pub elapsed_micros: u128,
}

/// The result of packing a set of pieces onto a roll of fixed width.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Layout {
    /// Every piece's final placement.
    pub placements: Vec<Placement>,
    /// Roll length consumed; `0` when `placements` is empty.
    pub used_length: f64,
    /// `Σ(w·h) / (roll_width · used_length)`, clamped to `[0, 1]`.
    pub utilization: f64,
    /// Number of shelves used.
    pub levels: usize,
    /// Final shelf state after compaction.
    pub shelves: Vec<Shelf>,
    /// Diagnostic metadata.
    pub meta: LayoutMeta,
}

/// The result of packing every line in a [`crate::compute_layout_per_line`]
/// call, plus the per-line breakdown.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PerLineLayout {
    /// One [`Layout`] per input line, in input order.
    pub lines: Vec<Layout>,
    /// Aggregate across all lines.
    pub combined: CombinedLayout,
}

/// Aggregate metrics across every line of a [`PerLineLayout`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct CombinedLayout {
    /// Sum of each line's `used_length`.
    pub used_length: f64,
    /// `Σ piece_area / Σ(roll_width · used_length)`.
    pub utilization: f64,
}

/// One piece of a marker, in marker-local coordinates (the marker's `x = 0`
/// is the marker's start). `w` and `h` are bit-identical to the source
/// [`Placement`] — the segmenter never resizes a piece.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct MarkerPlacedRect {
    /// Index into the original input piece list.
    pub item_id: usize,
    /// Shelf index this piece was placed on in the source layout.
    pub level: usize,
    /// Marker-local along-roll position.
    pub x: f64,
    /// Across-roll position (unchanged from the source placement).
    pub y: f64,
    /// Across-roll extent.
    pub w: f64,
    /// Along-roll extent (the drop).
    pub h: f64,
}

/// A segment of roll no longer than `MARKER_ROLL_LENGTH`, used as a
/// physical cutting guide.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Marker {
    /// 1-based sequential index, including any overflow sub-markers.
    pub idx: usize,
    /// Caller-supplied identifier grouping contiguous markers of equal
    /// roll width.
    pub batch_id: String,
    /// Roll width this marker was cut from.
    pub roll_width: f64,
    /// This marker's along-roll length; `<= marker_roll_length`.
    pub length: f64,
    /// Pieces assigned to this marker, in marker-local coordinates.
    pub rects: Vec<MarkerPlacedRect>,
}

/// One tube with its ordered cut list.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TubeCut {
    /// Ordered piece lengths cut from this tube.
    pub pieces: Vec<u32>,
    /// `Σ pieces + kerf · (|pieces| - 1)`.
    pub used: f64,
    /// `stock_length - used`.
    pub waste: f64,
}

/// An equivalence class of tubes sharing an identical multiset of pieces.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TubePattern {
    /// Sorted tuple identifying this pattern.
    pub key: Vec<u32>,
    /// The first tube encountered with this key.
    pub sample: TubeCut,
    /// Number of tubes sharing this pattern.
    pub count: usize,
}

/// The aggregate result of a [`crate::compute_tube_plan`] call.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TubePlan {
    /// Every tube used.
    pub tubes: Vec<TubeCut>,
    /// Tubes grouped into equivalence classes, sorted by `count` desc then
    /// by `Σ key` desc.
    pub patterns: Vec<TubePattern>,
    /// `Σ tube.used`.
    pub total_used: f64,
    /// `Σ tube.waste`.
    pub total_waste: f64,
    /// `total_used / (|tubes| · stock_length)`; `0` when no tubes.
    pub efficiency: f64,
    /// Pieces that could never fit a tube, with a human-readable reason.
    pub infeasible_pieces: Vec<(u32, String)>,
}

/// One order line as seen by the efficiency aggregator's boundary contract.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Line {
    /// Caller-supplied opaque identifier, echoed back in [`LineResult`].
    pub line_id: String,
    /// Across-roll extent of one blind/header from this line (mm).
    pub width: u32,
    /// Along-roll extent of one blind/header from this line (mm).
    pub drop: u32,
    /// Quantity of this line.
    pub qty: u32,
    /// Fabric code; validated at the boundary, not used by the core engine.
    pub fabric_code: Option<String>,
    /// `"blinds"` or `"header"`; metadata only, does not influence packing.
    pub series: Option<String>,
}

/// Per-line result of [`crate::compute_efficiency`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct LineResult {
    /// Caller-supplied identifier of the line this result was computed
    /// from, carried through from [`Line::line_id`] by the engine itself
    /// rather than left to positional zipping by the caller.
    pub line_id: String,
    /// Total blind area for this line, in m².
    pub blind_area_m2: f64,
    /// Roll area consumed by this line, in m².
    pub roll_area_m2: f64,
    /// `roll_area_m2 - blind_area_m2`.
    pub waste_area_m2: f64,
    /// `waste_area_m2 / blind_area_m2 * 100`; `0` when `blind_area_m2` is 0.
    pub waste_factor_pct: f64,
    /// Layout utilization, as a percentage.
    pub utilization_pct: f64,
    /// Roll length consumed by this line.
    pub used_length: f64,
    /// Roll width used for this line (shared across the whole call).
    pub roll_width: u32,
    /// Number of pieces placed for this line.
    pub pieces: usize,
    /// Number of shelves used for this line.
    pub levels: usize,
}

/// Aggregate totals of a [`crate::compute_efficiency`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Totals {
    /// `Σ blind_area / Σ roll_area * 100`; `0` on empty input.
    pub eff_pct: f64,
    /// `100 - eff_pct`; `100` on empty input.
    pub waste_pct: f64,
    /// Sum of every line's blind area, in m².
    pub blind_area_m2: f64,
    /// Sum of every line's roll area, in m².
    pub roll_area_m2: f64,
    /// Sum of every line's piece count.
    pub pieces: usize,
    /// Sum of every line's shelf count.
    pub levels: usize,
}

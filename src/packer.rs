//! Fabric Packer (C2): first-fit-decreasing-height shelf packing with
//! best-fit shelf choice and a post-pass compaction step.

use crate::config::{MAX_PIECES_PER_LINE, MAX_PIECES_PER_PACK, MAX_PIECE_DROP, MAX_PIECE_WIDTH};
use crate::error::{EngineError, Result};
use crate::geometry::{CombinedLayout, Layout, LayoutMeta, PerLineLayout, Placement, Shelf};
use std::time::Instant;

const SHELF_MERGE_EPS: f64 = 1e-6;

/// Controls which order pieces are handed to the FFDH pass in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceOrder {
    /// Area desc, then width desc, then drop desc — the default, which
    /// lands the largest rectangles at the bottom-left.
    LargestFirst,
    /// Drop desc, then width desc, then input index — the original FFDH
    /// sort key, kept as an alternate path for callers that want to
    /// otherwise preserve input order.
    KeepInputOrder,
}

impl Default for PieceOrder {
    fn default() -> Self {
        PieceOrder::LargestFirst
    }
}

#[derive(Debug, Clone)]
struct WorkingShelf {
    x0: f64,
    height: f64,
    used_y: f64,
    pieces: Vec<ShelfPiece>,
}

#[derive(Debug, Clone, Copy)]
struct ShelfPiece {
    item_id: usize,
    w: f64,
    h: f64,
    y: f64,
}

fn validate_pieces(pieces: &[(u32, u32)], roll_width: u32, gap: i64) -> Result<f64> {
    if gap < 0 {
        return Err(EngineError::NegativeGap { gap: gap as f64 });
    }
    if pieces.len() > MAX_PIECES_PER_PACK {
        return Err(EngineError::TooManyPieces {
            count: pieces.len(),
            limit: MAX_PIECES_PER_PACK,
        });
    }
    for (index, &(w, h)) in pieces.iter().enumerate() {
        if w == 0 || h == 0 {
            return Err(EngineError::NonPositiveDimension {
                index,
                w: w as i64,
                h: h as i64,
            });
        }
        if w > roll_width {
            return Err(EngineError::PieceWiderThanRoll {
                width: w,
                roll_width,
            });
        }
        if w > MAX_PIECE_WIDTH {
            return Err(EngineError::WidthExceedsDomainLimit {
                width: w,
                limit: MAX_PIECE_WIDTH,
            });
        }
        if h > MAX_PIECE_DROP {
            return Err(EngineError::DropExceedsDomainLimit {
                drop: h,
                limit: MAX_PIECE_DROP,
            });
        }
    }
    Ok(gap as f64)
}

fn ordered_indices(pieces: &[(u32, u32)], order: PieceOrder) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..pieces.len()).collect();
    match order {
        PieceOrder::LargestFirst => indices.sort_by(|&a, &b| {
            let (wa, ha) = pieces[a];
            let (wb, hb) = pieces[b];
            let area_a = wa as u64 * ha as u64;
            let area_b = wb as u64 * hb as u64;
            area_b
                .cmp(&area_a)
                .then(wb.cmp(&wa))
                .then(hb.cmp(&ha))
                .then(a.cmp(&b))
        }),
        PieceOrder::KeepInputOrder => indices.sort_by(|&a, &b| {
            let (wa, ha) = pieces[a];
            let (wb, hb) = pieces[b];
            hb.cmp(&ha).then(wb.cmp(&wa)).then(a.cmp(&b))
        }),
    }
    indices
}

fn place_ffdh(pieces: &[(u32, u32)], order: Vec<usize>, roll_width: f64, gap: f64) -> Vec<WorkingShelf> {
    let mut shelves: Vec<WorkingShelf> = Vec::new();

    for item_id in order {
        let (w, h) = pieces[item_id];
        let (w, h) = (w as f64, h as f64);

        let mut best: Option<(usize, f64)> = None;
        for (i, shelf) in shelves.iter().enumerate() {
            if shelf.height + SHELF_MERGE_EPS < h {
                continue;
            }
            let need_y = if shelf.used_y == 0.0 { w } else { gap + w };
            let remaining = roll_width - shelf.used_y;
            if need_y <= remaining + SHELF_MERGE_EPS {
                let leftover = remaining - need_y;
                if best.map_or(true, |(_, best_leftover)| leftover < best_leftover) {
                    best = Some((i, leftover));
                }
            }
        }

        match best {
            Some((i, _)) => {
                let shelf = &mut shelves[i];
                let y = if shelf.used_y == 0.0 {
                    0.0
                } else {
                    shelf.used_y + gap
                };
                shelf.used_y = y + w;
                shelf.pieces.push(ShelfPiece {
                    item_id,
                    w,
                    h,
                    y,
                });
            }
            None => {
                let x0 = shelves
                    .last()
                    .map(|prev| prev.x0 + prev.height + gap)
                    .unwrap_or(0.0);
                shelves.push(WorkingShelf {
                    x0,
                    height: h,
                    used_y: w,
                    pieces: vec![ShelfPiece {
                        item_id,
                        w,
                        h,
                        y: 0.0,
                    }],
                });
            }
        }
    }

    shelves
}

fn compact(mut shelves: Vec<WorkingShelf>, roll_width: f64, gap: f64) -> Vec<WorkingShelf> {
    // Intra-shelf left-shift: pack each shelf's pieces tightly from y=0.
    for shelf in &mut shelves {
        shelf.pieces.sort_by(|a, b| a.y.partial_cmp(&b.y).unwrap());
        let mut y = 0.0;
        for (i, piece) in shelf.pieces.iter_mut().enumerate() {
            piece.y = if i == 0 { 0.0 } else { y + gap };
            y = piece.y + piece.w;
        }
        shelf.used_y = y;
    }

    // Shelf merge: fold shelf i+1 into shelf i whenever their heights match
    // closely enough and the combined width fits, then re-check i.
    let mut i = 0;
    while i + 1 < shelves.len() {
        let height_close = (shelves[i].height - shelves[i + 1].height).abs() <= SHELF_MERGE_EPS;
        let both_nonempty = shelves[i].used_y > 0.0 && shelves[i + 1].used_y > 0.0;
        let connecting_gap = if both_nonempty { gap } else { 0.0 };
        let combined = shelves[i].used_y + connecting_gap + shelves[i + 1].used_y;

        if height_close && combined <= roll_width + SHELF_MERGE_EPS {
            let next = shelves.remove(i + 1);
            let base_y = shelves[i].used_y + connecting_gap;
            for piece in next.pieces {
                shelves[i].pieces.push(ShelfPiece {
                    y: base_y + (piece.y),
                    ..piece
                });
            }
            shelves[i].used_y = base_y + next.used_y;
            let shift = next.height + gap;
            for later in shelves.iter_mut().skip(i + 1) {
                later.x0 -= shift;
            }
            // Re-check the same index for a further merge.
        } else {
            i += 1;
        }
    }

    shelves
}

fn finalize(shelves: Vec<WorkingShelf>, roll_width: f64, algo: &'static str, started: Instant) -> Layout {
    let mut placements = Vec::new();
    let mut area_sum = 0.0;

    for (level, shelf) in shelves.iter().enumerate() {
        for piece in &shelf.pieces {
            debug_assert!(piece.y >= 0.0, "placement y underflow on shelf {level}");
            if piece.y + piece.w > roll_width + SHELF_MERGE_EPS {
                tracing::error!(level, y = piece.y, w = piece.w, roll_width, "shelf y-overflow");
                panic!("internal invariant violation: shelf {level} overflowed roll width");
            }
            if piece.h > shelf.height + SHELF_MERGE_EPS {
                tracing::error!(level, h = piece.h, shelf_height = shelf.height, "piece exceeds shelf height");
                panic!("internal invariant violation: piece on shelf {level} exceeds shelf height");
            }
            area_sum += piece.w * piece.h;
            placements.push(Placement {
                x: shelf.x0,
                y: piece.y,
                w: piece.w,
                h: piece.h,
                level,
                item_id: piece.item_id,
                line_id: None,
            });
        }
    }

    for shelf in &shelves {
        for pair in shelf.pieces.windows(2) {
            if pair[0].y + pair[0].w > pair[1].y + SHELF_MERGE_EPS {
                panic!("internal invariant violation: overlapping pieces on a shelf");
            }
        }
    }

    let used_length = shelves
        .last()
        .map(|s| s.x0 + s.height)
        .unwrap_or(0.0);

    let utilization = if used_length == 0.0 {
        0.0
    } else {
        (area_sum / (roll_width * used_length)).clamp(0.0, 1.0)
    };

    Layout {
        placements,
        used_length,
        utilization,
        levels: shelves.len(),
        shelves: shelves
            .iter()
            .map(|s| Shelf {
                x0: s.x0,
                height: s.height,
                used_y: s.used_y,
            })
            .collect(),
        meta: LayoutMeta {
            algo,
            elapsed_micros: started.elapsed().as_micros(),
        },
    }
}

/// Packs `pieces` (each `(width, drop)` in mm) onto a roll of `roll_width`
/// mm, with `gap` mm between adjacent pieces, using the default
/// [`PieceOrder::LargestFirst`] ordering.
pub fn compute_layout(pieces: &[(u32, u32)], roll_width: u32, gap: i64) -> Result<Layout> {
    compute_layout_with_order(pieces, roll_width, gap, PieceOrder::default())
}

/// Like [`compute_layout`], but with an explicit piece ordering.
pub fn compute_layout_with_order(
    pieces: &[(u32, u32)],
    roll_width: u32,
    gap: i64,
    order: PieceOrder,
) -> Result<Layout> {
    let started = Instant::now();
    let gap = validate_pieces(pieces, roll_width, gap)?;
    let roll_width_f = roll_width as f64;

    let indices = ordered_indices(pieces, order);
    let shelves = place_ffdh(pieces, indices, roll_width_f, gap);
    let shelves = compact(shelves, roll_width_f, gap);

    Ok(finalize(shelves, roll_width_f, "FFDH-horizontal", started))
}

/// One line's worth of pieces and its own roll width / gap, for
/// [`compute_layout_per_line`].
#[derive(Debug, Clone)]
pub struct LineSpec {
    /// `(width, drop)` pairs in mm, one per piece (already expanded by qty).
    pub pieces: Vec<(u32, u32)>,
    /// Roll width for this line, in mm.
    pub roll_width: u32,
    /// Gap for this line, in mm.
    pub gap: i64,
}

/// Packs every line independently, tags each placement with its line
/// index, and returns the per-line layouts plus the combined totals.
pub fn compute_layout_per_line(lines: &[LineSpec]) -> Result<PerLineLayout> {
    let mut layouts = Vec::with_capacity(lines.len());
    let mut combined_used_length = 0.0;
    let mut combined_area_numer = 0.0;
    let mut combined_area_denom = 0.0;

    for (line_idx, line) in lines.iter().enumerate() {
        if line.pieces.len() > MAX_PIECES_PER_LINE {
            return Err(EngineError::TooManyPieces {
                count: line.pieces.len(),
                limit: MAX_PIECES_PER_LINE,
            });
        }

        let mut layout = compute_layout(&line.pieces, line.roll_width, line.gap)?;
        for placement in &mut layout.placements {
            placement.line_id = Some(line_idx);
        }

        combined_used_length += layout.used_length;
        combined_area_numer += layout
            .placements
            .iter()
            .fold(0.0, |acc, p| acc + p.w * p.h);
        combined_area_denom += line.roll_width as f64 * layout.used_length;

        layouts.push(layout);
    }

    let combined_utilization = if combined_area_denom == 0.0 {
        0.0
    } else {
        (combined_area_numer / combined_area_denom).clamp(0.0, 1.0)
    };

    Ok(PerLineLayout {
        lines: layouts,
        combined: CombinedLayout {
            used_length: combined_used_length,
            utilization: combined_utilization,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placements_for_level(layout: &Layout, level: usize) -> Vec<&Placement> {
        layout.placements.iter().filter(|p| p.level == level).collect()
    }

    #[test]
    fn single_piece_fits_on_one_shelf() {
        let layout = compute_layout(&[(2400, 2100)], 3000, 0).unwrap();
        assert_eq!(layout.placements.len(), 1);
        let p = &layout.placements[0];
        assert_eq!((p.x, p.y, p.w, p.h, p.level), (0.0, 0.0, 2400.0, 2100.0, 0));
        assert_eq!(layout.used_length, 2100.0);
        assert!((layout.utilization - 0.8).abs() < 1e-9);
    }

    #[test]
    fn two_identical_pieces_share_a_shelf() {
        let layout = compute_layout(&[(1200, 1500), (1200, 1500)], 3000, 0).unwrap();
        let on_shelf = placements_for_level(&layout, 0);
        assert_eq!(on_shelf.len(), 2);
        let mut ys: Vec<f64> = on_shelf.iter().map(|p| p.y).collect();
        ys.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(ys, vec![0.0, 1200.0]);
        assert_eq!(layout.used_length, 1500.0);
        assert!((layout.utilization - 0.8).abs() < 1e-9);
    }

    #[test]
    fn two_drops_open_two_shelves_with_gap() {
        let layout = compute_layout(&[(2000, 2100), (2000, 1000)], 3000, 10).unwrap();
        assert_eq!(layout.levels, 2);
        assert_eq!(layout.used_length, 2110.0 + 1000.0);
    }

    #[test]
    fn rejects_non_positive_dimension() {
        let err = compute_layout(&[(0, 100)], 3000, 0).unwrap_err();
        assert!(matches!(err, EngineError::NonPositiveDimension { index: 0, .. }));
    }

    #[test]
    fn rejects_piece_wider_than_roll() {
        let err = compute_layout(&[(3100, 100)], 3000, 0).unwrap_err();
        assert!(matches!(err, EngineError::PieceWiderThanRoll { .. }));
    }

    #[test]
    fn rejects_negative_gap() {
        let err = compute_layout(&[(100, 100)], 3000, -1).unwrap_err();
        assert!(matches!(err, EngineError::NegativeGap { .. }));
    }

    #[test]
    fn no_shelf_overlap_within_level() {
        let pieces: Vec<(u32, u32)> = (0..20).map(|i| (100 + i * 7, 500)).collect();
        let layout = compute_layout(&pieces, 3000, 5).unwrap();
        for level in 0..layout.levels {
            let mut on_shelf = placements_for_level(&layout, level);
            on_shelf.sort_by(|a, b| a.y.partial_cmp(&b.y).unwrap());
            for pair in on_shelf.windows(2) {
                assert!(pair[0].y + pair[0].w <= pair[1].y + 1e-6);
            }
        }
    }

    #[test]
    fn per_line_combines_used_length_and_utilization() {
        let lines = vec![
            LineSpec {
                pieces: vec![(2400, 2100)],
                roll_width: 3000,
                gap: 0,
            },
            LineSpec {
                pieces: vec![(1200, 1500), (1200, 1500)],
                roll_width: 3000,
                gap: 0,
            },
        ];
        let result = compute_layout_per_line(&lines).unwrap();
        assert_eq!(result.lines.len(), 2);
        assert_eq!(result.combined.used_length, 2100.0 + 1500.0);
        assert!(result.lines[0].placements.iter().all(|p| p.line_id == Some(0)));
        assert!(result.lines[1].placements.iter().all(|p| p.line_id == Some(1)));
    }

    #[test]
    fn per_line_cap_is_enforced() {
        let pieces: Vec<(u32, u32)> = (0..1001).map(|_| (10, 10)).collect();
        let lines = vec![LineSpec {
            pieces,
            roll_width: 3000,
            gap: 0,
        }];
        let err = compute_layout_per_line(&lines).unwrap_err();
        assert!(matches!(err, EngineError::TooManyPieces { limit: 1000, .. }));
    }
}

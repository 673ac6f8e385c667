//! Efficiency Aggregator (C5): turns a caller's order lines into roll-width
//! selection, per-line fabric packing, and utilisation metrics.

use crate::error::{EngineError, Result};
use crate::geometry::{Line, LineResult, Totals};
use crate::packer::{compute_layout_per_line, LineSpec};

/// Hard cap on the number of lines accepted per [`compute_efficiency`] call,
/// matching the boundary contract's `|lines| <= 1000`.
pub const MAX_LINES: usize = 1000;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Picks the roll width shared by every line in the call: the smallest
/// candidate width that's at least as wide as the widest piece, or the
/// widest candidate if none fit; falling back to `max(max_piece_width,
/// 3000)` when no candidates were supplied.
fn pick_roll_width(max_piece_width: u32, candidate_widths: Option<&[u32]>) -> u32 {
    match candidate_widths.filter(|c| !c.is_empty()) {
        Some(candidates) => {
            let mut sorted: Vec<u32> = candidates.to_vec();
            sorted.sort_unstable();
            sorted
                .iter()
                .copied()
                .find(|&w| w >= max_piece_width)
                .unwrap_or_else(|| *sorted.last().unwrap())
        }
        None => max_piece_width.max(3000),
    }
}

/// Translates `lines` into per-line fabric layouts and utilisation metrics.
/// `candidate_widths`, when supplied, constrains the roll width chosen for
/// every line in this call (see [`pick_roll_width`]).
pub fn compute_efficiency(lines: &[Line], candidate_widths: Option<&[u32]>) -> Result<(Vec<LineResult>, Totals)> {
    if lines.len() > MAX_LINES {
        return Err(EngineError::TooManyLines {
            count: lines.len(),
            limit: MAX_LINES,
        });
    }

    if lines.is_empty() {
        return Ok((
            Vec::new(),
            Totals {
                eff_pct: 0.0,
                waste_pct: 100.0,
                blind_area_m2: 0.0,
                roll_area_m2: 0.0,
                pieces: 0,
                levels: 0,
            },
        ));
    }

    let max_piece_width = lines.iter().map(|l| l.width).max().unwrap_or(0);
    let roll_width = pick_roll_width(max_piece_width, candidate_widths);

    let line_specs: Vec<LineSpec> = lines
        .iter()
        .map(|line| LineSpec {
            pieces: std::iter::repeat((line.width, line.drop))
                .take(line.qty as usize)
                .collect(),
            roll_width,
            gap: 0,
        })
        .collect();

    let packed = compute_layout_per_line(&line_specs)?;

    let mut results = Vec::with_capacity(lines.len());
    let mut total_blind_area = 0.0;
    let mut total_roll_area = 0.0;
    let mut total_pieces = 0usize;
    let mut total_levels = 0usize;

    for (line, layout) in lines.iter().zip(&packed.lines) {
        let blind_area_m2 = layout.placements.iter().fold(0.0, |acc, p| acc + p.w * p.h) / 1_000_000.0;
        let roll_area_m2 = roll_width as f64 * layout.used_length / 1_000_000.0;
        let waste_area_m2 = roll_area_m2 - blind_area_m2;
        let waste_factor_pct = if blind_area_m2 == 0.0 {
            0.0
        } else {
            waste_area_m2 / blind_area_m2 * 100.0
        };

        total_blind_area += blind_area_m2;
        total_roll_area += roll_area_m2;
        total_pieces += layout.placements.len();
        total_levels += layout.levels;

        results.push(LineResult {
            line_id: line.line_id.clone(),
            blind_area_m2: round2(blind_area_m2),
            roll_area_m2: round2(roll_area_m2),
            waste_area_m2: round2(waste_area_m2),
            waste_factor_pct: round2(waste_factor_pct),
            utilization_pct: round2(layout.utilization * 100.0),
            used_length: layout.used_length,
            roll_width,
            pieces: layout.placements.len(),
            levels: layout.levels,
        });
    }

    let eff_pct = if total_roll_area == 0.0 {
        0.0
    } else {
        total_blind_area / total_roll_area * 100.0
    };

    let totals = Totals {
        eff_pct: round2(eff_pct),
        waste_pct: round2(100.0 - eff_pct),
        blind_area_m2: round2(total_blind_area),
        roll_area_m2: round2(total_roll_area),
        pieces: total_pieces,
        levels: total_levels,
    };

    Ok((results, totals))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, width: u32, drop: u32, qty: u32) -> Line {
        Line {
            line_id: id.to_string(),
            width,
            drop,
            qty,
            fabric_code: None,
            series: None,
        }
    }

    #[test]
    fn single_line_single_piece() {
        let lines = vec![line("L1", 2400, 2100, 1)];
        let (results, totals) = compute_efficiency(&lines, None).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].line_id, "L1");
        assert_eq!(results[0].roll_width, 3000);
        assert_eq!(results[0].used_length, 2100.0);
        assert!((results[0].utilization_pct - 80.0).abs() < 1e-6);
        assert!((totals.eff_pct - 80.0).abs() < 1e-6);
    }

    #[test]
    fn line_id_is_preserved_per_result_not_positional() {
        let lines = vec![
            line("first", 2400, 2100, 1),
            line("second", 1200, 1500, 2),
        ];
        let (results, _totals) = compute_efficiency(&lines, None).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].line_id, "first");
        assert_eq!(results[1].line_id, "second");
    }

    #[test]
    fn single_line_qty_two_shares_a_shelf() {
        let lines = vec![line("L1", 1200, 1500, 2)];
        let (results, _totals) = compute_efficiency(&lines, None).unwrap();
        assert_eq!(results[0].pieces, 2);
        assert_eq!(results[0].levels, 1);
        assert_eq!(results[0].used_length, 1500.0);
        assert!((results[0].utilization_pct - 80.0).abs() < 1e-6);
    }

    #[test]
    fn candidate_width_selection_picks_smallest_fit() {
        let lines = vec![line("L1", 2300, 2100, 2)];
        let candidates = [1900, 2050, 2400, 3000];
        let (results, _totals) = compute_efficiency(&lines, Some(&candidates)).unwrap();
        assert_eq!(results[0].roll_width, 2400);
    }

    #[test]
    fn over_cap_lines_are_rejected() {
        let lines: Vec<Line> = (0..1001).map(|i| line(&format!("L{i}"), 100, 100, 1)).collect();
        let err = compute_efficiency(&lines, None).unwrap_err();
        assert!(matches!(err, EngineError::TooManyLines { limit: 1000, .. }));
    }

    #[test]
    fn empty_input_yields_zero_efficiency_and_full_waste() {
        let (results, totals) = compute_efficiency(&[], None).unwrap();
        assert!(results.is_empty());
        assert_eq!(totals.eff_pct, 0.0);
        assert_eq!(totals.waste_pct, 100.0);
    }
}

//! Tube Planner (C4): a 1-D cutting-stock solver for fixed-length
//! aluminium tubes — best-fit-decreasing placement, pairwise
//! tube-emptying improvement, and pattern deduplication.

use crate::config::TUBE_MAX_PASSES;
use crate::geometry::{TubeCut, TubePattern, TubePlan};
use std::cmp::Reverse;

/// Validates `(width, qty)` demand pairs, expanding survivors into a flat
/// list of one width per unit quantity. Non-positive quantities or widths
/// are dropped silently; widths that can never fit a tube are reported in
/// the returned infeasible list instead of failing the call.
pub fn validate_pieces(items: &[(u32, u32)], stock_length: u32) -> (Vec<u32>, Vec<(u32, String)>) {
    let mut expanded = Vec::new();
    let mut infeasible = Vec::new();

    for &(width, qty) in items {
        if qty == 0 || width == 0 {
            continue;
        }
        if width > stock_length {
            infeasible.push((
                width,
                format!("width {width} exceeds stock length {stock_length}"),
            ));
            continue;
        }
        for _ in 0..qty {
            expanded.push(width);
        }
    }

    (expanded, infeasible)
}

/// Packs pieces (already sorted descending) onto tubes using best-fit
/// decreasing: each piece goes onto the open tube with the smallest
/// remaining room that can still hold it, or opens a new tube.
pub fn pack_bfd(widths_desc: &[u32], stock_length: f64, kerf: f64) -> Vec<TubeCut> {
    let mut tubes: Vec<TubeCut> = Vec::new();

    for &width in widths_desc {
        let piece = width as f64;
        let mut best: Option<(usize, f64)> = None;

        for (i, tube) in tubes.iter().enumerate() {
            let need = if tube.pieces.is_empty() { piece } else { piece + kerf };
            if tube.used + need <= stock_length {
                let remaining = stock_length - tube.used;
                if best.map_or(true, |(_, best_remaining)| remaining < best_remaining) {
                    best = Some((i, remaining));
                }
            }
        }

        match best {
            Some((i, _)) => {
                let tube = &mut tubes[i];
                let need = if tube.pieces.is_empty() { piece } else { piece + kerf };
                tube.used += need;
                tube.waste = stock_length - tube.used;
                tube.pieces.push(width);
            }
            None => tubes.push(TubeCut {
                pieces: vec![width],
                used: piece,
                waste: stock_length - piece,
            }),
        }
    }

    tubes
}

fn recompute(tube: &mut TubeCut, stock_length: f64, kerf: f64) {
    let used: f64 = tube.pieces.iter().map(|&p| p as f64).sum::<f64>()
        + kerf * tube.pieces.len().saturating_sub(1) as f64;
    tube.used = used;
    tube.waste = stock_length - used;
}

/// Attempts to move every piece of `tubes[i]` onto `tubes[j]`. Succeeds
/// (emptying tube `i`) only if every piece fits; otherwise leaves both
/// tubes untouched.
fn try_empty_into(tubes: &mut [TubeCut], i: usize, j: usize, stock_length: f64, kerf: f64) -> bool {
    let moving = tubes[i].pieces.clone();
    let mut trial_pieces = tubes[j].pieces.clone();
    let mut trial_used = tubes[j].used;

    for &width in &moving {
        let piece = width as f64;
        let need = if trial_pieces.is_empty() { piece } else { piece + kerf };
        if trial_used + need > stock_length {
            return false;
        }
        trial_used += need;
        trial_pieces.push(width);
    }

    tubes[j].pieces = trial_pieces;
    tubes[j].used = trial_used;
    tubes[j].waste = stock_length - trial_used;
    tubes[i].pieces.clear();
    recompute(&mut tubes[i], stock_length, kerf);
    true
}

/// Runs up to `max_passes` rounds of pairwise tube-emptying improvement
/// over an ordered-pair scan, stopping early once a full scan finds no
/// acceptable move. Only accepts moves that empty the source tube — a
/// deliberately conservative choice; see the crate design notes.
pub fn improve_pair_swaps(mut tubes: Vec<TubeCut>, stock_length: f64, kerf: f64, max_passes: usize) -> Vec<TubeCut> {
    for _pass in 0..max_passes {
        let mut changed = false;
        'outer: for i in 0..tubes.len() {
            for j in 0..tubes.len() {
                if j <= i {
                    continue;
                }
                if try_empty_into(&mut tubes, i, j, stock_length, kerf) {
                    changed = true;
                    break 'outer;
                }
            }
        }
        tubes.retain(|t| !t.pieces.is_empty());
        if !changed {
            break;
        }
    }
    tubes
}

/// Groups tubes into equivalence classes by their sorted piece multiset,
/// sorted by `count` desc then by `Σ key` desc.
pub fn dedupe_patterns(tubes: &[TubeCut]) -> Vec<TubePattern> {
    let mut patterns: Vec<TubePattern> = Vec::new();

    for tube in tubes {
        let mut key = tube.pieces.clone();
        key.sort_unstable();

        if let Some(pattern) = patterns.iter_mut().find(|p| p.key == key) {
            pattern.count += 1;
        } else {
            patterns.push(TubePattern {
                key,
                sample: tube.clone(),
                count: 1,
            });
        }
    }

    patterns.sort_by_key(|p| {
        let sum: u64 = p.key.iter().map(|&w| w as u64).sum();
        Reverse((p.count, sum))
    });

    patterns
}

/// Solves the 1-D cutting-stock problem for `items` (`(width, qty)` pairs
/// in mm) against tubes of `stock_length` mm with `kerf` mm per internal
/// cut. `algo` is currently always best-fit-decreasing; the parameter is
/// kept so callers can name their choice explicitly.
pub fn compute_tube_plan(items: &[(u32, u32)], stock_length: u32, kerf: u32, _algo: &str) -> TubePlan {
    let stock_length_f = stock_length as f64;
    let kerf_f = kerf as f64;

    let (mut widths, infeasible_pieces) = validate_pieces(items, stock_length);
    widths.sort_unstable_by_key(|&w| Reverse(w));

    let tubes = pack_bfd(&widths, stock_length_f, kerf_f);
    let tubes = improve_pair_swaps(tubes, stock_length_f, kerf_f, TUBE_MAX_PASSES);

    for tube in &tubes {
        let expected = tube.used + tube.waste;
        debug_assert!(
            (expected - stock_length_f).abs() < 1e-6,
            "internal invariant violation: tube used+waste != stock_length"
        );
    }

    let patterns = dedupe_patterns(&tubes);

    let total_used: f64 = tubes.iter().map(|t| t.used).sum();
    let total_waste: f64 = tubes.iter().map(|t| t.waste).sum();
    let efficiency = if tubes.is_empty() {
        0.0
    } else {
        total_used / (tubes.len() as f64 * stock_length_f)
    };

    TubePlan {
        tubes,
        patterns,
        total_used,
        total_waste,
        efficiency,
        infeasible_pieces,
    }
}

//! Marker Segmenter (C3): partitions a fabric layout along the length axis
//! into fixed-length markers without ever cutting a placed piece across a
//! marker boundary.

use crate::config::EngineConfig;
use crate::geometry::{Marker, MarkerPlacedRect, Placement};
use fnv::FnvHasher;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

/// Geometry for one marker, prior to batch-id stamping. Kept separate from
/// [`Marker`] so the memoisation cache (keyed purely on geometry) can't
/// leak a stale `batch_id` from an earlier call onto a cache hit.
#[derive(Debug, Clone, PartialEq)]
struct MarkerGeometry {
    length: f64,
    rects: Vec<MarkerPlacedRect>,
}

static MARKER_CACHE: Lazy<Mutex<HashMap<u64, Vec<MarkerGeometry>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Empties the process-scoped marker memoisation cache. Callers must call
/// this whenever placements that were previously segmented may have
/// changed, since the cache is keyed only on a content fingerprint.
pub fn clear_marker_cache() {
    MARKER_CACHE.lock().unwrap().clear();
}

fn fingerprint(placements: &[Placement], roll_width: f64, roll_length: f64, config: &EngineConfig) -> u64 {
    let mut sorted: Vec<&Placement> = placements.iter().collect();
    sorted.sort_by(|a, b| {
        (a.item_id, a.level, a.x.to_bits(), a.y.to_bits()).cmp(&(
            b.item_id,
            b.level,
            b.x.to_bits(),
            b.y.to_bits(),
        ))
    });

    let mut hasher = FnvHasher::default();
    roll_width.to_bits().hash(&mut hasher);
    roll_length.to_bits().hash(&mut hasher);
    config.safety_gap_x().to_bits().hash(&mut hasher);
    config.apply_gaps_to_length().hash(&mut hasher);
    config.boundary_eps().to_bits().hash(&mut hasher);
    for p in sorted {
        p.item_id.hash(&mut hasher);
        p.level.hash(&mut hasher);
        p.x.to_bits().hash(&mut hasher);
        p.y.to_bits().hash(&mut hasher);
        p.w.to_bits().hash(&mut hasher);
        p.h.to_bits().hash(&mut hasher);
    }
    hasher.finish()
}

/// Builds the marker list for a packed layout, using the documented
/// defaults for every tunable.
pub fn build_markers_from_layout(
    placements: &[Placement],
    roll_width: f64,
    batch_id: &str,
    roll_length: Option<f64>,
) -> Vec<Marker> {
    build_markers_from_layout_with_config(
        placements,
        roll_width,
        batch_id,
        roll_length,
        &EngineConfig::default(),
    )
}

/// Like [`build_markers_from_layout`], with explicit tunables.
pub fn build_markers_from_layout_with_config(
    placements: &[Placement],
    roll_width: f64,
    batch_id: &str,
    roll_length: Option<f64>,
    config: &EngineConfig,
) -> Vec<Marker> {
    let roll_length = roll_length.unwrap_or_else(|| config.marker_roll_length());
    let fp = fingerprint(placements, roll_width, roll_length, config);

    let geometries = {
        let mut cache = MARKER_CACHE.lock().unwrap();
        if let Some(hit) = cache.get(&fp) {
            hit.clone()
        } else {
            let computed = segment(placements, roll_length, config);
            cache.insert(fp, computed.clone());
            computed
        }
    };

    geometries
        .into_iter()
        .enumerate()
        .map(|(i, geom)| Marker {
            idx: i + 1,
            batch_id: batch_id.to_string(),
            roll_width,
            length: geom.length,
            rects: geom.rects,
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct GroupedPiece<'a> {
    placement: &'a Placement,
}

/// Computes the gap-aware marker-local length estimate for a group of
/// placements sharing one marker index, and the shift needed to
/// re-normalise their X coordinates to marker-local space.
fn estimate_group(group: &[GroupedPiece], marker_base: f64, config: &EngineConfig) -> (f64, f64) {
    let locals: Vec<f64> = group.iter().map(|g| g.placement.x - marker_base).collect();
    let shift = locals.iter().cloned().fold(f64::INFINITY, f64::min);
    let shift = if shift.is_finite() { shift } else { 0.0 };

    let mut base_length: f64 = 0.0;
    for (g, local_x) in group.iter().zip(&locals) {
        let final_x = local_x - shift;
        base_length = base_length.max(final_x + g.placement.h);
    }

    let mut gap_count = 0usize;
    if config.apply_gaps_to_length() {
        let mut by_level: HashMap<usize, Vec<(f64, f64)>> = HashMap::new();
        for (g, local_x) in group.iter().zip(&locals) {
            by_level
                .entry(g.placement.level)
                .or_default()
                .push((local_x - shift, g.placement.h));
        }
        for pieces in by_level.values_mut() {
            pieces.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
            for pair in pieces.windows(2) {
                if (pair[0].1 - pair[1].1).abs() > config.boundary_eps() {
                    gap_count += 1;
                }
            }
        }
    }

    let length = base_length + gap_count as f64 * config.safety_gap_x();
    (length, shift)
}

fn segment(placements: &[Placement], roll_length: f64, config: &EngineConfig) -> Vec<MarkerGeometry> {
    let eps = config.boundary_eps();

    // Assignment: push any piece that would straddle a boundary entirely
    // into the following marker index.
    let mut by_marker: HashMap<i64, Vec<GroupedPiece>> = HashMap::new();
    for placement in placements {
        let m = (placement.x / roll_length).floor() as i64;
        let boundary = (m + 1) as f64 * roll_length;
        let target = if placement.x + placement.h <= boundary - eps {
            m
        } else {
            m + 1
        };
        by_marker
            .entry(target)
            .or_default()
            .push(GroupedPiece { placement });
    }

    let mut marker_indices: Vec<i64> = by_marker.keys().copied().collect();
    marker_indices.sort_unstable();

    let mut result = Vec::new();
    for m in marker_indices {
        let group = by_marker.remove(&m).unwrap();
        let marker_base = m as f64 * roll_length;
        let (estimate, _) = estimate_group(&group, marker_base, config);

        if estimate <= roll_length + eps {
            result.push(finalize_marker(&group, marker_base, roll_length, config));
        } else {
            tracing::warn!(marker = m, estimate, roll_length, "overlong marker bucket, splitting");
            for sub_group in split_overlong(&group, marker_base, roll_length, config) {
                result.push(finalize_marker(&sub_group, marker_base, roll_length, config));
            }
        }
    }

    result
}

fn split_overlong<'a>(
    group: &[GroupedPiece<'a>],
    marker_base: f64,
    roll_length: f64,
    config: &EngineConfig,
) -> Vec<Vec<GroupedPiece<'a>>> {
    let mut sorted: Vec<GroupedPiece<'a>> = group.to_vec();
    sorted.sort_by(|a, b| {
        (a.placement.x, a.placement.level, a.placement.item_id)
            .partial_cmp(&(b.placement.x, b.placement.level, b.placement.item_id))
            .unwrap()
    });

    let eps = config.boundary_eps();
    let mut sub_groups = Vec::new();
    let mut current: Vec<GroupedPiece<'a>> = Vec::new();

    for piece in sorted {
        let mut candidate = current.clone();
        candidate.push(piece);
        let (estimate, _) = estimate_group(&candidate, marker_base, config);

        if current.is_empty() || estimate <= roll_length + eps {
            current = candidate;
        } else {
            sub_groups.push(current);
            current = vec![piece];
        }
    }
    if !current.is_empty() {
        sub_groups.push(current);
    }

    sub_groups
}

fn finalize_marker(
    group: &[GroupedPiece],
    marker_base: f64,
    roll_length: f64,
    config: &EngineConfig,
) -> MarkerGeometry {
    let (mut used_len, shift) = estimate_group(group, marker_base, config);

    let mut rects: Vec<MarkerPlacedRect> = group
        .iter()
        .map(|g| {
            let p = g.placement;
            MarkerPlacedRect {
                item_id: p.item_id,
                level: p.level,
                x: (p.x - marker_base) - shift,
                y: p.y,
                w: p.w,
                h: p.h,
            }
        })
        .collect();

    let mut length = used_len.min(roll_length);
    if used_len > roll_length + 0.5 {
        let excess = used_len - roll_length;
        tracing::error!(excess, roll_length, "marker length exceeded tolerance after split, shifting left");
        for rect in &mut rects {
            rect.x -= excess;
        }
        used_len -= excess;
        length = roll_length;
    }
    let _ = used_len;

    MarkerGeometry { length, rects }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placement(item_id: usize, level: usize, x: f64, h: f64) -> Placement {
        Placement {
            x,
            y: 0.0,
            w: 1000.0,
            h,
            level,
            item_id,
            line_id: None,
        }
    }

    #[test]
    fn single_short_layout_is_one_marker() {
        clear_marker_cache();
        let placements = vec![placement(0, 0, 0.0, 2000.0), placement(1, 0, 2010.0, 1500.0)];
        let markers = build_markers_from_layout(&placements, 3000.0, "batch-1", None);
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].idx, 1);
        assert_eq!(markers[0].batch_id, "batch-1");
        assert!(markers[0].length <= 5900.0 + 1e-6);
    }

    #[test]
    fn piece_straddling_boundary_is_pushed_whole() {
        clear_marker_cache();
        // This piece starts before 5900 and would straddle the boundary if
        // left in marker 0; it must be pushed entirely into marker 1.
        let placements = vec![placement(0, 0, 5850.0, 200.0)];
        let markers = build_markers_from_layout(&placements, 3000.0, "b", None);
        assert_eq!(markers.len(), 1);
        let rect = &markers[0].rects[0];
        assert!(rect.x >= 0.0);
        assert!(rect.x + rect.h <= markers[0].length + 0.5);
    }

    #[test]
    fn long_layout_splits_across_two_markers_by_assignment() {
        clear_marker_cache();
        // piece1 fits wholly in marker 0; piece2 would straddle the 5900mm
        // boundary so it (and the trailing piece3) are pushed into marker 1.
        let placements = vec![
            placement(0, 0, 0.0, 5800.0),
            placement(1, 0, 5800.0, 5800.0),
            placement(2, 0, 11600.0, 100.0),
        ];
        let markers = build_markers_from_layout(&placements, 3000.0, "b", Some(5900.0));
        assert_eq!(markers.len(), 2);
        for marker in &markers {
            assert!(marker.length <= 5900.0 + 1e-6);
        }
        let mut seen: Vec<usize> = markers.iter().flat_map(|m| m.rects.iter().map(|r| r.item_id)).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn gap_inflated_bucket_splits_even_though_raw_extent_fits() {
        clear_marker_cache();
        // Every adjacent pair differs in drop, so each interface charges a
        // SAFETY_GAP_X; the raw extent fits in one marker but the
        // gap-inflated estimate does not.
        let mut placements = Vec::new();
        for i in 0..60 {
            let h = if i % 2 == 0 { 50.0 } else { 60.0 };
            placements.push(placement(i, 0, i as f64 * 95.0, h));
        }
        let markers = build_markers_from_layout(&placements, 3000.0, "b", Some(5900.0));
        assert!(markers.len() >= 2, "expected the overlong bucket to split");
        for marker in &markers {
            assert!(marker.length <= 5900.0 + 1e-6);
        }
        let mut seen: Vec<usize> = markers.iter().flat_map(|m| m.rects.iter().map(|r| r.item_id)).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..60).collect::<Vec<_>>());
    }

    #[test]
    fn cache_returns_equal_markers_for_equal_input() {
        clear_marker_cache();
        let placements = vec![placement(0, 0, 0.0, 2000.0)];
        let first = build_markers_from_layout(&placements, 3000.0, "b1", None);
        let second = build_markers_from_layout(&placements, 3000.0, "b2", None);
        assert_eq!(first[0].length, second[0].length);
        assert_eq!(first[0].rects, second[0].rects);
        // batch_id is stamped per-call, not cached.
        assert_eq!(first[0].batch_id, "b1");
        assert_eq!(second[0].batch_id, "b2");
    }
}

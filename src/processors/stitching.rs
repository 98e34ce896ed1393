//! Cross-tile reconciliation of events split by tile seams.
//!
//! Tiles are classified independently, so a fire straddling a seam ends up as
//! separate tile-local events. This module:
//!
//! 1. Gives every `(tile, local id)` pair a global slot
//! 2. Indexes edge detections in a `kiddo` KD-tree and finds every pair of
//!    events with detections inside the box buffer
//!    (`|dy| < buffer && |dx| < buffer`, `buffer = spatial_param * resolution`)
//! 3. Repeatedly unions spatially adjacent groups whose day ranges are within
//!    `temporal_param` of each other, using a lock-free union-find, until a
//!    pass performs no union
//! 4. Renumbers the surviving groups `1..=n` by earliest detection day
//!
//! Merging only ever widens a group's day range, so the fixed point does not
//! depend on the order pairs are scanned in.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use kiddo::{ImmutableKdTree, SquaredEuclidean};
use rayon::prelude::*;
use thiserror::Error;

use crate::config::ClassificationConfig;
use crate::core::grid::date_to_day;
use crate::core::tables::{EventRow, TileEventTable};

/// Errors raised before any stitching happens.
#[derive(Debug, Error)]
pub enum StitchError {
    #[error("tile {tile} has {field} '{found}' but tile {reference} has '{expected}'; all tiles must share one grid")]
    GeometryMismatch {
        tile: String,
        reference: String,
        field: &'static str,
        expected: String,
        found: String,
    },

    #[error("tile {tile} was classified with spatial_param={found_spatial}, temporal_param={found_temporal} but stitching uses spatial_param={spatial}, temporal_param={temporal}; reclassify it")]
    ThresholdMismatch {
        tile: String,
        spatial: usize,
        temporal: u32,
        found_spatial: usize,
        found_temporal: u32,
    },

    #[error("tile {0} was supplied more than once")]
    DuplicateTile(String),
}

/// Disjoint sets over event slots, shared between rayon workers.
///
/// Every link points from a higher slot to a lower one, so the root of a set
/// is always its smallest slot. Only roots are ever relinked, through a CAS;
/// an ancestor never stops being an ancestor, which lets `find` shorten
/// paths with plain stores.
pub struct SlotUnion {
    parent: Vec<AtomicUsize>,
}

impl SlotUnion {
    pub fn new(slots: usize) -> Self {
        Self {
            parent: (0..slots).map(AtomicUsize::new).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Root slot of `slot`'s set, halving the path on the way.
    pub fn find(&self, mut slot: usize) -> usize {
        loop {
            let up = self.parent[slot].load(Ordering::Acquire);
            if up == slot {
                return slot;
            }
            let skip = self.parent[up].load(Ordering::Acquire);
            if skip == up {
                return up;
            }
            self.parent[slot].store(skip, Ordering::Release);
            slot = skip;
        }
    }

    /// Join the sets of `a` and `b`; false if they were already one set.
    pub fn union(&self, a: usize, b: usize) -> bool {
        let (mut a, mut b) = (a, b);
        loop {
            a = self.find(a);
            b = self.find(b);
            if a == b {
                return false;
            }
            let (low, high) = (a.min(b), a.max(b));
            if self.parent[high]
                .compare_exchange(high, low, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }
}

/// Counters describing one stitching run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StitchSummary {
    pub tiles: usize,
    /// Tile-local events fed in
    pub input_events: usize,
    /// Tile-local events flagged as touching a tile edge
    pub edge_events: usize,
    /// Distinct spatially adjacent event pairs
    pub adjacent_pairs: usize,
    /// Unions performed across all passes
    pub merges: usize,
    pub passes: usize,
    /// Events after stitching
    pub events: usize,
}

/// Merged, chronologically numbered rows plus run counters.
#[derive(Debug, Clone, Default)]
pub struct StitchOutput {
    pub rows: Vec<EventRow>,
    pub summary: StitchSummary,
}

/// Global slot for every tile-local event.
struct EventIndex {
    /// `(table position, local id)` per slot
    keys: Vec<(usize, u64)>,
    /// `(first day, last day)` per slot
    ranges: Vec<(i32, i32)>,
    edge: Vec<bool>,
    /// Slot of every row, per table
    row_slots: Vec<Vec<usize>>,
}

impl EventIndex {
    fn build(tables: &[TileEventTable]) -> Self {
        let mut lookup: HashMap<(usize, u64), usize> = HashMap::new();
        let mut keys = Vec::new();
        let mut ranges: Vec<(i32, i32)> = Vec::new();
        let mut edge = Vec::new();
        let mut row_slots = Vec::with_capacity(tables.len());

        for (t, table) in tables.iter().enumerate() {
            let mut slots = Vec::with_capacity(table.rows.len());
            for row in &table.rows {
                let day = date_to_day(row.date);
                let slot = *lookup.entry((t, row.id)).or_insert_with(|| {
                    keys.push((t, row.id));
                    ranges.push((day, day));
                    edge.push(false);
                    keys.len() - 1
                });
                let range = &mut ranges[slot];
                range.0 = range.0.min(day);
                range.1 = range.1.max(day);
                edge[slot] |= row.edge;
                slots.push(slot);
            }
            row_slots.push(slots);
        }

        Self {
            keys,
            ranges,
            edge,
            row_slots,
        }
    }

    #[inline]
    fn len(&self) -> usize {
        self.keys.len()
    }
}

/// Whether two day ranges are within `temporal_param` days of each other.
#[inline]
fn days_close(a: (i32, i32), b: (i32, i32), temporal_param: u32) -> bool {
    let gap = i64::from(a.0.max(b.0)) - i64::from(a.1.min(b.1));
    gap <= i64::from(temporal_param)
}

/// Reconciles tile-local events into one global, chronologically numbered set.
#[derive(Debug, Clone)]
pub struct TileStitcher {
    config: ClassificationConfig,
}

impl TileStitcher {
    pub fn new(config: ClassificationConfig) -> Self {
        Self { config }
    }

    /// Stitch the given tiles. All tiles must share CRS and resolution and
    /// must have been classified with this stitcher's thresholds.
    pub fn stitch(&self, tables: &[TileEventTable]) -> Result<StitchOutput, StitchError> {
        let Some(reference) = tables.first() else {
            return Ok(StitchOutput::default());
        };
        validate_tiles(tables, &self.config)?;

        let buffer = self.config.spatial_buffer(reference.geometry.resolution);
        let index = EventIndex::build(tables);
        let pairs = adjacent_pairs(tables, &index, buffer);

        let uf = SlotUnion::new(index.len());
        let (passes, merges) = merge_until_stable(&uf, &index, &pairs, self.config.temporal_param);
        let (rows, events) = renumber(tables, &index, &uf);

        let summary = StitchSummary {
            tiles: tables.len(),
            input_events: index.len(),
            edge_events: index.edge.iter().filter(|&&e| e).count(),
            adjacent_pairs: pairs.len(),
            merges,
            passes,
            events,
        };
        log::info!(
            "stitched {} tiles: {} events -> {} events ({} merges in {} passes)",
            summary.tiles,
            summary.input_events,
            summary.events,
            summary.merges,
            summary.passes
        );

        Ok(StitchOutput { rows, summary })
    }
}

/// Reject tile sets that do not share one grid definition or were classified
/// under other thresholds.
fn validate_tiles(tables: &[TileEventTable], config: &ClassificationConfig) -> Result<(), StitchError> {
    let Some(reference) = tables.first() else {
        return Ok(());
    };
    let mut seen: Vec<&str> = Vec::with_capacity(tables.len());

    for table in tables {
        if seen.contains(&table.tile_id.as_str()) {
            return Err(StitchError::DuplicateTile(table.tile_id.clone()));
        }
        seen.push(&table.tile_id);

        if table.classification != *config {
            return Err(StitchError::ThresholdMismatch {
                tile: table.tile_id.clone(),
                spatial: config.spatial_param,
                temporal: config.temporal_param,
                found_spatial: table.classification.spatial_param,
                found_temporal: table.classification.temporal_param,
            });
        }

        let mismatch = |field: &'static str, expected: String, found: String| {
            StitchError::GeometryMismatch {
                tile: table.tile_id.clone(),
                reference: reference.tile_id.clone(),
                field,
                expected,
                found,
            }
        };
        if table.geometry.crs != reference.geometry.crs {
            return Err(mismatch(
                "crs",
                reference.geometry.crs.clone(),
                table.geometry.crs.clone(),
            ));
        }
        if table.geometry.resolution != reference.geometry.resolution {
            return Err(mismatch(
                "resolution",
                reference.geometry.resolution.to_string(),
                table.geometry.resolution.to_string(),
            ));
        }
    }
    Ok(())
}

/// Every distinct pair of edge events with detections inside the box buffer.
fn adjacent_pairs(tables: &[TileEventTable], index: &EventIndex, buffer: f64) -> Vec<(usize, usize)> {
    // Deduplicate positions; a pixel burning on several days is one point in space
    let mut position_slots: HashMap<(u64, u64), usize> = HashMap::new();
    let mut positions: Vec<[f64; 2]> = Vec::new();
    let mut occupants: Vec<Vec<usize>> = Vec::new();

    for (t, table) in tables.iter().enumerate() {
        for (r, row) in table.rows.iter().enumerate() {
            if !row.edge {
                continue;
            }
            let event = index.row_slots[t][r];
            let slot = *position_slots
                .entry((row.x.to_bits(), row.y.to_bits()))
                .or_insert_with(|| {
                    positions.push([row.x, row.y]);
                    occupants.push(Vec::new());
                    positions.len() - 1
                });
            if !occupants[slot].contains(&event) {
                occupants[slot].push(event);
            }
        }
    }

    if positions.is_empty() {
        return Vec::new();
    }

    let tree: ImmutableKdTree<f64, 2> = ImmutableKdTree::new_from_slice(&positions);
    // The box |dx| < b, |dy| < b fits inside the circle of radius b * sqrt(2)
    let radius_sq = 2.0 * buffer * buffer;

    let mut pairs: Vec<(usize, usize)> = positions
        .par_iter()
        .enumerate()
        .flat_map_iter(|(i, pos)| {
            let mut found = Vec::new();
            for nn in tree.within::<SquaredEuclidean>(pos, radius_sq) {
                let j = nn.item as usize;
                if j < i {
                    continue;
                }
                let other = &positions[j];
                if (other[0] - pos[0]).abs() >= buffer || (other[1] - pos[1]).abs() >= buffer {
                    continue;
                }
                for &a in &occupants[i] {
                    for &b in &occupants[j] {
                        if a != b {
                            found.push((a.min(b), a.max(b)));
                        }
                    }
                }
            }
            found
        })
        .collect();

    pairs.par_sort_unstable();
    pairs.dedup();
    pairs
}

/// Union adjacent groups until a pass finds nothing left to merge.
///
/// Each pass compares group day ranges from a snapshot taken at its start,
/// so the pass itself can run in parallel. Returns `(passes, merges)`.
fn merge_until_stable(
    uf: &SlotUnion,
    index: &EventIndex,
    pairs: &[(usize, usize)],
    temporal_param: u32,
) -> (usize, usize) {
    let n = uf.len();
    let mut passes = 0;
    let mut merges = 0;

    loop {
        passes += 1;

        let roots: Vec<usize> = (0..n).into_par_iter().map(|i| uf.find(i)).collect();
        let mut spans = vec![(i32::MAX, i32::MIN); n];
        for (slot, &(first, last)) in index.ranges.iter().enumerate() {
            let span = &mut spans[roots[slot]];
            span.0 = span.0.min(first);
            span.1 = span.1.max(last);
        }

        let merged = pairs
            .par_iter()
            .filter(|&&(a, b)| {
                let (ra, rb) = (roots[a], roots[b]);
                ra != rb && days_close(spans[ra], spans[rb], temporal_param)
            })
            .filter(|&&(a, b)| uf.union(a, b))
            .count();

        log::debug!("stitch pass {}: {} merges", passes, merged);
        merges += merged;
        if merged == 0 {
            break;
        }
    }

    (passes, merges)
}

/// Assign dense ids by earliest detection day and emit the merged rows.
///
/// Ties on the first day are broken by the smallest `(tile, local id)` in the
/// group, so numbering does not depend on input order.
fn renumber(
    tables: &[TileEventTable],
    index: &EventIndex,
    uf: &SlotUnion,
) -> (Vec<EventRow>, usize) {
    let n = index.len();
    let roots: Vec<usize> = (0..n).map(|i| uf.find(i)).collect();

    let mut groups: HashMap<usize, (i32, &str, u64)> = HashMap::new();
    for slot in 0..n {
        let (t, local) = index.keys[slot];
        let candidate = (index.ranges[slot].0, tables[t].tile_id.as_str(), local);
        groups
            .entry(roots[slot])
            .and_modify(|best| {
                best.0 = best.0.min(candidate.0);
                if (candidate.1, candidate.2) < (best.1, best.2) {
                    best.1 = candidate.1;
                    best.2 = candidate.2;
                }
            })
            .or_insert(candidate);
    }

    let mut order: Vec<(usize, (i32, &str, u64))> = groups.into_iter().collect();
    order.sort_unstable_by(|a, b| a.1.cmp(&b.1));
    let new_ids: HashMap<usize, u64> = order
        .iter()
        .enumerate()
        .map(|(i, (root, _))| (*root, i as u64 + 1))
        .collect();

    let mut rows = Vec::with_capacity(tables.iter().map(|t| t.rows.len()).sum());
    for (t, table) in tables.iter().enumerate() {
        for (r, row) in table.rows.iter().enumerate() {
            let root = roots[index.row_slots[t][r]];
            rows.push(EventRow {
                id: new_ids[&root],
                tile: row.tile.clone(),
                date: row.date,
                x: row.x,
                y: row.y,
            });
        }
    }
    rows.sort_by(|a, b| (a.id, a.date).cmp(&(b.id, b.date)));

    (rows, order.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::{day_to_date, TileGeometry};
    use crate::core::tables::TileEventRow;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use std::collections::BTreeSet;

    const RES: f64 = 10.0;

    fn geometry() -> TileGeometry {
        TileGeometry {
            crs: "sinusoidal".to_string(),
            resolution: RES,
            x_origin: 0.0,
            y_origin: 0.0,
            nx: 10,
            ny: 10,
        }
    }

    fn row(tile: &str, id: u64, day: i32, x: f64, y: f64, edge: bool) -> TileEventRow {
        TileEventRow {
            id,
            date: day_to_date(day).unwrap(),
            x,
            y,
            edge,
            tile: tile.to_string(),
        }
    }

    fn table(tile: &str, rows: Vec<TileEventRow>) -> TileEventTable {
        TileEventTable {
            tile_id: tile.to_string(),
            geometry: geometry(),
            classification: ClassificationConfig::default(),
            rows,
        }
    }

    /// Stitch `tables` as if each had been classified with the given thresholds.
    fn run(spatial: usize, temporal: u32, tables: &[TileEventTable]) -> Result<StitchOutput, StitchError> {
        let config = ClassificationConfig::new(spatial, temporal);
        let tables: Vec<TileEventTable> = tables
            .iter()
            .cloned()
            .map(|mut t| {
                t.classification = config;
                t
            })
            .collect();
        TileStitcher::new(config).stitch(&tables)
    }

    /// Partition of rows into events, ignoring ids and row order.
    fn partition(rows: &[EventRow]) -> BTreeSet<BTreeSet<(String, i32, u64, u64)>> {
        let mut groups: HashMap<u64, BTreeSet<(String, i32, u64, u64)>> = HashMap::new();
        for r in rows {
            groups.entry(r.id).or_default().insert((
                r.tile.clone(),
                date_to_day(r.date),
                r.x.to_bits(),
                r.y.to_bits(),
            ));
        }
        groups.into_values().collect()
    }

    #[test]
    fn test_slot_union_roots_are_smallest_slot() {
        let uf = SlotUnion::new(5);

        assert_eq!(uf.find(0), 0);
        assert_eq!(uf.find(4), 4);

        assert!(uf.union(0, 1));
        assert_eq!(uf.find(0), uf.find(1));

        assert!(uf.union(2, 3));
        assert_ne!(uf.find(0), uf.find(2));

        assert!(uf.union(3, 1));
        assert_eq!(uf.find(0), uf.find(3));
        // Roots are the smallest slot of their set
        assert_eq!(uf.find(3), 0);
        assert_eq!(uf.find(4), 4);

        // Union of same set returns false
        assert!(!uf.union(0, 3));
    }

    #[test]
    fn test_days_close() {
        assert!(days_close((50, 50), (52, 52), 11));
        assert!(days_close((10, 40), (20, 25), 0));
        assert!(days_close((0, 10), (21, 30), 11));
        assert!(!days_close((0, 10), (22, 30), 11));
        assert!(!days_close((22, 30), (0, 10), 11));
    }

    #[test]
    fn test_scenario_two_adjacent_tiles() {
        // tile A's last column meets tile B's first column one pixel apart
        let a = table(
            "h01v01",
            vec![row("h01v01", 1, 50, 95.0, -45.0, true), row("h01v01", 2, 10, 45.0, -45.0, false)],
        );
        let b = table("h02v01", vec![row("h02v01", 1, 52, 105.0, -45.0, true)]);

        let out = run(5, 11, &[a, b]).unwrap();

        assert_eq!(out.summary.events, 2);
        let merged: Vec<_> = out.rows.iter().filter(|r| r.x != 45.0).collect();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].id, merged[1].id);
        let first = merged.iter().map(|r| r.date).min().unwrap();
        assert_eq!(first, day_to_date(50).unwrap());
        // the interior event burned earlier, so it is numbered first
        assert_eq!(merged[0].id, 2);
    }

    #[test]
    fn test_temporal_gap_prevents_merge() {
        let a = table("h01v01", vec![row("h01v01", 1, 50, 95.0, -45.0, true)]);
        let b = table("h02v01", vec![row("h02v01", 1, 80, 105.0, -45.0, true)]);

        let out = run(5, 11, &[a, b]).unwrap();
        assert_eq!(out.summary.events, 2);
        assert_eq!(out.rows[0].date, day_to_date(50).unwrap());
        assert_eq!(out.rows[0].id, 1);
    }

    #[test]
    fn test_box_buffer_is_strict() {
        // exactly spatial_param * resolution apart on x: not adjacent
        let a = table("h01v01", vec![row("h01v01", 1, 50, 0.0, 0.0, true)]);
        let b = table("h02v01", vec![row("h02v01", 1, 50, 20.0, 0.0, true)]);
        let out = run(2, 11, &[a.clone(), b]).unwrap();
        assert_eq!(out.summary.events, 2);

        let c = table("h02v01", vec![row("h02v01", 1, 50, 19.0, 19.0, true)]);
        let out = run(2, 11, &[a, c]).unwrap();
        assert_eq!(out.summary.events, 1);
    }

    #[test]
    fn test_interior_rows_are_never_matched() {
        let a = table("h01v01", vec![row("h01v01", 1, 50, 95.0, -45.0, false)]);
        let b = table("h02v01", vec![row("h02v01", 1, 50, 105.0, -45.0, true)]);
        let out = run(5, 11, &[a, b]).unwrap();
        assert_eq!(out.summary.events, 2);
        assert_eq!(out.summary.adjacent_pairs, 0);
    }

    #[test]
    fn test_widened_range_merges_in_later_pass() {
        // A (days 50..60) touches B (day 68); the merged group then reaches C
        // (day 75), which is spatially next to A only and 15 days from A's range.
        let a = table(
            "h01v01",
            vec![
                row("h01v01", 1, 50, 95.0, -45.0, true),
                row("h01v01", 1, 60, 95.0, -55.0, true),
            ],
        );
        let b = table("h02v01", vec![row("h02v01", 1, 68, 105.0, -55.0, true)]);
        let c = table("h01v02", vec![row("h01v02", 1, 75, 95.0, -35.0, true)]);

        let out = run(2, 11, &[a, b, c]).unwrap();

        assert_eq!(out.summary.events, 1);
        assert_eq!(out.summary.merges, 2);
        assert!(out.summary.passes >= 3);
        assert!(out.rows.iter().all(|r| r.id == 1));
    }

    #[test]
    fn test_every_row_keeps_exactly_one_id() {
        let a = table(
            "h01v01",
            vec![
                row("h01v01", 1, 50, 95.0, -45.0, true),
                row("h01v01", 1, 50, 95.0, -45.0, true),
                row("h01v01", 2, 90, 5.0, -5.0, true),
            ],
        );
        let b = table("h02v01", vec![row("h02v01", 7, 55, 105.0, -45.0, true)]);
        let out = run(5, 11, &[a, b]).unwrap();

        assert_eq!(out.rows.len(), 4);
        let ids: BTreeSet<u64> = out.rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, BTreeSet::from([1, 2]));
        assert!(out.rows.windows(2).all(|w| w[0].id <= w[1].id));
    }

    #[test]
    fn test_resolution_mismatch_rejected() {
        let a = table("h01v01", vec![row("h01v01", 1, 50, 0.0, 0.0, true)]);
        let mut b = table("h02v01", vec![row("h02v01", 1, 50, 10.0, 0.0, true)]);
        b.geometry.resolution = 20.0;

        let err = run(5, 11, &[a, b]).unwrap_err();
        match err {
            StitchError::GeometryMismatch { tile, field, .. } => {
                assert_eq!(tile, "h02v01");
                assert_eq!(field, "resolution");
            }
            other => panic!("expected GeometryMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_crs_mismatch_rejected() {
        let a = table("h01v01", Vec::new());
        let mut b = table("h02v01", Vec::new());
        b.geometry.crs = "EPSG:4326".to_string();
        assert!(matches!(
            run(5, 11, &[a, b]),
            Err(StitchError::GeometryMismatch { field: "crs", .. })
        ));
    }

    #[test]
    fn test_duplicate_tile_rejected() {
        let a = table("h01v01", Vec::new());
        assert!(matches!(
            run(5, 11, &[a.clone(), a]),
            Err(StitchError::DuplicateTile(_))
        ));
    }

    #[test]
    fn test_tables_from_other_thresholds_rejected() {
        let a = table("h01v01", vec![row("h01v01", 1, 50, 0.0, 0.0, true)]);
        let mut b = table("h02v01", vec![row("h02v01", 1, 50, 10.0, 0.0, true)]);
        b.classification = ClassificationConfig::new(2, 11);

        let result = TileStitcher::new(ClassificationConfig::default()).stitch(&[a, b]);
        match result {
            Err(StitchError::ThresholdMismatch {
                tile,
                spatial,
                found_spatial,
                ..
            }) => {
                assert_eq!(tile, "h02v01");
                assert_eq!((spatial, found_spatial), (5, 2));
            }
            other => panic!("expected ThresholdMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_no_tiles() {
        let out = run(5, 11, &[]).unwrap();
        assert!(out.rows.is_empty());
        assert_eq!(out.summary, StitchSummary::default());
    }

    #[test]
    fn test_scan_order_does_not_change_result() {
        // a 3x3 block of tiles, each with a few events along its borders
        let mut tables = Vec::new();
        for ty in 0..3 {
            for tx in 0..3 {
                let tile = format!("h{:02}v{:02}", tx, ty);
                let x0 = tx as f64 * 100.0;
                let y0 = -(ty as f64) * 100.0;
                let base = 100 + 7 * (tx + ty) as i32;
                let rows = vec![
                    row(&tile, 1, base, x0 + 95.0, y0 - 45.0, true),
                    row(&tile, 1, base + 3, x0 + 95.0, y0 - 55.0, true),
                    row(&tile, 2, base + 20, x0 + 5.0, y0 - 95.0, true),
                    row(&tile, 3, base + 2, x0 + 45.0, y0 - 5.0, true),
                    row(&tile, 4, base, x0 + 50.0, y0 - 50.0, false),
                ];
                tables.push(table(&tile, rows));
            }
        }

        let reference = run(2, 11, &tables).unwrap();
        let expected = partition(&reference.rows);

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10 {
            let mut shuffled = tables.clone();
            shuffled.shuffle(&mut rng);
            for t in shuffled.iter_mut() {
                t.rows.shuffle(&mut rng);
            }
            let out = run(2, 11, &shuffled).unwrap();
            assert_eq!(partition(&out.rows), expected);
            assert_eq!(out.summary.events, reference.summary.events);

            let mut got: Vec<_> = out.rows.iter().map(|r| (r.id, r.tile.clone(), r.date)).collect();
            let mut want: Vec<_> = reference
                .rows
                .iter()
                .map(|r| (r.id, r.tile.clone(), r.date))
                .collect();
            got.sort();
            want.sort();
            assert_eq!(got, want);
        }
    }
}

//! Detection-to-track association.
//!
//! Matching is greedy nearest-first over a gated cost matrix rather than an
//! optimal bipartite assignment. Track counts at the edge are small, and the
//! greedy order is what the tests pin down: the globally cheapest remaining
//! pair is committed first, ties go to the lowest track id and then to the
//! lowest detection index.

use ndarray::Array2;

use crate::error::TrackingError;
use crate::tracker::detection::Detection;
use crate::tracker::track::Track;

/// Outcome of associating one frame's detections with the live tracks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignment {
    /// (detection index, track id)
    pub matches: Vec<(usize, u64)>,
    pub unmatched_detections: Vec<usize>,
    pub unmatched_tracks: Vec<u64>,
    /// Tracks whose cost could not be computed; they take no part in matching.
    pub faulted_tracks: Vec<TrackingError>,
}

/// Build the (tracks x detections) cost matrix. Entries above `gate` and
/// entries for faulted tracks are +inf.
pub fn cost_matrix(
    tracks: &[Track],
    detections: &[Detection],
    gate: f64,
) -> (Array2<f64>, Vec<(usize, TrackingError)>) {
    let mut costs = Array2::from_elem((tracks.len(), detections.len()), f64::INFINITY);
    let mut faults = Vec::new();

    for (i, track) in tracks.iter().enumerate() {
        for (j, det) in detections.iter().enumerate() {
            match track.cost(det) {
                Ok(cost) if cost <= gate => costs[[i, j]] = cost,
                Ok(_) => {}
                Err(err) => {
                    costs.row_mut(i).fill(f64::INFINITY);
                    faults.push((i, err));
                    break;
                }
            }
        }
    }
    (costs, faults)
}

/// Greedy nearest-first assignment over finite costs. Returns (row, col) pairs.
pub fn greedy_assignment(costs: &Array2<f64>, track_ids: &[u64]) -> Vec<(usize, usize)> {
    let (rows, cols) = costs.dim();

    let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
    for i in 0..rows {
        for j in 0..cols {
            let cost = costs[[i, j]];
            if cost.is_finite() {
                candidates.push((cost, i, j));
            }
        }
    }
    candidates.sort_by(|a, b| {
        a.0.total_cmp(&b.0)
            .then_with(|| track_ids[a.1].cmp(&track_ids[b.1]))
            .then_with(|| a.2.cmp(&b.2))
    });

    let mut row_used = vec![false; rows];
    let mut col_used = vec![false; cols];
    let mut pairs = Vec::new();
    for (_, i, j) in candidates {
        if row_used[i] || col_used[j] {
            continue;
        }
        row_used[i] = true;
        col_used[j] = true;
        pairs.push((i, j));
    }
    pairs
}

/// Match detections to tracks whose motion models have already been
/// advanced to the current frame.
pub fn associate(detections: &[Detection], tracks: &[Track], gate: f64) -> Assignment {
    if tracks.is_empty() {
        return Assignment {
            unmatched_detections: (0..detections.len()).collect(),
            ..Assignment::default()
        };
    }
    if detections.is_empty() {
        return Assignment {
            unmatched_tracks: tracks.iter().map(Track::id).collect(),
            ..Assignment::default()
        };
    }

    let (costs, faults) = cost_matrix(tracks, detections, gate);
    let track_ids: Vec<u64> = tracks.iter().map(Track::id).collect();
    let pairs = greedy_assignment(&costs, &track_ids);

    let mut track_done = vec![false; tracks.len()];
    let mut det_done = vec![false; detections.len()];
    let mut faulted_tracks = Vec::with_capacity(faults.len());
    for (row, err) in faults {
        track_done[row] = true;
        faulted_tracks.push(err);
    }

    let mut matches: Vec<(usize, u64)> = pairs
        .into_iter()
        .map(|(row, col)| {
            track_done[row] = true;
            det_done[col] = true;
            (col, track_ids[row])
        })
        .collect();
    matches.sort_unstable();

    Assignment {
        matches,
        unmatched_detections: det_done
            .iter()
            .enumerate()
            .filter_map(|(j, &done)| (!done).then_some(j))
            .collect(),
        unmatched_tracks: track_done
            .iter()
            .enumerate()
            .filter_map(|(i, &done)| (!done).then_some(track_ids[i]))
            .collect(),
        faulted_tracks,
    }
}

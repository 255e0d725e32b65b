//! Two-pass connected-component labeling over a thresholded scalar field.
//!
//! Regions are grown breadth-first with 8-connectivity from each unlabeled
//! above-threshold cell, recording one local maximum per region. Scan order
//! is row-major, so tie-breaking among equal maxima is the first cell
//! encountered in that order; reproducibility depends on it.

use ndarray::Array2;
use std::collections::VecDeque;

const NOT_SET: i32 = 0;
const IN_QUEUE: i32 = -1;

/// One connected region's summit.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalMaxima {
    pub max_coordinate: (usize, usize),
    pub max_val: f32,
    pub area: usize,
}

/// Extract region summits when the field carries real signal: the threshold
/// is `0.85 x global max`, and nothing is extracted at all unless that
/// threshold clears `floor` (near-empty fields produce spurious maxima).
pub fn extract_maxima(image: &Array2<f32>, floor: f32) -> Vec<LocalMaxima> {
    let global_max = image.iter().fold(0.0f32, |acc, &v| acc.max(v));
    let threshold = global_max * 0.85;
    if threshold > floor {
        detect(image, threshold as f64)
    } else {
        Vec::new()
    }
}

/// Label all 8-connected regions of cells strictly above `threshold`,
/// returning `(argmax, max value, area)` per region in scan order.
pub fn detect(image: &Array2<f32>, threshold: f64) -> Vec<LocalMaxima> {
    let (rows, cols) = image.dim();
    let mut labels: Array2<i32> = Array2::from_elem((rows, cols), NOT_SET);
    let mut next_label = 1;

    let mut results = Vec::new();
    for i in 0..rows {
        for j in 0..cols {
            if image[[i, j]] as f64 > threshold && labels[[i, j]] == NOT_SET {
                let mut points = VecDeque::new();
                points.push_back((i, j));
                labels[[i, j]] = IN_QUEUE;
                results.push(process_region(image, threshold, &mut labels, points, next_label));
                next_label += 1;
            }
        }
    }
    results
}

fn process_region(
    image: &Array2<f32>,
    threshold: f64,
    labels: &mut Array2<i32>,
    mut points: VecDeque<(usize, usize)>,
    id: i32,
) -> LocalMaxima {
    let (rows, cols) = image.dim();
    let mut area = 0;
    let mut max_coordinate = *points.front().expect("seeded queue");
    let mut max_val = image[[max_coordinate.0, max_coordinate.1]];

    while let Some(current) = points.pop_front() {
        area += 1;
        labels[[current.0, current.1]] = id;

        if image[[current.0, current.1]] > max_val {
            max_val = image[[current.0, current.1]];
            max_coordinate = current;
        }

        for i in current.0.saturating_sub(1)..(current.0 + 2).min(rows) {
            for j in current.1.saturating_sub(1)..(current.1 + 2).min(cols) {
                if image[[i, j]] as f64 > threshold && labels[[i, j]] == NOT_SET {
                    points.push_back((i, j));
                    labels[[i, j]] = IN_QUEUE;
                }
            }
        }
    }

    LocalMaxima {
        max_coordinate,
        max_val,
        area,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_disjoint_blobs_report_two_regions() {
        let mut image: Array2<f32> = Array2::zeros((10, 10));
        // Blob 1: 2x2 with summit at (1, 2).
        image[[1, 1]] = 5.0;
        image[[1, 2]] = 8.0;
        image[[2, 1]] = 5.0;
        image[[2, 2]] = 5.0;
        // Blob 2: 3 cells with summit at (7, 8), separated by sub-threshold
        // cells.
        image[[7, 7]] = 4.0;
        image[[7, 8]] = 9.0;
        image[[8, 7]] = 4.0;

        let regions = detect(&image, 3.0);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].max_coordinate, (1, 2));
        assert_eq!(regions[0].max_val, 8.0);
        assert_eq!(regions[0].area, 4);
        assert_eq!(regions[1].max_coordinate, (7, 8));
        assert_eq!(regions[1].area, 3);
    }

    #[test]
    fn uniform_blob_ties_break_to_first_scanned() {
        let mut image: Array2<f32> = Array2::zeros((6, 6));
        for i in 2..5 {
            for j in 2..5 {
                image[[i, j]] = 7.0;
            }
        }
        let regions = detect(&image, 1.0);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area, 9);
        assert_eq!(regions[0].max_coordinate, (2, 2));
    }

    #[test]
    fn diagonal_cells_are_connected() {
        let mut image: Array2<f32> = Array2::zeros((4, 4));
        image[[0, 0]] = 5.0;
        image[[1, 1]] = 6.0;
        image[[2, 2]] = 5.0;
        let regions = detect(&image, 2.0);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area, 3);
        assert_eq!(regions[0].max_coordinate, (1, 1));
    }

    #[test]
    fn near_empty_field_yields_nothing() {
        let mut image: Array2<f32> = Array2::zeros((8, 8));
        image[[3, 3]] = 6.0;
        assert!(extract_maxima(&image, 10.0).is_empty());

        image[[3, 3]] = 60.0;
        let regions = extract_maxima(&image, 10.0);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].max_coordinate, (3, 3));
    }
}

//! Score matrix and optimal assignment
//!
//! Rows are title positions, columns are candidate boxes. The solver tries
//! every permutation in lexicographic order and keeps the first one reaching
//! the maximum total, which makes ties resolve the same way on every run.
//! `n` never exceeds 4 here, so the search is at most 24 candidates.

use crate::types::VoteTally;
use serde::Serialize;

/// `n x n` compatibility scores, row-major
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreMatrix {
    n: usize,
    cells: Vec<f64>,
}

impl ScoreMatrix {
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            cells: vec![0.0; n * n],
        }
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        let n = rows.len();
        debug_assert!(rows.iter().all(|r| r.len() == n), "score matrix must be square");
        Self {
            n,
            cells: rows.into_iter().flatten().collect(),
        }
    }

    /// Votes for title label `i` in box `j`
    pub fn from_votes(labels: &[String], tallies: &[VoteTally]) -> Self {
        let n = labels.len().min(tallies.len());
        let mut matrix = Self::zeros(n);
        for (i, label) in labels.iter().take(n).enumerate() {
            for (j, tally) in tallies.iter().take(n).enumerate() {
                matrix.set(i, j, tally.count(label) as f64);
            }
        }
        matrix
    }

    /// `vote_weight * self + shape_weight * shape`, cell by cell
    pub fn blend(&self, shape: &ScoreMatrix, vote_weight: f64, shape_weight: f64) -> Self {
        debug_assert_eq!(self.n, shape.n);
        Self {
            n: self.n,
            cells: self
                .cells
                .iter()
                .zip(&shape.cells)
                .map(|(v, s)| vote_weight * v + shape_weight * s)
                .collect(),
        }
    }

    pub fn size(&self) -> usize {
        self.n
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.cells[i * self.n + j]
    }

    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.cells[i * self.n + j] = value;
    }

    /// Sum of `(i, perm[i])` entries
    pub fn total(&self, perm: &[usize]) -> f64 {
        perm.iter().enumerate().map(|(i, &j)| self.get(i, j)).sum()
    }
}

/// Bijection from title position to box index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    /// `columns[i]` is the box chosen for title position `i`
    pub columns: Vec<usize>,
    pub score: f64,
}

impl Assignment {
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Maximize the total score over all permutations
///
/// The identity permutation is enumerated first, so it is also the answer
/// when every permutation scores the same.
pub fn solve(matrix: &ScoreMatrix) -> Assignment {
    let mut best = Assignment {
        columns: (0..matrix.size()).collect(),
        score: matrix.total(&(0..matrix.size()).collect::<Vec<_>>()),
    };
    for perm in Permutations::new(matrix.size()).skip(1) {
        let score = matrix.total(&perm);
        if score > best.score {
            best = Assignment {
                columns: perm,
                score,
            };
        }
    }
    best
}

/// Permutations of `0..n` in lexicographic order
pub struct Permutations {
    next: Option<Vec<usize>>,
}

impl Permutations {
    pub fn new(n: usize) -> Self {
        Self {
            next: Some((0..n).collect()),
        }
    }
}

impl Iterator for Permutations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let current = self.next.take()?;
        let mut following = current.clone();
        if next_permutation(&mut following) {
            self.next = Some(following);
        }
        Some(current)
    }
}

/// Advance `items` to its lexicographic successor; false when it was the last
fn next_permutation(items: &mut [usize]) -> bool {
    let n = items.len();
    if n < 2 {
        return false;
    }
    let mut i = n - 1;
    while i > 0 && items[i - 1] >= items[i] {
        i -= 1;
    }
    if i == 0 {
        return false;
    }
    let mut j = n - 1;
    while items[j] <= items[i - 1] {
        j -= 1;
    }
    items.swap(i - 1, j);
    items[i..].reverse();
    true
}

//! Fill-reducing orderings.
//!
//! An ordering is a permutation `perm` with `perm[new] = old`, applied
//! symmetrically (`B = P A Pᵀ`) before factorization. All orderings work on
//! the symmetrized pattern of `A + Aᵀ` without its diagonal.
//!
//! | Ordering              | Goal |
//! |-----------------------|------|
//! | `Identity`            | keep the natural order |
//! | `ReverseCuthillMcKee` | reduce bandwidth (good for banded solvers) |
//! | `MinimumDegree`       | reduce fill-in (default for `Automatic`) |
//! | `User`                | permutation supplied by the caller |

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SolverError};
use crate::matrix::CsrMatrix;

/// Ordering strategy applied before factorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ordering {
    /// Let the library choose (minimum degree).
    #[default]
    Automatic,
    /// Natural order.
    Identity,
    /// Reverse Cuthill-McKee.
    ReverseCuthillMcKee,
    /// Minimum degree on the elimination graph.
    MinimumDegree,
    /// User-supplied permutation.
    User,
}

impl fmt::Display for Ordering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Ordering::Automatic => "automatic",
            Ordering::Identity => "identity",
            Ordering::ReverseCuthillMcKee => "rcm",
            Ordering::MinimumDegree => "amd",
            Ordering::User => "user",
        };
        f.write_str(name)
    }
}

impl FromStr for Ordering {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "automatic" | "auto" => Ok(Ordering::Automatic),
            "identity" | "natural" | "none" => Ok(Ordering::Identity),
            "rcm" | "reverse-cuthill-mckee" => Ok(Ordering::ReverseCuthillMcKee),
            "amd" | "md" | "minimum-degree" => Ok(Ordering::MinimumDegree),
            "user" => Ok(Ordering::User),
            other => Err(format!("unknown ordering '{}'", other)),
        }
    }
}

/// Compute the permutation for `ordering`.
///
/// `user` is required (and only used) for [`Ordering::User`].
pub fn compute_ordering(
    a: &CsrMatrix,
    ordering: Ordering,
    user: Option<&[usize]>,
) -> Result<Vec<usize>> {
    if !a.is_square() {
        return Err(SolverError::wrong_dim(
            "compute_ordering",
            format!("matrix is {}x{}, orderings need a square matrix", a.nrows(), a.ncols()),
        ));
    }
    match ordering {
        Ordering::Identity => Ok((0..a.nrows()).collect()),
        Ordering::ReverseCuthillMcKee => Ok(reverse_cuthill_mckee(a)),
        Ordering::Automatic | Ordering::MinimumDegree => Ok(minimum_degree(a)),
        Ordering::User => {
            let perm = user.ok_or_else(|| {
                SolverError::wrong_index(
                    "compute_ordering",
                    "user ordering selected but no permutation was given",
                )
            })?;
            validate_permutation(perm, a.nrows())?;
            Ok(perm.to_vec())
        }
    }
}

/// Check that `perm` is a permutation of `0..n`.
pub fn validate_permutation(perm: &[usize], n: usize) -> Result<()> {
    if perm.len() != n {
        return Err(SolverError::wrong_dim(
            "validate_permutation",
            format!("permutation has length {}, matrix has dimension {}", perm.len(), n),
        ));
    }
    let mut seen = vec![false; n];
    for &p in perm {
        if p >= n || seen[p] {
            return Err(SolverError::wrong_index(
                "validate_permutation",
                format!("entry {} is out of range or repeated", p),
            ));
        }
        seen[p] = true;
    }
    Ok(())
}

/// Inverse permutation: `inverse[perm[k]] = k`.
pub fn inverse_permutation(perm: &[usize]) -> Vec<usize> {
    let mut inverse = vec![0; perm.len()];
    for (k, &p) in perm.iter().enumerate() {
        inverse[p] = k;
    }
    inverse
}

/// Half bandwidths `(lower, upper)`.
pub fn bandwidth(a: &CsrMatrix) -> (usize, usize) {
    let mut lower = 0;
    let mut upper = 0;
    for i in 0..a.nrows() {
        for &j in a.row(i).0 {
            if j < i {
                lower = lower.max(i - j);
            } else {
                upper = upper.max(j - i);
            }
        }
    }
    (lower, upper)
}

/// Adjacency of the pattern of `A + Aᵀ`, diagonal excluded, sorted.
fn symmetric_adjacency(a: &CsrMatrix) -> Vec<Vec<usize>> {
    let n = a.nrows();
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
    for i in 0..n {
        for &j in a.row(i).0 {
            if i != j {
                adj[i].push(j);
                adj[j].push(i);
            }
        }
    }
    for neighbors in &mut adj {
        neighbors.sort_unstable();
        neighbors.dedup();
    }
    adj
}

/// Reverse Cuthill-McKee ordering.
///
/// Each connected component is traversed breadth-first from a vertex of
/// minimum degree, visiting neighbors by increasing degree; the final order
/// is reversed.
pub fn reverse_cuthill_mckee(a: &CsrMatrix) -> Vec<usize> {
    let adj = symmetric_adjacency(a);
    let n = adj.len();
    let degree: Vec<usize> = adj.iter().map(Vec::len).collect();

    let mut starts: Vec<usize> = (0..n).collect();
    starts.sort_by_key(|&v| (degree[v], v));

    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut queue = VecDeque::new();

    for &start in &starts {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        queue.push_back(start);
        while let Some(v) = queue.pop_front() {
            order.push(v);
            let mut neighbors: Vec<usize> =
                adj[v].iter().copied().filter(|&u| !visited[u]).collect();
            neighbors.sort_by_key(|&u| (degree[u], u));
            for u in neighbors {
                visited[u] = true;
                queue.push_back(u);
            }
        }
    }

    order.reverse();
    order
}

/// Minimum degree ordering on the explicit elimination graph.
///
/// Ties are broken by the smallest vertex index, so the result is
/// deterministic.
pub fn minimum_degree(a: &CsrMatrix) -> Vec<usize> {
    let mut adj: Vec<HashSet<usize>> = symmetric_adjacency(a)
        .into_iter()
        .map(|v| v.into_iter().collect())
        .collect();
    let n = adj.len();

    let mut eliminated = vec![false; n];
    let mut heap: BinaryHeap<Reverse<(usize, usize)>> =
        (0..n).map(|v| Reverse((adj[v].len(), v))).collect();
    let mut order = Vec::with_capacity(n);

    while let Some(Reverse((deg, p))) = heap.pop() {
        // Skip stale heap entries
        if eliminated[p] || deg != adj[p].len() {
            continue;
        }
        eliminated[p] = true;
        order.push(p);

        let neighbors: Vec<usize> = adj[p].drain().collect();
        for &u in &neighbors {
            adj[u].remove(&p);
        }
        // Eliminating p turns its neighborhood into a clique
        for (k, &u) in neighbors.iter().enumerate() {
            for &w in &neighbors[k + 1..] {
                if adj[u].insert(w) {
                    adj[w].insert(u);
                }
            }
        }
        for &u in &neighbors {
            heap.push(Reverse((adj[u].len(), u)));
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Arrow matrix: dense first row and column plus the diagonal.
    fn arrow(n: usize) -> CsrMatrix {
        let mut rows = Vec::new();
        let mut cols = Vec::new();
        for i in 0..n {
            rows.push(i);
            cols.push(i);
            if i > 0 {
                rows.extend([0, i]);
                cols.extend([i, 0]);
            }
        }
        let values = vec![1.0; rows.len()];
        CsrMatrix::from_coordinates(n, n, &rows, &cols, &values).unwrap()
    }

    #[test]
    fn test_minimum_degree_eliminates_hub_last() {
        let perm = minimum_degree(&arrow(6));
        validate_permutation(&perm, 6).unwrap();
        // The hub has degree 5; leaves have degree 1 and go first
        assert_eq!(perm[5], 0);
    }

    #[test]
    fn test_rcm_reduces_bandwidth() {
        // Path graph 0-4-1-3-2 scrambled into a wide band
        let edges = [(0, 4), (4, 1), (1, 3), (3, 2)];
        let mut rows = vec![0, 1, 2, 3, 4];
        let mut cols = vec![0, 1, 2, 3, 4];
        for &(i, j) in &edges {
            rows.extend([i, j]);
            cols.extend([j, i]);
        }
        let values = vec![1.0; rows.len()];
        let a = CsrMatrix::from_coordinates(5, 5, &rows, &cols, &values).unwrap();
        assert_eq!(bandwidth(&a), (4, 4));

        let perm = reverse_cuthill_mckee(&a);
        validate_permutation(&perm, 5).unwrap();
        assert_eq!(bandwidth(&a.permute_symmetric(&perm)), (1, 1));
    }

    #[test]
    fn test_user_ordering_requires_permutation() {
        let a = arrow(3);
        assert!(compute_ordering(&a, Ordering::User, None).is_err());
        let err = compute_ordering(&a, Ordering::User, Some(&[0, 0, 1])).unwrap_err();
        assert!(matches!(err, SolverError::WrongIndex { .. }));
        assert_eq!(
            compute_ordering(&a, Ordering::User, Some(&[2, 0, 1])).unwrap(),
            vec![2, 0, 1]
        );
    }

    #[test]
    fn test_inverse_permutation() {
        let perm = [2, 0, 3, 1];
        let inv = inverse_permutation(&perm);
        for (k, &p) in perm.iter().enumerate() {
            assert_eq!(inv[p], k);
        }
    }

    #[test]
    fn test_ordering_from_str() {
        assert_eq!("RCM".parse::<Ordering>().unwrap(), Ordering::ReverseCuthillMcKee);
        assert_eq!("amd".parse::<Ordering>().unwrap(), Ordering::MinimumDegree);
        assert!("metis".parse::<Ordering>().is_err());
    }
}

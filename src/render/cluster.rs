//! Complete-linkage hierarchical clustering

/// One agglomeration step. Leaves are `0..n`, the k-th merge creates node `n + k`.
#[derive(Debug, Clone, PartialEq)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dendrogram {
    pub n_leaves: usize,
    pub merges: Vec<Merge>,
    /// Leaves left to right
    pub order: Vec<usize>,
}

impl Dendrogram {
    pub fn max_height(&self) -> f64 {
        self.merges.iter().map(|m| m.height).fold(0.0, f64::max)
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

/// Cluster `points` under Euclidean distance. Ties merge the earliest pair.
pub fn complete_linkage(points: &[Vec<f64>]) -> Dendrogram {
    let n = points.len();
    let mut dist = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = euclidean(&points[i], &points[j]);
            dist[i][j] = d;
            dist[j][i] = d;
        }
    }

    // Active clusters: (node id, slot in `dist`)
    let mut active: Vec<(usize, usize)> = (0..n).map(|i| (i, i)).collect();
    let mut merges = Vec::with_capacity(n.saturating_sub(1));

    while active.len() > 1 {
        let mut best = (0, 1, f64::INFINITY);
        for a in 0..active.len() {
            for b in (a + 1)..active.len() {
                let d = dist[active[a].1][active[b].1];
                if d < best.2 {
                    best = (a, b, d);
                }
            }
        }
        let (a, b, height) = best;
        let (slot_a, slot_b) = (active[a].1, active[b].1);
        for &(_, other) in &active {
            let merged = dist[slot_a][other].max(dist[slot_b][other]);
            dist[slot_a][other] = merged;
            dist[other][slot_a] = merged;
        }
        merges.push(Merge {
            left: active[a].0,
            right: active[b].0,
            height: if height.is_finite() { height } else { 0.0 },
        });
        active[a] = (n + merges.len() - 1, slot_a);
        active.remove(b);
    }

    let order = match active.first() {
        Some(&(root, _)) => leaf_order(root, n, &merges),
        None => Vec::new(),
    };
    Dendrogram {
        n_leaves: n,
        merges,
        order,
    }
}

fn leaf_order(root: usize, n: usize, merges: &[Merge]) -> Vec<usize> {
    let mut order = Vec::with_capacity(n);
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node < n {
            order.push(node);
        } else {
            let m = &merges[node - n];
            stack.push(m.right);
            stack.push(m.left);
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_clear_groups() {
        let points = vec![vec![0.0], vec![10.0], vec![0.5], vec![10.5]];
        let d = complete_linkage(&points);
        assert_eq!(d.merges.len(), 3);
        assert_eq!(d.merges[0], Merge { left: 0, right: 2, height: 0.5 });
        assert_eq!(d.merges[1], Merge { left: 1, right: 3, height: 0.5 });
        // complete linkage uses the farthest pair
        assert!((d.merges[2].height - 10.5).abs() < 1e-12);
        assert_eq!(d.order, vec![0, 2, 1, 3]);
    }

    #[test]
    fn test_single_and_empty() {
        assert_eq!(complete_linkage(&[vec![1.0]]).order, vec![0]);
        assert!(complete_linkage(&[]).order.is_empty());
    }
}

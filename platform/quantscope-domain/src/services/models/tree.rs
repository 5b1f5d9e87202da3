//! Regression trees grown on first/second-order statistics.
//!
//! Every tree learner in this crate fits the same objective: a node holding
//! gradient sum `G` and hessian sum `H` scores `G^2 / (H + lambda)` and
//! predicts `-G / (H + lambda)`. With `g = -y`, `h = 1`, `lambda = 0` that is
//! the plain CART variance-reduction tree used by the random forest; the
//! boosters pass squared-loss residual gradients instead.

use ndarray::{Array2, ArrayView1};

#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    /// Best-first growth stops once this many leaves exist.
    pub max_leaves: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub min_child_weight: f64,
    pub lambda: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            max_leaves: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            min_child_weight: 0.0,
            lambda: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Per-feature split counts and accumulated gain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitStats {
    pub counts: Vec<usize>,
    pub gains: Vec<f64>,
}

impl SplitStats {
    pub fn new(n_features: usize) -> Self {
        Self {
            counts: vec![0; n_features],
            gains: vec![0.0; n_features],
        }
    }

    fn record(&mut self, feature: usize, gain: f64) {
        if let (Some(c), Some(g)) = (self.counts.get_mut(feature), self.gains.get_mut(feature)) {
            *c += 1;
            *g += gain;
        }
    }
}

/// Sums to one; an all-zero input stays all-zero.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total > 0.0 && total.is_finite() {
        values.iter().map(|v| v / total).collect()
    } else {
        vec![0.0; values.len()]
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct Frontier {
    node: usize,
    samples: Vec<usize>,
    depth: usize,
    split: SplitCandidate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Grows a tree over `samples` (indices into `x`, repeats allowed).
    pub fn fit(
        x: &Array2<f64>,
        grad: ArrayView1<f64>,
        hess: ArrayView1<f64>,
        samples: Vec<usize>,
        params: &TreeParams,
        stats: &mut SplitStats,
    ) -> Self {
        let mut nodes = vec![Node::Leaf {
            value: leaf_value(grad, hess, &samples, params.lambda),
        }];
        let mut frontier = Vec::new();
        if let Some(split) = splittable(x, grad, hess, &samples, 0, params) {
            frontier.push(Frontier {
                node: 0,
                samples,
                depth: 0,
                split,
            });
        }

        let mut leaves = 1;
        while !frontier.is_empty() {
            if params.max_leaves.is_some_and(|max| leaves >= max) {
                break;
            }
            let best = frontier
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.split.gain.total_cmp(&b.split.gain))
                .map_or(0, |(idx, _)| idx);
            let Frontier {
                node,
                samples,
                depth,
                split,
            } = frontier.swap_remove(best);

            let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
                .iter()
                .partition(|i| x[[**i, split.feature]] <= split.threshold);

            let left = nodes.len();
            nodes.push(Node::Leaf {
                value: leaf_value(grad, hess, &left_samples, params.lambda),
            });
            let right = nodes.len();
            nodes.push(Node::Leaf {
                value: leaf_value(grad, hess, &right_samples, params.lambda),
            });
            nodes[node] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };
            stats.record(split.feature, split.gain);
            leaves += 1;

            for (child, child_samples) in [(left, left_samples), (right, right_samples)] {
                if let Some(split) = splittable(x, grad, hess, &child_samples, depth + 1, params) {
                    frontier.push(Frontier {
                        node: child,
                        samples: child_samples,
                        depth: depth + 1,
                        split,
                    });
                }
            }
        }

        Self { nodes }
    }

    pub fn predict_one(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let v = row.get(*feature).copied().unwrap_or(0.0);
                    idx = if v <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(Node::Split { left, right, .. }) => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

fn leaf_value(
    grad: ArrayView1<f64>,
    hess: ArrayView1<f64>,
    samples: &[usize],
    lambda: f64,
) -> f64 {
    let g: f64 = samples.iter().map(|i| grad[*i]).sum();
    let h: f64 = samples.iter().map(|i| hess[*i]).sum();
    let denom = h + lambda;
    if denom > 0.0 {
        -g / denom
    } else {
        0.0
    }
}

fn splittable(
    x: &Array2<f64>,
    grad: ArrayView1<f64>,
    hess: ArrayView1<f64>,
    samples: &[usize],
    depth: usize,
    params: &TreeParams,
) -> Option<SplitCandidate> {
    if params.max_depth.is_some_and(|max| depth >= max)
        || samples.len() < params.min_samples_split.max(2)
    {
        return None;
    }
    best_split(x, grad, hess, samples, params)
}

fn best_split(
    x: &Array2<f64>,
    grad: ArrayView1<f64>,
    hess: ArrayView1<f64>,
    samples: &[usize],
    params: &TreeParams,
) -> Option<SplitCandidate> {
    let n_features = x.ncols();
    let g_total: f64 = samples.iter().map(|i| grad[*i]).sum();
    let h_total: f64 = samples.iter().map(|i| hess[*i]).sum();
    let parent = score(g_total, h_total, params.lambda);
    let min_leaf = params.min_samples_leaf.max(1);

    let mut best: Option<SplitCandidate> = None;
    let mut order = samples.to_vec();
    for feature in 0..n_features {
        order.sort_by(|a, b| x[[*a, feature]].total_cmp(&x[[*b, feature]]));

        let mut g_left = 0.0;
        let mut h_left = 0.0;
        for k in 0..order.len() - 1 {
            let i = order[k];
            g_left += grad[i];
            h_left += hess[i];

            let here = x[[i, feature]];
            let next = x[[order[k + 1], feature]];
            if here == next {
                continue;
            }
            let n_left = k + 1;
            let n_right = order.len() - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }
            let g_right = g_total - g_left;
            let h_right = h_total - h_left;
            if h_left < params.min_child_weight || h_right < params.min_child_weight {
                continue;
            }

            let gain = score(g_left, h_left, params.lambda) + score(g_right, h_right, params.lambda)
                - parent;
            if gain > 1e-12 && best.map_or(true, |b| gain > b.gain) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: here + (next - here) / 2.0,
                    gain,
                });
            }
        }
    }
    best
}

fn score(g: f64, h: f64, lambda: f64) -> f64 {
    let denom = h + lambda;
    if denom > 0.0 {
        g * g / denom
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{aview1, Array1};

    fn column(values: impl Iterator<Item = f64>) -> Array2<f64> {
        let values: Vec<f64> = values.collect();
        Array2::from_shape_vec((values.len(), 1), values).expect("shape")
    }

    fn step_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((20, 2), |(i, j)| if j == 0 { i as f64 } else { 1.0 });
        let y = Array1::from_shape_fn(20, |i| if i < 10 { 1.0 } else { 5.0 });
        (x, y)
    }

    fn fit_cart(x: &Array2<f64>, y: &Array1<f64>, params: &TreeParams) -> (RegressionTree, SplitStats) {
        let grad = -y;
        let hess = Array1::ones(y.len());
        let mut stats = SplitStats::new(x.ncols());
        let tree = RegressionTree::fit(
            x,
            grad.view(),
            hess.view(),
            (0..y.len()).collect(),
            params,
            &mut stats,
        );
        (tree, stats)
    }

    #[test]
    fn cart_finds_step_and_predicts_means() {
        let (x, y) = step_data();
        let (tree, stats) = fit_cart(&x, &y, &TreeParams::default());
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.predict_one(aview1(&[3.0, 1.0])), 1.0);
        assert_eq!(tree.predict_one(aview1(&[15.0, 1.0])), 5.0);
        assert_eq!(stats.counts, vec![1, 0]);
    }

    #[test]
    fn leaf_cap_limits_best_first_growth() {
        let x = column((0..40).map(|i| i as f64));
        let y = Array1::from_shape_fn(40, |i| (i / 5) as f64);
        let params = TreeParams {
            max_leaves: Some(4),
            ..TreeParams::default()
        };
        let (tree, _) = fit_cart(&x, &y, &params);
        assert_eq!(tree.n_leaves(), 4);
    }

    #[test]
    fn depth_cap_is_respected() {
        let x = column((0..40).map(|i| i as f64));
        let y = Array1::from_shape_fn(40, |i| ((i * 13) % 7) as f64);
        let params = TreeParams {
            max_depth: Some(2),
            ..TreeParams::default()
        };
        let (tree, _) = fit_cart(&x, &y, &params);
        assert!(tree.depth() <= 2);
    }

    #[test]
    fn constant_target_stays_a_single_leaf() {
        let x = column((0..10).map(|i| i as f64));
        let (tree, _) = fit_cart(&x, &Array1::from_elem(10, 2.0), &TreeParams::default());
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.predict_one(aview1(&[100.0])), 2.0);
    }

    #[test]
    fn normalize_handles_zero_total() {
        assert_eq!(normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
        assert_eq!(normalize(&[1.0, 3.0]), vec![0.25, 0.75]);
    }
}

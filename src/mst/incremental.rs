use thiserror::Error;

use crate::cost::{Cost, FARAWAY};

use super::CsrMst;

/// An adjacency row whose length does not fit the tree it extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("adjacency row has {found} entries, expected {expected}")]
pub struct InvalidInput {
    pub expected: usize,
    pub found: usize,
}

/// Incremental MST kernel: given a tree on `k` nodes and the adjacency
/// costs of one new node, produces the MST on `k + 1` nodes in O(k^2)
/// via the classic edge-swap update. The new node is linked through its
/// cheapest incident edge; for every existing node the heaviest edge on
/// the cycle that an alternative link would close is swapped out if the
/// alternative is strictly cheaper. Comparisons are raw `<`, so ties
/// never swap and the prior structure is preserved deterministically.
///
/// All scratch space is sized once at construction; no allocation
/// happens afterwards.
#[derive(Debug)]
pub struct IncrementalMst {
    edge_store: Vec<(usize, usize, Cost)>,
    node_mark: Vec<bool>,
    max_nnodes: usize,
}

impl IncrementalMst {
    pub fn new(max_nnodes: usize) -> Self {
        assert!(max_nnodes >= 1);

        Self {
            edge_store: vec![(0, 0, 0.0); max_nnodes],
            node_mark: vec![false; max_nnodes],
            max_nnodes,
        }
    }

    #[inline(always)]
    pub fn max_nnodes(&self) -> usize {
        self.max_nnodes
    }

    /// Builds the MST on `mst_in` plus one node into `mst_out`, whose
    /// allocation must fit one more node. `adjcosts[i]` is the cost from
    /// the new node to node `i` of `mst_in` (`FARAWAY` if absent); the
    /// row carries one trailing self entry. Fails with [`InvalidInput`]
    /// if the row length is not `k + 1` for a tree on `k` nodes.
    pub fn add_node(
        &mut self,
        mst_in: &CsrMst,
        adjcosts: &[Cost],
        mst_out: &mut CsrMst,
    ) -> Result<(), InvalidInput> {
        if adjcosts.len() != mst_in.nnodes() + 1 {
            return Err(InvalidInput {
                expected: mst_in.nnodes() + 1,
                found: adjcosts.len(),
            });
        }

        assert!(mst_out.node_capacity() >= mst_in.nnodes() + 1);
        debug_assert!(mst_in.is_valid_tree());

        let nedges = self.insert(mst_in, adjcosts);
        mst_out.set_nnodes(mst_in.nnodes() + 1);
        mst_out.fill_from_edges(&self.edge_store[..nedges]);

        debug_assert!(mst_out.is_valid_tree());
        Ok(())
    }

    /// Extends `mst` by one node in place; its allocation must fit one
    /// more node. Fails with [`InvalidInput`] on a row length other
    /// than `k + 1`.
    pub fn add_node_inplace(&mut self, adjcosts: &[Cost], mst: &mut CsrMst) -> Result<(), InvalidInput> {
        if adjcosts.len() != mst.nnodes() + 1 {
            return Err(InvalidInput {
                expected: mst.nnodes() + 1,
                found: adjcosts.len(),
            });
        }

        assert!(mst.nnodes() < self.max_nnodes);
        assert!(mst.node_capacity() > mst.nnodes());
        debug_assert!(mst.is_valid_tree());

        let nedges = self.insert(mst, adjcosts);
        mst.set_nnodes(mst.nnodes() + 1);
        mst.fill_from_edges(&self.edge_store[..nedges]);

        debug_assert!(mst.is_valid_tree());
        Ok(())
    }

    /// Weight of `mst` extended by the new node, without materializing
    /// the extended tree. Unlike [`IncrementalMst::add_node`] the row
    /// needs no trailing self entry; anything shorter than the tree
    /// fails with [`InvalidInput`].
    pub fn ext_weight(&mut self, mst: &CsrMst, adjcosts: &[Cost]) -> Result<Cost, InvalidInput> {
        if adjcosts.len() < mst.nnodes() {
            return Err(InvalidInput {
                expected: mst.nnodes(),
                found: adjcosts.len(),
            });
        }

        debug_assert!(mst.is_valid_tree());

        let nedges = self.insert(mst, adjcosts);
        debug_assert_eq!(nedges, mst.nnodes());

        let weight = self.edge_store[..nedges].iter().map(|e| e.2).sum::<Cost>();
        debug_assert!(weight >= 0.0);

        Ok(if weight > FARAWAY { FARAWAY } else { weight })
    }

    /// Runs the edge-swap insertion of the new node against `mst_in`,
    /// leaving the edges of the extended tree in the store. Returns the
    /// number of stored edges (`mst_in.nnodes()`).
    fn insert(&mut self, mst_in: &CsrMst, adjcosts: &[Cost]) -> usize {
        let nnodes_in = mst_in.nnodes();
        assert!(nnodes_in < self.max_nnodes, "tree outgrew the kernel");

        self.node_mark[0] = true;
        self.node_mark[1..nnodes_in].iter_mut().for_each(|m| *m = false);

        let mut nedges = 0;
        let max_path_edge = self.insert_from(mst_in, adjcosts, 0, &mut nedges);

        debug_assert_eq!(nedges, nnodes_in - 1);
        self.edge_store[nedges] = max_path_edge;

        nedges + 1
    }

    /// Depth-first walk over `mst_in` from `root`. Returns the maximum
    /// edge on the path from the new node to `root` in the extended
    /// tree built so far; cycle edges heavier than that are swapped.
    fn insert_from(
        &mut self,
        mst_in: &CsrMst,
        adjcosts: &[Cost],
        root: usize,
        nedges: &mut usize,
    ) -> (usize, usize, Cost) {
        let newnode = mst_in.nnodes();
        let mut root2new = (root, newnode, adjcosts[root]);

        debug_assert!(self.node_mark[root]);

        for (w, cost_root2w) in mst_in.neighbors_of(root) {
            if self.node_mark[w] {
                continue;
            }
            self.node_mark[w] = true;

            let max_path_edge = self.insert_from(mst_in, adjcosts, w, nedges);

            debug_assert!(*nedges < mst_in.nnodes());

            if max_path_edge.2 < cost_root2w {
                // linking w through the new node is cheaper than the
                // tree edge; swap the tree edge out
                self.edge_store[*nedges] = max_path_edge;
                *nedges += 1;

                if cost_root2w < root2new.2 {
                    root2new = (root, w, cost_root2w);
                }
            } else {
                self.edge_store[*nedges] = (root, w, cost_root2w);
                *nedges += 1;

                if max_path_edge.2 < root2new.2 {
                    root2new = max_path_edge;
                }
            }
        }

        root2new
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cost::eq;
    use itertools::Itertools;
    use rand::prelude::*;
    use rand_pcg::Pcg64Mcg;

    /// Reference Prim over a dense cost matrix.
    fn prim_weight(costs: &[Vec<Cost>]) -> Cost {
        let n = costs.len();
        let mut in_tree = vec![false; n];
        let mut best = vec![FARAWAY; n];
        best[0] = 0.0;
        let mut total = 0.0;

        for _ in 0..n {
            let u = (0..n)
                .filter(|&u| !in_tree[u])
                .min_by(|&a, &b| best[a].partial_cmp(&best[b]).unwrap())
                .unwrap();
            in_tree[u] = true;
            total += best[u];
            for v in 0..n {
                if !in_tree[v] && costs[u][v] < best[v] {
                    best[v] = costs[u][v];
                }
            }
        }

        total
    }

    fn build_incrementally(costs: &[Vec<Cost>], order: &[usize]) -> CsrMst {
        let n = order.len();
        let mut kernel = IncrementalMst::new(n);

        let mut mst = CsrMst::with_nodes(1);
        mst.set_one_node();

        for k in 1..n {
            // adjacency of the k-th inserted node to the first k, plus
            // the trailing self entry
            let row = (0..k)
                .map(|i| costs[order[k]][order[i]])
                .chain([FARAWAY])
                .collect_vec();

            let mut next = CsrMst::with_nodes(k + 1);
            kernel.add_node(&mst, &row, &mut next).unwrap();
            mst = next;
        }

        mst
    }

    #[test]
    fn two_and_three_nodes() {
        let mut kernel = IncrementalMst::new(4);

        let mut mst1 = CsrMst::with_nodes(1);
        mst1.set_one_node();

        let mut mst2 = CsrMst::with_nodes(2);
        kernel.add_node(&mst1, &[2.5, FARAWAY], &mut mst2).unwrap();
        assert_eq!(mst2.weight(), 2.5);

        // third node undercuts the existing edge: it gets swapped out
        let mut mst3 = CsrMst::with_nodes(3);
        kernel.add_node(&mst2, &[1.0, 1.0, FARAWAY], &mut mst3).unwrap();
        assert_eq!(mst3.weight(), 2.0);
        assert!(mst3.is_valid_tree());
    }

    #[test]
    fn ext_weight_matches_materialized() {
        let mut rng = Pcg64Mcg::seed_from_u64(0x5eed);

        for n in 2..9 {
            for _ in 0..200 {
                let mut costs = vec![vec![0.0; n]; n];
                for (i, j) in (0..n).tuple_combinations() {
                    let c = rng.gen_range(1..100) as Cost / 8.0;
                    costs[i][j] = c;
                    costs[j][i] = c;
                }

                let order = (0..n).collect_vec();
                let mst = build_incrementally(&costs, &order);

                let row = (0..n).map(|i| costs[n - 1][i]).collect_vec();
                let prior = build_incrementally(&costs[..n - 1].iter().map(|r| r[..n - 1].to_vec()).collect_vec(), &order[..n - 1]);

                let mut kernel = IncrementalMst::new(n);
                let trial = kernel.ext_weight(&prior, &row[..n - 1]).unwrap();
                assert!(eq(trial, mst.weight()), "{trial} vs {}", mst.weight());
            }
        }
    }

    #[test]
    fn weight_agrees_with_prim_for_any_insertion_order() {
        let mut rng = Pcg64Mcg::seed_from_u64(0x123456);

        for n in 2..8 {
            for _ in 0..300 {
                let mut costs = vec![vec![0.0; n]; n];
                for (i, j) in (0..n).tuple_combinations() {
                    let c = rng.gen_range(1..50) as Cost;
                    costs[i][j] = c;
                    costs[j][i] = c;
                }

                let expected = prim_weight(&costs);

                let mut order = (0..n).collect_vec();
                order.shuffle(&mut rng);
                let mst = build_incrementally(&costs, &order);

                assert!(
                    eq(mst.weight(), expected),
                    "order {order:?}: {} vs {expected}",
                    mst.weight()
                );
            }
        }
    }

    #[test]
    fn inplace_matches_fresh_build() {
        let mut rng = Pcg64Mcg::seed_from_u64(0xfeed);

        for _ in 0..200 {
            let n = 6;
            let mut costs = vec![vec![0.0; n]; n];
            for (i, j) in (0..n).tuple_combinations() {
                let c = rng.gen_range(1..40) as Cost;
                costs[i][j] = c;
                costs[j][i] = c;
            }

            let order = (0..n).collect_vec();
            let fresh = build_incrementally(&costs, &order);

            let mut kernel = IncrementalMst::new(n);
            let mut mst = CsrMst::with_nodes(n);
            mst.set_one_node();
            for k in 1..n {
                let row = (0..k).map(|i| costs[k][i]).chain([FARAWAY]).collect_vec();
                kernel.add_node_inplace(&row, &mut mst).unwrap();
            }

            assert!(eq(mst.weight(), fresh.weight()));
        }
    }

    #[test]
    fn short_row_is_rejected() {
        let mut kernel = IncrementalMst::new(4);
        let mut mst1 = CsrMst::with_nodes(1);
        mst1.set_one_node();

        let mut mst2 = CsrMst::with_nodes(2);
        let err = kernel.add_node(&mst1, &[2.5], &mut mst2).unwrap_err();
        assert_eq!(err, InvalidInput { expected: 2, found: 1 });

        mst2.set_one_node();
        let err = kernel.add_node_inplace(&[2.5, 1.0, 0.5], &mut mst2).unwrap_err();
        assert_eq!(err, InvalidInput { expected: 2, found: 3 });

        let err = kernel.ext_weight(&mst2, &[]).unwrap_err();
        assert_eq!(err, InvalidInput { expected: 1, found: 0 });
    }
}

use log::debug;

use crate::cost::{eq, Cost};
use crate::graph::{Graph, Node, NO_NODE};
use crate::reduce::EqForbiddenEdges;

use super::ExtTree;

/// Tree bottleneck distances along the path to the root.
///
/// `mark_root_path(v)` walks from `v` up to the root and stores, for
/// every proper ancestor `u`, the maximum edge cost on the path from `u`
/// down to the lowest vertex of degree != 2 on the marked path. Edges
/// through degree-2 chains accumulate; any other vertex resets the
/// running maximum. In the prize-collecting variant a chain vertex that
/// is a terminal has its prize deducted from the accumulator.
///
/// At most one path is marked at a time, and every mark is undone by the
/// paired `unmark_root_path`.
impl ExtTree {
    pub fn mark_root_path(&mut self, g: &Graph, vertex: Node) {
        assert_eq!(self.bottleneck[vertex as usize], -1.0);
        assert_eq!(self.bottleneck[self.root as usize], -1.0);

        if vertex == self.root {
            self.bottleneck[vertex as usize] = 0.0;
            return;
        }

        let is_pc = g.is_pc();
        let mut bottleneck = 0.0;
        let mut local = 0.0;
        let mut child = vertex;
        let mut current = self.parent[vertex as usize];

        assert!(current != NO_NODE);

        while current != NO_NODE {
            debug_assert!(self.parent_cost[child as usize] >= 0.0);
            debug_assert_eq!(self.bottleneck[current as usize], -1.0);
            debug_assert!(current != vertex);

            local = self.chain_step(g, is_pc, child, local);

            if bottleneck < local {
                bottleneck = local;
            }

            self.bottleneck[current as usize] = bottleneck;
            child = current;
            current = self.parent[current as usize];
        }

        debug_assert_eq!(child, self.root);
    }

    pub fn unmark_root_path(&mut self, _g: &Graph, vertex: Node) {
        debug_assert!(
            self.bottleneck[vertex as usize] == -1.0 || vertex == self.root
        );
        debug_assert!(self.bottleneck[self.root as usize] >= 0.0);

        if vertex == self.root {
            self.bottleneck[vertex as usize] = -1.0;
            debug_assert_eq!(self.parent[vertex as usize], NO_NODE);
        }

        let mut current = self.parent[vertex as usize];
        while current != NO_NODE {
            debug_assert!(self.bottleneck[current as usize] >= 0.0);
            self.bottleneck[current as usize] = -1.0;
            current = self.parent[current as usize];
        }

        debug_assert_eq!(self.bottleneck[self.root as usize], -1.0);
    }

    /// Bottleneck between the vertex whose root path is marked and
    /// `v_unmarked`: walks up from `v_unmarked` until the marked path is
    /// hit, combining the running chain maximum with the stored mark.
    pub fn bottleneck_dist(&self, g: &Graph, v_unmarked: Node) -> Cost {
        debug_assert!(self.bottleneck[self.root as usize] >= 0.0);

        let mut bottleneck = 0.0;
        let mut current = v_unmarked;

        if v_unmarked != self.root {
            let is_pc = g.is_pc();
            let mut local = 0.0;

            debug_assert!(self.parent[v_unmarked as usize] != NO_NODE);

            while self.bottleneck[current as usize] < -0.5 {
                debug_assert!(self.parent_cost[current as usize] >= 0.0);

                local = self.chain_step(g, is_pc, current, local);

                if bottleneck < local {
                    bottleneck = local;
                }

                current = self.parent[current as usize];
            }
        }

        bottleneck.max(self.bottleneck[current as usize])
    }

    /// One step of the chain accumulator: the parent edge of `child`
    /// either extends a degree-2 chain or restarts the running maximum.
    #[inline(always)]
    fn chain_step(&self, g: &Graph, is_pc: bool, child: Node, local: Cost) -> Cost {
        if self.deg[child as usize] == 2 {
            let mut local = local + self.parent_cost[child as usize];
            if is_pc && g.is_term(child) {
                debug_assert!(g.prize(child) > 0.0);
                local -= g.prize(child);
            }
            local
        } else {
            self.parent_cost[child as usize]
        }
    }

    /// Forbids every tree edge on the parent chain from `path_start` up
    /// to (excluding) `path_end`.
    fn mark_equality_path(
        &self,
        g: &Graph,
        path_start: Node,
        path_end: Node,
        sdeq: &mut EqForbiddenEdges,
    ) {
        assert!(path_start != path_end);
        debug_assert!(path_start != NO_NODE && path_end != NO_NODE);

        let mut current = path_start;
        while current != path_end {
            let arc = self.parent_arc[current as usize];
            debug_assert!(eq(g.cost(arc), self.parent_cost[current as usize]));

            if sdeq.mark_arc(g, arc) {
                debug!("forbid equality edge {} ({} -> {})", g.edge_id(arc), g.tail(arc), g.head(arc));
            }

            current = self.parent[current as usize];
        }
    }

    /// After an equality rule-out with distance `dist_eq`, forbids the
    /// edges of the tree-bottleneck segment that attains `dist_eq` on
    /// the path between `v_marked` (root path marked) and `v_unmarked`.
    pub(crate) fn mark_equality_edges(
        &self,
        g: &Graph,
        dist_eq: Cost,
        v_marked: Node,
        v_unmarked: Node,
        sdeq: &mut EqForbiddenEdges,
    ) {
        let is_pc = g.is_pc();

        debug_assert!(self.bottleneck[self.root as usize] >= 0.0);
        assert!(v_marked != v_unmarked);

        // 1. walk up from the unmarked vertex to the common ancestor
        let ancestor;
        if v_unmarked == self.root {
            ancestor = v_unmarked;
        } else {
            let mut start = NO_NODE;
            let mut local = 0.0;
            let mut current = v_unmarked;

            while self.bottleneck[current as usize] < -0.5 {
                debug_assert!(current != v_marked);

                if self.deg[current as usize] == 2 {
                    local += self.parent_cost[current as usize];
                    if is_pc && g.is_term(current) {
                        local -= g.prize(current);
                    }
                } else {
                    start = current;
                    local = self.parent_cost[current as usize];
                }

                if eq(local, dist_eq) {
                    debug_assert!(start != NO_NODE);
                    self.mark_equality_path(g, start, self.parent[current as usize], sdeq);
                    return;
                }

                current = self.parent[current as usize];
            }

            ancestor = current;
            debug_assert!(self.bottleneck[ancestor as usize] >= 0.0);
        }

        // 2. walk up from the marked vertex to the ancestor
        let mut start = NO_NODE;
        let mut local = 0.0;
        let mut current = v_marked;

        while current != ancestor {
            debug_assert!(current != v_unmarked);

            if self.deg[current as usize] == 2 {
                local += self.parent_cost[current as usize];
                if is_pc && g.is_term(current) {
                    local -= g.prize(current);
                }
            } else {
                start = current;
                local = self.parent_cost[current as usize];
            }

            if eq(local, dist_eq) {
                if start == NO_NODE {
                    // the whole walked segment is a degree-2 chain; only
                    // the initial general star produces this shape
                    debug_assert!(self.in_initial_gen_star());
                    start = v_marked;
                }

                self.mark_equality_path(g, start, self.parent[current as usize], sdeq);
                return;
            }

            current = self.parent[current as usize];
        }

        unreachable!("equality distance not found on either bottleneck path");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cost::eq;
    use crate::graph::Graph;
    use crate::tree::ExtTree;
    use itertools::Itertools;

    fn path_tree(costs: &[Cost]) -> (Graph, ExtTree) {
        let n = costs.len() as u32 + 1;
        let edges = costs
            .iter()
            .enumerate()
            .map(|(i, &c)| (i as u32, i as u32 + 1, c))
            .collect_vec();
        let g = Graph::from_edges(n, &edges);

        let mut tree = ExtTree::new(&g, 0);
        for i in 0..costs.len() as u32 {
            tree.extend(&g, &[g.find_arc(i, i + 1).unwrap()]);
        }

        (g, tree)
    }

    #[test]
    fn chain_accumulates_along_degree_two_path() {
        let (g, mut tree) = path_tree(&[1.0, 1.0]);

        tree.mark_root_path(&g, 2);
        // node 1 has degree 2: the chain from 2 to the root accumulates
        assert!(eq(tree.bottleneck_values()[1], 1.0));
        assert!(eq(tree.bottleneck_values()[0], 2.0));

        assert!(eq(tree.bottleneck_dist(&g, 0), 2.0));

        tree.unmark_root_path(&g, 2);
    }

    #[test]
    fn prize_is_deducted_on_inner_terminal() {
        // path 0 - t - 2 with terminal t of prize 0.4
        let g = Graph::from_edges(3, &[(0, 1, 1.0), (1, 2, 1.0)])
            .with_prizes(&[1], vec![0.0, 0.4, 0.0]);

        let mut tree = ExtTree::new(&g, 0);
        tree.extend(&g, &[g.find_arc(0, 1).unwrap()]);
        tree.extend(&g, &[g.find_arc(1, 2).unwrap()]);

        tree.mark_root_path(&g, 2);
        assert!(eq(tree.bottleneck_values()[0], 1.6));
        tree.unmark_root_path(&g, 2);
    }

    #[test]
    fn mark_unmark_round_trip_is_exact() {
        let (g, mut tree) = path_tree(&[1.5, 0.5, 2.0, 1.0]);

        let before = tree.bottleneck_values().to_vec();
        tree.mark_root_path(&g, 4);
        tree.unmark_root_path(&g, 4);
        assert_eq!(tree.bottleneck_values(), before);

        // marking the root itself is legal and also round-trips
        tree.mark_root_path(&g, 0);
        assert_eq!(tree.bottleneck_values()[0], 0.0);
        tree.unmark_root_path(&g, 0);
        assert_eq!(tree.bottleneck_values(), before);
    }

    #[test]
    fn branching_resets_the_chain() {
        // star at 1: path 0-1-2 plus spur 1-3; deg(1) == 3
        let g = Graph::from_edges(4, &[(0, 1, 1.0), (1, 2, 3.0), (1, 3, 0.5)]);

        let mut tree = ExtTree::new(&g, 0);
        tree.extend(&g, &[g.find_arc(0, 1).unwrap()]);
        tree.extend(&g, &[g.find_arc(1, 2).unwrap(), g.find_arc(1, 3).unwrap()]);

        tree.mark_root_path(&g, 2);
        // deg(1) == 3, so no chain accumulation across 1
        assert!(eq(tree.bottleneck_values()[1], 3.0));
        assert!(eq(tree.bottleneck_values()[0], 3.0));

        // from the spur leaf: max(own edge, mark at 1)
        assert!(eq(tree.bottleneck_dist(&g, 3), 3.0));

        tree.unmark_root_path(&g, 2);
    }
}

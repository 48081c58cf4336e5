use crate::cost::{Cost, FARAWAY};

/// One MST in compressed sparse-row form. Nodes are positions in the
/// enclosing leaf ordering, not graph vertex ids. A tree on `k` nodes
/// carries `2 (k - 1)` directed entries; `k = 1` is a legal zero-edge
/// tree.
///
/// The arrays are allocated once for a final node count; `nnodes` may
/// lie below that capacity while the tree is grown node by node.
#[derive(Debug, Clone)]
pub struct CsrMst {
    nnodes: usize,
    start: Vec<u32>,
    head: Vec<u32>,
    cost: Vec<Cost>,
}

impl CsrMst {
    /// Allocates a zeroed CSR holding a tree on `nnodes` nodes.
    pub fn with_nodes(nnodes: usize) -> Self {
        assert!(nnodes >= 1);

        let nentries = 2 * (nnodes - 1);
        Self {
            nnodes,
            start: vec![0; nnodes + 1],
            head: vec![0; nentries],
            cost: vec![0.0; nentries],
        }
    }

    #[inline(always)]
    pub fn nnodes(&self) -> usize {
        self.nnodes
    }

    /// Number of directed entries in use, `2 (nnodes - 1)`.
    #[inline(always)]
    pub fn nentries(&self) -> usize {
        2 * (self.nnodes - 1)
    }

    #[inline(always)]
    pub fn node_capacity(&self) -> usize {
        self.start.len() - 1
    }

    /// Shrinks or grows the tree within its allocation; the content is
    /// expected to be rewritten afterwards.
    pub(crate) fn set_nnodes(&mut self, nnodes: usize) {
        assert!(nnodes >= 1 && nnodes <= self.node_capacity());
        self.nnodes = nnodes;
    }

    #[inline(always)]
    pub fn neighbors_of(&self, node: usize) -> impl Iterator<Item = (usize, Cost)> + '_ {
        debug_assert!(node < self.nnodes);
        (self.start[node] as usize..self.start[node + 1] as usize)
            .map(|i| (self.head[i] as usize, self.cost[i]))
    }

    /// Sum of edge costs, clamped at `FARAWAY` so that sentinel entries
    /// never produce a weight a rule-out could act on.
    pub fn weight(&self) -> Cost {
        let entries = &self.cost[..self.nentries()];
        debug_assert!(entries.iter().all(|&c| c >= 0.0));

        let weight = entries.iter().sum::<Cost>() / 2.0;
        if weight > FARAWAY {
            FARAWAY
        } else {
            weight
        }
    }

    /// Turns this CSR into the one-node, zero-edge tree.
    pub fn set_one_node(&mut self) {
        self.nnodes = 1;
        self.start[0] = 0;
        self.start[1] = 0;
    }

    /// Rebuilds the CSR from an undirected edge list via counting sort.
    /// `edges` must form a spanning tree on `self.nnodes()` nodes.
    pub(crate) fn fill_from_edges(&mut self, edges: &[(usize, usize, Cost)]) {
        let nnodes = self.nnodes;
        debug_assert_eq!(edges.len() + 1, nnodes);

        self.start[..=nnodes].iter_mut().for_each(|s| *s = 0);

        for &(v1, v2, _) in edges {
            debug_assert!(v1 < nnodes && v2 < nnodes);
            self.start[v1] += 1;
            self.start[v2] += 1;
        }

        for i in 1..=nnodes {
            self.start[i] += self.start[i - 1];
        }
        debug_assert_eq!(self.start[nnodes] as usize, self.nentries());

        for &(v1, v2, cost) in edges {
            self.start[v1] -= 1;
            self.head[self.start[v1] as usize] = v2 as u32;
            self.cost[self.start[v1] as usize] = cost;

            self.start[v2] -= 1;
            self.head[self.start[v2] as usize] = v1 as u32;
            self.cost[self.start[v2] as usize] = cost;
        }
    }

    pub fn copy_from(&mut self, other: &CsrMst) {
        assert!(self.node_capacity() >= other.nnodes);

        self.nnodes = other.nnodes;
        self.start[..=other.nnodes].copy_from_slice(&other.start[..=other.nnodes]);
        self.head[..other.nentries()].copy_from_slice(&other.head[..other.nentries()]);
        self.cost[..other.nentries()].copy_from_slice(&other.cost[..other.nentries()]);
    }

    /// Is this CSR a connected tree reaching every node? Used in debug
    /// assertions only.
    pub fn is_valid_tree(&self) -> bool {
        let nnodes = self.nnodes;
        if nnodes == 1 {
            return self.start[1] == 0;
        }
        if self.start[nnodes] as usize != self.nentries() {
            return false;
        }

        let mut visited = vec![false; nnodes];
        let mut stack = vec![0usize];
        visited[0] = true;
        let mut nvisited = 1;

        while let Some(u) = stack.pop() {
            for (v, _) in self.neighbors_of(u) {
                if v >= nnodes {
                    return false;
                }
                if !visited[v] {
                    visited[v] = true;
                    nvisited += 1;
                    stack.push(v);
                }
            }
        }

        nvisited == nnodes
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn one_node_tree() {
        let mut mst = CsrMst::with_nodes(1);
        mst.set_one_node();

        assert_eq!(mst.nnodes(), 1);
        assert_eq!(mst.nentries(), 0);
        assert_eq!(mst.weight(), 0.0);
        assert!(mst.is_valid_tree());
    }

    #[test]
    fn fill_from_path_edges() {
        let mut mst = CsrMst::with_nodes(3);
        mst.fill_from_edges(&[(0, 1, 1.5), (1, 2, 2.0)]);

        assert!(mst.is_valid_tree());
        assert_eq!(mst.weight(), 3.5);
        assert_eq!(mst.neighbors_of(1).count(), 2);
        assert_eq!(mst.neighbors_of(0).count(), 1);

        let (nb, c) = mst.neighbors_of(0).next().unwrap();
        assert_eq!(nb, 1);
        assert_eq!(c, 1.5);
    }

    #[test]
    fn grows_within_capacity() {
        let mut mst = CsrMst::with_nodes(4);
        mst.set_nnodes(2);
        mst.fill_from_edges(&[(0, 1, 1.0)]);
        assert!(mst.is_valid_tree());
        assert_eq!(mst.weight(), 1.0);

        mst.set_nnodes(3);
        mst.fill_from_edges(&[(0, 1, 1.0), (1, 2, 2.0)]);
        assert!(mst.is_valid_tree());
        assert_eq!(mst.weight(), 3.0);
        assert_eq!(mst.node_capacity(), 4);
    }

    #[test]
    fn copy_takes_the_source_size() {
        let mut src = CsrMst::with_nodes(3);
        src.fill_from_edges(&[(0, 1, 1.0), (1, 2, 2.0)]);

        let mut dst = CsrMst::with_nodes(5);
        dst.copy_from(&src);
        assert_eq!(dst.nnodes(), 3);
        assert!(dst.is_valid_tree());
        assert_eq!(dst.weight(), 3.0);
    }

    #[test]
    fn weight_clamps_at_faraway() {
        let mut mst = CsrMst::with_nodes(3);
        mst.fill_from_edges(&[(0, 1, FARAWAY), (1, 2, FARAWAY)]);
        assert_eq!(mst.weight(), FARAWAY);
    }

    #[test]
    fn disconnected_entries_are_invalid() {
        let mut mst = CsrMst::with_nodes(4);
        // 0-1 doubled, 2-3: not spanning
        mst.fill_from_edges(&[(0, 1, 1.0), (0, 1, 1.0), (2, 3, 1.0)]);
        assert!(!mst.is_valid_tree());
    }
}

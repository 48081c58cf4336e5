use crate::cost::Cost;
use crate::graph::{Graph, Node, NO_NODE};

/// Cap on neighborhood visits per marking pass.
const PC_SD_MAX_VISITS: usize = 20;

/// Prize-collecting SD refinement: starting from a vertex, marks upper
/// bounds on special distances to tree vertices reachable directly or
/// through one non-tree vertex. A two-edge detour through a vertex `m`
/// costs `max(c1, c2, c1 + c2 - prize(m))`. Marked entries are collected
/// in a candidate list so that unmarking touches only what was marked.
#[derive(Debug, Clone)]
pub struct PcSdCache {
    sd_to_node: Vec<Cost>,
    cands: Vec<Node>,
    start: Node,
}

impl PcSdCache {
    pub fn new(n: usize) -> Self {
        Self {
            sd_to_node: vec![-1.0; n],
            cands: Vec::new(),
            start: NO_NODE,
        }
    }

    /// Marks from `start`; `deg` is the tree-degree array deciding which
    /// vertices count as tree vertices.
    pub fn mark(&mut self, g: &Graph, start: Node, deg: &[u32]) {
        assert!(g.is_pc());
        assert_eq!(self.start, NO_NODE, "mark while already marked");
        debug_assert!(self.cands.is_empty());

        self.start = start;

        let mut nvisits = 0;
        for &arc in g.outgoing(start) {
            let head = g.head(arc);
            let edgecost = g.cost(arc);

            if deg[head as usize] == 0 {
                // detour through the non-tree vertex `head`
                let mut nvisits2 = 0;
                for &arc2 in g.outgoing(head) {
                    let head2 = g.head(arc2);

                    if deg[head2 as usize] > 0 && head2 != start {
                        let edgecost2 = g.cost(arc2);
                        let dist = edgecost
                            .max(edgecost2)
                            .max(edgecost + edgecost2 - g.prize(head));

                        debug_assert!(g.prize(head) == 0.0 || g.is_term(head));

                        self.mark_single(head2, dist);
                    }

                    if nvisits2 > PC_SD_MAX_VISITS {
                        break;
                    }
                    nvisits2 += 1;
                }
            } else {
                debug_assert!(head != start);
                self.mark_single(head, edgecost);
            }

            if nvisits > PC_SD_MAX_VISITS {
                break;
            }
            nvisits += 1;
        }
    }

    fn mark_single(&mut self, entry: Node, value: Cost) {
        let stored = &mut self.sd_to_node[entry as usize];

        if *stored < -0.5 {
            self.cands.push(entry);
            *stored = value;
        } else if value < *stored {
            *stored = value;
        }

        debug_assert!(*stored >= 0.0);
    }

    pub fn unmark(&mut self, g: &Graph, start: Node) {
        assert!(g.is_pc());
        assert_eq!(start, self.start, "unmark does not match mark");

        for &cand in &self.cands {
            debug_assert!(self.sd_to_node[cand as usize] >= 0.0);
            self.sd_to_node[cand as usize] = -1.0;
        }

        self.cands.clear();
        self.start = NO_NODE;
    }

    /// Marked value towards `v`, `-1` if unmarked.
    #[inline(always)]
    pub fn get(&self, v: Node) -> Cost {
        self.sd_to_node[v as usize]
    }

    #[inline(always)]
    pub fn ncands(&self) -> usize {
        self.cands.len()
    }

    #[inline(always)]
    pub fn cand(&self, i: usize) -> Node {
        self.cands[i]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cost::eq;

    /// Tree vertices 0, 1; vertex 2 is a free terminal between them.
    fn pc_graph() -> Graph {
        Graph::from_edges(
            4,
            &[(0, 2, 1.0), (2, 1, 1.0), (0, 1, 3.0), (0, 3, 1.0)],
        )
        .with_prizes(&[2], vec![0.0, 0.0, 0.5, 0.0])
    }

    #[test]
    fn detour_applies_prize() {
        let g = pc_graph();
        let deg = [1, 1, 0, 0];

        let mut cache = PcSdCache::new(4);
        cache.mark(&g, 0, &deg);

        // direct edge 0-1 gives 3.0; the detour through terminal 2 gives
        // max(1, 1, 1 + 1 - 0.5) = 1.5 and wins
        assert!(eq(cache.get(1), 1.5));
        // non-tree vertices are never marked
        assert_eq!(cache.get(3), -1.0);
        assert_eq!(cache.get(2), -1.0);

        cache.unmark(&g, 0);
        assert_eq!(cache.get(1), -1.0);
        assert_eq!(cache.ncands(), 0);
    }

    #[test]
    fn unmark_restores_everything() {
        let g = pc_graph();
        let deg = [1, 1, 0, 1];

        let mut cache = PcSdCache::new(4);
        let before: Vec<Cost> = (0..4).map(|v| cache.get(v)).collect();

        cache.mark(&g, 0, &deg);
        assert!(cache.ncands() > 0);
        cache.unmark(&g, 0);

        let after: Vec<Cost> = (0..4).map(|v| cache.get(v)).collect();
        assert_eq!(before, after);
    }
}

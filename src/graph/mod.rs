use crate::cost::Cost;

pub type Node = u32;
pub type NumNodes = Node;

/// Directed arc id. Arcs come in antiparallel pairs: `arc ^ 1` is the
/// reverse arc, `arc / 2` the undirected edge id.
pub type ArcId = u32;
pub type NumArcs = u32;

pub const NO_NODE: Node = Node::MAX;
pub const NO_ARC: ArcId = ArcId::MAX;

/// Static undirected graph with per-edge costs and optional
/// prize-collecting attributes (terminal flags and vertex prizes).
///
/// Arcs are stored in pair order; a CSR index maps every node to its
/// outgoing arc ids.
#[derive(Debug, Clone)]
pub struct Graph {
    arc_head: Vec<Node>,
    arc_cost: Vec<Cost>,
    adj_arcs: Vec<ArcId>,
    adj_start: Vec<NumArcs>,
    is_term: Vec<bool>,
    prize: Option<Vec<Cost>>,
}

impl Graph {
    /// Builds the graph from undirected weighted edges. Edge `i` becomes
    /// the arc pair `2i` (u -> v) and `2i + 1` (v -> u).
    pub fn from_edges(n: NumNodes, edges: &[(Node, Node, Cost)]) -> Self {
        assert!(n > 0);

        let n = n as usize;
        let mut arc_head = Vec::with_capacity(2 * edges.len());
        let mut arc_cost = Vec::with_capacity(2 * edges.len());
        let mut num_arcs_of = vec![0 as NumArcs; n];

        for &(u, v, c) in edges {
            assert!((u as usize) < n && (v as usize) < n && u != v);
            assert!(c >= 0.0);

            arc_head.push(v);
            arc_head.push(u);
            arc_cost.push(c);
            arc_cost.push(c);

            num_arcs_of[u as usize] += 1;
            num_arcs_of[v as usize] += 1;
        }

        let mut adj_start = Vec::with_capacity(n + 1);
        let mut running = 0 as NumArcs;
        for u in 0..n {
            adj_start.push(running);
            running += num_arcs_of[u];
            num_arcs_of[u] = adj_start[u];
        }
        adj_start.push(running);

        let mut adj_arcs = vec![NO_ARC; running as usize];
        for (i, &(u, v, _)) in edges.iter().enumerate() {
            adj_arcs[num_arcs_of[u as usize] as usize] = 2 * i as ArcId;
            num_arcs_of[u as usize] += 1;

            adj_arcs[num_arcs_of[v as usize] as usize] = 2 * i as ArcId + 1;
            num_arcs_of[v as usize] += 1;
        }

        Self {
            arc_head,
            arc_cost,
            adj_arcs,
            adj_start,
            is_term: vec![false; n],
            prize: None,
        }
    }

    /// Attaches prize-collecting attributes. Every prize must be
    /// non-negative; positive prizes are only meaningful on terminals.
    pub fn with_prizes(mut self, terminals: &[Node], prizes: Vec<Cost>) -> Self {
        assert_eq!(prizes.len(), self.number_of_nodes() as usize);
        assert!(prizes.iter().all(|&p| p >= 0.0));

        for &t in terminals {
            self.is_term[t as usize] = true;
        }

        self.prize = Some(prizes);
        self
    }

    #[inline(always)]
    pub fn number_of_nodes(&self) -> NumNodes {
        (self.adj_start.len() - 1) as NumNodes
    }

    #[inline(always)]
    pub fn number_of_arcs(&self) -> NumArcs {
        self.arc_head.len() as NumArcs
    }

    #[inline(always)]
    pub fn number_of_edges(&self) -> NumArcs {
        self.number_of_arcs() / 2
    }

    #[inline(always)]
    pub fn head(&self, arc: ArcId) -> Node {
        self.arc_head[arc as usize]
    }

    #[inline(always)]
    pub fn tail(&self, arc: ArcId) -> Node {
        self.arc_head[(arc ^ 1) as usize]
    }

    #[inline(always)]
    pub fn cost(&self, arc: ArcId) -> Cost {
        self.arc_cost[arc as usize]
    }

    /// Undirected edge id of an arc.
    #[inline(always)]
    pub fn edge_id(&self, arc: ArcId) -> ArcId {
        arc / 2
    }

    /// Outgoing arc ids of `u`.
    #[inline(always)]
    pub fn outgoing(&self, u: Node) -> &[ArcId] {
        &self.adj_arcs[self.adj_start[u as usize] as usize..self.adj_start[u as usize + 1] as usize]
    }

    #[inline(always)]
    pub fn is_term(&self, u: Node) -> bool {
        self.is_term[u as usize]
    }

    #[inline(always)]
    pub fn prize(&self, u: Node) -> Cost {
        self.prize.as_ref().map_or(0.0, |p| p[u as usize])
    }

    /// Is this a prize-collecting instance?
    #[inline(always)]
    pub fn is_pc(&self) -> bool {
        self.prize.is_some()
    }

    /// Finds an arc u -> v, if one exists.
    pub fn find_arc(&self, u: Node, v: Node) -> Option<ArcId> {
        self.outgoing(u).iter().copied().find(|&a| self.head(a) == v)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn triangle() -> Graph {
        Graph::from_edges(3, &[(0, 1, 1.0), (1, 2, 1.0), (0, 2, 1.5)])
    }

    #[test]
    fn arc_pairing() {
        let g = triangle();

        assert_eq!(g.number_of_nodes(), 3);
        assert_eq!(g.number_of_arcs(), 6);
        assert_eq!(g.number_of_edges(), 3);

        for arc in 0..g.number_of_arcs() {
            assert_eq!(g.head(arc), g.tail(arc ^ 1));
            assert_eq!(g.cost(arc), g.cost(arc ^ 1));
            assert_eq!(g.edge_id(arc), g.edge_id(arc ^ 1));
        }
    }

    #[test]
    fn adjacency_is_complete() {
        let g = triangle();

        for u in 0..g.number_of_nodes() {
            for &arc in g.outgoing(u) {
                assert_eq!(g.tail(arc), u);
            }
        }

        assert_eq!(g.outgoing(0).len(), 2);
        assert_eq!(g.outgoing(1).len(), 2);
        assert_eq!(g.outgoing(2).len(), 2);

        let arc = g.find_arc(0, 2).unwrap();
        assert_eq!(g.head(arc), 2);
        assert_eq!(g.cost(arc), 1.5);
        assert!(g.find_arc(0, 0).is_none());
    }

    #[test]
    fn prizes_default_to_zero() {
        let g = triangle();
        assert!(!g.is_pc());
        assert_eq!(g.prize(1), 0.0);

        let g = triangle().with_prizes(&[1], vec![0.0, 0.4, 0.0]);
        assert!(g.is_pc());
        assert!(g.is_term(1));
        assert!(!g.is_term(0));
        assert_eq!(g.prize(1), 0.4);
    }
}

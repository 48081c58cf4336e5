pub mod bottleneck;
pub mod pcsd;

use smallvec::SmallVec;

use crate::cost::Cost;
use crate::graph::{ArcId, Graph, Node, NO_ARC, NO_NODE};

use pcsd::PcSdCache;

/// Maximum number of sibling candidates per extension level.
pub const MAX_GRAD: usize = 8;

/// Shape of the component the extension tree was seeded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialComp {
    /// A single candidate edge out of the root.
    Edge,
    /// A star: the root is one spoke, candidates extend from the center.
    Star { center: Node },
    /// A general star: two adjacent centers, candidates from either.
    GenStar { centers: (Node, Node) },
}

#[derive(Debug, Clone)]
struct TreeLevel {
    comp_arcs: SmallVec<[ArcId; MAX_GRAD]>,
    /// Leaf that left the leaf list at this extension, with its position.
    removed_leaf: Option<(usize, Node)>,
    inner_added: SmallVec<[Node; 2]>,
    /// Arc whose degree contribution was pre-counted at tree creation.
    discount_arc: Option<ArcId>,
    prev_cost: Cost,
    prev_inner_prize: Cost,
}

#[derive(Debug, Clone)]
struct PcState {
    cache: PcSdCache,
    /// Sum of prizes of terminals that became inner tree nodes.
    inner_prize: Cost,
}

/// Shared state of the extension tree: the ordered leaf list, inner
/// nodes, degrees and parent pointers, the bottleneck mark array and the
/// prize-collecting cache. Mutated by the outer driver through
/// [`ExtTree::extend`]/[`ExtTree::retract`] between engine calls.
///
/// Leaf removal shifts instead of swapping: the relative order of the
/// remaining leaves is load-bearing for the distance rows and the MST
/// node numbering.
#[derive(Debug, Clone)]
pub struct ExtTree {
    root: Node,
    initial: InitialComp,
    leaves: Vec<Node>,
    inner: Vec<Node>,
    deg: Vec<u32>,
    parent: Vec<Node>,
    parent_cost: Vec<Cost>,
    parent_arc: Vec<ArcId>,
    bottleneck: Vec<Cost>,
    depth: usize,
    cost: Cost,
    levels: Vec<TreeLevel>,
    /// True while the root's first extension edge is still pre-counted
    /// in its degree.
    root_discount: bool,
    pc: Option<PcState>,
}

impl ExtTree {
    /// Tree seeded for an initial edge component: just the root, which
    /// pre-counts its first extension edge in its degree.
    pub fn new(g: &Graph, root: Node) -> Self {
        let mut tree = Self::empty(g, root, InitialComp::Edge);
        tree.deg[root as usize] = 1;
        tree.root_discount = true;
        tree
    }

    /// Tree seeded for an initial star component: the root spoke plus
    /// the center, connected by `arc` (root -> center). Candidates will
    /// extend from the center.
    pub fn new_star(g: &Graph, arc: ArcId) -> Self {
        let root = g.tail(arc);
        let center = g.head(arc);

        let mut tree = Self::empty(g, root, InitialComp::Star { center });
        tree.attach(g, arc);
        tree.inner.push(center);
        tree.add_inner_prize(g, center);
        tree
    }

    /// Tree seeded for an initial general star: root -> first center ->
    /// second center. Candidates will extend from either center.
    pub fn new_gen_star(g: &Graph, arc_to_center: ArcId, center_arc: ArcId) -> Self {
        let root = g.tail(arc_to_center);
        let c1 = g.head(arc_to_center);
        let c2 = g.head(center_arc);
        assert_eq!(g.tail(center_arc), c1);
        assert!(c2 != root);

        let mut tree = Self::empty(g, root, InitialComp::GenStar { centers: (c1, c2) });
        tree.attach(g, arc_to_center);
        tree.attach(g, center_arc);
        tree.inner.push(c1);
        tree.inner.push(c2);
        tree.add_inner_prize(g, c1);
        tree.add_inner_prize(g, c2);
        tree
    }

    fn empty(g: &Graph, root: Node, initial: InitialComp) -> Self {
        let n = g.number_of_nodes() as usize;
        assert!((root as usize) < n);

        Self {
            root,
            initial,
            leaves: vec![root],
            inner: Vec::new(),
            deg: vec![0; n],
            parent: vec![NO_NODE; n],
            parent_cost: vec![-1.0; n],
            parent_arc: vec![NO_ARC; n],
            bottleneck: vec![-1.0; n],
            depth: 0,
            cost: 0.0,
            levels: Vec::new(),
            root_discount: false,
            pc: g.is_pc().then(|| PcState {
                cache: PcSdCache::new(n),
                inner_prize: 0.0,
            }),
        }
    }

    /// Hangs `head(arc)` below `tail(arc)` without any leaf bookkeeping.
    fn attach(&mut self, g: &Graph, arc: ArcId) {
        let t = g.tail(arc);
        let h = g.head(arc);
        debug_assert!(t == self.root || self.deg[t as usize] >= 1);
        debug_assert_eq!(self.deg[h as usize], 0);

        self.deg[t as usize] += 1;
        self.deg[h as usize] = 1;
        self.parent[h as usize] = t;
        self.parent_cost[h as usize] = g.cost(arc);
        self.parent_arc[h as usize] = arc;
        self.cost += g.cost(arc);
    }

    fn add_inner_prize(&mut self, g: &Graph, v: Node) {
        if let Some(pc) = &mut self.pc {
            if g.is_term(v) {
                debug_assert!(g.prize(v) > 0.0);
                pc.inner_prize += g.prize(v);
            }
        }
    }

    /// Grows the tree by one level: the heads of `arcs` become new
    /// leaves, appended in arc order. A tail whose degree exceeds one
    /// leaves the leaf list (shifting removal) and becomes inner.
    pub fn extend(&mut self, g: &Graph, arcs: &[ArcId]) {
        assert!(!arcs.is_empty() && arcs.len() <= MAX_GRAD);

        let mut level = TreeLevel {
            comp_arcs: arcs.into(),
            removed_leaf: None,
            inner_added: SmallVec::new(),
            discount_arc: None,
            prev_cost: self.cost,
            prev_inner_prize: self.inner_prize(),
        };

        for &arc in arcs {
            let t = g.tail(arc);
            let h = g.head(arc);
            assert!(self.deg[t as usize] >= 1, "extension tail not in tree");
            assert_eq!(self.deg[h as usize], 0, "candidate head already in tree");

            if self.root_discount && t == self.root {
                self.root_discount = false;
                level.discount_arc = Some(arc);
            } else {
                self.deg[t as usize] += 1;
            }

            self.deg[h as usize] = 1;
            self.parent[h as usize] = t;
            self.parent_cost[h as usize] = g.cost(arc);
            self.parent_arc[h as usize] = arc;
            self.cost += g.cost(arc);
        }

        // distinct tails, first occurrence order
        let mut tails: SmallVec<[Node; MAX_GRAD]> = SmallVec::new();
        for &arc in arcs {
            let t = g.tail(arc);
            if !tails.contains(&t) {
                tails.push(t);
            }
        }

        for &t in &tails {
            if self.deg[t as usize] <= 1 {
                continue;
            }

            if let Some(pos) = self.leaves.iter().position(|&l| l == t) {
                debug_assert!(level.removed_leaf.is_none());
                self.leaves.remove(pos);
                level.removed_leaf = Some((pos, t));
            }

            if !self.inner.contains(&t) {
                self.inner.push(t);
                level.inner_added.push(t);
                self.add_inner_prize(g, t);
            }
        }

        for &arc in arcs {
            self.leaves.push(g.head(arc));
        }

        self.depth += 1;
        self.levels.push(level);
    }

    /// Undoes the most recent [`ExtTree::extend`] exactly.
    pub fn retract(&mut self, g: &Graph) {
        let level = self.levels.pop().expect("nothing to retract");

        for &arc in level.comp_arcs.iter().rev() {
            let h = g.head(arc);
            let t = g.tail(arc);

            let popped = self.leaves.pop();
            debug_assert_eq!(popped, Some(h));

            self.deg[h as usize] = 0;
            self.parent[h as usize] = NO_NODE;
            self.parent_cost[h as usize] = -1.0;
            self.parent_arc[h as usize] = NO_ARC;

            if level.discount_arc == Some(arc) {
                self.root_discount = true;
            } else {
                self.deg[t as usize] -= 1;
            }
        }

        for &v in level.inner_added.iter().rev() {
            let popped = self.inner.pop();
            debug_assert_eq!(popped, Some(v));
        }

        if let Some((pos, v)) = level.removed_leaf {
            self.leaves.insert(pos, v);
        }

        if let Some(pc) = &mut self.pc {
            pc.inner_prize = level.prev_inner_prize;
        }

        self.cost = level.prev_cost;
        self.depth -= 1;
    }

    #[inline(always)]
    pub fn root(&self) -> Node {
        self.root
    }

    #[inline(always)]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline(always)]
    pub fn cost(&self) -> Cost {
        self.cost
    }

    /// Tree cost with the prizes of inner terminals deducted (equals the
    /// plain cost outside the prize-collecting variant).
    pub fn reduced_cost(&self) -> Cost {
        let reduced = self.cost - self.inner_prize();
        debug_assert!(reduced >= 0.0);
        reduced
    }

    pub fn inner_prize(&self) -> Cost {
        self.pc.as_ref().map_or(0.0, |pc| pc.inner_prize)
    }

    #[inline(always)]
    pub fn n_leaves(&self) -> usize {
        self.leaves.len()
    }

    #[inline(always)]
    pub fn leaves(&self) -> &[Node] {
        &self.leaves
    }

    #[inline(always)]
    pub fn inner_nodes(&self) -> &[Node] {
        &self.inner
    }

    #[inline(always)]
    pub fn deg(&self, v: Node) -> u32 {
        self.deg[v as usize]
    }

    #[inline(always)]
    pub fn parent(&self, v: Node) -> Node {
        self.parent[v as usize]
    }

    #[inline(always)]
    pub fn parent_cost(&self, v: Node) -> Cost {
        self.parent_cost[v as usize]
    }

    #[inline(always)]
    pub fn parent_arc(&self, v: Node) -> ArcId {
        self.parent_arc[v as usize]
    }

    pub fn leaf_pos(&self, v: Node) -> Option<usize> {
        self.leaves.iter().position(|&l| l == v)
    }

    /// Arcs of the component added by the latest extension.
    pub fn top_component(&self) -> &[ArcId] {
        &self.levels.last().expect("tree has no level").comp_arcs
    }

    /// No level has been extended yet; the upcoming level is the initial
    /// component.
    #[inline(always)]
    pub fn at_initial_level(&self) -> bool {
        self.depth == 0
    }

    /// The initial component is the current stack top.
    #[inline(always)]
    pub fn in_initial_comp(&self) -> bool {
        self.depth == 1
    }

    pub fn in_initial_gen_star(&self) -> bool {
        self.in_initial_comp() && matches!(self.initial, InitialComp::GenStar { .. })
    }

    pub fn initial_comp_is_edge(&self) -> bool {
        matches!(self.initial, InitialComp::Edge)
    }

    pub fn initial_comp_is_star(&self) -> bool {
        matches!(self.initial, InitialComp::Star { .. })
    }

    pub fn is_center(&self, v: Node) -> bool {
        match self.initial {
            InitialComp::Edge => false,
            InitialComp::Star { center } => v == center,
            InitialComp::GenStar { centers } => v == centers.0 || v == centers.1,
        }
    }

    /// Raw bottleneck mark array; `-1` outside the marked root path.
    pub fn bottleneck_values(&self) -> &[Cost] {
        &self.bottleneck
    }

    pub fn pcsd_mark(&mut self, g: &Graph, start: Node) {
        if let Some(pc) = &mut self.pc {
            pc.cache.mark(g, start, &self.deg);
        }
    }

    pub fn pcsd_unmark(&mut self, g: &Graph, start: Node) {
        if let Some(pc) = &mut self.pc {
            pc.cache.unmark(g, start);
        }
    }

    /// Cached prize-collecting SD from the marked start to `v`; `-1` if
    /// not marked. Always `-1` outside the PC variant.
    pub fn pcsd_to_node(&self, v: Node) -> Cost {
        self.pc.as_ref().map_or(-1.0, |pc| pc.cache.get(v))
    }

    pub fn pcsd_ncands(&self) -> usize {
        self.pc.as_ref().map_or(0, |pc| pc.cache.ncands())
    }

    pub fn pcsd_cand(&self, i: usize) -> Node {
        self.pc.as_ref().unwrap().cache.cand(i)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use itertools::Itertools;

    fn path_graph(n: u32) -> Graph {
        let edges = (0..n - 1).map(|i| (i, i + 1, 1.0)).collect_vec();
        Graph::from_edges(n, &edges)
    }

    #[test]
    fn edge_initial_keeps_root_a_leaf() {
        let g = path_graph(4);
        let mut tree = ExtTree::new(&g, 0);

        assert!(tree.at_initial_level());
        assert_eq!(tree.leaves(), &[0]);
        assert_eq!(tree.deg(0), 1);

        let e01 = g.find_arc(0, 1).unwrap();
        tree.extend(&g, &[e01]);

        assert_eq!(tree.leaves(), &[0, 1]);
        assert_eq!(tree.deg(0), 1);
        assert_eq!(tree.deg(1), 1);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.cost(), 1.0);
        assert!(tree.in_initial_comp());

        let e12 = g.find_arc(1, 2).unwrap();
        tree.extend(&g, &[e12]);

        assert_eq!(tree.leaves(), &[0, 2]);
        assert_eq!(tree.inner_nodes(), &[1]);
        assert_eq!(tree.deg(1), 2);
        assert_eq!(tree.parent(2), 1);
        assert_eq!(tree.parent_cost(2), 1.0);
        assert_eq!(tree.depth(), 2);
        assert!(!tree.in_initial_comp());
    }

    #[test]
    fn extend_retract_round_trips() {
        let g = path_graph(5);
        let mut tree = ExtTree::new(&g, 0);

        tree.extend(&g, &[g.find_arc(0, 1).unwrap()]);
        tree.extend(&g, &[g.find_arc(1, 2).unwrap()]);

        let leaves = tree.leaves().to_vec();
        let inner = tree.inner_nodes().to_vec();
        let cost = tree.cost();
        let degs = (0..5).map(|v| tree.deg(v)).collect_vec();

        tree.extend(&g, &[g.find_arc(2, 3).unwrap()]);
        tree.retract(&g);

        assert_eq!(tree.leaves(), leaves);
        assert_eq!(tree.inner_nodes(), inner);
        assert_eq!(tree.cost(), cost);
        assert_eq!((0..5).map(|v| tree.deg(v)).collect_vec(), degs);
        assert_eq!(tree.parent(3), NO_NODE);
        assert_eq!(tree.parent_arc(3), NO_ARC);
    }

    #[test]
    fn retract_to_initial_restores_root_discount() {
        let g = path_graph(3);
        let mut tree = ExtTree::new(&g, 0);

        tree.extend(&g, &[g.find_arc(0, 1).unwrap()]);
        tree.retract(&g);

        assert_eq!(tree.leaves(), &[0]);
        assert_eq!(tree.deg(0), 1);
        assert_eq!(tree.deg(1), 0);
        assert_eq!(tree.cost(), 0.0);
        assert!(tree.at_initial_level());

        // the pre-counted degree must still hold for the next attempt
        tree.extend(&g, &[g.find_arc(0, 1).unwrap()]);
        assert_eq!(tree.deg(0), 1);
    }

    #[test]
    fn star_component_lifecycle() {
        // center 0 with spokes 1..=4
        let g = Graph::from_edges(5, &[(1, 0, 1.0), (0, 2, 1.0), (0, 3, 1.0), (0, 4, 1.0)]);
        let root_arc = g.find_arc(1, 0).unwrap();
        let mut tree = ExtTree::new_star(&g, root_arc);

        assert_eq!(tree.root(), 1);
        assert!(tree.is_center(0));
        assert_eq!(tree.leaves(), &[1]);
        assert_eq!(tree.inner_nodes(), &[0]);
        assert_eq!(tree.cost(), 1.0);
        assert!(tree.at_initial_level());

        let spokes = [g.find_arc(0, 2).unwrap(), g.find_arc(0, 3).unwrap()];
        tree.extend(&g, &spokes);

        assert_eq!(tree.leaves(), &[1, 2, 3]);
        assert_eq!(tree.deg(0), 3);
        assert_eq!(tree.cost(), 3.0);
        assert!(tree.in_initial_comp());
        assert!(!tree.in_initial_gen_star());

        tree.retract(&g);
        assert_eq!(tree.leaves(), &[1]);
        assert_eq!(tree.deg(0), 1);
        assert_eq!(tree.cost(), 1.0);
    }

    #[test]
    fn inner_prize_tracks_inner_terminals() {
        let g = Graph::from_edges(3, &[(0, 1, 1.0), (1, 2, 1.0)])
            .with_prizes(&[1], vec![0.0, 0.4, 0.0]);
        let mut tree = ExtTree::new(&g, 0);

        tree.extend(&g, &[g.find_arc(0, 1).unwrap()]);
        assert_eq!(tree.inner_prize(), 0.0);
        assert_eq!(tree.reduced_cost(), 1.0);

        tree.extend(&g, &[g.find_arc(1, 2).unwrap()]);
        assert_eq!(tree.inner_prize(), 0.4);
        assert!((tree.reduced_cost() - 1.6).abs() < 1e-12);

        tree.retract(&g);
        assert_eq!(tree.inner_prize(), 0.0);
    }
}

pub mod levels;
pub mod ruleout;
pub mod sd;


pub use sd::{DistOracle, Sd};

use bitvec::prelude::*;
use thiserror::Error;

use crate::cost::Cost;
use crate::graph::{ArcId, Graph};
use crate::mst::{CsrDepot, IncrementalMst, InvalidInput, MultiLevelDists};

#[derive(Debug, Error)]
pub enum ExtRedError {
    #[error("distance oracle returned impossible value {0}")]
    OracleValue(Cost),
    #[error("extension tree outgrew the engine: {nleaves} leaves, capacity {max}")]
    Capacity { nleaves: usize, max: usize },
    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),
}

pub type Result<T> = std::result::Result<T, ExtRedError>;

/// Set of edges temporarily forbidden by equality rule-outs: a flag per
/// undirected edge plus an undo stack of inserted ids. The stack is the
/// sole backtrack mechanism inside a branch; [`EqForbiddenEdges::rewind_to`]
/// restores any earlier watermark.
#[derive(Debug)]
pub struct EqForbiddenEdges {
    flags: BitVec,
    stack: Vec<ArcId>,
}

impl EqForbiddenEdges {
    pub fn new(nedges: usize) -> Self {
        Self {
            flags: bitvec![0; nedges],
            stack: Vec::new(),
        }
    }

    /// Is the undirected edge of `arc` forbidden?
    #[inline(always)]
    pub fn is_arc_forbidden(&self, g: &Graph, arc: ArcId) -> bool {
        self.flags[g.edge_id(arc) as usize]
    }

    #[inline(always)]
    pub fn is_edge_forbidden(&self, edge: ArcId) -> bool {
        self.flags[edge as usize]
    }

    /// Forbids the undirected edge of `arc`; returns whether the edge
    /// was newly forbidden (already-forbidden edges are not re-stacked).
    pub fn mark_arc(&mut self, g: &Graph, arc: ArcId) -> bool {
        let edge = g.edge_id(arc) as usize;

        if self.flags[edge] {
            return false;
        }

        self.flags.set(edge, true);
        self.stack.push(edge as ArcId);
        true
    }

    #[inline(always)]
    pub fn has_forbidden(&self) -> bool {
        !self.stack.is_empty()
    }

    #[inline(always)]
    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// Unwinds the stack to an earlier watermark, clearing the flags of
    /// everything recorded since.
    pub fn rewind_to(&mut self, watermark: usize) {
        assert!(watermark <= self.stack.len());

        while self.stack.len() > watermark {
            let edge = self.stack.pop().unwrap() as usize;
            debug_assert!(self.flags[edge]);
            self.flags.set(edge, false);
        }
    }
}

/// The extended-reduction MST engine: the layered special-distance
/// stores, the two MST depots, the incremental MST kernel with its
/// shared adjacency buffer, and the equality-forbidden edge set.
///
/// The engine is driven through the level lifecycle
/// ([`ExtMst::level_init`] .. [`ExtMst::level_remove`], see
/// `reduce::levels`) and queried through
/// [`ExtMst::rule_out_peripheral`] (see `reduce::ruleout`). All state is
/// single-writer; operations never suspend.
#[derive(Debug)]
pub struct ExtMst {
    pub(crate) sds_vertical: MultiLevelDists,
    pub(crate) sds_horizontal: MultiLevelDists,
    pub(crate) msts_levelbase: CsrDepot,
    pub(crate) msts_comp: CsrDepot,
    pub(crate) kernel: IncrementalMst,
    /// Shared adjacency row, `max_nleaves + 1` wide; reused by every
    /// MST extension and never re-entered.
    pub(crate) adj_buf: Vec<Cost>,
    pub(crate) sdeq: EqForbiddenEdges,
    /// Equality-stack watermark per vertical level.
    pub(crate) sdeq_marks: Vec<usize>,
}

impl ExtMst {
    pub fn new(g: &Graph, max_nleaves: usize) -> Self {
        assert!(max_nleaves >= 2);

        Self {
            sds_vertical: MultiLevelDists::new(),
            sds_horizontal: MultiLevelDists::new(),
            msts_levelbase: CsrDepot::new(),
            msts_comp: CsrDepot::new(),
            kernel: IncrementalMst::new(max_nleaves),
            adj_buf: vec![-1.0; max_nleaves + 1],
            sdeq: EqForbiddenEdges::new(g.number_of_edges() as usize),
            sdeq_marks: Vec::new(),
        }
    }

    pub fn n_comp_msts(&self) -> usize {
        self.msts_comp.len()
    }

    pub fn n_levelbase_msts(&self) -> usize {
        self.msts_levelbase.len()
    }

    pub fn n_vertical_levels(&self) -> usize {
        self.sds_vertical.nlevels()
    }

    pub fn n_horizontal_levels(&self) -> usize {
        self.sds_horizontal.nlevels()
    }

    pub fn eq_forbidden(&self) -> &EqForbiddenEdges {
        &self.sdeq
    }

    pub fn has_eq_forbidden_edges(&self) -> bool {
        self.sdeq.has_forbidden()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn forbidden_edges_rewind_exactly() {
        let g = Graph::from_edges(4, &[(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0)]);
        let mut sdeq = EqForbiddenEdges::new(g.number_of_edges() as usize);

        assert!(!sdeq.has_forbidden());
        let watermark = sdeq.stack_len();

        let arc = g.find_arc(1, 2).unwrap();
        assert!(sdeq.mark_arc(&g, arc));
        // the reverse arc maps to the same undirected edge
        assert!(!sdeq.mark_arc(&g, arc ^ 1));
        assert!(sdeq.is_arc_forbidden(&g, arc));
        assert_eq!(sdeq.stack_len(), 1);

        sdeq.mark_arc(&g, g.find_arc(0, 1).unwrap());
        assert_eq!(sdeq.stack_len(), 2);

        sdeq.rewind_to(watermark);
        assert!(!sdeq.has_forbidden());
        assert!(!sdeq.is_arc_forbidden(&g, arc));
        assert!((0..g.number_of_edges()).all(|e| !sdeq.is_edge_forbidden(e)));
    }
}

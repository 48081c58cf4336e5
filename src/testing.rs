//! Shared helpers for engine tests: a table-backed distance oracle and
//! small snapshot utilities.

use fxhash::FxHashMap;

use crate::cost::Cost;
use crate::graph::{ArcId, Graph, Node};
use crate::reduce::{DistOracle, EqForbiddenEdges, ExtMst};

/// Distance oracle answering from hash tables. Pairs are unordered;
/// anything not present answers `-1` ("not computed"), which the engine
/// treats conservatively. Forbidden-edge queries fall back to the plain
/// table unless an explicit answer is set; equality-confirmation queries
/// never confirm unless one is set.
#[derive(Debug, Default)]
pub struct TableOracle {
    sds: FxHashMap<(Node, Node), Cost>,
    forbidden_sds: FxHashMap<(Node, Node), Cost>,
    eq_sds: FxHashMap<(Node, Node), Cost>,
}

fn key(u: Node, v: Node) -> (Node, Node) {
    (u.min(v), u.max(v))
}

impl TableOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sd(mut self, u: Node, v: Node, d: Cost) -> Self {
        self.sds.insert(key(u, v), d);
        self
    }

    pub fn with_forbidden_sd(mut self, u: Node, v: Node, d: Cost) -> Self {
        self.forbidden_sds.insert(key(u, v), d);
        self
    }

    pub fn with_eq_sd(mut self, u: Node, v: Node, d: Cost) -> Self {
        self.eq_sds.insert(key(u, v), d);
        self
    }
}

impl DistOracle for TableOracle {
    fn sd_double(&self, _g: &Graph, u: Node, v: Node) -> Cost {
        self.sds.get(&key(u, v)).copied().unwrap_or(-1.0)
    }

    fn sd_double_forbidden(
        &self,
        _g: &Graph,
        _forbidden: &EqForbiddenEdges,
        u: Node,
        v: Node,
    ) -> Cost {
        self.forbidden_sds
            .get(&key(u, v))
            .or_else(|| self.sds.get(&key(u, v)))
            .copied()
            .unwrap_or(-1.0)
    }

    fn sd_double_forbidden_eq(
        &self,
        _g: &Graph,
        _forbidden: &EqForbiddenEdges,
        _dist_eq: Cost,
        _arc_forbidden: ArcId,
        u: Node,
        v: Node,
    ) -> Cost {
        self.eq_sds.get(&key(u, v)).copied().unwrap_or(-1.0)
    }
}

/// Stack counts of the engine, for before/after comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineCounts {
    pub vertical_levels: usize,
    pub horizontal_levels: usize,
    pub levelbase_msts: usize,
    pub comp_msts: usize,
    pub eq_forbidden: usize,
}

pub fn engine_counts(engine: &ExtMst) -> EngineCounts {
    EngineCounts {
        vertical_levels: engine.n_vertical_levels(),
        horizontal_levels: engine.n_horizontal_levels(),
        levelbase_msts: engine.n_levelbase_msts(),
        comp_msts: engine.n_comp_msts(),
        eq_forbidden: engine.eq_forbidden().stack_len(),
    }
}

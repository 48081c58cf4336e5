use log::debug;
use smallvec::SmallVec;

use crate::cost::{eq, ge, le, lt, Cost, FARAWAY};
use crate::graph::{ArcId, Graph, Node};
use crate::tree::{ExtTree, MAX_GRAD};

use super::sd::{get_sd, DistOracle, Sd};
use super::{EqForbiddenEdges, ExtMst, Result};

/// Confirms an equality rule-out: is the tied special distance still
/// achievable when `arc_forbidden` (on top of the already forbidden
/// edges) must be avoided?
fn is_equality_dominated<O: DistOracle>(
    g: &Graph,
    oracle: &O,
    sdeq: &EqForbiddenEdges,
    dist_eq: Cost,
    arc_forbidden: ArcId,
    v1: Node,
    v2: Node,
) -> Result<bool> {
    let sd_eq = Sd::try_from_oracle(oracle.sd_double_forbidden_eq(
        g,
        sdeq,
        dist_eq,
        arc_forbidden,
        v1,
        v2,
    ))?;

    let Some(c) = sd_eq.known() else {
        return Ok(false);
    };

    debug_assert!(ge(c, dist_eq));
    Ok(le(c, dist_eq))
}

/// Does the special distance dominate the tree bottleneck between the
/// path-marked vertex and `v_unmarked`? Equality is resolved through the
/// forbidden-edge re-check and, on success, recorded in `sdeq`.
pub(crate) fn bottleneck_is_dominated<O: DistOracle>(
    g: &Graph,
    oracle: &O,
    tree: &ExtTree,
    sdeq: &mut EqForbiddenEdges,
    v_marked: Node,
    v_unmarked: Node,
    sd: Sd,
    arc_forbidden: ArcId,
) -> Result<bool> {
    let Some(s) = sd.known() else {
        return Ok(false);
    };
    if v_marked == v_unmarked {
        return Ok(false);
    }

    let bottleneck = tree.bottleneck_dist(g, v_unmarked);

    if lt(s, bottleneck) {
        return Ok(true);
    }
    if le(s, bottleneck)
        && is_equality_dominated(g, oracle, sdeq, s, arc_forbidden, v_marked, v_unmarked)?
    {
        debug!("ruled out with equality {v_marked}->{v_unmarked}");
        tree.mark_equality_edges(g, s, v_marked, v_unmarked, sdeq);
        return Ok(true);
    }

    Ok(false)
}

/// Like [`bottleneck_is_dominated`], but first measures the special
/// distance against the cost of the extension arc itself. `v_marked` is
/// the tail of `ext_arc` and carries the marked root path.
pub(crate) fn bottleneck_with_extedge_is_dominated<O: DistOracle>(
    g: &Graph,
    oracle: &O,
    tree: &ExtTree,
    sdeq: &mut EqForbiddenEdges,
    ext_arc: ArcId,
    v_marked: Node,
    v_unmarked: Node,
    sd: Sd,
) -> Result<bool> {
    debug_assert_eq!(v_marked, g.tail(ext_arc));

    let Some(s) = sd.known() else {
        return Ok(false);
    };

    let ext_cost = g.cost(ext_arc);
    if lt(s, ext_cost) {
        return Ok(true);
    }
    if le(s, ext_cost) {
        let neighbor = g.head(ext_arc);
        if is_equality_dominated(g, oracle, sdeq, s, ext_arc, neighbor, v_unmarked)? {
            sdeq.mark_arc(g, ext_arc);
            debug!("ruled out with equality on the extension edge itself");
            return Ok(true);
        }
    }

    if v_marked == v_unmarked {
        return Ok(false);
    }

    let bottleneck = tree.bottleneck_dist(g, v_unmarked);

    if lt(s, bottleneck) {
        return Ok(true);
    }
    if le(s, bottleneck) {
        let neighbor = g.head(ext_arc);
        debug_assert!(neighbor != v_unmarked && neighbor != v_marked);

        if is_equality_dominated(g, oracle, sdeq, s, ext_arc, neighbor, v_unmarked)? {
            debug!("ruled out with equality {v_marked}->{v_unmarked}");
            tree.mark_equality_edges(g, s, v_marked, v_unmarked, sdeq);
            return Ok(true);
        }
    }

    Ok(false)
}

/// Sibling test: does the stored special distance between the heads of
/// two sibling extension arcs undercut either arc cost?
pub(crate) fn bottleneck_to_sibling_is_dominated<O: DistOracle>(
    g: &Graph,
    oracle: &O,
    sdeq: &mut EqForbiddenEdges,
    ext_arc: ArcId,
    sibling_arc: ArcId,
    stored: Cost,
) -> Result<bool> {
    assert!(ext_arc != sibling_arc);
    debug_assert_eq!(g.tail(ext_arc), g.tail(sibling_arc));
    debug_assert!(stored >= 0.0);

    if stored >= FARAWAY {
        return Ok(false);
    }
    let s = stored;

    if lt(s, g.cost(sibling_arc)) || lt(s, g.cost(ext_arc)) {
        return Ok(true);
    }

    let v1 = g.head(sibling_arc);
    let v2 = g.head(ext_arc);

    if le(s, g.cost(sibling_arc))
        && is_equality_dominated(g, oracle, sdeq, s, sibling_arc, v1, v2)?
    {
        sdeq.mark_arc(g, sibling_arc);
        debug!("ruled out sibling edge with equality");
        return Ok(true);
    }

    if le(s, g.cost(ext_arc)) && is_equality_dominated(g, oracle, sdeq, s, ext_arc, v1, v2)? {
        sdeq.mark_arc(g, ext_arc);
        debug!("ruled out extension edge with equality");
        return Ok(true);
    }

    Ok(false)
}

/// Bottleneck tests from the candidate against every inner tree node.
pub(crate) fn check_non_leaves<O: DistOracle>(
    g: &Graph,
    oracle: &O,
    tree: &ExtTree,
    sdeq: &mut EqForbiddenEdges,
    arc2neighbor: ArcId,
) -> Result<bool> {
    let neighbor = g.head(arc2neighbor);
    let base = g.tail(arc2neighbor);

    for &node in tree.inner_nodes() {
        debug_assert!(tree.deg(node) > 1);
        debug_assert!(node != base);

        let sd = get_sd(g, oracle, tree, neighbor, node)?;
        if bottleneck_with_extedge_is_dominated(
            g, oracle, tree, sdeq, arc2neighbor, base, node, sd,
        )? {
            debug!("non-leaf bottleneck rule-out at {node}");
            return Ok(true);
        }
    }

    Ok(false)
}

/// Bottleneck tests against the non-leaf tree vertices reached by the
/// prize-collecting cache.
pub(crate) fn check_non_leaves_pc<O: DistOracle>(
    g: &Graph,
    oracle: &O,
    tree: &ExtTree,
    sdeq: &mut EqForbiddenEdges,
    arc2neighbor: ArcId,
) -> Result<bool> {
    let neighbor = g.head(arc2neighbor);
    let base = g.tail(arc2neighbor);

    for i in 0..tree.pcsd_ncands() {
        let cand = tree.pcsd_cand(i);

        // leaves and vertices outside the tree are handled elsewhere
        if tree.deg(cand) <= 1 {
            continue;
        }

        let sd = get_sd(g, oracle, tree, neighbor, cand)?;
        if bottleneck_with_extedge_is_dominated(
            g, oracle, tree, sdeq, arc2neighbor, base, cand, sd,
        )? {
            debug!("pc non-leaf bottleneck rule-out at {cand}");
            return Ok(true);
        }
    }

    Ok(false)
}

impl ExtMst {
    /// Can the current stack top be peripherally ruled out? Builds the
    /// component MST over all leaves (with restricted bottleneck tests
    /// per added leaf) and then measures its weight against the tree
    /// cost. A bottleneck rule-out discards the partial MST; an
    /// objective rule-out leaves the finished MST for the caller to pop.
    pub fn rule_out_peripheral<O: DistOracle>(
        &mut self,
        g: &Graph,
        oracle: &O,
        tree: &mut ExtTree,
    ) -> Result<bool> {
        let mut ruled_out = self.comp_build_mst(g, oracle, tree)?;

        if ruled_out {
            debug!("peripheral rule-out via bottleneck");
        } else if self.comp_rule_out(g, oracle, tree)? {
            debug!("peripheral rule-out via component mst");
            ruled_out = true;
        }

        Ok(ruled_out)
    }

    /// Builds the component MST of the top level by extending the
    /// levelbase MST with every component leaf. Returns early with
    /// `true` (and removes the partial MST) on a bottleneck rule-out.
    fn comp_build_mst<O: DistOracle>(
        &mut self,
        g: &Graph,
        oracle: &O,
        tree: &mut ExtTree,
    ) -> Result<bool> {
        let nleaves = tree.n_leaves();
        let comp: SmallVec<[ArcId; MAX_GRAD]> = SmallVec::from_slice(tree.top_component());
        let topsize = comp.len();
        let n_anc = if tree.in_initial_comp() {
            1
        } else {
            nleaves - topsize
        };

        debug_assert!(n_anc >= 1 && n_anc < nleaves);
        debug_assert_eq!(n_anc + topsize, nleaves);
        debug_assert_eq!(self.msts_comp.len(), self.msts_levelbase.len() - 1);
        assert!(nleaves <= self.kernel.max_nnodes());
        debug_assert_eq!(self.sds_vertical.top_level(), tree.depth());

        self.msts_comp.push_empty_tree(nleaves);

        let mut ruled_out = false;
        let mut extended = false;

        for (i, &arc2leaf) in comp.iter().enumerate() {
            ruled_out = self.comp_leaf_sib_sds(g, oracle, tree, &comp, arc2leaf, n_anc)?;
            if ruled_out {
                break;
            }

            ruled_out = self.comp_leaf_anc_sds(g, oracle, tree, arc2leaf, n_anc, topsize)?;
            if ruled_out {
                break;
            }

            let nnodes_in = n_anc + i;
            if !extended {
                let parent = self.msts_levelbase.top();
                debug_assert_eq!(parent.nnodes(), n_anc);
                self.kernel.add_node(
                    parent,
                    &self.adj_buf[..nnodes_in + 1],
                    self.msts_comp.empty_top_mut(),
                )?;
                extended = true;
            } else {
                self.kernel.add_node_inplace(
                    &self.adj_buf[..nnodes_in + 1],
                    self.msts_comp.empty_top_mut(),
                )?;
            }
        }

        if ruled_out {
            self.msts_comp.pop();
        } else {
            debug_assert!(extended);
            debug_assert_eq!(self.msts_comp.empty_top_mut().nnodes(), nleaves);
            self.msts_comp.mark_top();
        }

        Ok(ruled_out)
    }

    /// Fills the sibling section of the adjacency row for `arc2top`'s
    /// head from the horizontal store. Sibling pairs sharing the
    /// extension base run the restricted two-edge test (right siblings
    /// only; left pairs were tested when the left sibling was
    /// processed). At the initial general star, siblings with a
    /// different base run the full bottleneck test instead.
    fn comp_leaf_sib_sds<O: DistOracle>(
        &mut self,
        g: &Graph,
        oracle: &O,
        tree: &mut ExtTree,
        comp: &[ArcId],
        arc2top: ArcId,
        n_anc: usize,
    ) -> Result<bool> {
        let topleaf = g.head(arc2top);
        let gen_star = tree.in_initial_gen_star();

        if gen_star {
            tree.mark_root_path(g, topleaf);
        }

        let mut hit_self = false;
        let mut ruled_out = false;

        for (j, &arc_sib) in comp.iter().enumerate() {
            let sibling = g.head(arc_sib);
            debug_assert_eq!(tree.deg(sibling), 1);

            if sibling == topleaf {
                debug_assert!(!hit_self);
                hit_self = true;
                self.adj_buf[n_anc + j] = FARAWAY;
                continue;
            }

            let d = self.sds_horizontal.top_dist(topleaf, sibling);
            self.adj_buf[n_anc + j] = d;

            if g.tail(arc2top) != g.tail(arc_sib) {
                debug_assert!(gen_star);

                if bottleneck_is_dominated(
                    g,
                    oracle,
                    tree,
                    &mut self.sdeq,
                    topleaf,
                    sibling,
                    Sd::from_stored(d),
                    arc_sib,
                )? {
                    debug!("bottleneck rule-out among general-star siblings");
                    ruled_out = true;
                    break;
                }
                continue;
            }

            if hit_self
                && bottleneck_to_sibling_is_dominated(
                    g,
                    oracle,
                    &mut self.sdeq,
                    arc2top,
                    arc_sib,
                    d,
                )?
            {
                debug!("bottleneck rule-out among siblings");
                ruled_out = true;
                break;
            }
        }

        if gen_star {
            tree.unmark_root_path(g, topleaf);
        }

        debug_assert!(hit_self || ruled_out);
        Ok(ruled_out)
    }

    /// Fills the ancestor section of the adjacency row from the vertical
    /// store. A non-trivial bottleneck rule-out is only possible when
    /// the leaf has no siblings, or at the initial general star.
    fn comp_leaf_anc_sds<O: DistOracle>(
        &mut self,
        g: &Graph,
        oracle: &O,
        tree: &mut ExtTree,
        arc2top: ArcId,
        n_anc: usize,
        topsize: usize,
    ) -> Result<bool> {
        let topleaf = g.head(arc2top);

        {
            let ancestors = self.sds_vertical.top_dists(topleaf);
            debug_assert_eq!(ancestors.len(), n_anc);
            self.adj_buf[..n_anc].copy_from_slice(ancestors);
        }

        let has_siblings = topsize > 1;
        if has_siblings && !tree.in_initial_gen_star() {
            return Ok(false);
        }

        tree.mark_root_path(g, topleaf);

        let mut ruled_out = false;
        for j in 0..n_anc {
            let leaf = tree.leaves()[j];
            let sd = Sd::from_stored(self.adj_buf[j]);

            if bottleneck_is_dominated(
                g,
                oracle,
                tree,
                &mut self.sdeq,
                topleaf,
                leaf,
                sd,
                arc2top,
            )? {
                debug!("bottleneck rule-out against ancestor leaf {leaf}");
                ruled_out = true;
                break;
            }
        }

        tree.unmark_root_path(g, topleaf);
        Ok(ruled_out)
    }

    /// MST-objective rule-out: the finished component MST against the
    /// (prize-reduced) tree cost. Strict undercut always rules out; a
    /// tie rules out once the MST has more than two entries, except that
    /// a 3-leaf tie must survive the forbidden-distance sub-check.
    fn comp_rule_out<O: DistOracle>(
        &self,
        g: &Graph,
        oracle: &O,
        tree: &ExtTree,
    ) -> Result<bool> {
        let topmst = self.msts_comp.top();
        let mstweight = topmst.weight();
        let tree_cost = tree.reduced_cost();

        debug_assert_eq!(topmst.nnodes(), tree.n_leaves());
        debug_assert_eq!(topmst.nentries() % 2, 0);

        let mut ruled_out = if topmst.nentries() > 2 {
            le(mstweight, tree_cost)
        } else {
            lt(mstweight, tree_cost)
        };

        if ruled_out
            && tree.n_leaves() == 3
            && eq(mstweight, tree_cost)
            && !self.eq_comp3_rule_out(g, oracle, tree, tree_cost)?
        {
            ruled_out = false;
        }

        if ruled_out {
            debug!("component mst alternative found: {mstweight} vs {tree_cost}");
        }

        Ok(ruled_out)
    }

    /// Does an exact 3-leaf tie still rule out? Any pair of
    /// forbidden-edge special distances connecting all three leaves at
    /// no more than the tree cost confirms the rule-out.
    fn eq_comp3_rule_out<O: DistOracle>(
        &self,
        g: &Graph,
        oracle: &O,
        tree: &ExtTree,
        tree_cost: Cost,
    ) -> Result<bool> {
        debug_assert_eq!(tree.n_leaves(), 3);

        // star initial components never used simple paths for their
        // equality rule-outs, and without forbidden edges there is
        // nothing to re-check
        if tree.initial_comp_is_star() || !self.sdeq.has_forbidden() {
            return Ok(true);
        }

        let leaves = tree.leaves();

        let sd01 = Sd::try_from_oracle(oracle.sd_double_forbidden(
            g, &self.sdeq, leaves[0], leaves[1],
        ))?
        .or_faraway();
        let sd02 = Sd::try_from_oracle(oracle.sd_double_forbidden(
            g, &self.sdeq, leaves[0], leaves[2],
        ))?
        .or_faraway();

        if le(sd01 + sd02, tree_cost) {
            return Ok(true);
        }

        let sd12 = Sd::try_from_oracle(oracle.sd_double_forbidden(
            g, &self.sdeq, leaves[1], leaves[2],
        ))?
        .or_faraway();

        Ok(le(sd01 + sd12, tree_cost) || le(sd02 + sd12, tree_cost))
    }
}

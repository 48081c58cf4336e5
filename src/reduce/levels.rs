use itertools::Itertools;
use log::{debug, trace};

use crate::cost::{lt, FARAWAY};
use crate::graph::{ArcId, Graph, Node};
use crate::mst::CsrDepot;
use crate::tree::{ExtTree, MAX_GRAD};

use super::ruleout::{
    bottleneck_with_extedge_is_dominated, check_non_leaves, check_non_leaves_pc,
};
use super::sd::{get_sd, DistOracle};
use super::{ExtMst, ExtRedError, Result};

fn add_one_node_mst(depot: &mut CsrDepot) {
    depot.push_empty_tree(1);
    depot.empty_top_mut().set_one_node();
    depot.mark_top();
}

impl ExtMst {
    /// Seeds every stack with the root level: one-node MSTs on both
    /// depots and a closed single-slot, zero-target level on both
    /// distance stores.
    pub fn add_root_level(&mut self, tree: &ExtTree) {
        assert!(self.msts_comp.is_empty() && self.msts_levelbase.is_empty());
        assert_eq!(tree.depth(), 0);

        add_one_node_mst(&mut self.msts_comp);
        add_one_node_mst(&mut self.msts_levelbase);

        for sds in [&mut self.sds_vertical, &mut self.sds_horizontal] {
            sds.push_level(1, 0);
            sds.slot_set_base(tree.root());
            sds.slot_commit();
            sds.close_top_level();
        }

        self.sdeq_marks.push(self.sdeq.stack_len());

        trace!("initialized root level for tree at {}", tree.root());
    }

    /// Opens a new vertical level for the upcoming extension step. Until
    /// the tree is extended, the vertical store runs one level ahead of
    /// the tree depth. The root keeps its own distance slot only for the
    /// initial component.
    pub fn level_init(&mut self, tree: &ExtTree) {
        let ntargets = if tree.at_initial_level() {
            tree.n_leaves()
        } else {
            tree.n_leaves() - 1
        };

        self.sds_vertical.push_level(MAX_GRAD, ntargets);
        self.sdeq_marks.push(self.sdeq.stack_len());

        trace!("init level {}", self.sds_vertical.top_level());
        debug_assert_eq!(tree.depth() + 1, self.sds_vertical.top_level());
    }

    /// Adds a candidate neighbor (head of `arc2neighbor`) to the open
    /// vertical level: computes and stores its special distances to
    /// every current leaf, and runs the bottleneck, trial-MST and
    /// non-leaf tests. Returns whether extending along this arc is
    /// already ruled out; a ruled-out candidate leaves no slot behind.
    pub fn vertical_add_leaf<O: DistOracle>(
        &mut self,
        g: &Graph,
        oracle: &O,
        tree: &mut ExtTree,
        arc2neighbor: ArcId,
    ) -> Result<bool> {
        let neighbor = g.head(arc2neighbor);
        let base = g.tail(arc2neighbor);

        assert!(!tree.at_initial_level());
        assert_eq!(tree.deg(base), 1, "extension base must be a leaf");
        assert_eq!(tree.deg(neighbor), 0, "candidate already in tree");

        if tree.n_leaves() + 1 > self.kernel.max_nnodes() {
            return Err(ExtRedError::Capacity {
                nleaves: tree.n_leaves() + 1,
                max: self.kernel.max_nnodes(),
            });
        }

        self.leaf_init(g, tree, base, neighbor);

        let mut ruled_out = self.set_vertical_sds(g, oracle, tree, arc2neighbor)?;

        // a trial extension of the component MST may beat the tree
        if !ruled_out {
            let row = self.sds_vertical.slot_dists();
            let topmst = self.msts_comp.top();
            debug_assert_eq!(topmst.nnodes(), tree.n_leaves());

            let ext_weight = self.kernel.ext_weight(topmst, row)?;
            if lt(ext_weight, tree.reduced_cost()) {
                debug!(
                    "extension to {neighbor} ruled out by trial mst ({ext_weight} < {})",
                    tree.reduced_cost()
                );
                ruled_out = true;
            }
        }

        if !ruled_out && g.is_pc() {
            ruled_out = check_non_leaves_pc(g, oracle, tree, &mut self.sdeq, arc2neighbor)?;
        }

        if !ruled_out {
            ruled_out = check_non_leaves(g, oracle, tree, &mut self.sdeq, arc2neighbor)?;
        }

        self.leaf_exit(g, tree, base, neighbor, ruled_out);
        Ok(ruled_out)
    }

    /// Candidate addition for the initial component: only the vertical
    /// distances and their bottleneck tests run; there is no component
    /// MST to extend yet.
    pub fn vertical_add_leaf_initial<O: DistOracle>(
        &mut self,
        g: &Graph,
        oracle: &O,
        tree: &mut ExtTree,
        arc2neighbor: ArcId,
    ) -> Result<bool> {
        let neighbor = g.head(arc2neighbor);
        let base = g.tail(arc2neighbor);

        assert!(tree.at_initial_level());
        assert!(tree.deg(base) >= 1);
        assert_eq!(tree.deg(neighbor), 0);
        debug_assert!(base == tree.root() || tree.is_center(base));

        self.leaf_init(g, tree, base, neighbor);
        let ruled_out = self.set_vertical_sds(g, oracle, tree, arc2neighbor)?;
        self.leaf_exit(g, tree, base, neighbor, ruled_out);

        Ok(ruled_out)
    }

    fn leaf_init(&mut self, g: &Graph, tree: &mut ExtTree, base: Node, neighbor: Node) {
        self.sds_vertical.slot_set_base(neighbor);

        // bottlenecks start from the base of the candidate
        tree.mark_root_path(g, base);
        tree.pcsd_mark(g, neighbor);
    }

    fn leaf_exit(
        &mut self,
        g: &Graph,
        tree: &mut ExtTree,
        base: Node,
        neighbor: Node,
        ruled_out: bool,
    ) {
        if ruled_out {
            self.sds_vertical.slot_discard();
        } else {
            // the base's own entry is useless for further extensions
            // from it; for the initial component the root keeps its slot
            if !tree.at_initial_level() {
                let pos = tree.leaf_pos(base).expect("base must be a leaf");
                debug_assert!(pos > 0, "the root is never an extension base here");
                debug_assert_eq!(self.sds_vertical.slot_ids()[pos], base);
                self.sds_vertical.slot_remove(pos);
            }

            self.sds_vertical.slot_commit();
        }

        tree.unmark_root_path(g, base);
        tree.pcsd_unmark(g, neighbor);
    }

    /// Fills the open vertical slot with the special distances from the
    /// candidate to every leaf, testing each against the extension-edge
    /// and root-path bottlenecks.
    fn set_vertical_sds<O: DistOracle>(
        &mut self,
        g: &Graph,
        oracle: &O,
        tree: &ExtTree,
        arc2neighbor: ArcId,
    ) -> Result<bool> {
        let neighbor = g.head(arc2neighbor);
        let base = g.tail(arc2neighbor);

        for j in 0..tree.n_leaves() {
            let leaf = tree.leaves()[j];
            debug_assert!(leaf != neighbor);

            let sd = get_sd(g, oracle, tree, neighbor, leaf)?;
            self.sds_vertical.slot_push(leaf, sd.or_faraway());

            if bottleneck_with_extedge_is_dominated(
                g,
                oracle,
                tree,
                &mut self.sdeq,
                arc2neighbor,
                base,
                leaf,
                sd,
            )? {
                debug!("bottleneck rule-out {neighbor}->{leaf}");
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Seals the vertical part of the top level.
    pub fn vertical_close(&mut self) {
        self.sds_vertical.close_top_level();
        trace!(
            "closed vertical level {}, nslots={}",
            self.sds_vertical.top_level(),
            self.sds_vertical.level_nslots(self.sds_vertical.top_level())
        );
    }

    /// Computes and stores the pairwise special distances among the
    /// surviving extension arcs of the new level. Right siblings are
    /// computed fresh; left siblings reuse the value already stored.
    pub fn horizontal_add<O: DistOracle>(
        &mut self,
        g: &Graph,
        oracle: &O,
        tree: &mut ExtTree,
        ext_arcs: &[ArcId],
    ) -> Result<()> {
        assert!(!ext_arcs.is_empty() && ext_arcs.len() <= MAX_GRAD);

        self.sds_horizontal
            .push_level(ext_arcs.len(), ext_arcs.len() - 1);

        debug_assert_eq!(tree.depth() + 1, self.sds_horizontal.top_level());
        trace!("added horizontal level {}", self.sds_horizontal.top_level());

        for (i, &arc) in ext_arcs.iter().enumerate() {
            let ext_head = g.head(arc);

            self.sds_horizontal.slot_set_base(ext_head);
            tree.pcsd_mark(g, ext_head);

            for &arc_left in &ext_arcs[..i] {
                let sibling = g.head(arc_left);
                let d = self.sds_horizontal.top_dist(sibling, ext_head);
                self.sds_horizontal.slot_push(sibling, d);
            }

            for &arc_right in &ext_arcs[i + 1..] {
                let sibling = g.head(arc_right);
                let sd = get_sd(g, oracle, tree, ext_head, sibling)?;
                self.sds_horizontal.slot_push(sibling, sd.or_faraway());
            }

            tree.pcsd_unmark(g, ext_head);
            self.sds_horizontal.slot_commit();
        }

        self.sds_horizontal.close_top_level();
        Ok(())
    }

    /// Closes the level: builds the levelbase MST (all leaves except the
    /// top component and the extension node). Extending from the root
    /// yields the one-node tree; otherwise the previous levelbase MST is
    /// extended by the siblings of `ext_node` in leaf order.
    pub fn level_close(&mut self, g: &Graph, ext_node: Node, tree: &ExtTree) -> Result<()> {
        if tree.at_initial_level() {
            debug_assert!(ext_node == tree.root() || tree.is_center(ext_node));
            debug_assert_eq!(self.msts_levelbase.len(), 1);

            add_one_node_mst(&mut self.msts_levelbase);
        } else {
            assert!(ext_node != tree.root());
            self.build_base_mst(g, ext_node, tree)?;
        }

        debug_assert_eq!(self.msts_levelbase.len(), self.sds_vertical.nlevels());
        Ok(())
    }

    fn build_base_mst(&mut self, g: &Graph, ext_node: Node, tree: &ExtTree) -> Result<()> {
        let nleaves = tree.n_leaves();
        let nnodes_new = nleaves - 1;
        let parent_level = self.sds_vertical.top_level() - 1;

        debug_assert_eq!(parent_level, tree.depth());

        // siblings of the extension node in the top component, ordered
        // by their position in the leaves array
        let comp_nodes: Vec<Node> = tree
            .top_component()
            .iter()
            .map(|&a| g.head(a))
            .sorted_by_key(|&v| tree.leaf_pos(v).expect("component node must be a leaf"))
            .collect();

        debug_assert_eq!(comp_nodes.iter().filter(|&&v| v == ext_node).count(), 1);

        self.msts_levelbase.push_empty_tree(nnodes_new);
        let (mst_parent, mst_new) = self.msts_levelbase.top_and_empty_mut();
        let nnodes_parent = mst_parent.nnodes();

        debug_assert_eq!(nnodes_parent, self.sds_vertical.level_ntargets(parent_level));
        debug_assert_eq!(nnodes_parent + comp_nodes.len(), nleaves);

        let mut extended = false;

        for &v in &comp_nodes {
            if v == ext_node {
                continue;
            }

            // adjacency of v: vertical distances to the ancestor leaves,
            // then horizontal distances to the already added siblings
            let ancestors = self.sds_vertical.dists(parent_level, v);
            debug_assert_eq!(ancestors.len(), nnodes_parent);
            self.adj_buf[..nnodes_parent].copy_from_slice(ancestors);

            let mut adjpos = nnodes_parent;
            for &w in &comp_nodes {
                if w == v {
                    self.adj_buf[adjpos] = FARAWAY;
                    break;
                }
                if w == ext_node {
                    continue;
                }

                self.adj_buf[adjpos] = self.sds_horizontal.dist(parent_level, v, w);
                adjpos += 1;
            }

            if !extended {
                self.kernel
                    .add_node(mst_parent, &self.adj_buf[..nnodes_parent + 1], mst_new)?;
                extended = true;
            } else {
                let nnodes_in = mst_new.nnodes();
                debug_assert_eq!(adjpos, nnodes_in);
                self.kernel
                    .add_node_inplace(&self.adj_buf[..nnodes_in + 1], mst_new)?;
            }
        }

        if !extended {
            debug_assert_eq!(nnodes_new, mst_parent.nnodes());
            mst_new.copy_from(mst_parent);
        }

        debug_assert_eq!(mst_new.nnodes(), nnodes_new);
        self.msts_levelbase.mark_top();

        trace!("built levelbase mst with {} nodes", nnodes_new);
        Ok(())
    }

    /// Removes the top level: horizontal distances and levelbase MST if
    /// they were added, then the vertical distances. The
    /// equality-forbidden stack is rewound to the watermark of the
    /// matching [`ExtMst::level_init`].
    pub fn level_remove(&mut self) {
        let n_horizontal = self.sds_horizontal.nlevels();
        let n_vertical = self.sds_vertical.nlevels();

        assert!(n_horizontal == n_vertical || n_horizontal + 1 == n_vertical);
        trace!("remove level {}", n_vertical - 1);

        // the horizontal part may not have been added yet
        if n_horizontal == n_vertical {
            self.sds_horizontal.pop_level();
            self.msts_levelbase.pop();
        }

        debug_assert_eq!(self.msts_levelbase.len(), self.sds_horizontal.nlevels());

        self.sds_vertical.pop_level();

        let watermark = self.sdeq_marks.pop().expect("level stack underflow");
        self.sdeq.rewind_to(watermark);
    }

    /// Removes the component MST of the current depth, if one is on top.
    pub fn component_remove(&mut self, tree: &ExtTree) {
        if self.msts_comp.len() - 1 > tree.depth() {
            self.msts_comp.pop();
        }

        debug_assert_eq!(self.msts_comp.len() - 1, tree.depth());
    }
}

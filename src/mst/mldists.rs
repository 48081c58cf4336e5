use crate::cost::{Cost, FARAWAY};
use crate::graph::{Node, NO_NODE};

/// Multi-level store of pairwise distances. Each level of the stack
/// holds up to `max_nslots` slots; a slot binds a base vertex to a
/// fixed-width array of `(target id, distance)` pairs, ordered as the
/// targets were pushed. A level is filled through exactly one
/// in-progress slot at a time (base set, targets pushed, then committed
/// or discarded) and is sealed against further slots once closed.
///
/// The in-progress slot may temporarily hold one entry more than the
/// level width; committing requires the width to match exactly, so a
/// surplus entry has to be removed first (see
/// [`MultiLevelDists::slot_remove`]).
#[derive(Debug, Default)]
pub struct MultiLevelDists {
    levels: Vec<Level>,
}

#[derive(Debug)]
struct Level {
    max_nslots: usize,
    ntargets: usize,
    closed: bool,
    slots: Vec<Slot>,
    /// In-progress slot; only ever present on the top level.
    open: Option<Slot>,
}

#[derive(Debug)]
struct Slot {
    base: Node,
    ids: Vec<Node>,
    dists: Vec<Cost>,
}

impl Slot {
    fn with_capacity(ntargets: usize) -> Self {
        Self {
            base: NO_NODE,
            ids: Vec::with_capacity(ntargets + 1),
            dists: Vec::with_capacity(ntargets + 1),
        }
    }
}

impl MultiLevelDists {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn nlevels(&self) -> usize {
        self.levels.len()
    }

    /// Index of the top level; levels are numbered from 0.
    #[inline(always)]
    pub fn top_level(&self) -> usize {
        assert!(!self.levels.is_empty());
        self.levels.len() - 1
    }

    pub fn level_nslots(&self, level: usize) -> usize {
        self.levels[level].slots.len()
    }

    pub fn level_ntargets(&self, level: usize) -> usize {
        self.levels[level].ntargets
    }

    pub fn top_ntargets(&self) -> usize {
        self.level_ntargets(self.top_level())
    }

    /// Pushes an open level accepting up to `max_nslots` slots of
    /// `ntargets` targets each.
    pub fn push_level(&mut self, max_nslots: usize, ntargets: usize) {
        assert!(max_nslots >= 1);
        debug_assert!(self.levels.last().is_none_or(|l| l.closed));

        self.levels.push(Level {
            max_nslots,
            ntargets,
            closed: false,
            slots: Vec::with_capacity(max_nslots),
            open: None,
        });
    }

    /// Seals the top level; no further slots can be added.
    pub fn close_top_level(&mut self) {
        let top = self.top_mut();

        assert!(!top.closed);
        assert!(top.open.is_none(), "commit or discard the open slot first");

        top.closed = true;
    }

    pub fn pop_level(&mut self) {
        assert!(!self.levels.is_empty());
        self.levels.pop();
    }

    /// Opens the next slot of the top level and binds it to `base`.
    pub fn slot_set_base(&mut self, base: Node) {
        let top = self.top_mut();

        assert!(!top.closed);
        assert!(top.open.is_none());
        assert!(top.slots.len() < top.max_nslots, "level is full");
        debug_assert!(base != NO_NODE);
        debug_assert!(top.slots.iter().all(|s| s.base != base));

        let mut slot = Slot::with_capacity(top.ntargets);
        slot.base = base;
        top.open = Some(slot);
    }

    pub fn has_open_slot(&self) -> bool {
        self.levels.last().is_some_and(|l| l.open.is_some())
    }

    /// Appends one target entry to the open slot.
    pub fn slot_push(&mut self, id: Node, dist: Cost) {
        let ntargets = self.top().ntargets;
        let slot = self.open_mut();

        assert!(slot.ids.len() <= ntargets, "open slot overfull");
        debug_assert!(dist >= 0.0 && dist <= FARAWAY);

        slot.ids.push(id);
        slot.dists.push(dist);
    }

    /// Distances pushed to the open slot so far.
    pub fn slot_dists(&self) -> &[Cost] {
        &self.open_ref().dists
    }

    pub fn slot_ids(&self) -> &[Node] {
        &self.open_ref().ids
    }

    /// Removes the entry at `pos` from the open slot, shifting later
    /// entries left.
    pub fn slot_remove(&mut self, pos: usize) {
        let slot = self.open_mut();

        assert!(pos < slot.ids.len());

        slot.ids.remove(pos);
        slot.dists.remove(pos);
    }

    /// Seals the open slot. Its width must match the level.
    pub fn slot_commit(&mut self) {
        let ntargets = self.top().ntargets;
        let top = self.top_mut();
        let slot = top.open.take().expect("no open slot");

        assert_eq!(slot.ids.len(), ntargets);

        top.slots.push(slot);
    }

    /// Discards the open slot.
    pub fn slot_discard(&mut self) {
        let top = self.top_mut();
        assert!(top.open.is_some());
        top.open = None;
    }

    /// Distance from `base` to `target` at `level`. Self-pairs report
    /// `FARAWAY`.
    pub fn dist(&self, level: usize, base: Node, target: Node) -> Cost {
        if base == target {
            return FARAWAY;
        }

        let slot = self.slot_of(level, base);
        let pos = slot
            .ids
            .iter()
            .position(|&id| id == target)
            .expect("target not stored for this base");

        slot.dists[pos]
    }

    /// Full target-distance row of `base` at `level`, in push order.
    pub fn dists(&self, level: usize, base: Node) -> &[Cost] {
        &self.slot_of(level, base).dists
    }

    pub fn ids(&self, level: usize, base: Node) -> &[Node] {
        &self.slot_of(level, base).ids
    }

    pub fn top_dist(&self, base: Node, target: Node) -> Cost {
        self.dist(self.top_level(), base, target)
    }

    pub fn top_dists(&self, base: Node) -> &[Cost] {
        self.dists(self.top_level(), base)
    }

    fn slot_of(&self, level: usize, base: Node) -> &Slot {
        self.levels[level]
            .slots
            .iter()
            .find(|s| s.base == base)
            .expect("no slot bound to this base")
    }

    #[inline(always)]
    fn top(&self) -> &Level {
        self.levels.last().expect("no level")
    }

    #[inline(always)]
    fn top_mut(&mut self) -> &mut Level {
        self.levels.last_mut().expect("no level")
    }

    #[inline(always)]
    fn open_ref(&self) -> &Slot {
        self.top().open.as_ref().expect("no open slot")
    }

    #[inline(always)]
    fn open_mut(&mut self) -> &mut Slot {
        self.top_mut().open.as_mut().expect("no open slot")
    }
}

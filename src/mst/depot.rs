use super::CsrMst;

/// Stack of MSTs with an empty-top / marked-top lifecycle: a freshly
/// pushed tree stays "empty" (mutable through [`CsrDepot::empty_top_mut`])
/// until it is marked, after which only read access is handed out. At
/// most one empty top exists at any time and only the top tree of the
/// stack may ever be mutated.
#[derive(Debug, Default)]
pub struct CsrDepot {
    csrs: Vec<CsrMst>,
    has_empty_top: bool,
}

impl CsrDepot {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.csrs.is_empty()
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.csrs.len()
    }

    #[inline(always)]
    pub fn has_empty_top(&self) -> bool {
        self.has_empty_top
    }

    /// Pushes space for a tree on `nnodes` nodes as the new, still
    /// unmarked top.
    pub fn push_empty_tree(&mut self, nnodes: usize) {
        assert!(!self.has_empty_top);

        self.csrs.push(CsrMst::with_nodes(nnodes));
        self.has_empty_top = true;
    }

    pub fn empty_top_mut(&mut self) -> &mut CsrMst {
        assert!(self.has_empty_top);
        self.csrs.last_mut().unwrap()
    }

    /// Seals the empty top; it becomes the read-only stack top.
    pub fn mark_top(&mut self) {
        assert!(self.has_empty_top);
        self.has_empty_top = false;
    }

    /// Removes the top tree, marked or not.
    pub fn pop(&mut self) {
        assert!(!self.csrs.is_empty());

        self.csrs.pop();
        self.has_empty_top = false;
    }

    /// Read access to the (marked) top tree.
    pub fn top(&self) -> &CsrMst {
        assert!(!self.has_empty_top);
        self.csrs.last().unwrap()
    }

    /// The marked tree directly below the empty top together with the
    /// empty top itself, for building the latter from the former.
    pub fn top_and_empty_mut(&mut self) -> (&CsrMst, &mut CsrMst) {
        assert!(self.has_empty_top);
        assert!(self.csrs.len() >= 2);

        let len = self.csrs.len();
        let (below, top) = self.csrs.split_at_mut(len - 1);
        (below.last().unwrap(), &mut top[0])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn push_mark_pop_cycle() {
        let mut depot = CsrDepot::new();
        assert!(depot.is_empty());

        depot.push_empty_tree(1);
        assert!(depot.has_empty_top());
        depot.empty_top_mut().set_one_node();
        depot.mark_top();
        assert_eq!(depot.len(), 1);
        assert_eq!(depot.top().nnodes(), 1);

        depot.push_empty_tree(3);
        assert_eq!(depot.len(), 2);
        assert!(depot.has_empty_top());

        {
            let (below, top) = depot.top_and_empty_mut();
            assert_eq!(below.nnodes(), 1);
            assert_eq!(top.nnodes(), 3);
        }

        // discard the in-progress top again
        depot.pop();
        assert_eq!(depot.len(), 1);
        assert!(!depot.has_empty_top());
        assert_eq!(depot.top().nnodes(), 1);
    }

    #[test]
    #[should_panic]
    fn top_of_unmarked_panics() {
        let mut depot = CsrDepot::new();
        depot.push_empty_tree(2);
        let _ = depot.top();
    }

    #[test]
    #[should_panic]
    fn double_push_without_mark_panics() {
        let mut depot = CsrDepot::new();
        depot.push_empty_tree(2);
        depot.push_empty_tree(2);
    }
}

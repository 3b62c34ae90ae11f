use crate::block::Block;
use crate::chain::Chain;

/// Read-through overlay of a proof's update blocks atop a locally known
/// chain.
///
/// The view is an immutable pair `(base, updates)`; block reads consult the
/// update run first and fall back to the base chain below it. Blocks of the
/// base at or above the first update's number are shadowed: the updates
/// replace the tail, they do not interleave with it.
pub struct ChainView<'a> {
    base: &'a Chain,
    updates: &'a [Block],
    valid: bool,
}

impl<'a> ChainView<'a> {
    /// Build a view and validate the overlay. Validity is a pure function of
    /// `(base, updates)`, computed once here.
    pub fn new(base: &'a Chain, updates: &'a [Block]) -> Self {
        let valid = validate(base, updates);
        ChainView {
            base,
            updates,
            valid,
        }
    }

    /// Build a view without validating (the decode-time escape hatch).
    pub fn unchecked(base: &'a Chain, updates: &'a [Block]) -> Self {
        ChainView {
            base,
            updates,
            valid: true,
        }
    }

    pub(crate) fn with_validity(base: &'a Chain, updates: &'a [Block], valid: bool) -> Self {
        ChainView {
            base,
            updates,
            valid,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// One past the highest block number visible through this view.
    pub fn height(&self) -> u64 {
        match self.updates.last() {
            Some(last) => last.number + 1,
            None => self.base.height(),
        }
    }

    pub fn get_block(&self, number: u64) -> Option<&'a Block> {
        overlay_block(self.base, self.updates, number)
    }

    /// Highest committed block number visible in the base chain.
    pub fn last_committed(&self) -> Option<u64> {
        self.base.last_committed()
    }

    /// Blocks in number order from genesis. Only meaningful on a valid view;
    /// an invalid overlay may yield gaps.
    pub fn iter(&self) -> impl Iterator<Item = &'a Block> + '_ {
        (0..self.height()).filter_map(move |n| self.get_block(n))
    }
}

/// The narrower read-only overlay used while relinking decoded sources: no
/// validation, just updates-first block lookup.
pub struct LightView<'a> {
    base: &'a Chain,
    updates: &'a [Block],
}

impl<'a> LightView<'a> {
    pub fn new(base: &'a Chain, updates: &'a [Block]) -> Self {
        LightView { base, updates }
    }

    pub fn get_block(&self, number: u64) -> Option<&'a Block> {
        overlay_block(self.base, self.updates, number)
    }
}

fn overlay_block<'a>(base: &'a Chain, updates: &'a [Block], number: u64) -> Option<&'a Block> {
    if let (Some(first), Some(last)) = (updates.first(), updates.last()) {
        if number >= first.number {
            if number > last.number {
                return None;
            }
            return updates.get((number - first.number) as usize);
        }
    }
    base.block(number)
}

/// The overlay contract: updates are contiguous ascending blocks of the
/// base's owner, and the run starts either at genesis of a chain with no
/// committed prefix, or strictly above the committed mark while still
/// attaching to an existing block.
fn validate(base: &Chain, updates: &[Block]) -> bool {
    let Some(first) = updates.first() else {
        return true;
    };
    let first_number = first.number;

    for (i, block) in updates.iter().enumerate() {
        if block.number != first_number + i as u64 || block.owner != base.owner() {
            return false;
        }
    }

    if first_number == 0 {
        return base.last_committed().is_none();
    }
    let attaches = first_number <= base.height();
    let above_committed = base.last_committed().map_or(true, |c| first_number > c);
    attaches && above_committed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeId;

    fn block(owner: NodeId, number: u64) -> Block {
        Block::new(number, owner, Vec::new())
    }

    fn chain_of(owner: NodeId, height: u64, committed: Option<u64>) -> Chain {
        let mut chain = Chain::new(owner);
        for _ in 0..height {
            chain.seal_block(Vec::new());
        }
        if let Some(c) = committed {
            chain.mark_committed(c).unwrap();
        }
        chain
    }

    #[test]
    fn empty_updates_are_always_valid() {
        let chain = chain_of(1, 3, Some(1));
        let view = ChainView::new(&chain, &[]);
        assert!(view.is_valid());
        assert_eq!(view.height(), 3);
        assert_eq!(view.get_block(2).map(|b| b.number), Some(2));
    }

    #[test]
    fn full_replacement_requires_no_committed_prefix() {
        let uncommitted = chain_of(1, 2, None);
        let updates = [block(1, 0), block(1, 1)];
        assert!(ChainView::new(&uncommitted, &updates).is_valid());

        let committed = chain_of(1, 2, Some(0));
        assert!(!ChainView::new(&committed, &updates).is_valid());
    }

    #[test]
    fn updates_must_attach_above_the_committed_mark() {
        let chain = chain_of(1, 3, Some(1));

        // Revises only the uncommitted suffix: ok.
        assert!(ChainView::new(&chain, &[block(1, 2), block(1, 3)]).is_valid());
        // Appends right past the tip: ok.
        assert!(ChainView::new(&chain, &[block(1, 3)]).is_valid());
        // Starts at the committed mark: rejected.
        assert!(!ChainView::new(&chain, &[block(1, 1), block(1, 2)]).is_valid());
        // Leaves a gap past the tip: rejected.
        assert!(!ChainView::new(&chain, &[block(1, 5)]).is_valid());
    }

    #[test]
    fn updates_must_be_contiguous_ascending() {
        let chain = chain_of(1, 1, None);
        assert!(!ChainView::new(&chain, &[block(1, 1), block(1, 3)]).is_valid());
        assert!(!ChainView::new(&chain, &[block(1, 2), block(1, 1)]).is_valid());
        assert!(!ChainView::new(&chain, &[block(2, 1)]).is_valid());
    }

    #[test]
    fn reads_go_updates_first_then_base() {
        let mut chain = Chain::new(1);
        chain.seal_block(vec![crate::transaction::Transaction::genesis(1, 5)]);
        chain.seal_block(Vec::new());
        let updates = [block(1, 1), block(1, 2)];
        let view = ChainView::new(&chain, &updates);

        assert!(view.is_valid());
        // Block 0 comes from the base, 1 and 2 from the updates.
        assert_eq!(view.get_block(0).map(|b| b.transactions.len()), Some(1));
        assert!(view.get_block(1).map(|b| b.transactions.is_empty()).unwrap());
        assert_eq!(view.get_block(2).map(|b| b.number), Some(2));
        // Beyond the update run there is nothing, even in the base.
        assert_eq!(view.get_block(3), None);
        assert_eq!(view.iter().count(), 3);
    }

    #[test]
    fn light_view_reads_without_judging() {
        let chain = chain_of(1, 2, Some(1));
        // An overlay ChainView::new would reject.
        let updates = [block(1, 0)];
        let light = LightView::new(&chain, &updates);
        assert_eq!(light.get_block(0).map(|b| b.number), Some(0));
        assert_eq!(light.get_block(1), None);
    }
}

//! Property tests for the chain-view overlay.

use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

use skein_ledger::{Block, Chain, ChainView};

#[derive(Clone, Debug)]
struct Overlay {
    base_height: u64,
    committed: Option<u64>,
    first: u64,
    len: u64,
}

fn arb_overlay() -> impl Strategy<Value = Overlay> {
    (0u64..6, 0u64..8, 1u64..5).prop_flat_map(|(base_height, first, len)| {
        let committed = if base_height == 0 {
            Just(None).boxed()
        } else {
            prop::option::of(0..base_height).boxed()
        };
        committed.prop_map(move |committed| Overlay {
            base_height,
            committed,
            first,
            len,
        })
    })
}

fn build(overlay: &Overlay) -> (Chain, Vec<Block>) {
    let mut chain = Chain::new(1);
    for _ in 0..overlay.base_height {
        chain.seal_block(Vec::new());
    }
    if let Some(c) = overlay.committed {
        chain.mark_committed(c).expect("mark within height");
    }
    let updates = (0..overlay.len)
        .map(|i| Block::new(overlay.first + i, 1, Vec::new()))
        .collect();
    (chain, updates)
}

proptest! {
    #![proptest_config(ProptestConfig {
        failure_persistence: Some(Box::new(FileFailurePersistence::Direct(
            ".proptest-regressions-chain_view"
        ))),
        max_global_rejects: 65536,
        .. ProptestConfig::default()
    })]

    /// Validity is a pure function of (base, updates): rebuilding the view
    /// gives the same verdict every time.
    #[test]
    fn validity_is_deterministic(overlay in arb_overlay()) {
        let (chain, updates) = build(&overlay);
        let first = ChainView::new(&chain, &updates).is_valid();
        let second = ChainView::new(&chain, &updates).is_valid();
        prop_assert_eq!(first, second);
    }

    /// A valid view iterates a gapless run of blocks numbered from 0.
    #[test]
    fn valid_views_iterate_contiguously(overlay in arb_overlay()) {
        let (chain, updates) = build(&overlay);
        let view = ChainView::new(&chain, &updates);
        prop_assume!(view.is_valid());

        let numbers: Vec<u64> = view.iter().map(|b| b.number).collect();
        let expected: Vec<u64> = (0..view.height()).collect();
        prop_assert_eq!(numbers, expected);
    }

    /// An update run reaching at or below the committed mark is invalid.
    #[test]
    fn committed_prefix_is_untouchable(overlay in arb_overlay()) {
        let (chain, updates) = build(&overlay);
        prop_assume!(overlay.committed.is_some_and(|c| overlay.first <= c));
        prop_assert!(!ChainView::new(&chain, &updates).is_valid());
    }

    /// An update run that does not attach to the base is invalid.
    #[test]
    fn detached_updates_are_invalid(overlay in arb_overlay()) {
        let (chain, updates) = build(&overlay);
        prop_assume!(overlay.first > overlay.base_height);
        prop_assert!(!ChainView::new(&chain, &updates).is_valid());
    }
}

//! 数组与节点的属性测试

use jacq_remote::{
    MemoryStore, NodeEvent, RemoteNode, RemoteValue, StoreOp, TwoWay, Writable, WriterCollection,
};
use proptest::prelude::*;

proptest! {
    /// `update_array` 结束后长度等于目标，且增删次数恰好为差值
    #[test]
    fn update_array_uses_exact_operations(
        first in 0usize..12,
        second in 0usize..12,
        states in proptest::collection::vec(any::<bool>(), 0..12),
    ) {
        let (store, rx) = MemoryStore::new();
        let mut pedals = WriterCollection::new(store.clone(), "num-pedals", "pedal-states");
        pedals.attach();
        for event in rx.try_iter() {
            pedals.handle(&event);
        }

        let values: Vec<RemoteValue> = states.iter().map(|&s| s.into()).collect();
        for target in [first, second] {
            let previous = pedals.len();
            store.take_ops();
            let reported = pedals.update_array(target, &values);

            let ops = store.take_ops();
            let structural = ops
                .iter()
                .filter(|op| matches!(op, StoreOp::Push { .. } | StoreOp::Remove { .. }))
                .count();
            prop_assert_eq!(pedals.len(), target);
            prop_assert_eq!(reported, previous.abs_diff(target));
            prop_assert_eq!(structural, previous.abs_diff(target));
            prop_assert_eq!(store.get("num-pedals"), RemoteValue::from(target));
        }
    }

    /// 种子读取完成前的订阅值不会先于种子生效
    #[test]
    fn attach_never_applies_change_before_seed(
        updates in proptest::collection::vec(0u64..100, 0..6),
    ) {
        let (store, rx) = MemoryStore::new();
        store.set("num-v-pedals", 7u64);
        store.defer_reads();

        let mut node = TwoWay::new(store.clone(), "num-v-pedals");
        node.attach();
        for value in &updates {
            store.set("num-v-pedals", *value);
        }

        // 种子未到：任何事件都不产生变化
        let early: Vec<NodeEvent> = rx.try_iter().flat_map(|e| node.handle(&e)).collect();
        prop_assert!(early.is_empty());
        prop_assert_eq!(node.value(), &RemoteValue::Null);

        store.release_reads();
        let events: Vec<NodeEvent> = rx.try_iter().flat_map(|e| node.handle(&e)).collect();
        prop_assert!(!events.is_empty());
        let expected = updates.last().copied().unwrap_or(7);
        prop_assert_eq!(node.value().as_u64(), Some(expected));
    }
}

#[test]
fn detached_two_way_set_is_local_only() {
    let (store, _rx) = MemoryStore::new();
    let mut node = TwoWay::new(store.clone(), "v-pedal-states");
    node.attach();
    node.detach();
    node.detach();
    node.set_val(true.into()).unwrap();
    assert_eq!(store.subscription_count(), 0);
    assert_eq!(store.get("v-pedal-states"), RemoteValue::Null);
    assert_eq!(node.value(), &RemoteValue::Bool(true));
}

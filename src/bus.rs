//! Subscription bus: one aggregated change notification per evaluation pass.
//!
//! Subscribers learn that *something* changed, never which node — per-node
//! granularity stays out of the scheduler so consuming UI layers re-render
//! once per user action.

use std::rc::Rc;

/// Handle returned by [`Engine::subscribe`](crate::Engine::subscribe),
/// used to cancel the subscription later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub(crate) struct SubscriberBus {
    subscribers: Vec<(SubscriptionId, Rc<dyn Fn()>)>,
    next_id: u64,
}

impl SubscriberBus {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn subscribe(&mut self, callback: Rc<dyn Fn()>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, callback));
        id
    }

    /// Cancel a subscription. Returns `false` if the id is unknown.
    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
        self.subscribers.len() != before
    }

    /// Clone out the callbacks in subscription order.
    ///
    /// Callers invoke them with no bus borrow held, so a callback may freely
    /// subscribe, unsubscribe, or write back into the engine.
    pub(crate) fn callbacks(&self) -> Vec<Rc<dyn Fn()>> {
        self.subscribers.iter().map(|(_, cb)| cb.clone()).collect()
    }
}

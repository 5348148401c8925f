use std::{
    any::{Any, TypeId},
    collections::HashMap,
    rc::Rc,
};

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u32);

type ErasedHandler = Rc<dyn Fn(&dyn Any)>;

/// Typed broadcast subscribe/unsubscribe bus. Owned by the context rather
/// than any process-wide registry, so multiple sessions can coexist in one
/// process and tear down deterministically.
pub struct EventBus {
    subscribers: HashMap<TypeId, Vec<(SubscriptionId, ErasedHandler)>>,
    ids: HashMap<SubscriptionId, TypeId>,
    next_id: u32,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: HashMap::new(),
            ids: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn subscribe<E: 'static>(&mut self, handler: impl Fn(&E) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;

        let erased: ErasedHandler = Rc::new(move |event: &dyn Any| {
            if let Some(event) = event.downcast_ref::<E>() {
                handler(event);
            }
        });

        self.subscribers
            .entry(TypeId::of::<E>())
            .or_default()
            .push((id, erased));
        self.ids.insert(id, TypeId::of::<E>());

        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        let Some(type_id) = self.ids.remove(&id) else {
            return;
        };
        if let Some(handlers) = self.subscribers.get_mut(&type_id) {
            handlers.retain(|(handler_id, _)| *handler_id != id);
            if handlers.is_empty() {
                self.subscribers.remove(&type_id);
            }
        }
    }

    pub fn publish<E: 'static>(&self, event: &E) {
        let Some(handlers) = self.subscribers.get(&TypeId::of::<E>()) else {
            return;
        };
        // handlers may unsubscribe others from inside a callback in a
        // future tick, never during this publish; a clone keeps the
        // iteration stable regardless
        let handlers: Vec<ErasedHandler> =
            handlers.iter().map(|(_, handler)| Rc::clone(handler)).collect();
        for handler in handlers {
            handler(event);
        }
    }

    pub fn subscriber_count<E: 'static>(&self) -> usize {
        self.subscribers
            .get(&TypeId::of::<E>())
            .map(|handlers| handlers.len())
            .unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::config::NavConfig;
use crate::marker::MarkerValue;

pub type PopHandler = Rc<dyn Fn(Option<&MarkerValue>)>;

pub trait HistoryBridge {
    fn push_marker(&self, marker: &MarkerValue);
    fn subscribe(&self, handler: PopHandler) -> PopSubscription;
    fn go_back(&self);
    fn current_marker(&self) -> Option<MarkerValue>;
}

pub struct PopSubscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl PopSubscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for PopSubscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

#[derive(Default)]
pub struct SubscriberSet {
    next_id: Cell<u64>,
    entries: RefCell<Vec<(u64, PopHandler)>>,
}

impl SubscriberSet {
    pub fn add(set: &Rc<Self>, handler: PopHandler) -> PopSubscription {
        let id = set.next_id.get();
        set.next_id.set(id.wrapping_add(1));
        set.entries.borrow_mut().push((id, handler));
        trace!(id, "added pop subscriber");

        let set = Rc::downgrade(set);
        PopSubscription::new(move || {
            if let Some(set) = set.upgrade() {
                set.entries.borrow_mut().retain(|(entry, _)| *entry != id);
                trace!(id, "removed pop subscriber");
            }
        })
    }

    pub fn dispatch(&self, top: Option<&MarkerValue>) {
        let snapshot: Vec<PopHandler> = self
            .entries
            .borrow()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        trace!(subscribers = snapshot.len(), "dispatching pop event");
        for handler in snapshot {
            handler(top);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

pub struct MemoryHistory {
    state_key: String,
    entries: RefCell<Vec<Value>>,
    cursor: Cell<usize>,
    subscribers: Rc<SubscriberSet>,
}

impl MemoryHistory {
    pub fn new(config: &NavConfig) -> Rc<Self> {
        Rc::new(Self {
            state_key: config.state_key.clone(),
            entries: RefCell::new(vec![Value::Null]),
            cursor: Cell::new(0),
            subscribers: Rc::new(SubscriberSet::default()),
        })
    }

    pub fn depth(&self) -> usize {
        self.cursor.get()
    }

    pub fn active_marker_count(&self) -> usize {
        let entries = self.entries.borrow();
        entries[..=self.cursor.get()]
            .iter()
            .filter(|state| MarkerValue::decode_state(&self.state_key, state).is_some())
            .count()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn top_marker(&self) -> Option<MarkerValue> {
        let entries = self.entries.borrow();
        MarkerValue::decode_state(&self.state_key, &entries[self.cursor.get()])
    }
}

impl HistoryBridge for MemoryHistory {
    fn push_marker(&self, marker: &MarkerValue) {
        let mut entries = self.entries.borrow_mut();
        entries.truncate(self.cursor.get() + 1);
        entries.push(marker.encode_state(&self.state_key));
        self.cursor.set(entries.len() - 1);
        debug!(
            marker = %marker,
            depth = entries.len() - 1,
            "pushed in-memory history entry"
        );
    }

    fn subscribe(&self, handler: PopHandler) -> PopSubscription {
        SubscriberSet::add(&self.subscribers, handler)
    }

    fn go_back(&self) {
        let cursor = self.cursor.get();
        if cursor == 0 {
            warn!("back requested at history base; ignoring");
            return;
        }

        self.cursor.set(cursor - 1);
        let top = self.top_marker();
        debug!(
            depth = cursor - 1,
            top = ?top.as_ref().map(ToString::to_string),
            "went back one history entry"
        );
        self.subscribers.dispatch(top.as_ref());
    }

    fn current_marker(&self) -> Option<MarkerValue> {
        self.top_marker()
    }
}

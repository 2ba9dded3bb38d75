use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use crate::bridge::{HistoryBridge, PopHandler, PopSubscription};
use crate::marker::MarkerValue;

pub type CloseHandler = Rc<dyn Fn()>;

pub struct OverlayLayer {
    inner: Rc<RefCell<LayerInner>>,
}

struct LayerInner {
    bridge: Rc<dyn HistoryBridge>,
    on_close: Option<CloseHandler>,
    marker: Option<MarkerValue>,
    subscription: Option<PopSubscription>,
}

impl OverlayLayer {
    pub fn new(bridge: Rc<dyn HistoryBridge>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(LayerInner {
                bridge,
                on_close: None,
                marker: None,
                subscription: None,
            })),
        }
    }

    pub fn with_close(bridge: Rc<dyn HistoryBridge>, on_close: CloseHandler) -> Self {
        let layer = Self::new(bridge);
        layer.set_on_close(on_close);
        layer
    }

    pub fn set_on_close(&self, handler: CloseHandler) {
        self.inner.borrow_mut().on_close = Some(handler);
    }

    pub fn is_registered(&self) -> bool {
        self.inner.borrow().marker.is_some()
    }

    pub fn marker(&self) -> Option<MarkerValue> {
        self.inner.borrow().marker.clone()
    }

    pub fn sync(&self, is_open: bool) {
        if is_open {
            self.register();
        } else {
            self.teardown();
        }
    }

    fn register(&self) {
        if self.inner.borrow().marker.is_some() {
            trace!("layer already registered; ignoring duplicate open");
            return;
        }

        let bridge = self.inner.borrow().bridge.clone();
        let marker = MarkerValue::next();
        bridge.push_marker(&marker);
        let subscription = bridge.subscribe(pop_handler(Rc::downgrade(&self.inner)));

        let mut inner = self.inner.borrow_mut();
        inner.marker = Some(marker.clone());
        inner.subscription = Some(subscription);
        debug!(marker = %marker, "registered overlay layer");
    }

    fn teardown(&self) {
        let (bridge, marker, subscription) = {
            let mut inner = self.inner.borrow_mut();
            let Some(marker) = inner.marker.take() else {
                return;
            };
            (inner.bridge.clone(), marker, inner.subscription.take())
        };

        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }

        if bridge.current_marker().as_ref() == Some(&marker) {
            debug!(marker = %marker, "unwinding history entry for explicit close");
            bridge.go_back();
        } else {
            trace!(
                marker = %marker,
                "marker no longer current; skipping compensating back"
            );
        }
    }
}

impl Drop for OverlayLayer {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn pop_handler(inner: Weak<RefCell<LayerInner>>) -> PopHandler {
    Rc::new(move |top: Option<&MarkerValue>| {
        let Some(cell) = inner.upgrade() else {
            return;
        };

        let close = {
            let mut state = cell.borrow_mut();
            let Some(marker) = state.marker.clone() else {
                return;
            };

            if marker.keeps_open(top) {
                trace!(marker = %marker, "pop left this layer in place");
                return;
            }

            state.marker = None;
            state.subscription = None;
            debug!(
                marker = %marker,
                top = ?top.map(ToString::to_string),
                "popped past this layer; closing"
            );
            state.on_close.clone()
        };

        match close {
            Some(close) => close(),
            None => warn!("layer popped with no close handler installed"),
        }
    })
}

use std::rc::Rc;

use gloo::events::EventListener;
use serde_json::Value;
use setu_core::bridge::{HistoryBridge, PopHandler, PopSubscription, SubscriberSet};
use setu_core::config::NavConfig;
use setu_core::marker::MarkerValue;
use tracing::{debug, trace, warn};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::PopStateEvent;

pub struct BrowserHistory {
    state_key: String,
    history: Option<web_sys::History>,
    subscribers: Rc<SubscriberSet>,
    _popstate: Option<EventListener>,
}

impl BrowserHistory {
    pub fn new(config: &NavConfig) -> Rc<Self> {
        let history = web_sys::window().and_then(|window| window.history().ok());
        if history.is_none() {
            warn!("host history unavailable; back-button interception disabled");
        }

        let subscribers = Rc::new(SubscriberSet::default());
        let popstate = history.as_ref().and(web_sys::window()).map(|window| {
            let subscribers = subscribers.clone();
            let state_key = config.state_key.clone();
            EventListener::new(&window, "popstate", move |event| {
                let top = event
                    .dyn_ref::<PopStateEvent>()
                    .map(PopStateEvent::state)
                    .and_then(|state| decode_js_state(&state_key, state));
                trace!(
                    top = ?top.as_ref().map(ToString::to_string),
                    "popstate received"
                );
                subscribers.dispatch(top.as_ref());
            })
        });

        Rc::new(Self {
            state_key: config.state_key.clone(),
            history,
            subscribers,
            _popstate: popstate,
        })
    }
}

impl HistoryBridge for BrowserHistory {
    fn push_marker(&self, marker: &MarkerValue) {
        let Some(history) = &self.history else {
            return;
        };

        let state = marker.encode_state(&self.state_key);
        let encoded = match serde_wasm_bindgen::to_value(&state) {
            Ok(value) => value,
            Err(error) => {
                warn!(%error, "failed encoding history state; skipping marker");
                return;
            }
        };

        match history.push_state_with_url(&encoded, "", None) {
            Ok(()) => debug!(marker = %marker, "pushed browser history marker"),
            Err(error) => {
                debug!(error = ?error, "push_state rejected by host; continuing unmarked");
            }
        }
    }

    fn subscribe(&self, handler: PopHandler) -> PopSubscription {
        SubscriberSet::add(&self.subscribers, handler)
    }

    fn go_back(&self) {
        let Some(history) = &self.history else {
            return;
        };
        if let Err(error) = history.back() {
            debug!(error = ?error, "history.back rejected by host");
        }
    }

    fn current_marker(&self) -> Option<MarkerValue> {
        let history = self.history.as_ref()?;
        let state = history.state().ok()?;
        decode_js_state(&self.state_key, state)
    }
}

fn decode_js_state(state_key: &str, state: JsValue) -> Option<MarkerValue> {
    if state.is_null() || state.is_undefined() {
        return None;
    }
    let value: Value = serde_wasm_bindgen::from_value(state).ok()?;
    MarkerValue::decode_state(state_key, &value)
}

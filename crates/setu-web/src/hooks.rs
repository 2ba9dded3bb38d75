use std::rc::Rc;

use setu_core::config::NavConfig;
use setu_core::layer::OverlayLayer;
use setu_core::stack::ScreenNav;
use tracing::debug;
use yew::{Callback, Reducible, UseReducerHandle, hook, use_effect_with, use_mut_ref, use_reducer};

use crate::history::BrowserHistory;

thread_local! {
    static SHARED_HISTORY: Rc<BrowserHistory> = BrowserHistory::new(&NavConfig::default());
}

pub fn shared_history() -> Rc<BrowserHistory> {
    SHARED_HISTORY.with(Rc::clone)
}

#[hook]
pub fn use_overlay_history(is_open: bool, on_close: Callback<()>) {
    let layer = use_mut_ref(|| OverlayLayer::new(shared_history()));

    layer
        .borrow()
        .set_on_close(Rc::new(move || on_close.emit(())));

    use_effect_with(is_open, {
        let layer = layer.clone();
        move |open| {
            layer.borrow().sync(*open);
            || ()
        }
    });
}

pub enum NavAction {
    Push(String),
    Pop,
    Switch(String),
    Reset,
}

pub struct NavState {
    nav: ScreenNav,
}

impl Reducible for NavState {
    type Action = NavAction;

    fn reduce(self: Rc<Self>, action: NavAction) -> Rc<Self> {
        let mut nav = self.nav.clone();
        match action {
            NavAction::Push(token) => nav.push(token),
            NavAction::Pop => {
                nav.pop();
            }
            NavAction::Switch(context) => nav.switch_context(context, |token| {
                debug!(token, "context switch retired sub-view token");
            }),
            NavAction::Reset => nav.reset_with(|token| {
                debug!(token, "reset retired sub-view token");
            }),
        }
        Rc::new(Self { nav })
    }
}

#[derive(Clone)]
pub struct NavStackHandle {
    state: UseReducerHandle<NavState>,
}

impl NavStackHandle {
    pub fn push(&self, token: impl Into<String>) {
        self.state.dispatch(NavAction::Push(token.into()));
    }

    pub fn pop(&self) {
        self.state.dispatch(NavAction::Pop);
    }

    pub fn close_callback(&self) -> Callback<()> {
        let state = self.state.clone();
        Callback::from(move |()| state.dispatch(NavAction::Pop))
    }

    pub fn switch_context(&self, context: impl Into<String>) {
        self.state.dispatch(NavAction::Switch(context.into()));
    }

    pub fn reset(&self) {
        self.state.dispatch(NavAction::Reset);
    }

    pub fn context(&self) -> String {
        self.state.nav.active_context().to_string()
    }

    pub fn top(&self) -> Option<String> {
        self.state.nav.top().map(ToString::to_string)
    }

    pub fn tokens(&self) -> Vec<String> {
        self.state.nav.stack().tokens().to_vec()
    }

    pub fn is_open(&self, token: &str) -> bool {
        self.state.nav.stack().contains(token)
    }

    pub fn depth(&self) -> usize {
        self.state.nav.depth()
    }
}

#[hook]
pub fn use_nav_stack(context: String) -> NavStackHandle {
    let state = use_reducer(move || NavState {
        nav: ScreenNav::new(context, &NavConfig::default()),
    });
    NavStackHandle { state }
}

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use setu_core::bridge::{HistoryBridge, MemoryHistory};
use setu_core::config::NavConfig;
use setu_core::layer::OverlayLayer;
use setu_core::stack::ScreenNav;

struct Screen {
    history: Rc<MemoryHistory>,
    nav: Rc<RefCell<ScreenNav>>,
    layers: Rc<RefCell<BTreeMap<String, OverlayLayer>>>,
    closed: Rc<RefCell<Vec<String>>>,
}

impl Screen {
    fn new(context: &str) -> Self {
        let config = NavConfig::default();
        Self {
            history: MemoryHistory::new(&config),
            nav: Rc::new(RefCell::new(ScreenNav::new(context, &config))),
            layers: Rc::new(RefCell::new(BTreeMap::new())),
            closed: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn open(&self, token: &str) {
        self.nav.borrow_mut().push(token);

        let nav = self.nav.clone();
        let layers = self.layers.clone();
        let closed = self.closed.clone();
        let own = token.to_string();
        let layer = OverlayLayer::with_close(
            self.history.clone(),
            Rc::new(move || {
                nav.borrow_mut().pop();
                closed.borrow_mut().push(own.clone());
                layers.borrow_mut().remove(&own);
            }),
        );
        layer.sync(true);
        self.layers.borrow_mut().insert(token.to_string(), layer);
    }

    fn close_top(&self) {
        let Some(token) = self.nav.borrow_mut().pop() else {
            return;
        };
        if let Some(layer) = self.layers.borrow_mut().remove(&token) {
            layer.sync(false);
        }
        self.closed.borrow_mut().push(token);
    }

    fn back(&self) {
        self.history.go_back();
    }

    fn switch_context(&self, context: &str) {
        let layers = self.layers.clone();
        let closed = self.closed.clone();
        self.nav.borrow_mut().switch_context(context, |token| {
            if let Some(layer) = layers.borrow_mut().remove(token) {
                layer.sync(false);
            }
            closed.borrow_mut().push(token.to_string());
        });
    }

    fn open_overlays(&self) -> usize {
        self.layers.borrow().len()
    }

    fn tokens(&self) -> Vec<String> {
        self.nav.borrow().stack().tokens().to_vec()
    }

    fn closed_log(&self) -> Vec<String> {
        self.closed.borrow().clone()
    }

    fn assert_parity(&self) {
        assert_eq!(
            self.history.active_marker_count(),
            self.open_overlays(),
            "pending markers must match open overlays"
        );
    }
}

#[test]
fn single_modal_back_closes_once() {
    let screen = Screen::new("principal");

    screen.open("add_student");
    screen.assert_parity();

    screen.back();
    assert_eq!(screen.closed_log(), vec!["add_student"]);
    assert_eq!(screen.tokens(), Vec::<String>::new());
    screen.assert_parity();

    screen.back();
    assert_eq!(screen.closed_log(), vec!["add_student"]);
}

#[test]
fn nested_stack_closes_in_lifo_order() {
    let screen = Screen::new("principal");

    screen.open("list");
    screen.open("detail");
    assert_eq!(screen.tokens(), vec!["list", "detail"]);
    screen.assert_parity();

    screen.back();
    assert_eq!(screen.tokens(), vec!["list"]);
    assert_eq!(screen.closed_log(), vec!["detail"]);
    screen.assert_parity();

    screen.back();
    assert_eq!(screen.tokens(), Vec::<String>::new());
    assert_eq!(screen.closed_log(), vec!["detail", "list"]);
    screen.assert_parity();
}

#[test]
fn lifo_holds_at_depth_three() {
    let screen = Screen::new("teacher");

    screen.open("attendance");
    screen.open("edit_period");
    screen.open("student_picker");
    screen.assert_parity();

    screen.back();
    assert_eq!(screen.tokens(), vec!["attendance", "edit_period"]);
    assert_eq!(screen.closed_log(), vec!["student_picker"]);
    screen.assert_parity();

    screen.back();
    screen.back();
    assert_eq!(
        screen.closed_log(),
        vec!["student_picker", "edit_period", "attendance"]
    );
    assert_eq!(screen.history.depth(), 0);
}

#[test]
fn explicit_close_then_back_targets_the_right_overlay() {
    let screen = Screen::new("parent");

    screen.open("notices");
    screen.open("leave_request");
    screen.assert_parity();

    screen.close_top();
    assert_eq!(screen.closed_log(), vec!["leave_request"]);
    assert_eq!(screen.tokens(), vec!["notices"]);
    screen.assert_parity();

    screen.back();
    assert_eq!(screen.closed_log(), vec!["leave_request", "notices"]);
    assert_eq!(screen.open_overlays(), 0);
    screen.assert_parity();
}

#[test]
fn explicit_close_restores_history_depth() {
    let screen = Screen::new("parent");
    assert_eq!(screen.history.depth(), 0);

    screen.open("gallery");
    assert_eq!(screen.history.depth(), 1);

    screen.close_top();
    assert_eq!(screen.history.depth(), 0);
    screen.assert_parity();
}

#[test]
fn reset_unwinds_every_marker() {
    let screen = Screen::new("principal");

    screen.open("x");
    screen.open("y");
    screen.open("z");
    screen.assert_parity();

    screen.switch_context("teacher");
    assert_eq!(screen.closed_log(), vec!["z", "y", "x"]);
    assert_eq!(screen.open_overlays(), 0);
    assert_eq!(screen.history.active_marker_count(), 0);
    assert_eq!(screen.history.depth(), 0);
}

#[test]
fn context_switch_keeps_the_new_context_usable() {
    let screen = Screen::new("principal");

    screen.open("attendance");
    screen.switch_context("teacher");
    screen.assert_parity();

    screen.open("homework");
    assert_eq!(screen.tokens(), vec!["homework"]);
    screen.assert_parity();

    screen.back();
    assert_eq!(screen.closed_log(), vec!["attendance", "homework"]);
    screen.assert_parity();
}

#[test]
fn marker_parity_across_mixed_operations() {
    let screen = Screen::new("principal");

    screen.open("attendance");
    screen.assert_parity();
    screen.open("edit_period");
    screen.assert_parity();
    screen.close_top();
    screen.assert_parity();
    screen.open("homework");
    screen.assert_parity();
    screen.back();
    screen.assert_parity();
    screen.back();
    screen.assert_parity();

    assert_eq!(screen.open_overlays(), 0);
    assert_eq!(screen.history.depth(), 0);
}

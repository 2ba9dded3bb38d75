use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::config::NavConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationStack {
    tokens: Vec<String>,
}

impl NavigationStack {
    pub fn push(&mut self, token: impl Into<String>) {
        self.tokens.push(token.into());
    }

    pub fn pop(&mut self) -> Option<String> {
        self.tokens.pop()
    }

    pub fn top(&self) -> Option<&str> {
        self.tokens.last().map(String::as_str)
    }

    pub fn depth(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|entry| entry == token)
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

#[derive(Debug, Clone)]
pub struct ScreenNav {
    stacks: BTreeMap<String, NavigationStack>,
    active: String,
    warn_depth: usize,
}

impl ScreenNav {
    pub fn new(initial_context: impl Into<String>, config: &NavConfig) -> Self {
        let active = initial_context.into();
        let mut stacks = BTreeMap::new();
        stacks.insert(active.clone(), NavigationStack::default());
        Self {
            stacks,
            active,
            warn_depth: config.warn_depth,
        }
    }

    pub fn active_context(&self) -> &str {
        &self.active
    }

    pub fn stack(&self) -> &NavigationStack {
        static EMPTY: NavigationStack = NavigationStack { tokens: Vec::new() };
        self.stacks.get(&self.active).unwrap_or(&EMPTY)
    }

    fn stack_mut(&mut self) -> &mut NavigationStack {
        self.stacks.entry(self.active.clone()).or_default()
    }

    pub fn push(&mut self, token: impl Into<String>) {
        let token = token.into();
        let stack = self.stack_mut();
        stack.push(token.clone());
        let depth = stack.depth();
        debug!(context = %self.active, token = %token, depth, "pushed sub-view token");
        if depth > self.warn_depth {
            warn!(context = %self.active, depth, "navigation stack unusually deep");
        }
    }

    pub fn pop(&mut self) -> Option<String> {
        let popped = self.stack_mut().pop();
        match &popped {
            Some(token) => {
                debug!(context = %self.active, token = %token, "popped sub-view token");
            }
            None => debug!(context = %self.active, "pop on empty stack ignored"),
        }
        popped
    }

    pub fn top(&self) -> Option<&str> {
        self.stack().top()
    }

    pub fn depth(&self) -> usize {
        self.stack().depth()
    }

    pub fn reset_with(&mut self, mut close: impl FnMut(&str)) {
        let depth = self.depth();
        if depth > 0 {
            info!(context = %self.active, depth, "resetting navigation stack");
        }
        while let Some(token) = self.stack_mut().pop() {
            close(&token);
        }
    }

    pub fn switch_context(&mut self, context: impl Into<String>, close: impl FnMut(&str)) {
        let context = context.into();
        if context == self.active {
            return;
        }

        self.reset_with(close);
        info!(from = %self.active, to = %context, "switching navigation context");
        self.active = context;
        self.stacks.entry(self.active.clone()).or_default();
    }
}

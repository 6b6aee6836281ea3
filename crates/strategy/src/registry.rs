//! Explicit strategy registry.
//!
//! Strategies are registered by name at startup; the router instantiates
//! them from here in registration order, which also fixes their id order.

use crate::contract::Strategy;

type Factory = Box<dyn Fn() -> Box<dyn Strategy> + Send + Sync>;

#[derive(Default)]
pub struct StrategyRegistry {
    factories: Vec<(String, Factory)>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a strategy constructor. Re-registering a name replaces the
    /// previous factory in place, keeping its position.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Strategy> + Send + Sync + 'static,
    {
        let name = name.into();
        if let Some(slot) = self.factories.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = Box::new(factory);
        } else {
            self.factories.push((name, Box::new(factory)));
        }
    }

    pub fn build(&self, name: &str) -> Option<Box<dyn Strategy>> {
        self.factories
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f())
    }

    /// Instantiate every registered strategy, in registration order.
    pub fn build_all(&self) -> Vec<Box<dyn Strategy>> {
        self.factories.iter().map(|(_, f)| f()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

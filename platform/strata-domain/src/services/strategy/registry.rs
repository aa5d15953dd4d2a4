use super::liquidity_sweep::LiquiditySweepFactory;
use super::StrategyFactory;
use crate::errors::InputError;
use std::collections::BTreeMap;

/// Explicit table of known strategies, keyed by identifier.
#[derive(Default)]
pub struct StrategyRegistry {
    factories: BTreeMap<&'static str, Box<dyn StrategyFactory>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(LiquiditySweepFactory));
        registry
    }

    /// Replaces any factory already registered under the same name.
    pub fn register(&mut self, factory: Box<dyn StrategyFactory>) {
        self.factories.insert(factory.name(), factory);
    }

    pub fn get(&self, name: &str) -> Result<&dyn StrategyFactory, InputError> {
        self.factories
            .get(name)
            .map(|factory| &**factory)
            .ok_or_else(|| InputError::UnknownStrategy {
                name: name.to_string(),
                registered: self.names().collect::<Vec<_>>().join(", "),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_include_liquidity_sweep() {
        let registry = StrategyRegistry::with_builtins();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["liquidity_sweep"]);
        assert!(registry.get("liquidity_sweep").is_ok());
        match registry.get("mean_reversion") {
            Err(InputError::UnknownStrategy { name, registered }) => {
                assert_eq!(name, "mean_reversion");
                assert_eq!(registered, "liquidity_sweep");
            }
            _ => panic!("expected unknown strategy"),
        }
    }
}

//! Reserved and implicit identifier configuration.
//!
//! Built once at startup and read-only thereafter. Services receive it
//! by `Arc` instead of consulting global mutable state.

use std::collections::HashSet;

use crate::constants::FX_RATE_IDENTIFIER;

/// Identifier namespace configuration for the engine.
///
/// Reserved identifiers are claimed by system formulas; user formulas
/// and definitions may not use them. Implicit identifiers are resolved
/// at evaluation time (FX lookups) and never correspond to a schema
/// column.
#[derive(Debug, Clone)]
pub struct SystemIdentifierRegistry {
    reserved: HashSet<String>,
    implicit: HashSet<String>,
}

impl SystemIdentifierRegistry {
    pub fn builder() -> SystemIdentifierRegistryBuilder {
        SystemIdentifierRegistryBuilder {
            reserved: HashSet::new(),
            implicit: [FX_RATE_IDENTIFIER.to_string()].into_iter().collect(),
        }
    }

    pub fn is_reserved(&self, identifier: &str) -> bool {
        self.reserved.contains(identifier)
    }

    pub fn is_implicit(&self, identifier: &str) -> bool {
        self.implicit.contains(identifier)
    }
}

impl Default for SystemIdentifierRegistry {
    fn default() -> Self {
        Self::builder().build()
    }
}

pub struct SystemIdentifierRegistryBuilder {
    reserved: HashSet<String>,
    implicit: HashSet<String>,
}

impl SystemIdentifierRegistryBuilder {
    /// Marks an identifier as claimed by a system formula.
    pub fn reserve(mut self, identifier: impl Into<String>) -> Self {
        self.reserved.insert(identifier.into());
        self
    }

    /// Registers an identifier resolved at evaluation time rather than
    /// from a schema column.
    pub fn implicit(mut self, identifier: impl Into<String>) -> Self {
        self.implicit.insert(identifier.into());
        self
    }

    pub fn build(self) -> SystemIdentifierRegistry {
        SystemIdentifierRegistry {
            reserved: self.reserved,
            implicit: self.implicit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fx_rate_is_implicit_by_default() {
        let registry = SystemIdentifierRegistry::default();
        assert!(registry.is_implicit("fx_rate"));
        assert!(!registry.is_reserved("fx_rate"));
    }

    #[test]
    fn builder_reserves_identifiers() {
        let registry = SystemIdentifierRegistry::builder()
            .reserve("current_value")
            .implicit("spot_rate")
            .build();
        assert!(registry.is_reserved("current_value"));
        assert!(registry.is_implicit("spot_rate"));
        assert!(!registry.is_reserved("quantity"));
    }
}

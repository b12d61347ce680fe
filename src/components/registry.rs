//! Lookup table from component type to stamper.

use std::collections::HashMap;

use crate::error::{Result, TransimError};

use super::{
    CapacitorStamper, ComponentType, CurrentSourceStamper, DiodeStamper, IgbtStamper,
    InductorStamper, MosfetStamper, ResistorStamper, Stamper, SwitchStamper, ThyristorStamper,
    VoltageSourceStamper,
};

/// Maps each [`ComponentType`] to the stamper that handles it.
///
/// One registry belongs to one simulation run. Registering a type that is
/// already present replaces its stamper.
#[derive(Debug, Default)]
pub struct StamperRegistry {
    stampers: HashMap<ComponentType, Box<dyn Stamper>>,
}

impl StamperRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with a stamper for every built-in kind.
    pub fn create_default() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ResistorStamper));
        registry.register(Box::new(CapacitorStamper));
        registry.register(Box::new(InductorStamper));
        registry.register(Box::new(VoltageSourceStamper));
        registry.register(Box::new(CurrentSourceStamper));
        registry.register(Box::new(SwitchStamper));
        registry.register(Box::new(DiodeStamper));
        registry.register(Box::new(ThyristorStamper));
        registry.register(Box::new(IgbtStamper));
        registry.register(Box::new(MosfetStamper));
        registry
    }

    /// Register `stamper` under its own component type, returning the one
    /// it replaced.
    pub fn register(&mut self, stamper: Box<dyn Stamper>) -> Option<Box<dyn Stamper>> {
        self.stampers.insert(stamper.component_type(), stamper)
    }

    pub fn unregister(&mut self, kind: ComponentType) -> Option<Box<dyn Stamper>> {
        self.stampers.remove(&kind)
    }

    /// The stamper for `kind`, or `UnknownComponentType`.
    pub fn get_stamper(&self, kind: ComponentType) -> Result<&dyn Stamper> {
        self.stampers
            .get(&kind)
            .map(|s| s.as_ref())
            .ok_or_else(|| TransimError::UnknownComponentType {
                component_type: kind.tag().to_string(),
                element: String::new(),
            })
    }

    pub fn has_stamper(&self, kind: ComponentType) -> bool {
        self.stampers.contains_key(&kind)
    }

    /// Registered types in a stable order.
    pub fn registered_types(&self) -> Vec<ComponentType> {
        let mut kinds: Vec<_> = self.stampers.keys().copied().collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.stampers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stampers.is_empty()
    }

    pub fn clear(&mut self) {
        self.stampers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_covers_all_kinds() {
        let registry = StamperRegistry::create_default();
        assert_eq!(registry.len(), ComponentType::ALL.len());
        for kind in ComponentType::ALL {
            assert!(registry.has_stamper(kind));
            assert_eq!(registry.get_stamper(kind).unwrap().component_type(), kind);
        }
        assert_eq!(registry.registered_types(), ComponentType::ALL.to_vec());
    }

    #[test]
    fn test_missing_stamper_is_unknown_type() {
        let mut registry = StamperRegistry::create_default();
        assert!(registry.unregister(ComponentType::Diode).is_some());
        assert!(matches!(
            registry.get_stamper(ComponentType::Diode),
            Err(TransimError::UnknownComponentType { .. })
        ));
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = StamperRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.register(Box::new(ResistorStamper)).is_none());
        assert!(registry.register(Box::new(ResistorStamper)).is_some());
        assert_eq!(registry.len(), 1);
        registry.clear();
        assert!(registry.is_empty());
    }
}

//! The member model of one synthesis request.
//!
//! Contributors add members in precedence order. A member whose identity
//! (name, parameter modes and types, generic arity) is already taken is
//! switched to its qualified name and inserted again; a second collision,
//! or a collision of a member that cannot be qualified, fails the request.
//! Entries already inserted are never renamed.

mod member;

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::GenerationError;
use crate::types::{ParamMode, TypeRef};

pub use member::MemberName;
pub(crate) use member::{Declaring, MetaEvent, MetaMethod, MetaProperty};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MemberKey {
    name: String,
    params: Vec<(ParamMode, TypeRef)>,
    generic_arity: usize,
}

impl MemberKey {
    fn of(method: &MetaMethod) -> Self {
        Self {
            name: method.name.to_string(),
            params: method.sig.parameter_key(),
            generic_arity: method.sig.generic_arity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PropertyKey {
    name: String,
    ty: TypeRef,
}

/// Collected members of one proxy type, in insertion order.
#[derive(Debug)]
pub(crate) struct MetaType {
    proxy: Arc<str>,
    methods: IndexMap<MemberKey, MetaMethod>,
    properties: IndexMap<PropertyKey, MetaProperty>,
    events: IndexMap<PropertyKey, MetaEvent>,
}

impl MetaType {
    pub(crate) fn new(proxy: &Arc<str>) -> Self {
        Self {
            proxy: Arc::clone(proxy),
            methods: IndexMap::new(),
            properties: IndexMap::new(),
            events: IndexMap::new(),
        }
    }

    fn duplicate(&self, member: impl ToString) -> GenerationError {
        GenerationError::DuplicateMember {
            proxy: self.proxy.to_string(),
            member: member.to_string(),
        }
    }

    /// Inserts a method and returns the name it ended up under.
    pub(crate) fn add_method(&mut self, method: MetaMethod) -> Result<MemberName, GenerationError> {
        let key = MemberKey::of(&method);
        if !self.methods.contains_key(&key) {
            let name = method.name.clone();
            self.methods.insert(key, method);
            return Ok(name);
        }
        if !method.can_be_qualified() {
            return Err(self.duplicate(&method.name));
        }

        let method = method.qualified();
        let key = MemberKey::of(&method);
        if self.methods.contains_key(&key) {
            return Err(self.duplicate(&method.name));
        }
        tracing::debug!(proxy = %self.proxy, member = %method.name, "member switched to its qualified name");
        let name = method.name.clone();
        self.methods.insert(key, method);
        Ok(name)
    }

    /// Inserts a property, then its accessors.
    pub(crate) fn add_property(&mut self, property: MetaProperty) -> Result<(), GenerationError> {
        let key = |p: &MetaProperty| PropertyKey {
            name: p.name.to_string(),
            ty: p.sig.ty().clone(),
        };
        let mut property = property;
        if self.properties.contains_key(&key(&property)) {
            property = property.qualified();
            if self.properties.contains_key(&key(&property)) {
                return Err(self.duplicate(&property.name));
            }
        }

        if let Some(getter) = property.getter.take() {
            let name = self.add_method(getter.clone())?;
            property.getter = Some(MetaMethod { name, ..getter });
        }
        if let Some(setter) = property.setter.take() {
            let name = self.add_method(setter.clone())?;
            property.setter = Some(MetaMethod { name, ..setter });
        }
        self.properties.insert(key(&property), property);
        Ok(())
    }

    /// Inserts an event, then its accessors.
    pub(crate) fn add_event(&mut self, event: MetaEvent) -> Result<(), GenerationError> {
        let key = |e: &MetaEvent| PropertyKey {
            name: e.name.to_string(),
            ty: e.sig.handler().clone(),
        };
        let mut event = event;
        if self.events.contains_key(&key(&event)) {
            event = event.qualified();
            if self.events.contains_key(&key(&event)) {
                return Err(self.duplicate(&event.name));
            }
        }

        let adder_name = self.add_method(event.adder.clone())?;
        let remover_name = self.add_method(event.remover.clone())?;
        event.adder.name = adder_name;
        event.remover.name = remover_name;
        self.events.insert(key(&event), event);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn methods(&self) -> impl Iterator<Item = &MetaMethod> {
        self.methods.values()
    }

    pub(crate) fn methods_of(&self, owner: usize) -> impl Iterator<Item = &MetaMethod> {
        self.methods.values().filter(move |m| m.owner == owner)
    }

    pub(crate) fn properties(&self) -> impl Iterator<Item = &MetaProperty> {
        self.properties.values()
    }

    pub(crate) fn events(&self) -> impl Iterator<Item = &MetaEvent> {
        self.events.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.methods.len()
    }
}

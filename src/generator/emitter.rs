//! Accumulates the fields, call-context types and member slots of the proxy
//! type being generated.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::contract::Contract;
use crate::generator::invocation_type::InvocationType;
use crate::generator::method_body::MemberSlot;
use crate::logging::GenerationLog;

/// Hands out type names that are unique for the lifetime of a factory.
#[derive(Debug, Default)]
pub(crate) struct NamingScope {
    used: Mutex<HashMap<String, usize>>,
}

impl NamingScope {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns `suggested`, or `suggested_N` for the first free `N`.
    pub(crate) fn unique(&self, suggested: &str) -> Arc<str> {
        let mut used = self.used.lock();
        if !used.contains_key(suggested) {
            used.insert(suggested.to_string(), 0);
            return Arc::from(suggested);
        }
        loop {
            let counter = used.entry(suggested.to_string()).or_insert(0);
            *counter += 1;
            let candidate = format!("{}_{}", suggested, counter);
            if !used.contains_key(&candidate) {
                used.insert(candidate.clone(), 0);
                return Arc::from(candidate);
            }
        }
    }
}

/// What a proxy field holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// The interceptor chain
    Interceptors,
    /// The target, fixed or swappable
    Target,
    /// The mixin providing a contract
    Mixin(Arc<str>),
    /// The interceptor selector
    Selector,
}

/// A field of a synthesized proxy type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    name: Arc<str>,
    kind: FieldKind,
}

impl FieldInfo {
    /// Returns the field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns what the field holds.
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }
}

pub(crate) struct TypeEmitter<'a> {
    pub(crate) proxy: Arc<str>,
    pub(crate) naming: &'a NamingScope,
    pub(crate) log: GenerationLog<'a>,
    pub(crate) fields: Vec<FieldInfo>,
    pub(crate) slots: Vec<MemberSlot>,
    pub(crate) invocation_types: Vec<Arc<InvocationType>>,
    pub(crate) contracts: Vec<Arc<Contract>>,
}

impl<'a> TypeEmitter<'a> {
    pub(crate) fn new(proxy: &Arc<str>, naming: &'a NamingScope, log: GenerationLog<'a>) -> Self {
        Self {
            proxy: Arc::clone(proxy),
            naming,
            log,
            fields: Vec::new(),
            slots: Vec::new(),
            invocation_types: Vec::new(),
            contracts: Vec::new(),
        }
    }

    pub(crate) fn add_field(&mut self, name: &str, kind: FieldKind) {
        self.fields.push(FieldInfo {
            name: Arc::from(name),
            kind,
        });
    }

    /// Records that the proxy type implements `contract`.
    pub(crate) fn implement(&mut self, contract: &Arc<Contract>) {
        if !self.contracts.iter().any(|c| c.name() == contract.name()) {
            self.contracts.push(Arc::clone(contract));
        }
    }

    pub(crate) fn invocation_name(&self, declaring: &str, method: &str) -> Arc<str> {
        self.naming
            .unique(&format!("Invocations.{}_{}", declaring, method))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique_per_scope() {
        let scope = NamingScope::new();
        assert_eq!(&*scope.unique("Proxies.FooProxy"), "Proxies.FooProxy");
        assert_eq!(&*scope.unique("Proxies.FooProxy"), "Proxies.FooProxy_1");
        assert_eq!(&*scope.unique("Proxies.FooProxy"), "Proxies.FooProxy_2");

        let other = NamingScope::new();
        assert_eq!(&*other.unique("Proxies.FooProxy"), "Proxies.FooProxy");
    }

    #[test]
    fn suffixed_names_never_shadow_taken_ones() {
        let scope = NamingScope::new();
        scope.unique("A_1");
        scope.unique("A");
        assert_eq!(&*scope.unique("A"), "A_2");
    }

    #[test]
    fn fields_are_recorded_in_order() {
        let scope = NamingScope::new();
        let proxy: Arc<str> = Arc::from("Proxies.FooProxy");
        let mut emitter = TypeEmitter::new(&proxy, &scope, GenerationLog::new("Proxies.FooProxy"));
        emitter.add_field("__interceptors", FieldKind::Interceptors);
        emitter.add_field("__target", FieldKind::Target);
        assert_eq!(emitter.fields[1].kind(), &FieldKind::Target);
        assert!(!emitter.fields.iter().any(|f| f.kind() == &FieldKind::Selector));
        assert_eq!(emitter.fields[0].name(), "__interceptors");
    }
}

//! Contract (interface) descriptions.

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::types::{GenericParam, ParamMode, Parameter, TypeRef};

/// Name of the infrastructure contract every proxy implements.
pub const TARGET_ACCESSOR: &str = "ProxyCore.IProxyTargetAccessor";

/// Name of the marker contract declaring proxies as serializable.
pub const SERIALIZATION_MARKER: &str = "ProxyCore.ISerializableProxy";

static TARGET_ACCESSOR_CONTRACT: Lazy<Arc<Contract>> = Lazy::new(|| {
    Contract::builder(TARGET_ACCESSOR)
        .method(MethodSig::new("DynProxyGetTarget").returns(TypeRef::reference("object")))
        .method(
            MethodSig::new("DynProxySetTarget")
                .param(Parameter::value("target", TypeRef::reference("object"))),
        )
        .method(MethodSig::new("GetInterceptors").returns(TypeRef::reference("IInterceptor[]")))
        .build()
});

static SERIALIZATION_MARKER_CONTRACT: Lazy<Arc<Contract>> =
    Lazy::new(|| Contract::builder(SERIALIZATION_MARKER).build());

/// The signature of one operation.
///
/// # Examples
///
/// ```
/// use proxy_core::{MethodSig, Parameter, TypeRef};
///
/// let sig = MethodSig::new("TryParse")
///     .param(Parameter::value("text", TypeRef::reference("string")))
///     .param(Parameter::out("result", TypeRef::value_of::<i32>("int")))
///     .returns(TypeRef::value_of::<bool>("bool"));
///
/// assert_eq!(sig.parameters().len(), 2);
/// assert!(sig.has_by_ref_params());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSig {
    name: Arc<str>,
    params: Vec<Parameter>,
    returns: TypeRef,
    generics: Vec<GenericParam>,
}

impl MethodSig {
    /// A parameterless `void` operation.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: TypeRef::void(),
            generics: Vec::new(),
        }
    }

    /// Appends a parameter.
    pub fn param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    /// Sets the return type.
    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.returns = ty;
        self
    }

    /// Appends a generic parameter.
    pub fn generic(mut self, param: GenericParam) -> Self {
        self.generics.push(param);
        self
    }

    /// Returns the operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    /// Returns the parameters.
    pub fn parameters(&self) -> &[Parameter] {
        &self.params
    }

    /// Returns the return type.
    pub fn return_type(&self) -> &TypeRef {
        &self.returns
    }

    /// Returns the generic parameters.
    pub fn generic_params(&self) -> &[GenericParam] {
        &self.generics
    }

    /// Returns the number of generic parameters.
    pub fn generic_arity(&self) -> usize {
        self.generics.len()
    }

    /// Returns true if the operation has generic parameters.
    pub fn is_generic(&self) -> bool {
        !self.generics.is_empty()
    }

    /// Returns true if the operation returns a task.
    pub fn is_async(&self) -> bool {
        self.returns.is_task()
    }

    /// Returns true if any parameter is passed by reference.
    pub fn has_by_ref_params(&self) -> bool {
        self.params.iter().any(|p| p.mode().is_by_ref())
    }

    /// Returns true if both operations take the same parameters and generic
    /// arity, ignoring names and return types.
    pub fn same_shape(&self, other: &MethodSig) -> bool {
        self.generic_arity() == other.generic_arity()
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.mode() == b.mode() && a.ty() == b.ty())
    }

    /// Returns true if `other` has the same name and shape.
    pub fn matches(&self, other: &MethodSig) -> bool {
        self.name == other.name && self.same_shape(other)
    }

    pub(crate) fn parameter_key(&self) -> Vec<(ParamMode, TypeRef)> {
        self.params
            .iter()
            .map(|p| (p.mode(), p.ty().clone()))
            .collect()
    }

    /// Closes the signature over concrete type arguments.
    pub fn substitute(&self, type_args: &[TypeRef]) -> MethodSig {
        MethodSig {
            name: Arc::clone(&self.name),
            params: self.params.iter().map(|p| p.substitute(type_args)).collect(),
            returns: self.returns.substitute(type_args),
            generics: self.generics.clone(),
        }
    }
}

/// A property declared on a contract; expands to `get_`/`set_` accessors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertySig {
    name: Arc<str>,
    ty: TypeRef,
    readable: bool,
    writable: bool,
}

impl PropertySig {
    /// A read-write property.
    pub fn new(name: impl Into<Arc<str>>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            readable: true,
            writable: true,
        }
    }

    /// A read-only property.
    pub fn read_only(name: impl Into<Arc<str>>, ty: TypeRef) -> Self {
        Self {
            writable: false,
            ..Self::new(name, ty)
        }
    }

    /// Returns the property name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the property type.
    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    /// Returns the getter signature, if readable.
    pub fn getter(&self) -> Option<MethodSig> {
        self.readable
            .then(|| MethodSig::new(format!("get_{}", self.name)).returns(self.ty.clone()))
    }

    /// Returns the setter signature, if writable.
    pub fn setter(&self) -> Option<MethodSig> {
        self.writable.then(|| {
            MethodSig::new(format!("set_{}", self.name))
                .param(Parameter::value("value", self.ty.clone()))
        })
    }
}

/// An event declared on a contract; expands to `add_`/`remove_` accessors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventSig {
    name: Arc<str>,
    handler: TypeRef,
}

impl EventSig {
    /// An event whose handlers have type `handler`.
    pub fn new(name: impl Into<Arc<str>>, handler: TypeRef) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }

    /// Returns the event name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the handler type.
    pub fn handler(&self) -> &TypeRef {
        &self.handler
    }

    /// Returns the `add_` accessor.
    pub fn adder(&self) -> MethodSig {
        MethodSig::new(format!("add_{}", self.name))
            .param(Parameter::value("handler", self.handler.clone()))
    }

    /// Returns the `remove_` accessor.
    pub fn remover(&self) -> MethodSig {
        MethodSig::new(format!("remove_{}", self.name))
            .param(Parameter::value("handler", self.handler.clone()))
    }
}

/// A contract: a named set of operations, properties and events, possibly
/// extending other contracts.
///
/// Contracts compare structurally, so two separately built descriptions of
/// the same interface are interchangeable in a shape key.
///
/// # Examples
///
/// ```
/// use proxy_core::{Contract, MethodSig, PropertySig, TypeRef};
///
/// let named = Contract::builder("INamed")
///     .property(PropertySig::read_only("Name", TypeRef::reference("string")))
///     .build();
/// let greeter = Contract::builder("IGreeter")
///     .extends(&named)
///     .method(MethodSig::new("Greet"))
///     .build();
///
/// let all: Vec<_> = greeter.all_contracts().iter().map(|c| c.name().to_string()).collect();
/// assert_eq!(all, ["IGreeter", "INamed"]);
/// ```
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Contract {
    name: Arc<str>,
    methods: Vec<MethodSig>,
    properties: Vec<PropertySig>,
    events: Vec<EventSig>,
    parents: Vec<Arc<Contract>>,
}

impl Contract {
    /// Starts describing a contract.
    pub fn builder(name: impl Into<Arc<str>>) -> ContractBuilder {
        ContractBuilder {
            contract: Contract {
                name: name.into(),
                methods: Vec::new(),
                properties: Vec::new(),
                events: Vec::new(),
                parents: Vec::new(),
            },
        }
    }

    /// The infrastructure contract giving access to a proxy's target and
    /// interceptors.
    pub fn target_accessor() -> Arc<Contract> {
        Arc::clone(&TARGET_ACCESSOR_CONTRACT)
    }

    /// The marker contract every proxy implements for serialization.
    pub fn serialization_marker() -> Arc<Contract> {
        Arc::clone(&SERIALIZATION_MARKER_CONTRACT)
    }

    /// Returns true for contracts owned by the engine itself.
    pub fn is_infrastructure(&self) -> bool {
        &*self.name == TARGET_ACCESSOR || &*self.name == SERIALIZATION_MARKER
    }

    /// Returns the contract name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    /// Returns the operations declared directly on this contract.
    pub fn methods(&self) -> &[MethodSig] {
        &self.methods
    }

    /// Returns the properties declared directly on this contract.
    pub fn properties(&self) -> &[PropertySig] {
        &self.properties
    }

    /// Returns the events declared directly on this contract.
    pub fn events(&self) -> &[EventSig] {
        &self.events
    }

    /// Returns the directly extended contracts.
    pub fn parents(&self) -> &[Arc<Contract>] {
        &self.parents
    }

    /// Returns this contract followed by every contract it extends,
    /// depth first, without duplicates.
    pub fn all_contracts(self: &Arc<Self>) -> Vec<Arc<Contract>> {
        let mut out: Vec<Arc<Contract>> = Vec::new();
        let mut stack = vec![Arc::clone(self)];
        while let Some(contract) = stack.pop() {
            if out.iter().any(|c| c.name == contract.name) {
                continue;
            }
            for parent in contract.parents.iter().rev() {
                stack.push(Arc::clone(parent));
            }
            out.push(contract);
        }
        out
    }

    /// Returns true if this contract is `name` or extends it.
    pub fn extends(self: &Arc<Self>, name: &str) -> bool {
        self.all_contracts().iter().any(|c| c.name() == name)
    }

    /// Finds an operation, including property and event accessors, by name
    /// and shape.
    pub fn find_method(&self, sig: &MethodSig) -> Option<MethodSig> {
        self.accessor_and_plain_methods()
            .into_iter()
            .find(|m| m.matches(sig))
    }

    pub(crate) fn accessor_and_plain_methods(&self) -> Vec<MethodSig> {
        let mut out = Vec::new();
        for property in &self.properties {
            out.extend(property.getter());
            out.extend(property.setter());
        }
        for event in &self.events {
            out.push(event.adder());
            out.push(event.remover());
        }
        out.extend(self.methods.iter().cloned());
        out
    }
}

/// Builder returned by [`Contract::builder`].
#[derive(Debug)]
pub struct ContractBuilder {
    contract: Contract,
}

impl ContractBuilder {
    /// Declares an operation.
    pub fn method(mut self, sig: MethodSig) -> Self {
        self.contract.methods.push(sig);
        self
    }

    /// Declares a property.
    pub fn property(mut self, property: PropertySig) -> Self {
        self.contract.properties.push(property);
        self
    }

    /// Declares an event.
    pub fn event(mut self, event: EventSig) -> Self {
        self.contract.events.push(event);
        self
    }

    /// Extends another contract.
    pub fn extends(mut self, parent: &Arc<Contract>) -> Self {
        if !self.contract.parents.iter().any(|p| p.name == parent.name) {
            self.contract.parents.push(Arc::clone(parent));
        }
        self
    }

    /// Finishes the description.
    pub fn build(self) -> Arc<Contract> {
        Arc::new(self.contract)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calc() -> Arc<Contract> {
        Contract::builder("ICalc")
            .method(
                MethodSig::new("Add")
                    .param(Parameter::value("a", TypeRef::value_of::<i32>("int")))
                    .param(Parameter::value("b", TypeRef::value_of::<i32>("int")))
                    .returns(TypeRef::value_of::<i32>("int")),
            )
            .build()
    }

    #[test]
    fn contracts_compare_structurally() {
        assert_eq!(calc(), calc());
        let other = Contract::builder("ICalc").build();
        assert_ne!(*calc(), *other);
    }

    #[test]
    fn diamond_inheritance_is_flattened_once() {
        let root = Contract::builder("IRoot").build();
        let left = Contract::builder("ILeft").extends(&root).build();
        let right = Contract::builder("IRight").extends(&root).build();
        let leaf = Contract::builder("ILeaf").extends(&left).extends(&right).build();

        let names: Vec<_> = leaf
            .all_contracts()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, ["ILeaf", "ILeft", "IRoot", "IRight"]);
        assert!(leaf.extends("IRoot"));
    }

    #[test]
    fn properties_and_events_expand_to_accessors() {
        let contract = Contract::builder("IWidget")
            .property(PropertySig::new("Size", TypeRef::value_of::<u32>("uint")))
            .event(EventSig::new("Clicked", TypeRef::reference("Handler")))
            .build();

        let names: Vec<_> = contract
            .accessor_and_plain_methods()
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        assert_eq!(names, ["get_Size", "set_Size", "add_Clicked", "remove_Clicked"]);
    }

    #[test]
    fn infrastructure_contracts_are_recognised() {
        assert!(Contract::target_accessor().is_infrastructure());
        assert!(Contract::serialization_marker().is_infrastructure());
        assert!(!calc().is_infrastructure());
        assert_eq!(Contract::target_accessor().methods().len(), 3);
    }

    #[test]
    fn find_method_matches_shape() {
        let add = calc().methods()[0].clone();
        assert!(calc().find_method(&add).is_some());
        assert!(calc().find_method(&MethodSig::new("Add")).is_none());
    }
}

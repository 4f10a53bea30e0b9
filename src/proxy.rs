//! Synthesized proxy types and the proxies bound from them.
//!
//! A [`ProxyType`] is the immutable template the generator produces and the
//! factory caches. [`ProxyType::instantiate`] binds it to interceptors, a
//! target and mixin instances, producing a [`Proxy`]: a cheap handle that
//! runs every call through the member slot the generator emitted for it.

use std::fmt;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::class::{ClassMethod, ClassType, Implementation, Target};
use crate::contract::{Contract, MethodSig};
use crate::error::{CallError, InstantiationError};
use crate::generator::emitter::TypeEmitter;
use crate::generator::invocation_type::Binding;
use crate::generator::method_body::{InfrastructureOp, MemberSlot, MethodBody};
use crate::generator::{FieldInfo, GenerationRequest, InvocationType, ProxyKind};
use crate::interceptor::Interceptor;
use crate::invocation::Invocation;
use crate::locator::ImplementationLocator;
use crate::marshal::{check_arity, copy_back, finish_return, to_positional, zero_fill_out};
use crate::model::{MemberName, MetaType};
use crate::options::{GenerationOptions, InterceptorSelector, MixinData};
use crate::types::TypeRef;
use crate::value::{Instance, Value};

#[derive(Debug, Clone, Default)]
struct Accessors {
    first: Option<String>,
    second: Option<String>,
}

#[derive(Debug, Clone)]
struct MixinSlot {
    contract: Arc<str>,
    ty: Arc<ClassType>,
}

/// A synthesized proxy type.
///
/// Holds one member slot per proxied operation, the call-context type of
/// every intercepted operation and the fields a bound proxy carries. Proxy
/// types are shared: every request with the same shape gets the same
/// `Arc<ProxyType>` from the factory.
pub struct ProxyType {
    name: Arc<str>,
    kind: ProxyKind,
    base: Option<Arc<ClassType>>,
    primary: Option<Arc<Contract>>,
    target_type: Option<Arc<ClassType>>,
    contracts: Vec<Arc<Contract>>,
    fields: Vec<FieldInfo>,
    slots: Vec<MemberSlot>,
    by_name: IndexMap<String, Vec<usize>>,
    properties: IndexMap<String, Accessors>,
    events: IndexMap<String, Accessors>,
    invocation_types: Vec<Arc<InvocationType>>,
    mixins: Vec<MixinSlot>,
    locator: Arc<dyn ImplementationLocator>,
    descriptor: Arc<ClassType>,
}

impl ProxyType {
    pub(crate) fn assemble(
        request: &GenerationRequest<'_>,
        mixins: &MixinData,
        meta: &MetaType,
        emitter: TypeEmitter<'_>,
        locator: &Arc<dyn ImplementationLocator>,
    ) -> Self {
        let base = request
            .base
            .or_else(|| request.options.base_type())
            .cloned();
        let mut contracts = emitter.contracts;
        if let Some(base) = &base {
            for contract in base.all_contracts() {
                if !contracts.iter().any(|c| c.name() == contract.name()) {
                    contracts.push(contract);
                }
            }
        }

        let mut by_name: IndexMap<String, Vec<usize>> = IndexMap::new();
        for (index, slot) in emitter.slots.iter().enumerate() {
            by_name.entry(slot.name.to_string()).or_default().push(index);
        }
        let properties = meta
            .properties()
            .map(|p| {
                let accessors = Accessors {
                    first: p.getter.as_ref().map(|g| g.name.to_string()),
                    second: p.setter.as_ref().map(|s| s.name.to_string()),
                };
                (p.name.to_string(), accessors)
            })
            .collect();
        let events = meta
            .events()
            .map(|e| {
                let accessors = Accessors {
                    first: Some(e.adder.name.to_string()),
                    second: Some(e.remover.name.to_string()),
                };
                (e.name.to_string(), accessors)
            })
            .collect();
        let mixin_slots = mixins
            .contracts()
            .iter()
            .zip(mixins.mixins())
            .map(|(contract, mixin)| MixinSlot {
                contract: Arc::clone(contract.name_arc()),
                ty: Arc::clone(mixin.ty()),
            })
            .collect();
        let descriptor = describe(&emitter.proxy, &contracts, &emitter.slots);

        Self {
            name: emitter.proxy,
            kind: request.kind,
            base,
            primary: request.primary.cloned(),
            target_type: request.target_type.cloned(),
            contracts,
            fields: emitter.fields,
            slots: emitter.slots,
            by_name,
            properties,
            events,
            invocation_types: emitter.invocation_types,
            mixins: mixin_slots,
            locator: Arc::clone(locator),
            descriptor,
        }
    }

    /// Returns the type name, unique within the factory.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the dispatch strategy.
    pub fn kind(&self) -> ProxyKind {
        self.kind
    }

    /// Returns the class the proxy extends, if any.
    pub fn base_type(&self) -> Option<&Arc<ClassType>> {
        self.base.as_ref()
    }

    /// Returns the fixed target class of contract proxies with a target.
    pub fn target_type(&self) -> Option<&Arc<ClassType>> {
        self.target_type.as_ref()
    }

    /// Returns the fields a bound proxy carries.
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    /// Returns every implemented contract, infrastructure included.
    pub fn contracts(&self) -> &[Arc<Contract>] {
        &self.contracts
    }

    /// Returns true if the proxy type implements `contract`.
    pub fn implements(&self, contract: &str) -> bool {
        self.contracts.iter().any(|c| c.name() == contract)
    }

    /// Returns the call-context types of the intercepted operations.
    pub fn invocation_types(&self) -> impl Iterator<Item = &Arc<InvocationType>> {
        self.invocation_types.iter()
    }

    /// Returns the names members are exposed under, qualified names
    /// included.
    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    /// Describes the proxy type as a class, so that a proxy can serve as
    /// the target or mixin of another proxy.
    ///
    /// The description implements the target accessor contract, which makes
    /// it an invalid base type.
    pub fn class_descriptor(&self) -> &Arc<ClassType> {
        &self.descriptor
    }

    /// Binds the proxy type to live instances.
    ///
    /// # Errors
    ///
    /// Returns an [`InstantiationError`] when the target does not fit the
    /// target slot, a mixin slot has no instance, or the base state cannot
    /// be constructed.
    pub fn instantiate(self: &Arc<Self>, args: ProxyArgs) -> Result<Proxy, InstantiationError> {
        let target = self.bind_target(args.target)?;
        let mixins = self.bind_mixins(&args.mixins)?;
        let base = match &self.base {
            Some(base) => {
                let constructor =
                    base.constructor()
                        .ok_or_else(|| InstantiationError::NoConstructor {
                            type_name: base.name().to_string(),
                        })?;
                Some(Target::new(base, constructor.create()))
            }
            None => None,
        };

        tracing::debug!(
            proxy = %self.name,
            interceptors = args.interceptors.len(),
            has_target = target.is_some(),
            "proxy instantiated"
        );
        Ok(Proxy {
            inner: Arc::new(ProxyInner {
                ty: Arc::clone(self),
                interceptors: args.interceptors.into(),
                base,
                target: RwLock::new(target),
                mixins,
                selector: args.selector,
                selections: self.slots.iter().map(|_| RwLock::new(None)).collect(),
            }),
        })
    }

    fn target_mismatch(&self, expected: &str, actual: Option<&Target>) -> InstantiationError {
        InstantiationError::TargetType {
            proxy: self.name.to_string(),
            expected: expected.to_string(),
            actual: actual.map_or("<none>", |t| t.ty().name()).to_string(),
        }
    }

    fn bind_target(&self, target: Option<Target>) -> Result<Option<Target>, InstantiationError> {
        match self.kind {
            ProxyKind::Class | ProxyKind::ContractWithoutTarget => match target {
                Some(_) => Err(InstantiationError::TargetNotAccepted {
                    proxy: self.name.to_string(),
                }),
                None => Ok(None),
            },
            ProxyKind::ClassWithTarget | ProxyKind::ContractWithTarget => {
                let expected = self
                    .target_type
                    .as_ref()
                    .or(self.base.as_ref())
                    .map_or("", |t| t.name());
                match target {
                    Some(t) if t.ty().name() == expected => Ok(Some(t)),
                    other => Err(self.target_mismatch(expected, other.as_ref())),
                }
            }
            ProxyKind::ContractWithTargetContract => {
                let expected = self.primary.as_ref().map_or("", |c| c.name());
                match target {
                    Some(t) if !t.ty().implements(expected) => {
                        Err(self.target_mismatch(expected, Some(&t)))
                    }
                    other => Ok(other),
                }
            }
        }
    }

    fn bind_mixins(&self, given: &[Target]) -> Result<Vec<Target>, InstantiationError> {
        self.mixins
            .iter()
            .map(|slot| {
                if let Some(mixin) = given.iter().find(|m| m.ty().name() == slot.ty.name()) {
                    return Ok(mixin.clone());
                }
                match given.iter().find(|m| m.ty().implements(&slot.contract)) {
                    Some(other) => Err(self.target_mismatch(slot.ty.name(), Some(other))),
                    None => Err(InstantiationError::MissingMixin {
                        proxy: self.name.to_string(),
                        contract: slot.contract.to_string(),
                    }),
                }
            })
            .collect()
    }

    fn resolve(&self, name: &str, arity: usize) -> Result<usize, CallError> {
        let candidates = self
            .by_name
            .get(name)
            .ok_or_else(|| CallError::UnknownMember {
                name: name.to_string(),
            })?;
        let mut matching = candidates
            .iter()
            .copied()
            .filter(|&i| self.slots[i].sig.parameters().len() == arity);
        match (matching.next(), matching.next()) {
            (Some(index), None) => Ok(index),
            (Some(_), Some(_)) => Err(CallError::AmbiguousMember {
                name: name.to_string(),
                arity,
            }),
            (None, _) => {
                let first = &self.slots[candidates[0]].sig;
                Err(CallError::ArgumentCount {
                    method: name.to_string(),
                    expected: first.parameters().len(),
                    actual: arity,
                })
            }
        }
    }

    fn resolve_on(&self, contract: &str, name: &str, arity: usize) -> Result<usize, CallError> {
        let mut matching = self.slots.iter().enumerate().filter(|(_, s)| {
            &*s.declaring == contract
                && s.sig.name() == name
                && s.sig.parameters().len() == arity
        });
        match (matching.next(), matching.next()) {
            (Some((index, _)), None) => Ok(index),
            (Some(_), Some(_)) => Err(CallError::AmbiguousMember {
                name: format!("{}.{}", contract, name),
                arity,
            }),
            (None, _) => Err(CallError::UnknownMember {
                name: format!("{}.{}", contract, name),
            }),
        }
    }
}

/// Builds the class description of a proxy type. Every member forwards
/// back into the proxy instance it is called on.
fn describe(name: &Arc<str>, contracts: &[Arc<Contract>], slots: &[MemberSlot]) -> Arc<ClassType> {
    let mut builder = ClassType::builder(Arc::clone(name));
    for contract in contracts {
        builder = builder.implements(contract);
    }
    for (index, slot) in slots.iter().enumerate() {
        let implementation = if slot.sig.is_async() {
            Implementation::typed_async::<Proxy, _, _>(move |proxy, args, generics| async move {
                proxy.invoke_slot_async(index, generics, args).await
            })
        } else {
            Implementation::typed::<Proxy, _>(move |proxy, args, generics| {
                proxy.invoke_slot(index, generics.to_vec(), args)
            })
        };
        let mut method = ClassMethod::new(slot.sig.clone()).implemented_by(implementation);
        if let MemberName::Qualified { owner, .. } = &slot.name {
            method = method.explicit(Arc::clone(owner));
        }
        builder = builder.method(method);
    }
    builder.build()
}

impl fmt::Debug for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyType")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("fields", &self.fields)
            .field("members", &self.by_name.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// What a proxy type is bound to at instantiation.
///
/// ```
/// use proxy_core::{CallError, GenerationOptions, Invocation, ProxyArgs};
///
/// let counting = |invocation: &mut Invocation| -> Result<(), CallError> { invocation.proceed() };
/// let args = ProxyArgs::from_options(&GenerationOptions::new()).interceptor(counting);
/// assert_eq!(args.interceptor_count(), 1);
/// ```
#[derive(Clone, Default)]
pub struct ProxyArgs {
    interceptors: Vec<Arc<dyn Interceptor>>,
    target: Option<Target>,
    mixins: Vec<Target>,
    selector: Option<Arc<dyn InterceptorSelector>>,
}

impl ProxyArgs {
    /// No interceptors, no target and no mixins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from the mixin instances and selector of `options`.
    pub fn from_options(options: &GenerationOptions) -> Self {
        Self {
            interceptors: Vec::new(),
            target: None,
            mixins: options.mixins().to_vec(),
            selector: options.interceptor_selector().cloned(),
        }
    }

    /// Appends an interceptor to the chain.
    pub fn interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Appends already shared interceptors to the chain.
    pub fn interceptors(mut self, interceptors: impl IntoIterator<Item = Arc<dyn Interceptor>>) -> Self {
        self.interceptors.extend(interceptors);
        self
    }

    /// Sets the target.
    pub fn target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    /// Adds a mixin instance, replacing one of the same type.
    pub fn mixin(mut self, mixin: Target) -> Self {
        self.mixins.retain(|m| m.ty().name() != mixin.ty().name());
        self.mixins.push(mixin);
        self
    }

    /// Sets the interceptor selector.
    pub fn selector(mut self, selector: impl InterceptorSelector + 'static) -> Self {
        self.selector = Some(Arc::new(selector));
        self
    }

    /// Returns the number of interceptors in the chain.
    pub fn interceptor_count(&self) -> usize {
        self.interceptors.len()
    }
}

struct SelectedChain {
    target_type: Option<Arc<str>>,
    interceptors: Arc<[Arc<dyn Interceptor>]>,
}

struct ProxyInner {
    ty: Arc<ProxyType>,
    interceptors: Arc<[Arc<dyn Interceptor>]>,
    base: Option<Target>,
    target: RwLock<Option<Target>>,
    mixins: Vec<Target>,
    selector: Option<Arc<dyn InterceptorSelector>>,
    selections: Vec<RwLock<Option<Arc<SelectedChain>>>>,
}

/// A live proxy.
///
/// Cloning is cheap and every clone is the same proxy: they share the
/// target slot, the mixins and the interceptor chain.
#[derive(Clone)]
pub struct Proxy {
    inner: Arc<ProxyInner>,
}

impl Proxy {
    /// Returns true if `ty` is a synthesized proxy type.
    pub fn is_proxy_type(ty: &ClassType) -> bool {
        ty.is_proxy_type()
    }

    /// Returns true if `instance` is a proxy.
    pub fn is_proxy(instance: &Instance) -> bool {
        instance.downcast_ref::<Proxy>().is_some()
    }

    /// Returns the proxy type this proxy was bound from.
    pub fn proxy_type(&self) -> &Arc<ProxyType> {
        &self.inner.ty
    }

    /// Returns the interceptor chain.
    pub fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.inner.interceptors
    }

    /// Returns the current target.
    pub fn target(&self) -> Option<Target> {
        self.inner.target.read().clone()
    }

    /// Replaces the target of a swappable-target proxy. `None` unbinds it.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::TargetNotChangeable`] on other proxy kinds and
    /// [`CallError::IncompatibleTarget`] if `target` does not implement the
    /// primary contract.
    pub fn set_target(&self, target: Option<Target>) -> Result<(), CallError> {
        let ty = &self.inner.ty;
        let Some(primary) = ty.primary.as_ref().filter(|_| ty.kind.can_change_target()) else {
            return Err(CallError::TargetNotChangeable {
                method: "DynProxySetTarget".to_string(),
            });
        };
        if let Some(t) = &target {
            if !t.ty().implements(primary.name()) {
                return Err(CallError::IncompatibleTarget {
                    expected: primary.name().to_string(),
                    actual: t.ty().name().to_string(),
                });
            }
        }
        self.replace_target(target);
        Ok(())
    }

    /// Returns the object behind the proxy, looking through proxies that
    /// target other proxies. Class proxies return their base state.
    pub fn unproxied_target(&self) -> Option<Target> {
        let current = match self.inner.ty.kind {
            ProxyKind::Class => self.inner.base.clone(),
            _ => self.target(),
        }?;
        match current.downcast_ref::<Proxy>() {
            Some(inner) => inner.unproxied_target(),
            None => Some(current),
        }
    }

    /// Wraps the proxy as a target for another proxy.
    pub fn as_target(&self) -> Target {
        Target::new(&self.inner.ty.descriptor, Arc::new(self.clone()))
    }

    pub(crate) fn locator(&self) -> &dyn ImplementationLocator {
        self.inner.ty.locator.as_ref()
    }

    pub(crate) fn replace_target(&self, target: Option<Target>) {
        tracing::trace!(
            proxy = %self.inner.ty.name,
            new_target = ?target.as_ref().map(|t| t.ty().name()),
            "target replaced"
        );
        *self.inner.target.write() = target;
    }

    /// Calls the member exposed as `name` (plain or qualified) with
    /// `args`. By-reference arguments are updated in place.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::UnknownMember`] or [`CallError::AmbiguousMember`]
    /// when `name` does not pick exactly one member, and whatever the call
    /// itself fails with.
    pub fn invoke(&self, name: &str, args: &mut [Value]) -> Result<Value, CallError> {
        let index = self.inner.ty.resolve(name, args.len())?;
        self.invoke_slot(index, Vec::new(), args)
    }

    /// Calls a generic member closed over `type_args`.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::GenericArity`] or
    /// [`CallError::GenericConstraint`] when the type arguments do not fit,
    /// and everything [`invoke`](Self::invoke) returns.
    pub fn invoke_generic(
        &self,
        name: &str,
        type_args: &[TypeRef],
        args: &mut [Value],
    ) -> Result<Value, CallError> {
        let index = self.inner.ty.resolve(name, args.len())?;
        self.invoke_slot(index, type_args.to_vec(), args)
    }

    /// Calls the member `name` declared on `contract`, whatever name it is
    /// exposed under.
    pub fn invoke_contract(
        &self,
        contract: &str,
        name: &str,
        args: &mut [Value],
    ) -> Result<Value, CallError> {
        let index = self.inner.ty.resolve_on(contract, name, args.len())?;
        self.invoke_slot(index, Vec::new(), args)
    }

    /// Calls a task-returning member.
    pub fn invoke_async(&self, name: &str, args: Vec<Value>) -> BoxFuture<'static, Result<Value, CallError>> {
        self.invoke_generic_async(name, Vec::new(), args)
    }

    /// Calls a task-returning generic member closed over `type_args`.
    pub fn invoke_generic_async(
        &self,
        name: &str,
        type_args: Vec<TypeRef>,
        args: Vec<Value>,
    ) -> BoxFuture<'static, Result<Value, CallError>> {
        let proxy = self.clone();
        let name = name.to_string();
        async move {
            let index = proxy.inner.ty.resolve(&name, args.len())?;
            proxy.invoke_slot_async(index, type_args, args).await
        }
        .boxed()
    }

    /// Reads a property.
    pub fn get_property(&self, name: &str) -> Result<Value, CallError> {
        let getter = self.accessor(&self.inner.ty.properties, name, |a| &a.first, "get")?;
        self.invoke(&getter, &mut [])
    }

    /// Writes a property.
    pub fn set_property(&self, name: &str, value: Value) -> Result<(), CallError> {
        let setter = self.accessor(&self.inner.ty.properties, name, |a| &a.second, "set")?;
        self.invoke(&setter, &mut [value]).map(|_| ())
    }

    /// Subscribes `handler` to an event.
    pub fn add_event_handler(&self, name: &str, handler: Value) -> Result<(), CallError> {
        let adder = self.accessor(&self.inner.ty.events, name, |a| &a.first, "add")?;
        self.invoke(&adder, &mut [handler]).map(|_| ())
    }

    /// Unsubscribes `handler` from an event.
    pub fn remove_event_handler(&self, name: &str, handler: Value) -> Result<(), CallError> {
        let remover = self.accessor(&self.inner.ty.events, name, |a| &a.second, "remove")?;
        self.invoke(&remover, &mut [handler]).map(|_| ())
    }

    fn accessor(
        &self,
        members: &IndexMap<String, Accessors>,
        name: &str,
        pick: impl Fn(&Accessors) -> &Option<String>,
        prefix: &str,
    ) -> Result<String, CallError> {
        members
            .get(name)
            .and_then(|a| pick(a).clone())
            .ok_or_else(|| CallError::UnknownMember {
                name: format!("{}_{}", prefix, name),
            })
    }

    fn bound_target(&self, binding: Binding) -> Option<Target> {
        match binding {
            Binding::None => None,
            Binding::Base => self.inner.base.clone(),
            Binding::Main => self.target(),
            Binding::Mixin(position) => self.inner.mixins.get(position).cloned(),
        }
    }

    fn select(&self, index: usize, ty: &InvocationType) -> Arc<[Arc<dyn Interceptor>]> {
        let Some(selector) = &self.inner.selector else {
            return Arc::clone(&self.inner.interceptors);
        };
        let target_type = self
            .bound_target(ty.binding())
            .map(|t| Arc::clone(t.ty().name_arc()));
        let cell = &self.inner.selections[index];
        if let Some(chain) = cell.read().as_ref() {
            if chain.target_type == target_type {
                return Arc::clone(&chain.interceptors);
            }
        }
        let selected: Arc<[Arc<dyn Interceptor>]> = selector
            .select(target_type.as_deref(), ty.method(), &self.inner.interceptors)
            .into();
        *cell.write() = Some(Arc::new(SelectedChain {
            target_type,
            interceptors: Arc::clone(&selected),
        }));
        selected
    }

    fn close(slot: &MemberSlot, type_args: &[TypeRef]) -> Result<MethodSig, CallError> {
        let method = &slot.sig;
        if method.generic_arity() != type_args.len() {
            return Err(CallError::GenericArity {
                method: slot.name.to_string(),
                expected: method.generic_arity(),
                actual: type_args.len(),
            });
        }
        for (param, arg) in method.generic_params().iter().zip(type_args) {
            // Type arguments must be closed and storable in a call slot.
            if arg.is_open() || !arg.is_representable() || !param.admits(arg) {
                return Err(CallError::GenericConstraint {
                    method: slot.name.to_string(),
                    parameter: param.name().to_string(),
                    argument: arg.name().to_string(),
                });
            }
        }
        if type_args.is_empty() {
            Ok(method.clone())
        } else {
            Ok(method.substitute(type_args))
        }
    }

    fn located(&self, contract: &Contract, slot: &MemberSlot) -> Result<Option<(Target, Implementation)>, CallError> {
        let Some(target) = self.target() else {
            return Ok(None);
        };
        let implementation = self
            .locator()
            .locate(contract, &slot.sig, target.ty())
            .ok_or_else(|| CallError::Unimplemented {
                target: target.ty().name().to_string(),
                method: slot.name.to_string(),
            })?;
        Ok(Some((target, implementation)))
    }

    fn invoke_slot(
        &self,
        index: usize,
        type_args: Vec<TypeRef>,
        args: &mut [Value],
    ) -> Result<Value, CallError> {
        let ty = Arc::clone(&self.inner.ty);
        let slot = &ty.slots[index];
        if slot.sig.is_async() {
            return Err(CallError::AsyncMismatch {
                method: slot.name.to_string(),
                expected: "asynchronously",
            });
        }
        let method = Self::close(slot, &type_args)?;
        check_arity(&method, args.len())?;

        let forward = |target: Option<Target>, implementation: &Implementation, args: &mut [Value]| {
            let target = target.ok_or_else(|| CallError::NoTarget {
                method: slot.name.to_string(),
            })?;
            let mut slots = to_positional(&method, args)?;
            let outcome = implementation.call(target.instance(), &mut slots, &type_args);
            copy_back(&method, &slots, args);
            finish_return(&method, outcome?)
        };

        match &slot.body {
            MethodBody::Intercepted(invocation_type) => {
                self.run_intercepted(index, invocation_type, &method, &type_args, args)
            }
            MethodBody::Forwarding {
                binding,
                implementation,
            } => forward(self.bound_target(*binding), implementation, args),
            MethodBody::OptionallyForwarding(contract) => match self.located(contract, slot)? {
                Some((target, implementation)) => forward(Some(target), &implementation, args),
                None => {
                    zero_fill_out(&method, args);
                    Ok(method.return_type().default_value())
                }
            },
            MethodBody::Minimalistic => {
                zero_fill_out(&method, args);
                Ok(method.return_type().default_value())
            }
            MethodBody::Infrastructure(op) => self.run_infrastructure(*op, args),
        }
    }

    fn run_intercepted(
        &self,
        index: usize,
        invocation_type: &Arc<InvocationType>,
        method: &MethodSig,
        type_args: &[TypeRef],
        args: &mut [Value],
    ) -> Result<Value, CallError> {
        let interceptors = self.select(index, invocation_type);
        let positional = to_positional(method, args)?;
        let mut invocation = Invocation::new(
            self.bound_target(invocation_type.binding()),
            self.clone(),
            interceptors,
            Arc::clone(invocation_type),
            positional,
        );
        if !type_args.is_empty() {
            invocation.bind_generic_arguments(type_args);
        }

        let outcome = invocation.proceed();
        let (slots, value) = invocation.into_parts();
        copy_back(method, &slots, args);
        if let Err(e) = &outcome {
            tracing::debug!(proxy = %self.inner.ty.name, member = %invocation_type.member(), error = %e, "intercepted call failed");
        }
        outcome?;
        finish_return(method, value)
    }

    async fn invoke_slot_async(
        &self,
        index: usize,
        type_args: Vec<TypeRef>,
        mut args: Vec<Value>,
    ) -> Result<Value, CallError> {
        let ty = Arc::clone(&self.inner.ty);
        let slot = &ty.slots[index];
        if !slot.sig.is_async() {
            return Err(CallError::AsyncMismatch {
                method: slot.name.to_string(),
                expected: "synchronously",
            });
        }
        let method = Self::close(slot, &type_args)?;
        let positional = to_positional(&method, &args)?;
        let defaulted = || {
            method
                .return_type()
                .task_result()
                .map_or_else(Value::null, TypeRef::default_value)
        };

        let value = match &slot.body {
            MethodBody::Intercepted(invocation_type) => {
                let interceptors = self.select(index, invocation_type);
                let mut invocation = Invocation::new(
                    self.bound_target(invocation_type.binding()),
                    self.clone(),
                    interceptors,
                    Arc::clone(invocation_type),
                    positional,
                );
                if !type_args.is_empty() {
                    invocation.bind_generic_arguments(&type_args);
                }
                invocation.proceed_async().await?;
                invocation.into_parts().1
            }
            MethodBody::Forwarding {
                binding,
                implementation,
            } => {
                let target = self
                    .bound_target(*binding)
                    .ok_or_else(|| CallError::NoTarget {
                        method: slot.name.to_string(),
                    })?;
                implementation
                    .call_async(Arc::clone(target.instance()), positional, type_args.clone())
                    .await?
            }
            MethodBody::OptionallyForwarding(contract) => match self.located(contract, slot)? {
                Some((target, implementation)) => {
                    implementation
                        .call_async(Arc::clone(target.instance()), positional, type_args.clone())
                        .await?
                }
                None => defaulted(),
            },
            MethodBody::Minimalistic => defaulted(),
            MethodBody::Infrastructure(op) => self.run_infrastructure(*op, &mut args)?,
        };
        finish_return(&method, value)
    }

    fn run_infrastructure(&self, op: InfrastructureOp, args: &mut [Value]) -> Result<Value, CallError> {
        match op {
            InfrastructureOp::GetTarget => Ok(match self.inner.ty.kind {
                ProxyKind::Class => Value::of(self.as_target()),
                _ => self.target().map_or_else(Value::null, Value::of),
            }),
            InfrastructureOp::SetTarget => {
                let target = args.first().and_then(|v| v.cloned::<Target>());
                self.set_target(target).map(|()| Value::null())
            }
            InfrastructureOp::GetInterceptors => Ok(Value::of(self.interceptors().to_vec())),
        }
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("type", &self.inner.ty.name)
            .field("interceptors", &self.inner.interceptors.len())
            .field("target", &self.target())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::ProxyFactory;
    use crate::types::Parameter;

    fn store() -> Arc<Contract> {
        Contract::builder("IStore")
            .method(
                MethodSig::new("Get")
                    .param(Parameter::value("key", TypeRef::reference("string")))
                    .returns(TypeRef::value_of::<i32>("int")),
            )
            .method(MethodSig::new("Clear"))
            .build()
    }

    fn answering(value: i32) -> impl Interceptor {
        move |invocation: &mut Invocation| -> Result<(), CallError> {
            invocation.set_return_value(Value::of(value));
            Ok(())
        }
    }

    #[test]
    fn members_resolve_by_name_and_arity() {
        let factory = ProxyFactory::new();
        let ty = factory
            .create_contract_proxy_type_without_target(&store(), &[], &GenerationOptions::new())
            .unwrap();
        let proxy = ty.instantiate(ProxyArgs::new().interceptor(answering(7))).unwrap();

        let value = proxy.invoke("Get", &mut [Value::of("k".to_string())]).unwrap();
        assert_eq!(value.get::<i32>(), Some(&7));
        assert!(matches!(
            proxy.invoke("Missing", &mut []),
            Err(CallError::UnknownMember { .. })
        ));
        assert!(matches!(
            proxy.invoke("Get", &mut []),
            Err(CallError::ArgumentCount { expected: 1, actual: 0, .. })
        ));
    }

    #[test]
    fn targets_are_rejected_where_no_slot_exists() {
        let factory = ProxyFactory::new();
        let ty = factory
            .create_contract_proxy_type_without_target(&store(), &[], &GenerationOptions::new())
            .unwrap();
        let stray = ClassType::builder("Stray").build();
        let err = ty
            .instantiate(ProxyArgs::new().target(Target::of(&stray, ())))
            .unwrap_err();
        assert!(matches!(err, InstantiationError::TargetNotAccepted { .. }));
    }

    #[test]
    fn proxy_descriptor_marks_it_as_a_proxy() {
        let factory = ProxyFactory::new();
        let ty = factory
            .create_contract_proxy_type_without_target(&store(), &[], &GenerationOptions::new())
            .unwrap();
        let proxy = ty.instantiate(ProxyArgs::new()).unwrap();
        assert!(Proxy::is_proxy_type(ty.class_descriptor()));
        assert!(Proxy::is_proxy(proxy.as_target().instance()));
        assert!(ty.implements("IStore"));
        assert!(ty.implements(crate::contract::TARGET_ACCESSOR));
    }

    #[test]
    fn infrastructure_reports_the_interceptors() {
        let factory = ProxyFactory::new();
        let ty = factory
            .create_contract_proxy_type_without_target(&store(), &[], &GenerationOptions::new())
            .unwrap();
        let proxy = ty
            .instantiate(ProxyArgs::new().interceptor(answering(1)).interceptor(answering(2)))
            .unwrap();
        let chain = proxy.invoke("GetInterceptors", &mut []).unwrap();
        assert_eq!(chain.get::<Vec<Arc<dyn Interceptor>>>().map(Vec::len), Some(2));
        assert!(proxy.invoke("DynProxyGetTarget", &mut []).unwrap().is_null());
    }
}

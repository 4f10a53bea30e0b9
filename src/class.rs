//! Class descriptions: base classes, concrete targets and mixin types.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::contract::{Contract, MethodSig, TARGET_ACCESSOR};
use crate::error::CallError;
use crate::types::TypeRef;
use crate::value::{Instance, Value};

/// A synchronous operation body: receives the instance, the mutable argument
/// slots and the closed generic arguments.
pub type SyncImpl =
    Arc<dyn Fn(&Instance, &mut [Value], &[TypeRef]) -> Result<Value, CallError> + Send + Sync>;

/// An asynchronous operation body. By-reference parameters never reach it.
pub type AsyncImpl = Arc<
    dyn Fn(Instance, Vec<Value>, Vec<TypeRef>) -> BoxFuture<'static, Result<Value, CallError>>
        + Send
        + Sync,
>;

/// The real implementation of an operation.
#[derive(Clone)]
pub enum Implementation {
    /// Runs to completion on the calling thread
    Sync(SyncImpl),
    /// Produces a future
    Async(AsyncImpl),
}

impl Implementation {
    /// Wraps an untyped synchronous body.
    pub fn sync<F>(body: F) -> Self
    where
        F: Fn(&Instance, &mut [Value], &[TypeRef]) -> Result<Value, CallError>
            + Send
            + Sync
            + 'static,
    {
        Implementation::Sync(Arc::new(body))
    }

    /// Wraps a synchronous body over a concrete instance type.
    ///
    /// Calling it on an instance of another type fails with
    /// [`CallError::InstanceType`].
    ///
    /// ```
    /// use std::sync::Arc;
    /// use proxy_core::{Implementation, Instance, Value};
    ///
    /// struct Counter(i32);
    ///
    /// let imp = Implementation::typed(|c: &Counter, _args, _generics| Ok(Value::of(c.0)));
    /// let instance: Instance = Arc::new(Counter(3));
    /// let result = imp.call(&instance, &mut [], &[]).unwrap();
    /// assert_eq!(result.get::<i32>(), Some(&3));
    /// ```
    pub fn typed<T, F>(body: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, &mut [Value], &[TypeRef]) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        Implementation::sync(move |instance, args, generics| {
            let this = instance
                .downcast_ref::<T>()
                .ok_or(CallError::InstanceType {
                    expected: std::any::type_name::<T>(),
                })?;
            body(this, args, generics)
        })
    }

    /// Wraps an untyped asynchronous body.
    pub fn asynchronous<F, Fut>(body: F) -> Self
    where
        F: Fn(Instance, Vec<Value>, Vec<TypeRef>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, CallError>> + Send + 'static,
    {
        Implementation::Async(Arc::new(move |instance, args, generics| {
            body(instance, args, generics).boxed()
        }))
    }

    /// Wraps an asynchronous body over a concrete instance type.
    pub fn typed_async<T, F, Fut>(body: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(Arc<T>, Vec<Value>, Vec<TypeRef>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, CallError>> + Send + 'static,
    {
        Implementation::Async(Arc::new(move |instance: Instance, args, generics| {
            match instance.downcast::<T>() {
                Ok(this) => body(this, args, generics).boxed(),
                Err(_) => futures::future::ready(Err(CallError::InstanceType {
                    expected: std::any::type_name::<T>(),
                }))
                .boxed(),
            }
        }))
    }

    /// Returns true for asynchronous bodies.
    pub fn is_async(&self) -> bool {
        matches!(self, Implementation::Async(_))
    }

    /// Runs a synchronous body.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::AsyncMismatch`] for asynchronous bodies.
    pub fn call(
        &self,
        instance: &Instance,
        args: &mut [Value],
        generics: &[TypeRef],
    ) -> Result<Value, CallError> {
        match self {
            Implementation::Sync(body) => body(instance, args, generics),
            Implementation::Async(_) => Err(CallError::AsyncMismatch {
                method: "<implementation>".to_string(),
                expected: "asynchronously",
            }),
        }
    }

    /// Runs either kind of body to a future. Synchronous bodies run before
    /// the future is returned.
    pub fn call_async(
        &self,
        instance: Instance,
        mut args: Vec<Value>,
        generics: Vec<TypeRef>,
    ) -> BoxFuture<'static, Result<Value, CallError>> {
        match self {
            Implementation::Async(body) => body(instance, args, generics),
            Implementation::Sync(body) => {
                futures::future::ready(body(&instance, &mut args, &generics)).boxed()
            }
        }
    }
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Implementation::Sync(_) => write!(f, "Implementation::Sync"),
            Implementation::Async(_) => write!(f, "Implementation::Async"),
        }
    }
}

/// Member visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Visible everywhere
    Public,
    /// Visible to derived types, proxies included
    Protected,
    /// Visible inside the declaring assembly; proxies are granted access
    Internal,
    /// Invisible to proxies
    Private,
}

impl Visibility {
    /// Returns true if a proxy can see the member.
    pub fn is_accessible(self) -> bool {
        !matches!(self, Visibility::Private)
    }
}

/// A method declared on a class.
#[derive(Debug, Clone)]
pub struct ClassMethod {
    sig: MethodSig,
    is_virtual: bool,
    is_final: bool,
    visibility: Visibility,
    implements: Option<Arc<str>>,
    implementation: Option<Implementation>,
}

impl ClassMethod {
    /// A public virtual method without a body (abstract).
    pub fn new(sig: MethodSig) -> Self {
        Self {
            sig,
            is_virtual: true,
            is_final: false,
            visibility: Visibility::Public,
            implements: None,
            implementation: None,
        }
    }

    /// Attaches the method body.
    pub fn implemented_by(mut self, implementation: Implementation) -> Self {
        self.implementation = Some(implementation);
        self
    }

    /// Marks the method non-virtual.
    pub fn non_virtual(mut self) -> Self {
        self.is_virtual = false;
        self
    }

    /// Marks the method as a final override.
    pub fn sealed(mut self) -> Self {
        self.is_final = true;
        self
    }

    /// Sets the visibility.
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Marks the method as the explicit implementation of `contract`'s
    /// operation with the same signature. Explicit implementations are not
    /// part of the class surface.
    pub fn explicit(mut self, contract: impl Into<Arc<str>>) -> Self {
        self.implements = Some(contract.into());
        self
    }

    /// Returns the signature.
    pub fn sig(&self) -> &MethodSig {
        &self.sig
    }

    /// Returns the method body, if any.
    pub fn implementation(&self) -> Option<&Implementation> {
        self.implementation.as_ref()
    }

    /// Returns the visibility.
    pub fn member_visibility(&self) -> Visibility {
        self.visibility
    }

    /// Returns the contract this method explicitly implements.
    pub fn explicit_contract(&self) -> Option<&str> {
        self.implements.as_deref()
    }

    /// Returns true if a proxy can override the method.
    pub fn is_overridable(&self) -> bool {
        self.is_virtual && !self.is_final && self.visibility.is_accessible()
    }
}

/// Creates the state of a class instance.
pub type ConstructorFn = Arc<dyn Fn() -> Instance + Send + Sync>;

/// A parameterless constructor.
#[derive(Clone)]
pub struct Constructor {
    visibility: Visibility,
    create: ConstructorFn,
}

impl Constructor {
    /// Returns the constructor visibility.
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Runs the constructor.
    pub fn create(&self) -> Instance {
        (self.create)()
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("visibility", &self.visibility)
            .finish_non_exhaustive()
    }
}

/// A class: the base of a class proxy, a concrete target or a mixin type.
///
/// Classes are identified by name.
#[derive(Debug)]
pub struct ClassType {
    name: Arc<str>,
    sealed: bool,
    constructor: Option<Constructor>,
    contracts: Vec<Arc<Contract>>,
    methods: Vec<ClassMethod>,
}

impl ClassType {
    /// Starts describing a class.
    ///
    /// ```
    /// use proxy_core::{ClassMethod, ClassType, Implementation, MethodSig, TypeRef, Value};
    ///
    /// #[derive(Default)]
    /// struct Clock;
    ///
    /// let clock = ClassType::builder("Clock")
    ///     .default_constructor::<Clock>()
    ///     .method(
    ///         ClassMethod::new(MethodSig::new("Now").returns(TypeRef::value_of::<u64>("ulong")))
    ///             .implemented_by(Implementation::typed(|_: &Clock, _, _| Ok(Value::of(0_u64)))),
    ///     )
    ///     .build();
    ///
    /// assert_eq!(clock.name(), "Clock");
    /// assert!(clock.constructor().is_some());
    /// ```
    pub fn builder(name: impl Into<Arc<str>>) -> ClassTypeBuilder {
        ClassTypeBuilder {
            class: ClassType {
                name: name.into(),
                sealed: false,
                constructor: None,
                contracts: Vec::new(),
                methods: Vec::new(),
            },
        }
    }

    /// Returns the class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    /// Returns true if the class cannot be extended.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Returns the parameterless constructor, if declared.
    pub fn constructor(&self) -> Option<&Constructor> {
        self.constructor.as_ref()
    }

    /// Returns the directly implemented contracts.
    pub fn contracts(&self) -> &[Arc<Contract>] {
        &self.contracts
    }

    /// Returns every implemented contract, parents included.
    pub fn all_contracts(&self) -> Vec<Arc<Contract>> {
        let mut out: Vec<Arc<Contract>> = Vec::new();
        for contract in &self.contracts {
            for c in contract.all_contracts() {
                if !out.iter().any(|seen| seen.name() == c.name()) {
                    out.push(c);
                }
            }
        }
        out
    }

    /// Returns the declared methods.
    pub fn methods(&self) -> &[ClassMethod] {
        &self.methods
    }

    /// Returns true if the class implements `contract`, directly or through
    /// a parent contract.
    pub fn implements(&self, contract: &str) -> bool {
        self.contracts.iter().any(|c| c.extends(contract))
    }

    /// Returns true if the class is itself a synthesized proxy.
    pub fn is_proxy_type(&self) -> bool {
        self.implements(TARGET_ACCESSOR)
    }
}

impl PartialEq for ClassType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ClassType {}

/// Builder returned by [`ClassType::builder`].
#[derive(Debug)]
pub struct ClassTypeBuilder {
    class: ClassType,
}

impl ClassTypeBuilder {
    /// Marks the class sealed.
    pub fn sealed(mut self) -> Self {
        self.class.sealed = true;
        self
    }

    /// Declares a parameterless constructor.
    pub fn constructor<F>(mut self, visibility: Visibility, create: F) -> Self
    where
        F: Fn() -> Instance + Send + Sync + 'static,
    {
        self.class.constructor = Some(Constructor {
            visibility,
            create: Arc::new(create),
        });
        self
    }

    /// Declares a public constructor producing `T::default()`.
    pub fn default_constructor<T: Default + Any + Send + Sync>(self) -> Self {
        self.constructor(Visibility::Public, || Arc::new(T::default()) as Instance)
    }

    /// Declares an implemented contract.
    pub fn implements(mut self, contract: &Arc<Contract>) -> Self {
        if !self.class.contracts.iter().any(|c| c.name() == contract.name()) {
            self.class.contracts.push(Arc::clone(contract));
        }
        self
    }

    /// Declares a method.
    pub fn method(mut self, method: ClassMethod) -> Self {
        self.class.methods.push(method);
        self
    }

    /// Finishes the description.
    pub fn build(self) -> Arc<ClassType> {
        Arc::new(self.class)
    }
}

/// A live object paired with its class description.
#[derive(Clone)]
pub struct Target {
    ty: Arc<ClassType>,
    instance: Instance,
}

impl Target {
    /// Pairs an existing instance with its class.
    pub fn new(ty: &Arc<ClassType>, instance: Instance) -> Self {
        Self {
            ty: Arc::clone(ty),
            instance,
        }
    }

    /// Boxes `value` as an instance of `ty`.
    pub fn of<T: Any + Send + Sync>(ty: &Arc<ClassType>, value: T) -> Self {
        Self::new(ty, Arc::new(value))
    }

    /// Returns the class description.
    pub fn ty(&self) -> &Arc<ClassType> {
        &self.ty
    }

    /// Returns the instance.
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Borrows the instance as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.instance.downcast_ref::<T>()
    }

    /// Returns true if both targets share the same instance.
    pub fn ptr_eq(&self, other: &Target) -> bool {
        Arc::ptr_eq(&self.instance, &other.instance)
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("ty", &self.ty.name())
            .finish_non_exhaustive()
    }
}

//! Run-time proxy synthesis and call interception.
//!
//! This crate builds proxies over described surfaces:
//! - **Contracts and classes**: [`Contract`] and [`ClassType`] describe what a
//!   proxy exposes and what it may forward to
//! - **Proxy types**: [`ProxyFactory`] lays every requested member out into an
//!   immutable [`ProxyType`], cached once per shape
//! - **Interception**: every intercepted call becomes an [`Invocation`] that
//!   walks the [`Interceptor`] chain before reaching the real implementation
//!
//! # Core Types
//!
//! - [`ProxyFactory`]: Synthesizes and caches proxy types
//! - [`GenerationOptions`]: Hook, selector, mixins and base type of a request
//! - [`ProxyType`]: The synthesized dispatch table, shared between proxies
//! - [`Proxy`]: A bound proxy instance, cheap to clone
//! - [`Invocation`]: The call context handed to interceptors
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use proxy_core::{
//!     CallError, ClassMethod, ClassType, GenerationOptions, Implementation, Interceptor,
//!     Invocation, MethodSig, ProxyFactory, TypeRef, Value,
//! };
//!
//! #[derive(Default)]
//! struct Calculator;
//!
//! let calculator = ClassType::builder("Calculator")
//!     .default_constructor::<Calculator>()
//!     .method(
//!         ClassMethod::new(MethodSig::new("Answer").returns(TypeRef::value_of::<i32>("int")))
//!             .implemented_by(Implementation::typed(|_: &Calculator, _, _| Ok(Value::of(41)))),
//!     )
//!     .build();
//!
//! // Adds one to whatever the base class answers
//! let plus_one: Arc<dyn Interceptor> = Arc::new(|invocation: &mut Invocation| -> Result<(), CallError> {
//!     invocation.proceed()?;
//!     let answer = invocation.return_value().get::<i32>().copied().unwrap_or_default();
//!     invocation.set_return_value(Value::of(answer + 1));
//!     Ok(())
//! });
//!
//! let factory = ProxyFactory::new();
//! let proxy = factory
//!     .create_class_proxy(&calculator, &[], &GenerationOptions::new(), &[plus_one])
//!     .expect("calculator can be proxied");
//!
//! let answer = proxy.invoke("Answer", &mut []).unwrap();
//! assert_eq!(answer.get::<i32>(), Some(&42));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod class;
mod contract;
mod contributor;
mod error;
mod factory;
mod generator;
mod interceptor;
mod invocation;
mod locator;
mod logging;
pub mod marshal;
mod model;
mod options;
mod proxy;
mod types;
mod value;

pub use cache::{BaseIdentity, ShapeKey, TypeCache};
pub use class::{
    AsyncImpl, ClassMethod, ClassType, ClassTypeBuilder, Constructor, ConstructorFn,
    Implementation, SyncImpl, Target, Visibility,
};
pub use contract::{
    Contract, ContractBuilder, EventSig, MethodSig, PropertySig, SERIALIZATION_MARKER,
    TARGET_ACCESSOR,
};
pub use error::{
    BaseTypeDefect, CallError, Error, Fault, GenerationError, InstantiationError, Result,
};
pub use factory::ProxyFactory;
pub use generator::{FieldInfo, FieldKind, InvocationType, ProxyKind};
pub use interceptor::{InterceptionSteps, Interceptor, StandardInterceptor};
pub use invocation::Invocation;
pub use locator::{ContractMapLocator, ImplementationLocator};
pub use model::MemberName;
pub use options::{
    AllMethodsHook, GenerationOptions, InterceptorSelector, MixinData, OptionsKey,
    ProxyGenerationHook,
};
pub use proxy::{Proxy, ProxyArgs, ProxyType};
pub use types::{Constraint, DefaultFn, GenericParam, ParamMode, Parameter, TypeKind, TypeRef};
pub use value::{Instance, Value};

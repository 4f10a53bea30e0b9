//! Call-context types: one per intercepted operation.

use std::fmt;
use std::sync::Arc;

use crate::class::{Implementation, Target};
use crate::contract::{Contract, MethodSig};
use crate::error::CallError;
use crate::locator::ImplementationLocator;
use crate::model::MemberName;
use crate::types::TypeRef;

/// What runs when the interceptor chain is exhausted.
#[derive(Debug, Clone)]
pub(crate) enum Callback {
    /// Nothing to forward to
    NoTarget,
    /// The base class leaves the operation abstract
    Unimplemented,
    /// Resolved while generating the proxy type
    Static(Implementation),
    /// Resolved against the current target on every call
    Located(Arc<Contract>),
}

/// Which object an invocation starts out targeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Binding {
    None,
    /// The proxy's own base-class state
    Base,
    /// The proxy's target slot
    Main,
    /// The mixin at this position
    Mixin(usize),
}

/// The synthesized call-context type of one intercepted operation.
///
/// It records the operation token (the open signature), how the call is
/// dispatched once every interceptor has proceeded, and whether the target
/// may be changed mid-call. Generic operations get one invocation type whose
/// closed instantiations are named per call, see [`closed_name`](Self::closed_name).
pub struct InvocationType {
    name: Arc<str>,
    member: MemberName,
    declaring: Arc<str>,
    method: MethodSig,
    callback: Callback,
    binding: Binding,
    slot_contract: Option<Arc<Contract>>,
}

impl InvocationType {
    pub(crate) fn new(
        name: Arc<str>,
        member: MemberName,
        declaring: Arc<str>,
        method: MethodSig,
        callback: Callback,
        binding: Binding,
    ) -> Self {
        Self {
            name,
            member,
            declaring,
            method,
            callback,
            binding,
            slot_contract: None,
        }
    }

    /// Lets interceptors replace the target with implementers of `contract`.
    pub(crate) fn changeable(mut self, contract: &Arc<Contract>) -> Self {
        self.slot_contract = Some(Arc::clone(contract));
        self
    }

    /// Returns the type name, unique within the factory.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name of the proxied member.
    pub fn member(&self) -> &MemberName {
        &self.member
    }

    /// Returns the contract or class declaring the operation.
    pub fn declaring_type(&self) -> &str {
        &self.declaring
    }

    /// Returns the open operation signature.
    pub fn method(&self) -> &MethodSig {
        &self.method
    }

    /// Returns the number of generic parameters mirrored from the operation.
    pub fn generic_arity(&self) -> usize {
        self.method.generic_arity()
    }

    /// Returns true for task-returning operations.
    pub fn is_async(&self) -> bool {
        self.method.is_async()
    }

    /// Returns true if interceptors may change the call's target.
    pub fn can_change_target(&self) -> bool {
        self.slot_contract.is_some()
    }

    /// Returns the contract replacement targets must implement.
    pub fn target_contract(&self) -> Option<&Arc<Contract>> {
        self.slot_contract.as_ref()
    }

    /// Names the instantiation closed over `type_args`.
    ///
    /// ```
    /// # use proxy_core::{ClassType, Contract, GenerationOptions, GenericParam, MethodSig, ProxyFactory, TypeRef};
    /// let repo = Contract::builder("IRepo")
    ///     .method(
    ///         MethodSig::new("Find")
    ///             .generic(GenericParam::new("T"))
    ///             .returns(TypeRef::generic(0, "T")),
    ///     )
    ///     .build();
    /// let factory = ProxyFactory::new();
    /// let ty = factory
    ///     .create_contract_proxy_type_without_target(&repo, &[], &GenerationOptions::new())
    ///     .unwrap();
    /// let find = ty.invocation_types().next().unwrap();
    /// assert_eq!(find.name(), "Invocations.IRepo_Find");
    /// assert_eq!(find.closed_name(&[TypeRef::reference("string")]), "Invocations.IRepo_Find<string>");
    /// ```
    pub fn closed_name(&self, type_args: &[TypeRef]) -> String {
        if type_args.is_empty() {
            return self.name.to_string();
        }
        let args: Vec<&str> = type_args.iter().map(TypeRef::name).collect();
        format!("{}<{}>", self.name, args.join(", "))
    }

    pub(crate) fn binding(&self) -> Binding {
        self.binding
    }

    /// Finds the implementation to run on `target` once the chain is exhausted.
    pub(crate) fn resolve(
        &self,
        target: Option<&Target>,
        locator: &dyn ImplementationLocator,
    ) -> Result<Implementation, CallError> {
        let no_target = || CallError::NoTarget {
            method: self.member.to_string(),
        };
        match &self.callback {
            Callback::NoTarget => Err(no_target()),
            Callback::Unimplemented => Err(CallError::Unimplemented {
                target: self.declaring.to_string(),
                method: self.member.to_string(),
            }),
            Callback::Static(implementation) => {
                target.ok_or_else(no_target)?;
                Ok(implementation.clone())
            }
            Callback::Located(contract) => {
                let target = target.ok_or_else(no_target)?;
                locator
                    .locate(contract, &self.method, target.ty())
                    .ok_or_else(|| CallError::Unimplemented {
                        target: target.ty().name().to_string(),
                        method: self.member.to_string(),
                    })
            }
        }
    }
}

impl fmt::Debug for InvocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationType")
            .field("name", &self.name)
            .field("member", &self.member.to_string())
            .field("callback", &self.callback)
            .field("can_change_target", &self.can_change_target())
            .finish()
    }
}

//! Member bodies of a synthesized proxy type.

use std::fmt;
use std::sync::Arc;

use crate::class::Implementation;
use crate::contract::{Contract, MethodSig};
use crate::error::GenerationError;
use crate::generator::emitter::TypeEmitter;
use crate::generator::invocation_type::{Binding, Callback, InvocationType};
use crate::model::{MemberName, MetaMethod};

/// Operations of the target-accessor contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InfrastructureOp {
    GetTarget,
    SetTarget,
    GetInterceptors,
}

impl InfrastructureOp {
    pub(crate) fn for_method(name: &str) -> Option<Self> {
        match name {
            "DynProxyGetTarget" => Some(InfrastructureOp::GetTarget),
            "DynProxySetTarget" => Some(InfrastructureOp::SetTarget),
            "GetInterceptors" => Some(InfrastructureOp::GetInterceptors),
            _ => None,
        }
    }
}

/// How a member slot runs.
#[derive(Clone)]
pub(crate) enum MethodBody {
    /// Builds an invocation and walks the interceptor chain
    Intercepted(Arc<InvocationType>),
    /// Calls the implementation directly, bypassing interceptors
    Forwarding {
        binding: Binding,
        implementation: Implementation,
    },
    /// Forwards to the current target if one is bound, else returns defaults
    OptionallyForwarding(Arc<Contract>),
    /// Returns defaults without forwarding anywhere
    Minimalistic,
    Infrastructure(InfrastructureOp),
}

impl MethodBody {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            MethodBody::Intercepted(ty) if ty.is_async() => "intercepted-async",
            MethodBody::Intercepted(_) => "intercepted",
            MethodBody::Forwarding { .. } => "forwarding",
            MethodBody::OptionallyForwarding(_) => "optionally-forwarding",
            MethodBody::Minimalistic => "minimalistic",
            MethodBody::Infrastructure(_) => "infrastructure",
        }
    }
}

impl fmt::Debug for MethodBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodBody::Intercepted(ty) => write!(f, "Intercepted({})", ty.name()),
            MethodBody::Forwarding { binding, .. } => write!(f, "Forwarding({:?})", binding),
            MethodBody::OptionallyForwarding(contract) => {
                write!(f, "OptionallyForwarding({})", contract.name())
            }
            MethodBody::Minimalistic => write!(f, "Minimalistic"),
            MethodBody::Infrastructure(op) => write!(f, "Infrastructure({:?})", op),
        }
    }
}

/// One member of a synthesized proxy type.
#[derive(Debug, Clone)]
pub(crate) struct MemberSlot {
    pub(crate) name: MemberName,
    pub(crate) sig: MethodSig,
    pub(crate) declaring: Arc<str>,
    pub(crate) body: MethodBody,
}

fn check_async(member: &MetaMethod) -> Result<(), GenerationError> {
    if member.sig.is_async() && member.sig.has_by_ref_params() {
        return Err(GenerationError::ByRefInAsync {
            method: member.name.to_string(),
        });
    }
    Ok(())
}

impl TypeEmitter<'_> {
    fn push_slot(&mut self, member: &MetaMethod, body: MethodBody) {
        self.log.trace(format_args!(
            "member `{}` emitted as {}",
            member.name,
            body.kind_name()
        ));
        self.slots.push(MemberSlot {
            name: member.name.clone(),
            sig: member.sig.clone(),
            declaring: Arc::clone(member.declaring.name()),
            body,
        });
    }

    /// Emits an intercepted member and its call-context type. `changeable`
    /// names the contract replacement targets must implement.
    pub(crate) fn emit_intercepted(
        &mut self,
        member: &MetaMethod,
        callback: Callback,
        binding: Binding,
        changeable: Option<&Arc<Contract>>,
    ) -> Result<(), GenerationError> {
        check_async(member)?;
        let name = self.invocation_name(member.declaring.name(), member.sig.name());
        let mut ty = InvocationType::new(
            name,
            member.name.clone(),
            Arc::clone(member.declaring.name()),
            member.sig.clone(),
            callback,
            binding,
        );
        if let Some(contract) = changeable {
            ty = ty.changeable(contract);
        }
        let ty = Arc::new(ty);
        self.invocation_types.push(Arc::clone(&ty));
        self.push_slot(member, MethodBody::Intercepted(ty));
        Ok(())
    }

    /// Emits a member that calls `implementation` directly.
    pub(crate) fn emit_forwarding(
        &mut self,
        member: &MetaMethod,
        binding: Binding,
        implementation: Implementation,
    ) -> Result<(), GenerationError> {
        check_async(member)?;
        self.push_slot(
            member,
            MethodBody::Forwarding {
                binding,
                implementation,
            },
        );
        Ok(())
    }

    /// Emits a member forwarding to the swappable target when one is bound.
    pub(crate) fn emit_optionally_forwarding(
        &mut self,
        member: &MetaMethod,
        contract: &Arc<Contract>,
    ) -> Result<(), GenerationError> {
        check_async(member)?;
        self.push_slot(member, MethodBody::OptionallyForwarding(Arc::clone(contract)));
        Ok(())
    }

    /// Emits a member that only produces defaults.
    pub(crate) fn emit_minimalistic(&mut self, member: &MetaMethod) -> Result<(), GenerationError> {
        check_async(member)?;
        self.push_slot(member, MethodBody::Minimalistic);
        Ok(())
    }

    pub(crate) fn emit_infrastructure(&mut self, member: &MetaMethod, op: InfrastructureOp) {
        self.push_slot(member, MethodBody::Infrastructure(op));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::emitter::NamingScope;
    use crate::logging::GenerationLog;
    use crate::types::{Parameter, TypeRef};

    fn with_emitter(test: impl FnOnce(&mut TypeEmitter<'_>)) {
        let scope = NamingScope::new();
        let proxy: Arc<str> = Arc::from("Proxies.IStoreProxy");
        let mut emitter = TypeEmitter::new(&proxy, &scope, GenerationLog::new("Proxies.IStoreProxy"));
        test(&mut emitter);
    }

    fn member(sig: MethodSig) -> MetaMethod {
        MetaMethod::on_contract(&Arc::from("IStore"), sig, 0)
    }

    #[test]
    fn by_ref_parameters_are_rejected_on_async_members() {
        with_emitter(|emitter| {
            let sig = MethodSig::new("LoadAsync")
                .param(Parameter::by_ref("count", TypeRef::value_of::<i32>("int")))
                .returns(TypeRef::task());
            let err = emitter
                .emit_intercepted(&member(sig), Callback::NoTarget, Binding::None, None)
                .unwrap_err();
            assert_eq!(
                err,
                GenerationError::ByRefInAsync {
                    method: "LoadAsync".to_string()
                }
            );
            assert!(emitter.slots.is_empty());
        });
    }

    #[test]
    fn intercepted_members_get_their_own_invocation_type() {
        with_emitter(|emitter| {
            emitter
                .emit_intercepted(&member(MethodSig::new("Load")), Callback::NoTarget, Binding::None, None)
                .unwrap();
            emitter.emit_minimalistic(&member(MethodSig::new("Flush"))).unwrap();

            assert_eq!(emitter.invocation_types.len(), 1);
            assert_eq!(emitter.invocation_types[0].name(), "Invocations.IStore_Load");
            assert_eq!(emitter.slots[1].body.kind_name(), "minimalistic");
        });
    }

    #[test]
    fn accessor_operations_are_recognised() {
        assert_eq!(
            InfrastructureOp::for_method("DynProxySetTarget"),
            Some(InfrastructureOp::SetTarget)
        );
        assert_eq!(InfrastructureOp::for_method("Run"), None);
    }
}

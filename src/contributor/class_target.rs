use std::sync::Arc;

use crate::class::ClassType;
use crate::contract::Contract;
use crate::contributor::{collect_contract, find_contract, Contributor};
use crate::error::GenerationError;
use crate::generator::emitter::TypeEmitter;
use crate::generator::invocation_type::{Binding, Callback};
use crate::locator::ImplementationLocator;
use crate::model::{MetaMethod, MetaType};
use crate::options::ProxyGenerationHook;

/// Serves the members of the base class, and the contracts the base class
/// implements, for class proxies.
///
/// Overridable methods run on `binding` (the proxy's own base state, or the
/// held target). Methods that cannot be overridden always run on the base
/// state.
pub(crate) struct ClassTargetContributor {
    class: Arc<ClassType>,
    contracts: Vec<Arc<Contract>>,
    binding: Binding,
    locator: Arc<dyn ImplementationLocator>,
}

impl ClassTargetContributor {
    pub(crate) fn new(
        class: &Arc<ClassType>,
        contracts: Vec<Arc<Contract>>,
        binding: Binding,
        locator: &Arc<dyn ImplementationLocator>,
    ) -> Self {
        Self {
            class: Arc::clone(class),
            contracts,
            binding,
            locator: Arc::clone(locator),
        }
    }

    fn emit_class_member(
        &self,
        member: &MetaMethod,
        emitter: &mut TypeEmitter<'_>,
    ) -> Result<(), GenerationError> {
        let implementation = member
            .class_method
            .as_ref()
            .and_then(|m| m.implementation())
            .cloned();
        if member.proxyable {
            let callback = implementation.map_or(Callback::Unimplemented, Callback::Static);
            return emitter.emit_intercepted(member, callback, self.binding, None);
        }
        let binding = if member.is_overridable_class_member() {
            self.binding
        } else {
            Binding::Base
        };
        match implementation {
            Some(implementation) => emitter.emit_forwarding(member, binding, implementation),
            None => emitter.emit_minimalistic(member),
        }
    }

    fn emit_contract_member(
        &self,
        member: &MetaMethod,
        emitter: &mut TypeEmitter<'_>,
    ) -> Result<(), GenerationError> {
        let contract = find_contract(&self.contracts, member)?;
        let implementation = self.locator.locate(contract, &member.sig, &self.class);
        match (member.proxyable, implementation) {
            (true, implementation) => {
                let callback = implementation.map_or(Callback::Unimplemented, Callback::Static);
                emitter.emit_intercepted(member, callback, self.binding, None)
            }
            (false, Some(implementation)) => {
                emitter.emit_forwarding(member, self.binding, implementation)
            }
            (false, None) => emitter.emit_minimalistic(member),
        }
    }
}

impl Contributor for ClassTargetContributor {
    fn label(&self) -> &'static str {
        "class target"
    }

    fn contracts(&self) -> Vec<Arc<Contract>> {
        self.contracts.clone()
    }

    fn collect(
        &self,
        owner: usize,
        hook: &dyn ProxyGenerationHook,
        meta: &mut MetaType,
    ) -> Result<(), GenerationError> {
        let class = self.class.name_arc();
        for method in self.class.methods() {
            if method.explicit_contract().is_some() || !method.member_visibility().is_accessible() {
                continue;
            }
            let proxyable = if method.is_overridable() {
                hook.should_intercept(class, method.sig())
            } else {
                hook.non_proxyable_member(class, method.sig());
                false
            };
            meta.add_method(MetaMethod::on_class(class, method, owner).proxyable(proxyable))?;
        }
        for contract in &self.contracts {
            collect_contract(contract, owner, Some(hook), meta)?;
        }
        Ok(())
    }

    fn emit(
        &self,
        owner: usize,
        meta: &MetaType,
        emitter: &mut TypeEmitter<'_>,
    ) -> Result<(), GenerationError> {
        for member in meta.methods_of(owner) {
            if member.class_method.is_some() {
                self.emit_class_member(member, emitter)?;
            } else {
                self.emit_contract_member(member, emitter)?;
            }
        }
        Ok(())
    }
}

use std::sync::Arc;

use crate::class::ClassType;
use crate::contract::Contract;
use crate::contributor::{collect_contract, find_contract, Contributor};
use crate::error::GenerationError;
use crate::generator::emitter::TypeEmitter;
use crate::generator::invocation_type::{Binding, Callback};
use crate::locator::ImplementationLocator;
use crate::model::MetaType;
use crate::options::ProxyGenerationHook;

/// How the target of a contract proxy is held.
pub(crate) enum TargetSlot {
    /// A target of this class, bound once at instantiation
    Fixed(Arc<ClassType>),
    /// Any implementer of this contract, replaceable at run time
    Swappable(Arc<Contract>),
}

/// Forwards contract members to the proxy's target.
pub(crate) struct ContractTargetContributor {
    contracts: Vec<Arc<Contract>>,
    slot: TargetSlot,
    locator: Arc<dyn ImplementationLocator>,
}

impl ContractTargetContributor {
    pub(crate) fn new(
        contracts: Vec<Arc<Contract>>,
        slot: TargetSlot,
        locator: &Arc<dyn ImplementationLocator>,
    ) -> Self {
        Self {
            contracts,
            slot,
            locator: Arc::clone(locator),
        }
    }
}

impl Contributor for ContractTargetContributor {
    fn label(&self) -> &'static str {
        match self.slot {
            TargetSlot::Fixed(_) => "contract target",
            TargetSlot::Swappable(_) => "swappable contract target",
        }
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
            let contract = find_contract(&self.contracts, member)?;
            match &self.slot {
                TargetSlot::Fixed(class) => {
                    let implementation = self
                        .locator
                        .locate(contract, &member.sig, class)
                        .ok_or_else(|| GenerationError::UnresolvedImplementation {
                            target: class.name().to_string(),
                            contract: contract.name().to_string(),
                            method: member.sig.name().to_string(),
                        })?;
                    if member.proxyable {
                        emitter.emit_intercepted(
                            member,
                            Callback::Static(implementation),
                            Binding::Main,
                            None,
                        )?;
                    } else {
                        emitter.emit_forwarding(member, Binding::Main, implementation)?;
                    }
                }
                TargetSlot::Swappable(primary) => {
                    if member.proxyable {
                        emitter.emit_intercepted(
                            member,
                            Callback::Located(Arc::clone(contract)),
                            Binding::Main,
                            Some(primary),
                        )?;
                    } else {
                        emitter.emit_optionally_forwarding(member, contract)?;
                    }
                }
            }
        }
        Ok(())
    }
}

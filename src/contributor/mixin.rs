use std::sync::Arc;

use crate::contract::Contract;
use crate::contributor::{collect_contract, find_contract, Contributor};
use crate::error::GenerationError;
use crate::generator::emitter::TypeEmitter;
use crate::generator::invocation_type::{Binding, Callback};
use crate::locator::ImplementationLocator;
use crate::model::MetaType;
use crate::options::{MixinData, ProxyGenerationHook};

/// Weaves mixin contracts into the proxy, each forwarding to the mixin
/// instance that provides it.
pub(crate) struct MixinContributor {
    contracts: Vec<Arc<Contract>>,
    mixins: MixinData,
    locator: Arc<dyn ImplementationLocator>,
}

impl MixinContributor {
    pub(crate) fn new(
        contracts: Vec<Arc<Contract>>,
        mixins: &MixinData,
        locator: &Arc<dyn ImplementationLocator>,
    ) -> Self {
        Self {
            contracts,
            mixins: mixins.clone(),
            locator: Arc::clone(locator),
        }
    }
}

impl Contributor for MixinContributor {
    fn label(&self) -> &'static str {
        "mixin"
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
            let position = self.mixins.mixin_position(contract.name()).ok_or_else(|| {
                GenerationError::MalformedRequest(format!(
                    "no mixin provides contract `{}`",
                    contract.name()
                ))
            })?;
            let mixin = self.mixins.mixins()[position].ty();
            let implementation = self
                .locator
                .locate(contract, &member.sig, mixin)
                .ok_or_else(|| GenerationError::UnresolvedImplementation {
                    target: mixin.name().to_string(),
                    contract: contract.name().to_string(),
                    method: member.sig.name().to_string(),
                })?;
            if member.proxyable {
                emitter.emit_intercepted(
                    member,
                    Callback::Static(implementation),
                    Binding::Mixin(position),
                    None,
                )?;
            } else {
                emitter.emit_forwarding(member, Binding::Mixin(position), implementation)?;
            }
        }
        Ok(())
    }
}

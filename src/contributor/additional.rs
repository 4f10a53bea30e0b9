use std::sync::Arc;

use crate::contract::Contract;
use crate::contributor::{collect_contract, Contributor};
use crate::error::GenerationError;
use crate::generator::emitter::TypeEmitter;
use crate::generator::invocation_type::{Binding, Callback};
use crate::model::MetaType;
use crate::options::ProxyGenerationHook;

/// Implements contracts nothing backs: intercepted members fail with
/// `NoTarget` unless an interceptor answers them, and excluded members
/// return defaults.
pub(crate) struct AdditionalContractsContributor {
    contracts: Vec<Arc<Contract>>,
}

impl AdditionalContractsContributor {
    pub(crate) fn new(contracts: Vec<Arc<Contract>>) -> Self {
        Self { contracts }
    }
}

impl Contributor for AdditionalContractsContributor {
    fn label(&self) -> &'static str {
        "additional contracts"
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
            if member.proxyable {
                emitter.emit_intercepted(member, Callback::NoTarget, Binding::None, None)?;
            } else {
                emitter.emit_minimalistic(member)?;
            }
        }
        Ok(())
    }
}

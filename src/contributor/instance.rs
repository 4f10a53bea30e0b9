use std::sync::Arc;

use crate::contract::Contract;
use crate::contributor::{collect_contract, Contributor};
use crate::error::GenerationError;
use crate::generator::emitter::TypeEmitter;
use crate::generator::method_body::InfrastructureOp;
use crate::model::MetaType;
use crate::options::ProxyGenerationHook;

/// Implements the target accessor and the serialization marker. Its members
/// are never intercepted and never shown to the hook.
pub(crate) struct InstanceContributor {
    contracts: Vec<Arc<Contract>>,
}

impl InstanceContributor {
    pub(crate) fn new() -> Self {
        Self {
            contracts: vec![Contract::target_accessor(), Contract::serialization_marker()],
        }
    }
}

impl Contributor for InstanceContributor {
    fn label(&self) -> &'static str {
        "instance infrastructure"
    }

    fn contracts(&self) -> Vec<Arc<Contract>> {
        self.contracts.clone()
    }

    fn collect(
        &self,
        owner: usize,
        _hook: &dyn ProxyGenerationHook,
        meta: &mut MetaType,
    ) -> Result<(), GenerationError> {
        for contract in &self.contracts {
            collect_contract(contract, owner, None, meta)?;
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
            match InfrastructureOp::for_method(member.sig.name()) {
                Some(op) => emitter.emit_infrastructure(member, op),
                None => emitter.emit_minimalistic(member)?,
            }
        }
        Ok(())
    }
}

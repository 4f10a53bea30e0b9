use std::sync::Arc;

use crate::contributor::{
    flatten, map_contracts, ContractMap, ContractTargetContributor, Contributor, TargetSlot,
};
use crate::error::GenerationError;
use crate::generator::{GenerationRequest, ProxyStrategy};
use crate::locator::ImplementationLocator;
use crate::options::MixinData;

/// Implements contracts over a target slot typed to the primary contract.
/// The slot can be rebound while the proxy lives, so implementations are
/// located on whatever target is current when the call is made.
pub(crate) struct ContractProxyWithTargetContract;

impl ProxyStrategy for ContractProxyWithTargetContract {
    fn validate(&self, request: &GenerationRequest<'_>) -> Result<(), GenerationError> {
        request.require_primary().map(|_| ())
    }

    fn map_contracts(
        &self,
        request: &GenerationRequest<'_>,
        mixins: &MixinData,
    ) -> Result<ContractMap, GenerationError> {
        let primary = std::slice::from_ref(request.require_primary()?);
        map_contracts(primary, &flatten(primary), request.additional, mixins)
    }

    fn target_contributor(
        &self,
        request: &GenerationRequest<'_>,
        map: &ContractMap,
        locator: &Arc<dyn ImplementationLocator>,
    ) -> Result<Box<dyn Contributor>, GenerationError> {
        let primary = request.require_primary()?;
        Ok(Box::new(ContractTargetContributor::new(
            map.target.clone(),
            TargetSlot::Swappable(Arc::clone(primary)),
            locator,
        )))
    }
}

use std::sync::Arc;

use crate::contributor::{
    flatten, map_contracts, AdditionalContractsContributor, ContractMap, Contributor,
};
use crate::error::GenerationError;
use crate::generator::{GenerationRequest, ProxyStrategy};
use crate::locator::ImplementationLocator;
use crate::options::MixinData;

/// Implements contracts with nothing behind them. Every call must be
/// answered by an interceptor; proceeding to the end of the chain fails.
pub(crate) struct ContractProxyWithoutTarget;

impl ProxyStrategy for ContractProxyWithoutTarget {
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
        _request: &GenerationRequest<'_>,
        map: &ContractMap,
        _locator: &Arc<dyn ImplementationLocator>,
    ) -> Result<Box<dyn Contributor>, GenerationError> {
        Ok(Box::new(AdditionalContractsContributor::new(map.target.clone())))
    }
}

use std::sync::Arc;

use crate::class::ClassType;
use crate::contributor::{
    flatten, map_contracts, ContractMap, ContractTargetContributor, Contributor, TargetSlot,
};
use crate::error::GenerationError;
use crate::generator::{GenerationRequest, ProxyStrategy};
use crate::locator::ImplementationLocator;
use crate::options::MixinData;

/// Implements contracts over a target of a fixed class. Implementations are
/// resolved on that class while generating, so a missing one fails the
/// request rather than the call.
pub(crate) struct ContractProxyWithTarget;

impl ContractProxyWithTarget {
    fn target_type<'r>(
        request: &GenerationRequest<'r>,
    ) -> Result<&'r Arc<ClassType>, GenerationError> {
        request.target_type.ok_or_else(|| {
            GenerationError::MalformedRequest(
                "contract proxies with a target need a target type".to_string(),
            )
        })
    }
}

impl ProxyStrategy for ContractProxyWithTarget {
    fn validate(&self, request: &GenerationRequest<'_>) -> Result<(), GenerationError> {
        let primary = request.require_primary()?;
        let target = Self::target_type(request)?;
        if !target.implements(primary.name()) {
            return Err(GenerationError::MalformedRequest(format!(
                "target type `{}` does not implement `{}`",
                target.name(),
                primary.name()
            )));
        }
        Ok(())
    }

    fn map_contracts(
        &self,
        request: &GenerationRequest<'_>,
        mixins: &MixinData,
    ) -> Result<ContractMap, GenerationError> {
        let primary = std::slice::from_ref(request.require_primary()?);
        let mut provided = Self::target_type(request)?.all_contracts();
        provided.extend(flatten(primary));
        map_contracts(primary, &provided, request.additional, mixins)
    }

    fn target_contributor(
        &self,
        request: &GenerationRequest<'_>,
        map: &ContractMap,
        locator: &Arc<dyn ImplementationLocator>,
    ) -> Result<Box<dyn Contributor>, GenerationError> {
        let target = Self::target_type(request)?;
        Ok(Box::new(ContractTargetContributor::new(
            map.target.clone(),
            TargetSlot::Fixed(Arc::clone(target)),
            locator,
        )))
    }
}

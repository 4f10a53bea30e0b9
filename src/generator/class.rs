use std::sync::Arc;

use crate::contributor::{map_contracts, ClassTargetContributor, ContractMap, Contributor};
use crate::error::GenerationError;
use crate::generator::invocation_type::Binding;
use crate::generator::{validate_base_type, GenerationRequest, ProxyStrategy};
use crate::locator::ImplementationLocator;
use crate::options::MixinData;

/// Extends a base class. Proceeding runs the base implementation on the
/// proxy's own base state.
pub(crate) struct ClassProxy;

impl ProxyStrategy for ClassProxy {
    fn validate(&self, request: &GenerationRequest<'_>) -> Result<(), GenerationError> {
        validate_base_type(request.require_base()?)
    }

    fn map_contracts(
        &self,
        request: &GenerationRequest<'_>,
        mixins: &MixinData,
    ) -> Result<ContractMap, GenerationError> {
        let base = request.require_base()?;
        map_contracts(&[], &base.all_contracts(), request.additional, mixins)
    }

    fn target_contributor(
        &self,
        request: &GenerationRequest<'_>,
        map: &ContractMap,
        locator: &Arc<dyn ImplementationLocator>,
    ) -> Result<Box<dyn Contributor>, GenerationError> {
        Ok(Box::new(ClassTargetContributor::new(
            request.require_base()?,
            map.target.clone(),
            Binding::Base,
            locator,
        )))
    }
}

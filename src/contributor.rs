//! Contributors claim the members of a proxy type and emit their bodies.
//!
//! The generator runs contributors in a fixed order: the target (or base
//! class) first, then mixins, then additional contracts, then the engine's
//! own infrastructure. The order decides ownership when a contract could be
//! served by more than one of them.

mod additional;
mod class_target;
mod contract_target;
mod instance;
mod mixin;

use std::sync::Arc;

use crate::contract::{Contract, MethodSig};
use crate::error::GenerationError;
use crate::generator::emitter::TypeEmitter;
use crate::model::{MemberName, MetaEvent, MetaMethod, MetaProperty, MetaType};
use crate::options::{MixinData, ProxyGenerationHook};

pub(crate) use additional::AdditionalContractsContributor;
pub(crate) use class_target::ClassTargetContributor;
pub(crate) use contract_target::{ContractTargetContributor, TargetSlot};
pub(crate) use instance::InstanceContributor;
pub(crate) use mixin::MixinContributor;

/// A participant in proxy type generation.
pub(crate) trait Contributor {
    /// Short label used in logs.
    fn label(&self) -> &'static str;

    /// Contracts the proxy type implements through this contributor.
    fn contracts(&self) -> Vec<Arc<Contract>>;

    /// Adds the contributor's members to `meta`, tagged with `owner`.
    fn collect(
        &self,
        owner: usize,
        hook: &dyn ProxyGenerationHook,
        meta: &mut MetaType,
    ) -> Result<(), GenerationError>;

    /// Emits a body for every member tagged with `owner`.
    fn emit(
        &self,
        owner: usize,
        meta: &MetaType,
        emitter: &mut TypeEmitter<'_>,
    ) -> Result<(), GenerationError>;
}

/// Flattens contracts with their parents, keeping the first occurrence.
pub(crate) fn flatten(contracts: &[Arc<Contract>]) -> Vec<Arc<Contract>> {
    let mut out: Vec<Arc<Contract>> = Vec::new();
    for contract in contracts {
        for c in contract.all_contracts() {
            if !out.iter().any(|seen| seen.name() == c.name()) {
                out.push(c);
            }
        }
    }
    out
}

fn contains(contracts: &[Arc<Contract>], name: &str) -> bool {
    contracts.iter().any(|c| c.name() == name)
}

/// Which contributor serves each contract of a request.
#[derive(Debug, Default)]
pub(crate) struct ContractMap {
    pub(crate) target: Vec<Arc<Contract>>,
    pub(crate) mixins: Vec<Arc<Contract>>,
    /// Mixin contracts the target already provides; implemented, never woven
    pub(crate) empty: Vec<Arc<Contract>>,
    pub(crate) additional: Vec<Arc<Contract>>,
}

impl ContractMap {
    fn is_mapped(&self, name: &str) -> bool {
        contains(&self.target, name) || contains(&self.mixins, name) || contains(&self.additional, name)
    }
}

/// Assigns contracts to contributors.
///
/// `primary` contracts always go to the target. `provided` lists what the
/// target implements: those contracts are forwarded to it when requested
/// as additional contracts, and are never woven from a mixin. A contract
/// requested both as a mixin and as an additional contract is owned by the
/// mixin.
pub(crate) fn map_contracts(
    primary: &[Arc<Contract>],
    provided: &[Arc<Contract>],
    additional: &[Arc<Contract>],
    mixins: &MixinData,
) -> Result<ContractMap, GenerationError> {
    let primary = flatten(primary);
    let additional = flatten(additional);

    if let Some(infra) = primary
        .iter()
        .chain(&additional)
        .chain(mixins.contracts())
        .find(|c| c.is_infrastructure())
    {
        return Err(GenerationError::MalformedRequest(format!(
            "contract `{}` belongs to the proxy infrastructure and cannot be proxied; is the request proxying a proxy?",
            infra.name()
        )));
    }

    let mut map = ContractMap::default();
    for contract in &primary {
        map.target.push(Arc::clone(contract));
    }
    for contract in &additional {
        if contains(provided, contract.name()) && !map.is_mapped(contract.name()) {
            map.target.push(Arc::clone(contract));
        }
    }
    for contract in mixins.contracts() {
        if contains(provided, contract.name()) || contains(&map.target, contract.name()) {
            map.empty.push(Arc::clone(contract));
        } else if !map.is_mapped(contract.name()) {
            map.mixins.push(Arc::clone(contract));
        }
    }
    for contract in &additional {
        if !map.is_mapped(contract.name()) && !mixins.contains(contract.name()) {
            map.additional.push(Arc::clone(contract));
        }
    }
    Ok(map)
}

/// Adds the properties, events and methods of `contract` to `meta`.
///
/// Without a hook the members are recorded as not proxyable.
pub(crate) fn collect_contract(
    contract: &Arc<Contract>,
    owner: usize,
    hook: Option<&dyn ProxyGenerationHook>,
    meta: &mut MetaType,
) -> Result<(), GenerationError> {
    let declaring = contract.name_arc();
    let intercept = |sig: &MethodSig| hook.is_some_and(|h| h.should_intercept(declaring, sig));
    let accessor = |sig: MethodSig| {
        let proxyable = intercept(&sig);
        MetaMethod::on_contract(declaring, sig, owner).proxyable(proxyable)
    };

    for property in contract.properties() {
        meta.add_property(MetaProperty {
            name: MemberName::Plain(Arc::from(property.name())),
            sig: property.clone(),
            declaring: Arc::clone(declaring),
            getter: property.getter().map(accessor),
            setter: property.setter().map(accessor),
        })?;
    }
    for event in contract.events() {
        meta.add_event(MetaEvent {
            name: MemberName::Plain(Arc::from(event.name())),
            sig: event.clone(),
            declaring: Arc::clone(declaring),
            adder: accessor(event.adder()),
            remover: accessor(event.remover()),
        })?;
    }
    for sig in contract.methods() {
        let proxyable = intercept(sig);
        meta.add_method(MetaMethod::on_contract(declaring, sig.clone(), owner).proxyable(proxyable))?;
    }
    Ok(())
}

pub(crate) fn find_contract<'c>(
    contracts: &'c [Arc<Contract>],
    member: &MetaMethod,
) -> Result<&'c Arc<Contract>, GenerationError> {
    contracts
        .iter()
        .find(|c| c.name() == member.declaring.name().as_ref())
        .ok_or_else(|| {
            GenerationError::MalformedRequest(format!(
                "member `{}` is not declared by any contract of its contributor",
                member.name
            ))
        })
}

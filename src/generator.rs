//! Proxy type generation.
//!
//! Every proxy kind runs the same skeleton: validate the request, map its
//! contracts to contributors, collect the member model, emit the fields,
//! emit every member through its contributor, and assemble the immutable
//! [`ProxyType`]. The kinds differ only in validation, contract mapping and
//! the contributor that serves the target.

mod class;
mod class_with_target;
mod contract_with_target;
mod contract_with_target_contract;
mod contract_without_target;
pub(crate) mod emitter;
pub(crate) mod invocation_type;
pub(crate) mod method_body;

use std::sync::Arc;

use crate::class::ClassType;
use crate::contract::Contract;
use crate::contributor::{
    AdditionalContractsContributor, ContractMap, Contributor, InstanceContributor, MixinContributor,
};
use crate::error::{BaseTypeDefect, GenerationError};
use crate::locator::ImplementationLocator;
use crate::logging::GenerationLog;
use crate::model::MetaType;
use crate::options::{GenerationOptions, MixinData};
use crate::proxy::ProxyType;

use self::emitter::{NamingScope, TypeEmitter};

pub use self::emitter::{FieldInfo, FieldKind};
pub use self::invocation_type::InvocationType;

/// The dispatch strategy of a proxy type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyKind {
    /// Extends a class; calls proceed to the proxy's own base state
    Class,
    /// Extends a class and forwards to a held target of that class
    ClassWithTarget,
    /// Implements contracts and forwards to a held target of a fixed class
    ContractWithTarget,
    /// Implements contracts and forwards to a replaceable target
    ContractWithTargetContract,
    /// Implements contracts with nothing to forward to
    ContractWithoutTarget,
}

impl ProxyKind {
    /// Returns true for kinds that hold a target.
    pub fn has_target(self) -> bool {
        matches!(
            self,
            ProxyKind::ClassWithTarget
                | ProxyKind::ContractWithTarget
                | ProxyKind::ContractWithTargetContract
        )
    }

    /// Returns true if the target may be replaced after instantiation.
    pub fn can_change_target(self) -> bool {
        matches!(self, ProxyKind::ContractWithTargetContract)
    }

    /// Returns true for kinds that extend a class.
    pub fn is_class_proxy(self) -> bool {
        matches!(self, ProxyKind::Class | ProxyKind::ClassWithTarget)
    }
}

/// Everything a synthesis request names.
#[derive(Clone, Copy)]
pub(crate) struct GenerationRequest<'r> {
    pub(crate) kind: ProxyKind,
    pub(crate) base: Option<&'r Arc<ClassType>>,
    pub(crate) primary: Option<&'r Arc<Contract>>,
    pub(crate) additional: &'r [Arc<Contract>],
    pub(crate) target_type: Option<&'r Arc<ClassType>>,
    pub(crate) options: &'r GenerationOptions,
}

impl<'r> GenerationRequest<'r> {
    pub(crate) fn class(
        kind: ProxyKind,
        base: &'r Arc<ClassType>,
        additional: &'r [Arc<Contract>],
        options: &'r GenerationOptions,
    ) -> Self {
        Self {
            kind,
            base: Some(base),
            primary: None,
            additional,
            target_type: None,
            options,
        }
    }

    pub(crate) fn contract(
        kind: ProxyKind,
        primary: &'r Arc<Contract>,
        additional: &'r [Arc<Contract>],
        target_type: Option<&'r Arc<ClassType>>,
        options: &'r GenerationOptions,
    ) -> Self {
        Self {
            kind,
            base: None,
            primary: Some(primary),
            additional,
            target_type,
            options,
        }
    }

    fn suggested_name(&self) -> String {
        let base = match (self.base, self.primary) {
            (Some(base), _) => base.name(),
            (None, Some(primary)) => primary.name(),
            (None, None) => "Object",
        };
        format!("Proxies.{}Proxy", base)
    }

    pub(crate) fn require_base(&self) -> Result<&'r Arc<ClassType>, GenerationError> {
        self.base.ok_or_else(|| {
            GenerationError::MalformedRequest(format!("{:?} proxies need a base class", self.kind))
        })
    }

    pub(crate) fn require_primary(&self) -> Result<&'r Arc<Contract>, GenerationError> {
        self.primary.ok_or_else(|| {
            GenerationError::MalformedRequest(format!(
                "{:?} proxies need a primary contract",
                self.kind
            ))
        })
    }
}

/// The parts of generation that differ between proxy kinds.
pub(crate) trait ProxyStrategy {
    /// Rejects requests this kind cannot serve.
    fn validate(&self, request: &GenerationRequest<'_>) -> Result<(), GenerationError>;

    /// Assigns the request's contracts to contributors.
    fn map_contracts(
        &self,
        request: &GenerationRequest<'_>,
        mixins: &MixinData,
    ) -> Result<ContractMap, GenerationError>;

    /// The contributor serving the target (or base class) contracts.
    fn target_contributor(
        &self,
        request: &GenerationRequest<'_>,
        map: &ContractMap,
        locator: &Arc<dyn ImplementationLocator>,
    ) -> Result<Box<dyn Contributor>, GenerationError>;
}

fn strategy_for(kind: ProxyKind) -> &'static dyn ProxyStrategy {
    match kind {
        ProxyKind::Class => &class::ClassProxy,
        ProxyKind::ClassWithTarget => &class_with_target::ClassProxyWithTarget,
        ProxyKind::ContractWithTarget => &contract_with_target::ContractProxyWithTarget,
        ProxyKind::ContractWithTargetContract => {
            &contract_with_target_contract::ContractProxyWithTargetContract
        }
        ProxyKind::ContractWithoutTarget => &contract_without_target::ContractProxyWithoutTarget,
    }
}

/// Rejects classes a proxy cannot extend.
///
/// Checks run in a fixed order: sealed, already a proxy, no accessible
/// parameterless constructor.
pub(crate) fn validate_base_type(ty: &ClassType) -> Result<(), GenerationError> {
    let reason = if ty.is_sealed() {
        BaseTypeDefect::Sealed
    } else if ty.is_proxy_type() {
        BaseTypeDefect::AlreadyProxy
    } else if !ty
        .constructor()
        .is_some_and(|c| c.visibility().is_accessible())
    {
        BaseTypeDefect::NoAccessibleConstructor
    } else {
        return Ok(());
    };
    Err(GenerationError::InvalidBaseType {
        type_name: ty.name().to_string(),
        reason,
    })
}

/// Generates the proxy type for `request`. The result is not cached here.
pub(crate) fn generate(
    request: &GenerationRequest<'_>,
    naming: &NamingScope,
    locator: &Arc<dyn ImplementationLocator>,
) -> Result<ProxyType, GenerationError> {
    let name = naming.unique(&request.suggested_name());
    let log = GenerationLog::new(&name);
    log.debug(format_args!("generating {:?} proxy", request.kind));
    generate_named(request, &name, naming, locator, log).inspect_err(|e| {
        log.warn(format_args!("generation failed: {}", e));
    })
}

fn generate_named(
    request: &GenerationRequest<'_>,
    name: &Arc<str>,
    naming: &NamingScope,
    locator: &Arc<dyn ImplementationLocator>,
    log: GenerationLog<'_>,
) -> Result<ProxyType, GenerationError> {
    let strategy = strategy_for(request.kind);
    strategy.validate(request)?;
    if !request.kind.is_class_proxy() {
        if let Some(base) = request.options.base_type() {
            validate_base_type(base)?;
        }
    }

    let mixins = request.options.mixin_data()?;
    let map = strategy.map_contracts(request, &mixins)?;
    let contributors: Vec<Box<dyn Contributor>> = vec![
        strategy.target_contributor(request, &map, locator)?,
        Box::new(MixinContributor::new(map.mixins.clone(), &mixins, locator)),
        Box::new(AdditionalContractsContributor::new(map.additional.clone())),
        Box::new(InstanceContributor::new()),
    ];

    let hook = request.options.generation_hook();
    let mut meta = MetaType::new(name);
    for (owner, contributor) in contributors.iter().enumerate() {
        contributor.collect(owner, hook.as_ref(), &mut meta)?;
        log.trace(format_args!(
            "{} contributor collected {} members",
            contributor.label(),
            meta.methods_of(owner).count()
        ));
    }
    hook.methods_inspected();
    log.debug(format_args!("member model holds {} members", meta.len()));

    let mut emitter = TypeEmitter::new(name, naming, log);
    emitter.add_field("__interceptors", FieldKind::Interceptors);
    if request.kind.has_target() {
        emitter.add_field("__target", FieldKind::Target);
    }
    for contract in &map.mixins {
        emitter.add_field(
            &format!("__mixin_{}", contract.name()),
            FieldKind::Mixin(Arc::from(contract.name())),
        );
    }
    if request.options.interceptor_selector().is_some() {
        emitter.add_field("__selector", FieldKind::Selector);
    }
    for contributor in &contributors {
        for contract in contributor.contracts() {
            emitter.implement(&contract);
        }
    }
    for contract in &map.empty {
        emitter.implement(contract);
    }

    for (owner, contributor) in contributors.iter().enumerate() {
        contributor.emit(owner, &meta, &mut emitter)?;
    }
    log.debug(format_args!(
        "emitted {} members and {} invocation types",
        emitter.slots.len(),
        emitter.invocation_types.len()
    ));

    Ok(ProxyType::assemble(request, &mixins, &meta, emitter, locator))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::Visibility;

    #[test]
    fn base_type_checks_run_in_order() {
        let sealed_proxy = ClassType::builder("SealedProxy")
            .sealed()
            .implements(&Contract::target_accessor())
            .build();
        assert!(matches!(
            validate_base_type(&sealed_proxy),
            Err(GenerationError::InvalidBaseType {
                reason: BaseTypeDefect::Sealed,
                ..
            })
        ));

        let proxy = ClassType::builder("Proxy")
            .implements(&Contract::target_accessor())
            .build();
        assert!(matches!(
            validate_base_type(&proxy),
            Err(GenerationError::InvalidBaseType {
                reason: BaseTypeDefect::AlreadyProxy,
                ..
            })
        ));

        let private = ClassType::builder("Private")
            .constructor(Visibility::Private, || std::sync::Arc::new(()) as crate::Instance)
            .build();
        assert!(matches!(
            validate_base_type(&private),
            Err(GenerationError::InvalidBaseType {
                reason: BaseTypeDefect::NoAccessibleConstructor,
                ..
            })
        ));

        let ok = ClassType::builder("Ok")
            .constructor(Visibility::Protected, || std::sync::Arc::new(()) as crate::Instance)
            .build();
        assert!(validate_base_type(&ok).is_ok());
    }

    #[test]
    fn kinds_describe_their_target_slot() {
        assert!(!ProxyKind::Class.has_target());
        assert!(ProxyKind::ClassWithTarget.has_target());
        assert!(!ProxyKind::ContractWithoutTarget.has_target());
        assert!(ProxyKind::ContractWithTargetContract.can_change_target());
        assert!(!ProxyKind::ContractWithTarget.can_change_target());
    }
}

//! Locating the real implementation of a contract operation on a class.

use std::fmt;

use crate::class::{ClassType, Implementation, Visibility};
use crate::contract::{Contract, MethodSig};

/// Finds the concrete operation to forward to, given the declaring contract
/// and the class of the current target.
///
/// Contract-with-target proxies consult the locator once per operation at
/// generation time. Swappable-target proxies consult it on every forwarded
/// call, against whatever target is bound at that moment.
pub trait ImplementationLocator: Send + Sync + fmt::Debug {
    /// Returns the implementation of `method` (declared on `contract`) on
    /// `target`, or `None` if the class does not provide one.
    fn locate(
        &self,
        contract: &Contract,
        method: &MethodSig,
        target: &ClassType,
    ) -> Option<Implementation>;
}

/// Resolves explicit implementations first, then public methods with the
/// same name and signature.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContractMapLocator;

impl ImplementationLocator for ContractMapLocator {
    fn locate(
        &self,
        contract: &Contract,
        method: &MethodSig,
        target: &ClassType,
    ) -> Option<Implementation> {
        let explicit = target.methods().iter().find(|m| {
            m.explicit_contract() == Some(contract.name()) && m.sig().matches(method)
        });
        let found = explicit.or_else(|| {
            target.methods().iter().find(|m| {
                m.explicit_contract().is_none()
                    && m.member_visibility() == Visibility::Public
                    && m.sig().matches(method)
            })
        })?;
        found.implementation().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassMethod;
    use crate::types::{Parameter, TypeRef};
    use crate::value::{Instance, Value};
    use std::sync::Arc;

    fn run_sig() -> MethodSig {
        MethodSig::new("Run").returns(TypeRef::value_of::<i32>("int"))
    }

    fn returning(n: i32) -> Implementation {
        Implementation::sync(move |_, _, _| Ok(Value::of(n)))
    }

    fn call(imp: &Implementation) -> i32 {
        let instance: Instance = Arc::new(());
        *imp.call(&instance, &mut [], &[]).unwrap().get::<i32>().unwrap()
    }

    #[test]
    fn explicit_implementation_wins() {
        let contract = Contract::builder("IRun").method(run_sig()).build();
        let class = ClassType::builder("Runner")
            .implements(&contract)
            .method(ClassMethod::new(run_sig()).implemented_by(returning(1)))
            .method(
                ClassMethod::new(run_sig())
                    .explicit("IRun")
                    .implemented_by(returning(2)),
            )
            .build();

        let imp = ContractMapLocator.locate(&contract, &run_sig(), &class).unwrap();
        assert_eq!(call(&imp), 2);
    }

    #[test]
    fn implicit_lookup_requires_public_matching_signature() {
        let contract = Contract::builder("IRun").method(run_sig()).build();
        let hidden = ClassType::builder("Hidden")
            .method(
                ClassMethod::new(run_sig())
                    .visibility(Visibility::Protected)
                    .implemented_by(returning(1)),
            )
            .build();
        assert!(ContractMapLocator.locate(&contract, &run_sig(), &hidden).is_none());

        let overload = ClassType::builder("Overload")
            .method(
                ClassMethod::new(
                    MethodSig::new("Run").param(Parameter::value("x", TypeRef::value_of::<i32>("int"))),
                )
                .implemented_by(returning(1)),
            )
            .build();
        assert!(ContractMapLocator.locate(&contract, &run_sig(), &overload).is_none());
    }

    #[test]
    fn abstract_methods_have_nothing_to_locate() {
        let contract = Contract::builder("IRun").method(run_sig()).build();
        let class = ClassType::builder("Abstract")
            .method(ClassMethod::new(run_sig()))
            .build();
        assert!(ContractMapLocator.locate(&contract, &run_sig(), &class).is_none());
    }
}

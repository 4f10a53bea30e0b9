//! Member descriptors collected for one synthesis request.

use std::fmt;
use std::sync::Arc;

use crate::class::ClassMethod;
use crate::contract::{EventSig, MethodSig, PropertySig};

/// The name a member is exposed under.
///
/// Members declared on a contract may be switched to their qualified form
/// (`IContract.Member`) when their plain name is already taken.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberName {
    /// The declared name
    Plain(Arc<str>),
    /// The declared name prefixed with its declaring contract
    Qualified {
        /// Declaring contract
        owner: Arc<str>,
        /// Declared name
        name: Arc<str>,
    },
}

impl MemberName {
    /// Returns the declared name without qualification.
    pub fn simple(&self) -> &str {
        match self {
            MemberName::Plain(name) => name,
            MemberName::Qualified { name, .. } => name,
        }
    }

    /// Returns true for qualified names.
    pub fn is_qualified(&self) -> bool {
        matches!(self, MemberName::Qualified { .. })
    }

    pub(crate) fn qualify(&self, owner: &Arc<str>) -> MemberName {
        MemberName::Qualified {
            owner: Arc::clone(owner),
            name: Arc::from(self.simple()),
        }
    }
}

impl fmt::Display for MemberName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberName::Plain(name) => write!(f, "{}", name),
            MemberName::Qualified { owner, name } => write!(f, "{}.{}", owner, name),
        }
    }
}

/// Where a member was declared.
#[derive(Debug, Clone)]
pub(crate) enum Declaring {
    Contract(Arc<str>),
    Class(Arc<str>),
}

impl Declaring {
    pub(crate) fn name(&self) -> &Arc<str> {
        match self {
            Declaring::Contract(name) | Declaring::Class(name) => name,
        }
    }

    pub(crate) fn is_contract(&self) -> bool {
        matches!(self, Declaring::Contract(_))
    }
}

/// One proxied operation.
#[derive(Debug, Clone)]
pub(crate) struct MetaMethod {
    pub(crate) name: MemberName,
    pub(crate) sig: MethodSig,
    pub(crate) declaring: Declaring,
    pub(crate) proxyable: bool,
    pub(crate) owner: usize,
    pub(crate) class_method: Option<ClassMethod>,
}

impl MetaMethod {
    pub(crate) fn on_contract(contract: &Arc<str>, sig: MethodSig, owner: usize) -> Self {
        Self {
            name: MemberName::Plain(Arc::clone(sig.name_arc())),
            sig,
            declaring: Declaring::Contract(Arc::clone(contract)),
            proxyable: true,
            owner,
            class_method: None,
        }
    }

    pub(crate) fn on_class(class: &Arc<str>, method: &ClassMethod, owner: usize) -> Self {
        Self {
            name: MemberName::Plain(Arc::clone(method.sig().name_arc())),
            sig: method.sig().clone(),
            declaring: Declaring::Class(Arc::clone(class)),
            proxyable: method.is_overridable(),
            owner,
            class_method: Some(method.clone()),
        }
    }

    pub(crate) fn proxyable(mut self, proxyable: bool) -> Self {
        self.proxyable = proxyable;
        self
    }

    /// Only members declared on a contract can be qualified.
    pub(crate) fn can_be_qualified(&self) -> bool {
        self.declaring.is_contract()
    }

    pub(crate) fn qualified(mut self) -> Self {
        self.name = self.name.qualify(self.declaring.name());
        self
    }

    pub(crate) fn is_overridable_class_member(&self) -> bool {
        self.class_method
            .as_ref()
            .is_some_and(ClassMethod::is_overridable)
    }
}

/// A property and its accessors.
#[derive(Debug, Clone)]
pub(crate) struct MetaProperty {
    pub(crate) name: MemberName,
    pub(crate) sig: PropertySig,
    pub(crate) declaring: Arc<str>,
    pub(crate) getter: Option<MetaMethod>,
    pub(crate) setter: Option<MetaMethod>,
}

impl MetaProperty {
    pub(crate) fn qualified(mut self) -> Self {
        self.name = self.name.qualify(&self.declaring);
        self.getter = self.getter.map(MetaMethod::qualified);
        self.setter = self.setter.map(MetaMethod::qualified);
        self
    }
}

/// An event and its accessors.
#[derive(Debug, Clone)]
pub(crate) struct MetaEvent {
    pub(crate) name: MemberName,
    pub(crate) sig: EventSig,
    pub(crate) declaring: Arc<str>,
    pub(crate) adder: MetaMethod,
    pub(crate) remover: MetaMethod,
}

impl MetaEvent {
    pub(crate) fn qualified(mut self) -> Self {
        self.name = self.name.qualify(&self.declaring);
        self.adder = self.adder.qualified();
        self.remover = self.remover.qualified();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeRef;

    #[test]
    fn qualified_names_display_with_their_owner() {
        let name = MemberName::Plain(Arc::from("Run"));
        let qualified = name.qualify(&Arc::from("IRunner"));
        assert_eq!(qualified.to_string(), "IRunner.Run");
        assert_eq!(qualified.simple(), "Run");
        assert!(qualified.is_qualified());
    }

    #[test]
    fn class_members_cannot_be_qualified() {
        let method = ClassMethod::new(MethodSig::new("Run"));
        let member = MetaMethod::on_class(&Arc::from("Runner"), &method, 0);
        assert!(!member.can_be_qualified());
        assert!(member.is_overridable_class_member());

        let member = MetaMethod::on_contract(&Arc::from("IRunner"), MethodSig::new("Run"), 1);
        assert!(member.can_be_qualified());
    }

    #[test]
    fn qualifying_a_property_qualifies_its_accessors() {
        let sig = PropertySig::new("Size", TypeRef::value_of::<u32>("uint"));
        let owner: Arc<str> = Arc::from("IWidget");
        let property = MetaProperty {
            name: MemberName::Plain(Arc::from("Size")),
            getter: sig.getter().map(|g| MetaMethod::on_contract(&owner, g, 0)),
            setter: sig.setter().map(|s| MetaMethod::on_contract(&owner, s, 0)),
            sig,
            declaring: owner,
        }
        .qualified();

        assert_eq!(property.name.to_string(), "IWidget.Size");
        assert_eq!(
            property.getter.map(|g| g.name.to_string()),
            Some("IWidget.get_Size".to_string())
        );
        assert_eq!(
            property.setter.map(|s| s.name.to_string()),
            Some("IWidget.set_Size".to_string())
        );
    }
}

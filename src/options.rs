//! Generation options: the inclusion hook, the interceptor selector, the
//! base type for contract proxies and mixins.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::class::{ClassType, Target};
use crate::contract::{Contract, MethodSig};
use crate::error::GenerationError;
use crate::interceptor::Interceptor;

/// Decides which operations are intercepted.
///
/// Hooks take part in the shape key through [`cache_key`](Self::cache_key):
/// two hooks with the same key must make the same decisions.
pub trait ProxyGenerationHook: Send + Sync {
    /// Returns false to keep `method` out of the interceptor chain.
    fn should_intercept(&self, declaring: &str, method: &MethodSig) -> bool {
        let _ = (declaring, method);
        true
    }

    /// Reports an accessible class method that cannot be overridden.
    fn non_proxyable_member(&self, declaring: &str, method: &MethodSig) {
        let _ = (declaring, method);
    }

    /// Called once after every member has been inspected.
    fn methods_inspected(&self) {}

    /// Identity of the hook's decisions.
    fn cache_key(&self) -> Cow<'static, str> {
        Cow::Borrowed(std::any::type_name::<Self>())
    }
}

/// Intercepts every operation.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllMethodsHook;

impl ProxyGenerationHook for AllMethodsHook {}

/// Picks the interceptors that apply to one operation.
///
/// The result is cached per proxy, operation and target type. Selection may
/// run more than once for the same key when calls race.
pub trait InterceptorSelector: Send + Sync {
    /// Returns the interceptors to run, in order. `target_type` is the class
    /// of the target bound when the call is made.
    fn select(
        &self,
        target_type: Option<&str>,
        method: &MethodSig,
        interceptors: &[Arc<dyn Interceptor>],
    ) -> Vec<Arc<dyn Interceptor>>;
}

/// Mixin instances ordered by the contracts they provide.
///
/// Every contract of every mixin (parents included) gets one position;
/// positions follow contract names so the order mixins are added in does
/// not matter.
#[derive(Clone, Default)]
pub struct MixinData {
    contracts: Vec<Arc<Contract>>,
    positions: IndexMap<Arc<str>, usize>,
    mixins: Vec<Target>,
}

impl MixinData {
    /// Indexes `mixins` by contract.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::MixinCollision`] when two mixins provide
    /// the same contract.
    pub fn new(mixins: &[Target]) -> Result<Self, GenerationError> {
        let mut by_contract: IndexMap<Arc<str>, (Arc<Contract>, Target)> = IndexMap::new();
        for mixin in mixins {
            for contract in mixin.ty().all_contracts() {
                if let Some((_, first)) = by_contract.get(contract.name()) {
                    return Err(GenerationError::MixinCollision {
                        contract: contract.name().to_string(),
                        first: first.ty().name().to_string(),
                        second: mixin.ty().name().to_string(),
                    });
                }
                by_contract.insert(Arc::clone(contract.name_arc()), (contract, mixin.clone()));
            }
        }
        by_contract.sort_keys();

        let mut data = MixinData::default();
        for (position, (name, (contract, mixin))) in by_contract.into_iter().enumerate() {
            data.positions.insert(name, position);
            data.contracts.push(contract);
            data.mixins.push(mixin);
        }
        Ok(data)
    }

    /// Returns the mixed-in contracts in position order.
    pub fn contracts(&self) -> &[Arc<Contract>] {
        &self.contracts
    }

    /// Returns the mixin bound at each position.
    pub fn mixins(&self) -> &[Target] {
        &self.mixins
    }

    /// Returns the position of the mixin providing `contract`.
    pub fn mixin_position(&self, contract: &str) -> Option<usize> {
        self.positions.get(contract).copied()
    }

    /// Returns true if some mixin provides `contract`.
    pub fn contains(&self, contract: &str) -> bool {
        self.positions.contains_key(contract)
    }

    /// Returns true if there are no mixins.
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

impl fmt::Debug for MixinData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.contracts
                    .iter()
                    .zip(&self.mixins)
                    .map(|(c, m)| (c.name(), m.ty().name())),
            )
            .finish()
    }
}

/// The part of [`GenerationOptions`] that affects the synthesized shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OptionsKey {
    hook: Cow<'static, str>,
    has_selector: bool,
    base_type: Option<Arc<str>>,
    mixin_types: Vec<Arc<str>>,
}

/// Options for one synthesis request.
///
/// Two option values are equal when they would produce the same proxy type:
/// hooks compare by cache key, selectors by presence, mixins by type
/// regardless of order, and the base type by name.
///
/// # Examples
///
/// ```
/// use proxy_core::{ClassType, Contract, GenerationOptions, Target};
///
/// let logging = Contract::builder("ILogging").build();
/// let auditing = Contract::builder("IAuditing").build();
/// let logger = ClassType::builder("Logger").implements(&logging).build();
/// let auditor = ClassType::builder("Auditor").implements(&auditing).build();
///
/// let a = GenerationOptions::new()
///     .add_mixin(Target::of(&logger, ()))
///     .add_mixin(Target::of(&auditor, ()));
/// let b = GenerationOptions::new()
///     .add_mixin(Target::of(&auditor, ()))
///     .add_mixin(Target::of(&logger, ()));
///
/// assert_eq!(a, b);
/// ```
#[derive(Clone)]
pub struct GenerationOptions {
    hook: Arc<dyn ProxyGenerationHook>,
    selector: Option<Arc<dyn InterceptorSelector>>,
    base_type: Option<Arc<ClassType>>,
    mixins: Vec<Target>,
}

impl GenerationOptions {
    /// Options intercepting every operation, with no mixins.
    pub fn new() -> Self {
        Self {
            hook: Arc::new(AllMethodsHook),
            selector: None,
            base_type: None,
            mixins: Vec::new(),
        }
    }

    /// Sets the inclusion hook.
    pub fn hook(mut self, hook: impl ProxyGenerationHook + 'static) -> Self {
        self.hook = Arc::new(hook);
        self
    }

    /// Sets the interceptor selector.
    pub fn selector(mut self, selector: impl InterceptorSelector + 'static) -> Self {
        self.selector = Some(Arc::new(selector));
        self
    }

    /// Sets the class contract proxies extend.
    pub fn base_type_for_contract_proxy(mut self, base: &Arc<ClassType>) -> Self {
        self.base_type = Some(Arc::clone(base));
        self
    }

    /// Adds a mixin instance.
    pub fn add_mixin(mut self, mixin: Target) -> Self {
        self.mixins.push(mixin);
        self
    }

    /// Returns the inclusion hook.
    pub fn generation_hook(&self) -> &Arc<dyn ProxyGenerationHook> {
        &self.hook
    }

    /// Returns the interceptor selector.
    pub fn interceptor_selector(&self) -> Option<&Arc<dyn InterceptorSelector>> {
        self.selector.as_ref()
    }

    /// Returns the base type for contract proxies.
    pub fn base_type(&self) -> Option<&Arc<ClassType>> {
        self.base_type.as_ref()
    }

    /// Returns the mixin instances in insertion order.
    pub fn mixins(&self) -> &[Target] {
        &self.mixins
    }

    /// Indexes the mixins by contract.
    pub fn mixin_data(&self) -> Result<MixinData, GenerationError> {
        MixinData::new(&self.mixins)
    }

    /// Returns the shape-relevant part of the options.
    pub fn key(&self) -> OptionsKey {
        let mut mixin_types: Vec<Arc<str>> = self
            .mixins
            .iter()
            .map(|m| Arc::clone(m.ty().name_arc()))
            .collect();
        mixin_types.sort();
        OptionsKey {
            hook: self.hook.cache_key(),
            has_selector: self.selector.is_some(),
            base_type: self.base_type.as_ref().map(|b| Arc::clone(b.name_arc())),
            mixin_types,
        }
    }
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for GenerationOptions {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for GenerationOptions {}

impl fmt::Debug for GenerationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationOptions")
            .field("key", &self.key())
            .finish()
    }
}

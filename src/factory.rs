//! The entry point: synthesizes proxy types on demand and caches them by
//! shape.

use std::sync::Arc;

use crate::cache::{BaseIdentity, ShapeKey, TypeCache};
use crate::class::{ClassType, Target};
use crate::contract::Contract;
use crate::error::{Error, GenerationError};
use crate::generator::emitter::NamingScope;
use crate::generator::{self, GenerationRequest, ProxyKind};
use crate::interceptor::Interceptor;
use crate::locator::{ContractMapLocator, ImplementationLocator};
use crate::options::GenerationOptions;
use crate::proxy::{Proxy, ProxyArgs, ProxyType};

/// Synthesizes proxy types and caches one per shape.
///
/// A factory owns its cache and its naming scope; type names are unique per
/// factory. Dropping the factory drops the cache, while proxies already
/// created keep their types alive.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use proxy_core::{
///     CallError, Contract, GenerationOptions, Interceptor, Invocation, MethodSig, ProxyFactory,
///     TypeRef, Value,
/// };
///
/// let greeter = Contract::builder("IGreeter")
///     .method(MethodSig::new("Greet").returns(TypeRef::reference("string")))
///     .build();
///
/// let answer: Arc<dyn Interceptor> = Arc::new(|invocation: &mut Invocation| -> Result<(), CallError> {
///     invocation.set_return_value(Value::of("hello".to_string()));
///     Ok(())
/// });
/// let factory = ProxyFactory::new();
/// let proxy = factory
///     .create_contract_proxy_without_target(&greeter, &[], &GenerationOptions::new(), &[answer])
///     .unwrap();
///
/// let greeting = proxy.invoke("Greet", &mut []).unwrap();
/// assert_eq!(greeting.get::<String>().map(String::as_str), Some("hello"));
/// ```
#[derive(Debug)]
pub struct ProxyFactory {
    cache: TypeCache,
    naming: NamingScope,
    locator: Arc<dyn ImplementationLocator>,
}

impl ProxyFactory {
    /// A factory resolving implementations with [`ContractMapLocator`].
    pub fn new() -> Self {
        Self::with_locator(ContractMapLocator)
    }

    /// A factory resolving implementations with `locator`.
    pub fn with_locator(locator: impl ImplementationLocator + 'static) -> Self {
        Self {
            cache: TypeCache::new(),
            naming: NamingScope::new(),
            locator: Arc::new(locator),
        }
    }

    /// Returns the type cache.
    pub fn cache(&self) -> &TypeCache {
        &self.cache
    }

    /// Forgets every cached proxy type.
    pub fn clear_cache(&self) {
        tracing::debug!(cached = self.cache.len(), "clearing proxy type cache");
        self.cache.clear();
    }

    fn get_or_generate(
        &self,
        request: GenerationRequest<'_>,
        key: ShapeKey,
    ) -> Result<Arc<ProxyType>, GenerationError> {
        self.cache
            .get_or_create(&key, || generator::generate(&request, &self.naming, &self.locator))
    }

    /// Returns the proxy type extending `base`. Proceeding runs the base
    /// class implementation on the proxy's own state.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerationError`] when `base` cannot be extended or the
    /// requested members cannot be laid out.
    pub fn create_class_proxy_type(
        &self,
        base: &Arc<ClassType>,
        additional: &[Arc<Contract>],
        options: &GenerationOptions,
    ) -> Result<Arc<ProxyType>, GenerationError> {
        let kind = ProxyKind::Class;
        let key = ShapeKey::new(
            kind,
            BaseIdentity::Class(Arc::clone(base.name_arc())),
            additional,
            None,
            options,
        );
        self.get_or_generate(GenerationRequest::class(kind, base, additional, options), key)
    }

    /// Returns the proxy type extending `base` that forwards to a target of
    /// the same class.
    ///
    /// # Errors
    ///
    /// Same as [`create_class_proxy_type`](Self::create_class_proxy_type).
    pub fn create_class_proxy_type_with_target(
        &self,
        base: &Arc<ClassType>,
        additional: &[Arc<Contract>],
        options: &GenerationOptions,
    ) -> Result<Arc<ProxyType>, GenerationError> {
        let kind = ProxyKind::ClassWithTarget;
        let key = ShapeKey::new(
            kind,
            BaseIdentity::Class(Arc::clone(base.name_arc())),
            additional,
            None,
            options,
        );
        self.get_or_generate(GenerationRequest::class(kind, base, additional, options), key)
    }

    /// Returns the proxy type implementing `primary` over a target of
    /// `target_type`.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerationError`] when `target_type` does not implement
    /// `primary` or lacks an implementation of one of its operations.
    pub fn create_contract_proxy_type_with_target(
        &self,
        primary: &Arc<Contract>,
        additional: &[Arc<Contract>],
        target_type: &Arc<ClassType>,
        options: &GenerationOptions,
    ) -> Result<Arc<ProxyType>, GenerationError> {
        let kind = ProxyKind::ContractWithTarget;
        let key = ShapeKey::new(
            kind,
            BaseIdentity::Contract(Arc::clone(primary)),
            additional,
            Some(target_type),
            options,
        );
        let request =
            GenerationRequest::contract(kind, primary, additional, Some(target_type), options);
        self.get_or_generate(request, key)
    }

    /// Returns the proxy type implementing `primary` over a replaceable
    /// target.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerationError`] when the members cannot be laid out.
    pub fn create_contract_proxy_type_with_target_contract(
        &self,
        primary: &Arc<Contract>,
        additional: &[Arc<Contract>],
        options: &GenerationOptions,
    ) -> Result<Arc<ProxyType>, GenerationError> {
        let kind = ProxyKind::ContractWithTargetContract;
        let key = ShapeKey::new(
            kind,
            BaseIdentity::Contract(Arc::clone(primary)),
            additional,
            None,
            options,
        );
        self.get_or_generate(
            GenerationRequest::contract(kind, primary, additional, None, options),
            key,
        )
    }

    /// Returns the proxy type implementing `primary` with no target.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerationError`] when the members cannot be laid out.
    pub fn create_contract_proxy_type_without_target(
        &self,
        primary: &Arc<Contract>,
        additional: &[Arc<Contract>],
        options: &GenerationOptions,
    ) -> Result<Arc<ProxyType>, GenerationError> {
        let kind = ProxyKind::ContractWithoutTarget;
        let key = ShapeKey::new(
            kind,
            BaseIdentity::Contract(Arc::clone(primary)),
            additional,
            None,
            options,
        );
        self.get_or_generate(
            GenerationRequest::contract(kind, primary, additional, None, options),
            key,
        )
    }

    /// Creates a class proxy bound to `interceptors`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generation`] or [`Error::Instantiation`].
    pub fn create_class_proxy(
        &self,
        base: &Arc<ClassType>,
        additional: &[Arc<Contract>],
        options: &GenerationOptions,
        interceptors: &[Arc<dyn Interceptor>],
    ) -> Result<Proxy, Error> {
        let ty = self.create_class_proxy_type(base, additional, options)?;
        Ok(ty.instantiate(bound(options, interceptors, None))?)
    }

    /// Creates a class proxy forwarding to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generation`] or [`Error::Instantiation`].
    pub fn create_class_proxy_with_target(
        &self,
        base: &Arc<ClassType>,
        additional: &[Arc<Contract>],
        target: Target,
        options: &GenerationOptions,
        interceptors: &[Arc<dyn Interceptor>],
    ) -> Result<Proxy, Error> {
        let ty = self.create_class_proxy_type_with_target(base, additional, options)?;
        Ok(ty.instantiate(bound(options, interceptors, Some(target)))?)
    }

    /// Creates a contract proxy forwarding to `target`, typed to the
    /// target's class.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generation`] or [`Error::Instantiation`].
    pub fn create_contract_proxy_with_target(
        &self,
        primary: &Arc<Contract>,
        additional: &[Arc<Contract>],
        target: Target,
        options: &GenerationOptions,
        interceptors: &[Arc<dyn Interceptor>],
    ) -> Result<Proxy, Error> {
        let target_type = Arc::clone(target.ty());
        let ty =
            self.create_contract_proxy_type_with_target(primary, additional, &target_type, options)?;
        Ok(ty.instantiate(bound(options, interceptors, Some(target)))?)
    }

    /// Creates a contract proxy over a replaceable target.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generation`] or [`Error::Instantiation`].
    pub fn create_contract_proxy_with_target_contract(
        &self,
        primary: &Arc<Contract>,
        additional: &[Arc<Contract>],
        target: Option<Target>,
        options: &GenerationOptions,
        interceptors: &[Arc<dyn Interceptor>],
    ) -> Result<Proxy, Error> {
        let ty = self.create_contract_proxy_type_with_target_contract(primary, additional, options)?;
        Ok(ty.instantiate(bound(options, interceptors, target))?)
    }

    /// Creates a contract proxy with no target.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generation`] or [`Error::Instantiation`].
    pub fn create_contract_proxy_without_target(
        &self,
        primary: &Arc<Contract>,
        additional: &[Arc<Contract>],
        options: &GenerationOptions,
        interceptors: &[Arc<dyn Interceptor>],
    ) -> Result<Proxy, Error> {
        let ty = self.create_contract_proxy_type_without_target(primary, additional, options)?;
        Ok(ty.instantiate(bound(options, interceptors, None))?)
    }

    /// Generates a target-less contract proxy type without consulting the
    /// cache.
    #[cfg(test)]
    pub(crate) fn generate_uncached(
        &self,
        primary: &Arc<Contract>,
    ) -> Result<ProxyType, GenerationError> {
        let options = GenerationOptions::new();
        let request = GenerationRequest::contract(
            ProxyKind::ContractWithoutTarget,
            primary,
            &[],
            None,
            &options,
        );
        generator::generate(&request, &self.naming, &self.locator)
    }
}

impl Default for ProxyFactory {
    fn default() -> Self {
        Self::new()
    }
}

fn bound(
    options: &GenerationOptions,
    interceptors: &[Arc<dyn Interceptor>],
    target: Option<Target>,
) -> ProxyArgs {
    let args = ProxyArgs::from_options(options).interceptors(interceptors.iter().cloned());
    match target {
        Some(target) => args.target(target),
        None => args,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::MethodSig;

    fn contract(name: &str) -> Arc<Contract> {
        Contract::builder(name).method(MethodSig::new("Run")).build()
    }

    #[test]
    fn equal_shapes_share_one_type() {
        let factory = ProxyFactory::new();
        let extra_a = contract("IA");
        let extra_b = contract("IB");
        let first = factory
            .create_contract_proxy_type_without_target(
                &contract("IMain"),
                &[Arc::clone(&extra_a), Arc::clone(&extra_b)],
                &GenerationOptions::new(),
            )
            .unwrap();
        let second = factory
            .create_contract_proxy_type_without_target(
                &contract("IMain"),
                &[extra_b, extra_a],
                &GenerationOptions::new(),
            )
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.cache().len(), 1);
    }

    #[test]
    fn kinds_get_distinct_types_and_names() {
        let factory = ProxyFactory::new();
        let main = contract("IMain");
        let without = factory
            .create_contract_proxy_type_without_target(&main, &[], &GenerationOptions::new())
            .unwrap();
        let swappable = factory
            .create_contract_proxy_type_with_target_contract(&main, &[], &GenerationOptions::new())
            .unwrap();
        assert!(!Arc::ptr_eq(&without, &swappable));
        assert_eq!(without.name(), "Proxies.IMainProxy");
        assert_eq!(swappable.name(), "Proxies.IMainProxy_1");
    }

    #[test]
    fn clearing_the_cache_regenerates() {
        let factory = ProxyFactory::new();
        let main = contract("IMain");
        let before = factory
            .create_contract_proxy_type_without_target(&main, &[], &GenerationOptions::new())
            .unwrap();
        factory.clear_cache();
        let after = factory
            .create_contract_proxy_type_without_target(&main, &[], &GenerationOptions::new())
            .unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
    }
}

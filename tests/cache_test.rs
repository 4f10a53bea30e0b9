//! Proxy type caching under concurrent requests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use proxy_core::{Contract, GenerationOptions, MethodSig, ProxyFactory, ProxyGenerationHook, TypeRef};

/// Counts how many proxy types were generated with it.
struct Generations(Arc<AtomicUsize>);

impl ProxyGenerationHook for Generations {
    fn methods_inspected(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn repository(name: &str) -> Arc<Contract> {
    Contract::builder(name)
        .method(MethodSig::new("Load").returns(TypeRef::reference("object")))
        .method(MethodSig::new("Save"))
        .build()
}

#[test]
fn concurrent_requests_for_one_shape_share_one_type() {
    let generated = Arc::new(AtomicUsize::new(0));
    let options = GenerationOptions::new().hook(Generations(Arc::clone(&generated)));
    let factory = ProxyFactory::new();
    let contract = repository("IRepository");

    let types: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    factory
                        .create_contract_proxy_type_without_target(&contract, &[], &options)
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(types.iter().all(|ty| Arc::ptr_eq(ty, &types[0])));
    assert_eq!(generated.load(Ordering::SeqCst), 1);
    assert_eq!(factory.cache().len(), 1);
}

#[test]
fn concurrent_requests_for_different_shapes_get_different_types() {
    let factory = ProxyFactory::new();
    let contracts: Vec<_> = (0..6).map(|i| repository(&format!("IRepository{}", i))).collect();

    let names: Vec<String> = thread::scope(|scope| {
        let handles: Vec<_> = contracts
            .iter()
            .map(|contract| {
                let factory = &factory;
                scope.spawn(move || {
                    factory
                        .create_contract_proxy_type_without_target(contract, &[], &GenerationOptions::new())
                        .unwrap()
                        .name()
                        .to_string()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mut unique = names.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), contracts.len());
    assert_eq!(factory.cache().len(), contracts.len());
}

#[test]
fn separately_built_contracts_hit_the_same_entry() {
    let factory = ProxyFactory::new();
    let first = factory
        .create_contract_proxy_type_without_target(&repository("IRepository"), &[], &GenerationOptions::new())
        .unwrap();
    let second = factory
        .create_contract_proxy_type_without_target(&repository("IRepository"), &[], &GenerationOptions::new())
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    factory.clear_cache();
    let third = factory
        .create_contract_proxy_type_without_target(&repository("IRepository"), &[], &GenerationOptions::new())
        .unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_ne!(first.name(), third.name());
}

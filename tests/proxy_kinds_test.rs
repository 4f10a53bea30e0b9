//! The five proxy kinds, their targets, mixins and base type rules.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use proxy_core::{
    BaseTypeDefect, CallError, ClassMethod, ClassType, Contract, Error, GenerationError,
    GenerationOptions, Implementation, InstantiationError, Interceptor, Invocation, MethodSig,
    Parameter, Proxy, ProxyArgs, ProxyFactory, ProxyGenerationHook, ProxyKind, Target, TypeRef,
    Value, Visibility,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn int() -> TypeRef {
    TypeRef::value_of::<i32>("int")
}

fn string() -> TypeRef {
    TypeRef::reference("string")
}

fn counting(calls: &Arc<AtomicUsize>) -> Arc<dyn Interceptor> {
    let calls = Arc::clone(calls);
    Arc::new(move |invocation: &mut Invocation| -> Result<(), CallError> {
        calls.fetch_add(1, Ordering::SeqCst);
        invocation.proceed()
    })
}

#[derive(Default)]
struct Account {
    balance: i32,
    id: i32,
}

fn account_class() -> Arc<ClassType> {
    ClassType::builder("Account")
        .default_constructor::<Account>()
        .method(
            ClassMethod::new(MethodSig::new("Balance").returns(int()))
                .implemented_by(Implementation::typed(|a: &Account, _, _| Ok(Value::of(a.balance)))),
        )
        .method(
            ClassMethod::new(MethodSig::new("Id").returns(int()))
                .non_virtual()
                .implemented_by(Implementation::typed(|a: &Account, _, _| Ok(Value::of(a.id)))),
        )
        .method(ClassMethod::new(MethodSig::new("Close")))
        .method(
            ClassMethod::new(MethodSig::new("Recalculate"))
                .visibility(Visibility::Private)
                .implemented_by(Implementation::sync(|_, _, _| Ok(Value::null()))),
        )
        .build()
}

#[test]
fn class_proxies_intercept_overridable_members_only() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let proxy = ProxyFactory::new()
        .create_class_proxy(&account_class(), &[], &GenerationOptions::new(), &[counting(&calls)])
        .unwrap();

    assert_eq!(proxy.invoke("Balance", &mut []).unwrap().get::<i32>(), Some(&0));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert_eq!(proxy.invoke("Id", &mut []).unwrap().get::<i32>(), Some(&0));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(matches!(
        proxy.invoke("Close", &mut []),
        Err(CallError::Unimplemented { .. })
    ));
    assert!(matches!(
        proxy.invoke("Recalculate", &mut []),
        Err(CallError::UnknownMember { .. })
    ));

    let state = proxy.unproxied_target().unwrap();
    assert_eq!(state.ty().name(), "Account");
    assert!(state.downcast_ref::<Account>().is_some());
    assert!(proxy.proxy_type().implements(proxy_core::TARGET_ACCESSOR));
}

#[derive(Default)]
struct AuditLog {
    skipped: Mutex<Vec<String>>,
    inspections: AtomicUsize,
}

struct AuditHook(Arc<AuditLog>);

impl ProxyGenerationHook for AuditHook {
    fn should_intercept(&self, _declaring: &str, method: &MethodSig) -> bool {
        method.name() != "Balance"
    }

    fn non_proxyable_member(&self, declaring: &str, method: &MethodSig) {
        self.0
            .skipped
            .lock()
            .push(format!("{}.{}", declaring, method.name()));
    }

    fn methods_inspected(&self) {
        self.0.inspections.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn hooks_see_every_member_once_per_generated_type() {
    init_tracing();
    let audit = Arc::new(AuditLog::default());
    let options = GenerationOptions::new().hook(AuditHook(Arc::clone(&audit)));
    let calls = Arc::new(AtomicUsize::new(0));
    let factory = ProxyFactory::new();

    let proxy = factory
        .create_class_proxy(&account_class(), &[], &options, &[counting(&calls)])
        .unwrap();
    factory
        .create_class_proxy(&account_class(), &[], &options, &[])
        .unwrap();

    assert_eq!(proxy.invoke("Balance", &mut []).unwrap().get::<i32>(), Some(&0));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(*audit.skipped.lock(), vec!["Account.Id".to_string()]);
    assert_eq!(audit.inspections.load(Ordering::SeqCst), 1);
}

#[test]
fn class_proxies_with_target_forward_overridable_members_to_it() {
    init_tracing();
    let class = account_class();
    let factory = ProxyFactory::new();
    let target = Target::of(&class, Account { balance: 500, id: 9 });
    let proxy = factory
        .create_class_proxy_with_target(&class, &[], target, &GenerationOptions::new(), &[])
        .unwrap();

    assert_eq!(proxy.invoke("Balance", &mut []).unwrap().get::<i32>(), Some(&500));
    // Non-virtual members always run on the proxy's own state
    assert_eq!(proxy.invoke("Id", &mut []).unwrap().get::<i32>(), Some(&0));

    let ty = factory
        .create_class_proxy_type_with_target(&class, &[], &GenerationOptions::new())
        .unwrap();
    assert!(matches!(
        ty.instantiate(ProxyArgs::new()),
        Err(InstantiationError::TargetType { ref actual, .. }) if actual == "<none>"
    ));
    let stranger = ClassType::builder("Stranger").build();
    assert!(matches!(
        ty.instantiate(ProxyArgs::new().target(Target::of(&stranger, ()))),
        Err(InstantiationError::TargetType { .. })
    ));
}

fn greeter() -> Arc<Contract> {
    Contract::builder("IGreeter")
        .method(MethodSig::new("Greet").returns(string()))
        .build()
}

fn speaker(name: &'static str, greeting: &'static str) -> Arc<ClassType> {
    ClassType::builder(name)
        .implements(&greeter())
        .method(
            ClassMethod::new(MethodSig::new("Greet").returns(string())).implemented_by(
                Implementation::sync(move |_, _, _| Ok(Value::of(greeting.to_string()))),
            ),
        )
        .build()
}

fn greeting(proxy: &Proxy) -> Option<String> {
    proxy.invoke("Greet", &mut []).unwrap().cloned::<String>()
}

#[test]
fn contract_proxies_with_target_require_a_matching_implementation() {
    init_tracing();
    let factory = ProxyFactory::new();
    let english = speaker("English", "hello");

    let proxy = factory
        .create_contract_proxy_with_target(
            &greeter(),
            &[],
            Target::of(&english, ()),
            &GenerationOptions::new(),
            &[],
        )
        .unwrap();
    assert_eq!(greeting(&proxy).as_deref(), Some("hello"));
    assert_eq!(proxy.proxy_type().kind(), ProxyKind::ContractWithTarget);

    let mute = ClassType::builder("Mute").implements(&greeter()).build();
    assert!(matches!(
        factory.create_contract_proxy_type_with_target(&greeter(), &[], &mute, &GenerationOptions::new()),
        Err(GenerationError::UnresolvedImplementation { .. })
    ));

    let unrelated = ClassType::builder("Unrelated").build();
    assert!(matches!(
        factory.create_contract_proxy_type_with_target(&greeter(), &[], &unrelated, &GenerationOptions::new()),
        Err(GenerationError::MalformedRequest(_))
    ));
}

#[test]
fn only_swappable_proxies_let_interceptors_change_the_target() {
    init_tracing();
    let french = speaker("French", "bonjour");
    let redirect: Arc<dyn Interceptor> = {
        let french = french.clone();
        Arc::new(move |invocation: &mut Invocation| -> Result<(), CallError> {
            invocation.change_invocation_target(Target::of(&french, ()))?;
            invocation.proceed()
        })
    };

    let fixed = ProxyFactory::new()
        .create_contract_proxy_with_target(
            &greeter(),
            &[],
            Target::of(&speaker("English", "hello"), ()),
            &GenerationOptions::new(),
            &[redirect],
        )
        .unwrap();
    assert!(matches!(
        fixed.invoke("Greet", &mut []),
        Err(CallError::TargetNotChangeable { .. })
    ));
    assert!(matches!(
        fixed.set_target(None),
        Err(CallError::TargetNotChangeable { .. })
    ));
}

#[test]
fn swapped_targets_apply_to_one_call_or_to_the_proxy() {
    init_tracing();
    let english = speaker("English", "hello");
    let french = speaker("French", "bonjour");
    let factory = ProxyFactory::new();

    let once: Arc<dyn Interceptor> = {
        let french = french.clone();
        Arc::new(move |invocation: &mut Invocation| -> Result<(), CallError> {
            invocation.change_invocation_target(Target::of(&french, ()))?;
            invocation.proceed()
        })
    };
    let proxy = factory
        .create_contract_proxy_with_target_contract(
            &greeter(),
            &[],
            Some(Target::of(&english, ())),
            &GenerationOptions::new(),
            &[once],
        )
        .unwrap();
    assert_eq!(greeting(&proxy).as_deref(), Some("bonjour"));
    assert_eq!(proxy.target().unwrap().ty().name(), "English");

    let swapped = Arc::new(AtomicBool::new(false));
    let permanent: Arc<dyn Interceptor> = {
        let french = french.clone();
        let swapped = Arc::clone(&swapped);
        Arc::new(move |invocation: &mut Invocation| -> Result<(), CallError> {
            if !swapped.swap(true, Ordering::SeqCst) {
                invocation.change_proxy_target(Target::of(&french, ()))?;
            }
            invocation.proceed()
        })
    };
    let proxy = factory
        .create_contract_proxy_with_target_contract(
            &greeter(),
            &[],
            Some(Target::of(&english, ())),
            &GenerationOptions::new(),
            &[permanent],
        )
        .unwrap();
    assert_eq!(greeting(&proxy).as_deref(), Some("bonjour"));
    assert_eq!(greeting(&proxy).as_deref(), Some("bonjour"));
    assert_eq!(proxy.target().unwrap().ty().name(), "French");
}

#[test]
fn swappable_targets_must_implement_the_primary_contract() {
    init_tracing();
    let stranger = ClassType::builder("Stranger").build();
    let misdirect: Arc<dyn Interceptor> = {
        let stranger = stranger.clone();
        Arc::new(move |invocation: &mut Invocation| -> Result<(), CallError> {
            invocation.change_proxy_target(Target::of(&stranger, ()))?;
            invocation.proceed()
        })
    };
    let proxy = ProxyFactory::new()
        .create_contract_proxy_with_target_contract(
            &greeter(),
            &[],
            Some(Target::of(&speaker("English", "hello"), ())),
            &GenerationOptions::new(),
            &[misdirect],
        )
        .unwrap();

    assert!(matches!(
        proxy.invoke("Greet", &mut []),
        Err(CallError::IncompatibleTarget { ref expected, ref actual })
            if expected == "IGreeter" && actual == "Stranger"
    ));
    assert!(matches!(
        proxy.set_target(Some(Target::of(&stranger, ()))),
        Err(CallError::IncompatibleTarget { .. })
    ));
    assert_eq!(proxy.target().unwrap().ty().name(), "English");
}

struct SkipGreet;

impl ProxyGenerationHook for SkipGreet {
    fn should_intercept(&self, _declaring: &str, method: &MethodSig) -> bool {
        method.name() != "Greet"
    }
}

#[test]
fn uninterrupted_members_of_swappable_proxies_tolerate_a_missing_target() {
    init_tracing();
    let factory = ProxyFactory::new();
    let options = GenerationOptions::new().hook(SkipGreet);
    let proxy = factory
        .create_contract_proxy_with_target_contract(&greeter(), &[], None, &options, &[])
        .unwrap();

    assert!(proxy.invoke("Greet", &mut []).unwrap().is_null());

    let english = speaker("English", "hello");
    proxy
        .invoke("DynProxySetTarget", &mut [Value::of(Target::of(&english, ()))])
        .unwrap();
    assert_eq!(greeting(&proxy).as_deref(), Some("hello"));

    let current = proxy.invoke("DynProxyGetTarget", &mut []).unwrap();
    assert_eq!(current.get::<Target>().map(|t| t.ty().name()), Some("English"));

    // Intercepted members still need a target once the chain is exhausted
    let intercepted = factory
        .create_contract_proxy_with_target_contract(&greeter(), &[], None, &GenerationOptions::new(), &[])
        .unwrap();
    assert!(matches!(
        intercepted.invoke("Greet", &mut []),
        Err(CallError::NoTarget { .. })
    ));
}

#[test]
fn proxies_can_target_other_proxies() {
    init_tracing();
    let factory = ProxyFactory::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let inner = factory
        .create_contract_proxy_with_target(
            &greeter(),
            &[],
            Target::of(&speaker("English", "hello"), ()),
            &GenerationOptions::new(),
            &[counting(&calls)],
        )
        .unwrap();
    let outer = factory
        .create_contract_proxy_with_target_contract(
            &greeter(),
            &[],
            Some(inner.as_target()),
            &GenerationOptions::new(),
            &[counting(&calls)],
        )
        .unwrap();

    assert_eq!(greeting(&outer).as_deref(), Some("hello"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(Proxy::is_proxy(outer.target().unwrap().instance()));
    assert_eq!(outer.unproxied_target().unwrap().ty().name(), "English");

    let descriptor = inner.proxy_type().class_descriptor();
    assert!(Proxy::is_proxy_type(descriptor));
    assert!(matches!(
        factory.create_class_proxy_type(descriptor, &[], &GenerationOptions::new()),
        Err(GenerationError::InvalidBaseType {
            reason: BaseTypeDefect::AlreadyProxy,
            ..
        })
    ));
}

#[test]
fn members_shared_by_two_contracts_are_qualified() {
    init_tracing();
    let first = Contract::builder("IA").method(MethodSig::new("Run")).build();
    let second = Contract::builder("IB").method(MethodSig::new("Run")).build();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record: Arc<dyn Interceptor> = {
        let seen = Arc::clone(&seen);
        Arc::new(move |invocation: &mut Invocation| -> Result<(), CallError> {
            let member = invocation.invocation_type().member().to_string();
            seen.lock().push(member);
            Ok(())
        })
    };
    let proxy = ProxyFactory::new()
        .create_contract_proxy_without_target(&first, &[second], &GenerationOptions::new(), &[record])
        .unwrap();

    let names: Vec<&str> = proxy.proxy_type().member_names().collect();
    assert!(names.contains(&"Run"));
    assert!(names.contains(&"IB.Run"));

    proxy.invoke("IB.Run", &mut []).unwrap();
    proxy.invoke_contract("IA", "Run", &mut []).unwrap();
    assert_eq!(*seen.lock(), vec!["IB.Run".to_string(), "Run".to_string()]);
}

#[derive(Default)]
struct Logger {
    lines: Mutex<Vec<String>>,
}

fn logging() -> Arc<Contract> {
    Contract::builder("ILogging")
        .method(MethodSig::new("Log").param(Parameter::value("message", string())))
        .build()
}

fn logger_class() -> Arc<ClassType> {
    ClassType::builder("Logger")
        .implements(&logging())
        .method(
            ClassMethod::new(MethodSig::new("Log").param(Parameter::value("message", string())))
                .implemented_by(Implementation::typed(|logger: &Logger, args: &mut [Value], _| {
                    if let Some(message) = args[0].get::<String>() {
                        logger.lines.lock().push(message.clone());
                    }
                    Ok(Value::null())
                })),
        )
        .build()
}

#[test]
fn mixins_forward_their_contracts_to_the_mixin_instance() {
    init_tracing();
    let service = Contract::builder("IService").method(MethodSig::new("Run")).build();
    let logger = Target::of(&logger_class(), Logger::default());
    let options = GenerationOptions::new().add_mixin(logger.clone());
    let calls = Arc::new(AtomicUsize::new(0));
    let factory = ProxyFactory::new();

    let proxy = factory
        .create_contract_proxy_without_target(&service, &[], &options, &[counting(&calls)])
        .unwrap();
    proxy
        .invoke("Log", &mut [Value::of("started".to_string())])
        .unwrap();

    let lines = logger.downcast_ref::<Logger>().unwrap().lines.lock().clone();
    assert_eq!(lines, vec!["started".to_string()]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(proxy.proxy_type().implements("ILogging"));
    assert!(proxy
        .proxy_type()
        .fields()
        .iter()
        .any(|f| f.name() == "__mixin_ILogging"));

    let ty = factory
        .create_contract_proxy_type_without_target(&service, &[], &options)
        .unwrap();
    assert!(matches!(
        ty.instantiate(ProxyArgs::new()),
        Err(InstantiationError::MissingMixin { ref contract, .. }) if contract == "ILogging"
    ));
}

#[test]
fn mixins_may_not_overlap() {
    let twin = ClassType::builder("TwinLogger").implements(&logging()).build();
    let options = GenerationOptions::new()
        .add_mixin(Target::of(&logger_class(), Logger::default()))
        .add_mixin(Target::of(&twin, ()));
    let service = Contract::builder("IService").build();

    assert!(matches!(
        ProxyFactory::new().create_contract_proxy_type_without_target(&service, &[], &options),
        Err(GenerationError::MixinCollision { .. })
    ));
}

#[test]
fn unsuitable_base_classes_are_rejected_and_never_cached() {
    init_tracing();
    let factory = ProxyFactory::new();
    let sealed = ClassType::builder("Locked")
        .sealed()
        .default_constructor::<()>()
        .build();
    let bare = ClassType::builder("Bare").build();

    for (class, expected) in [
        (&sealed, BaseTypeDefect::Sealed),
        (&bare, BaseTypeDefect::NoAccessibleConstructor),
    ] {
        match factory.create_class_proxy(class, &[], &GenerationOptions::new(), &[]) {
            Err(Error::Generation(GenerationError::InvalidBaseType { reason, .. })) => {
                assert_eq!(reason, expected)
            }
            other => panic!("expected {:?}, got {:?}", expected, other.map(|_| ())),
        }
    }

    let options = GenerationOptions::new().base_type_for_contract_proxy(&sealed);
    assert!(matches!(
        factory.create_contract_proxy_type_without_target(&greeter(), &[], &options),
        Err(GenerationError::InvalidBaseType {
            reason: BaseTypeDefect::Sealed,
            ..
        })
    ));
    assert!(matches!(
        factory.create_contract_proxy_type_without_target(
            &greeter(),
            &[Contract::target_accessor()],
            &GenerationOptions::new()
        ),
        Err(GenerationError::MalformedRequest(_))
    ));
    assert!(factory.cache().is_empty());
}

#[test]
fn targetless_kinds_refuse_a_target() {
    let factory = ProxyFactory::new();
    let ty = factory
        .create_contract_proxy_type_without_target(&greeter(), &[], &GenerationOptions::new())
        .unwrap();
    let english = speaker("English", "hello");

    assert!(matches!(
        ty.instantiate(ProxyArgs::new().target(Target::of(&english, ()))),
        Err(InstantiationError::TargetNotAccepted { .. })
    ));
    assert!(!ty.fields().iter().any(|f| f.name() == "__target"));
}

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use vokal::{
    formant_param_specs, ComponentRegistry, Engine, Error, FilterParams, FormantFilter,
    InstantiationOptions, Originator, ParamUnit, ParameterTree, Readiness, UnitFactory,
    ATTACK_DURATION, CENTER_FREQUENCY, DECAY_DURATION, FORMANT_DISPLAY_NAME, FORMANT_EFFECT,
};

/// Stand-in for the host-managed formant unit: a real parameter tree,
/// a playing flag, and no DSP.
struct MockUnit {
    tree: ParameterTree,
    playing: AtomicBool,
}

impl MockUnit {
    fn with_tree(tree: ParameterTree) -> Self {
        Self {
            tree,
            playing: AtomicBool::new(false),
        }
    }
}

impl vokal::EffectUnit for MockUnit {
    fn parameter_tree(&self) -> &ParameterTree {
        &self.tree
    }

    fn start(&self) {
        self.playing.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.playing.store(false, Ordering::SeqCst);
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

type TreeSlot = Arc<Mutex<Option<ParameterTree>>>;

/// Factory that clones the unit's tree into `slot` so tests can poke the
/// "external" side directly. `delay` simulates slow host instantiation.
fn capture_factory(slot: TreeSlot, delay: Duration) -> UnitFactory {
    Arc::new(move |_opts| {
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        let tree = ParameterTree::new(&formant_param_specs());
        *slot.lock().unwrap() = Some(tree.clone());
        Ok(Arc::new(MockUnit::with_tree(tree)))
    })
}

fn registered(slot: &TreeSlot, delay: Duration) -> ComponentRegistry {
    let registry = ComponentRegistry::new();
    registry
        .register(
            FORMANT_EFFECT,
            FORMANT_DISPLAY_NAME,
            1,
            capture_factory(slot.clone(), delay),
        )
        .unwrap();
    registry
}

fn build(
    registry: &ComponentRegistry,
    params: FilterParams,
) -> (FormantFilter, Arc<Engine>, vokal::NodeId) {
    let engine = Arc::new(Engine::new());
    let source = engine.attach("source");
    let filter = FormantFilter::with_registry(
        registry,
        engine.clone(),
        source,
        params,
        InstantiationOptions::default(),
    );
    (filter, engine, source)
}

fn pump_until_resolved(filter: &mut FormantFilter) -> Readiness {
    let deadline = Instant::now() + Duration::from_secs(5);
    while filter.readiness() == Readiness::NotReady {
        filter.pump();
        assert!(Instant::now() < deadline, "unit never resolved");
        thread::sleep(Duration::from_millis(1));
    }
    // drain echoes of the attach-time parameter pushes
    filter.pump();
    filter.readiness()
}

/// Counts tree changes caused by the filter itself, i.e. pushes.
fn count_pushes(tree: &ParameterTree, originator: Originator) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    tree.subscribe(move |change| {
        if change.originator == originator {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });
    count
}

#[test]
fn constructor_values_read_back_before_completion() {
    let slot: TreeSlot = Arc::default();
    let registry = registered(&slot, Duration::from_millis(100));

    let params = FilterParams {
        center_frequency: 440.0,
        attack_duration: 0.02,
        decay_duration: 0.5,
    };
    let (mut filter, _engine, _src) = build(&registry, params);

    assert_eq!(filter.readiness(), Readiness::NotReady);
    assert_eq!(filter.center_frequency(), 440.0);
    assert_eq!(filter.attack_duration(), 0.02);
    assert_eq!(filter.decay_duration(), 0.5);
    assert_eq!(filter.params(), params);

    // transport is a defined error before the unit exists, not a crash
    assert!(matches!(filter.start(), Err(Error::NotReady)));
    assert!(matches!(filter.stop(), Err(Error::NotReady)));
    assert!(matches!(filter.is_started(), Err(Error::NotReady)));

    pump_until_resolved(&mut filter);
}

#[test]
fn defaults_match_documented_values() {
    let params = FilterParams::default();
    assert_eq!(params.center_frequency, 1000.0);
    assert_eq!(params.attack_duration, 0.007);
    assert_eq!(params.decay_duration, 0.04);
}

#[test]
fn writes_before_ready_reach_the_unit() {
    let slot: TreeSlot = Arc::default();
    let registry = registered(&slot, Duration::from_millis(50));
    let (mut filter, _engine, _src) = build(&registry, FilterParams::default());

    filter.set_center_frequency(1234.0).unwrap();
    assert_eq!(filter.center_frequency(), 1234.0);
    assert_eq!(filter.readiness(), Readiness::NotReady);

    assert_eq!(pump_until_resolved(&mut filter), Readiness::Ready);

    let tree = slot.lock().unwrap().clone().unwrap();
    let handle = tree.lookup(CENTER_FREQUENCY).unwrap();
    assert_eq!(handle.value(), 1234.0);
}

#[test]
fn equal_value_write_is_a_no_op() {
    let slot: TreeSlot = Arc::default();
    let registry = registered(&slot, Duration::ZERO);
    let (mut filter, _engine, _src) = build(&registry, FilterParams::default());
    pump_until_resolved(&mut filter);

    let tree = slot.lock().unwrap().clone().unwrap();
    let pushes = count_pushes(&tree, filter.originator());

    filter.set_center_frequency(1000.0).unwrap();
    filter.set_attack_duration(0.007).unwrap();
    filter.set_decay_duration(0.04).unwrap();
    assert_eq!(pushes.load(Ordering::SeqCst), 0);

    filter.set_center_frequency(880.0).unwrap();
    assert_eq!(pushes.load(Ordering::SeqCst), 1);
    filter.set_attack_duration(0.01).unwrap();
    assert_eq!(pushes.load(Ordering::SeqCst), 2);
}

#[test]
fn spec_scenario_push_and_echo() {
    // construct with defaults; set center 2000 -> one push of 2000.0;
    // external decay change 0.08 -> cache follows, no push
    let slot: TreeSlot = Arc::default();
    let registry = registered(&slot, Duration::ZERO);
    let (mut filter, _engine, _src) = build(&registry, FilterParams::default());
    pump_until_resolved(&mut filter);

    let tree = slot.lock().unwrap().clone().unwrap();
    let pushes = count_pushes(&tree, filter.originator());

    filter.set_center_frequency(2000.0).unwrap();
    assert_eq!(pushes.load(Ordering::SeqCst), 1);
    assert_eq!(filter.center_frequency(), 2000.0);
    assert_eq!(tree.lookup(CENTER_FREQUENCY).unwrap().value(), 2000.0);

    let decay = tree.lookup(DECAY_DURATION).unwrap();
    decay.set_value(0.08, Originator::EXTERNAL);
    filter.pump();

    assert_eq!(filter.decay_duration(), 0.08);
    assert_eq!(pushes.load(Ordering::SeqCst), 1);
}

#[test]
fn echo_of_own_push_is_idempotent() {
    let slot: TreeSlot = Arc::default();
    let registry = registered(&slot, Duration::ZERO);
    let (mut filter, _engine, _src) = build(&registry, FilterParams::default());
    pump_until_resolved(&mut filter);

    filter.set_center_frequency(2000.0).unwrap();
    // the push triggers the filter's own subscription; draining the echo
    // must leave the cache exactly where the write put it
    assert_eq!(filter.pump(), 1);
    assert_eq!(filter.center_frequency(), 2000.0);

    // and a hand-delivered duplicate echo changes nothing either
    let tree = slot.lock().unwrap().clone().unwrap();
    tree.lookup(CENTER_FREQUENCY)
        .unwrap()
        .set_value(2000.0, filter.originator());
    filter.pump();
    assert_eq!(filter.center_frequency(), 2000.0);
}

#[test]
fn start_stop_lifecycle() {
    let slot: TreeSlot = Arc::default();
    let registry = registered(&slot, Duration::ZERO);
    let (mut filter, _engine, _src) = build(&registry, FilterParams::default());
    pump_until_resolved(&mut filter);

    assert!(!filter.is_started().unwrap());
    filter.start().unwrap();
    assert!(filter.is_started().unwrap());
    filter.stop().unwrap();
    assert!(!filter.is_started().unwrap());
}

#[test]
fn ready_node_is_wired_into_the_engine() {
    let slot: TreeSlot = Arc::default();
    let registry = registered(&slot, Duration::ZERO);
    let (mut filter, engine, source) = build(&registry, FilterParams::default());

    assert_eq!(filter.node_id(), None);
    pump_until_resolved(&mut filter);

    let node = filter.node_id().expect("attached node");
    assert!(engine.is_attached(node));
    assert!(engine.is_connected(source, node));
    assert_eq!(engine.node_count(), 2);
}

#[test]
fn concurrent_notifications_are_serialized() {
    let slot: TreeSlot = Arc::default();
    let registry = registered(&slot, Duration::ZERO);
    let (mut filter, _engine, _src) = build(&registry, FilterParams::default());
    pump_until_resolved(&mut filter);

    let tree = slot.lock().unwrap().clone().unwrap();
    let center = tree.lookup(CENTER_FREQUENCY).unwrap();
    let attack = tree.lookup(ATTACK_DURATION).unwrap();

    const THREADS: usize = 4;
    const WRITES: usize = 250;

    let mut workers = Vec::new();
    for t in 0..THREADS {
        let center = center.clone();
        let attack = attack.clone();
        workers.push(thread::spawn(move || {
            let originator = Originator::unique();
            for i in 0..WRITES {
                center.set_value(100.0 + (t * WRITES + i) as f64, originator);
                attack.set_value(0.001 + (t * WRITES + i) as f64 * 1e-6, originator);
            }
        }));
    }

    // drain while the writers hammer the tree from their own threads
    let mut applied = 0;
    while workers.iter().any(|w| !w.is_finished()) {
        applied += filter.pump();
    }
    for worker in workers {
        worker.join().unwrap();
    }
    applied += filter.pump();

    // every notification arrived exactly once, and the cache converged on
    // whichever write the tree serialized last
    assert_eq!(applied, THREADS * WRITES * 2);
    assert_eq!(filter.center_frequency(), center.value());
    assert_eq!(filter.attack_duration(), attack.value());
    assert!(filter.center_frequency() >= 100.0);
    assert!(filter.attack_duration() >= 0.001);
    // decay was never touched from any thread
    assert_eq!(filter.decay_duration(), 0.04);
}

#[test]
fn failed_wiring_leaves_the_engine_untouched() {
    let slot: TreeSlot = Arc::default();
    let registry = registered(&slot, Duration::ZERO);

    // an upstream id from a different engine can never be wired here
    let engine = Arc::new(Engine::new());
    let other = Engine::new();
    let foreign = other.attach("foreign source");

    let mut filter = FormantFilter::with_registry(
        &registry,
        engine.clone(),
        foreign,
        FilterParams::default(),
        InstantiationOptions::default(),
    );

    assert_eq!(pump_until_resolved(&mut filter), Readiness::Failed);
    assert!(matches!(
        filter.instantiation_error(),
        Some(Error::UnknownNode(_))
    ));
    // the failed node must not linger in the shared engine
    assert_eq!(engine.node_count(), 0);
    assert_eq!(filter.node_id(), None);
}

#[test]
fn param_units_render_for_display() {
    let specs = formant_param_specs();
    assert_eq!(specs[0].unit, ParamUnit::Hertz);
    assert_eq!(specs[0].unit.to_string(), "Hz");
    assert_eq!(specs[1].unit.to_string(), "s");
    assert_eq!(specs[2].unit, ParamUnit::Seconds);

    let tree = ParameterTree::new(&specs);
    let center = tree.lookup(CENTER_FREQUENCY).unwrap();
    assert_eq!(center.unit(), ParamUnit::Hertz);
}

#[test]
fn unregistered_component_fails_the_node() {
    let registry = ComponentRegistry::new();
    let (mut filter, _engine, _src) = build(&registry, FilterParams::default());

    assert_eq!(pump_until_resolved(&mut filter), Readiness::Failed);
    assert!(matches!(
        filter.instantiation_error(),
        Some(Error::ComponentNotFound(_))
    ));
    assert!(matches!(filter.start(), Err(Error::UnitFailed { .. })));
    assert!(matches!(
        filter.set_center_frequency(2000.0),
        Err(Error::UnitFailed { .. })
    ));
    // the failed write must not dirty the cache
    assert_eq!(filter.center_frequency(), 1000.0);
}

#[test]
fn factory_error_surfaces_as_failed() {
    let registry = ComponentRegistry::new();
    registry
        .register(
            FORMANT_EFFECT,
            FORMANT_DISPLAY_NAME,
            1,
            Arc::new(|_| Err(Error::InstantiationFailed("no DSP today".into()))),
        )
        .unwrap();

    let (mut filter, _engine, _src) = build(&registry, FilterParams::default());
    assert_eq!(pump_until_resolved(&mut filter), Readiness::Failed);
    assert!(matches!(
        filter.instantiation_error(),
        Some(Error::InstantiationFailed(_))
    ));
}

#[test]
fn registration_is_idempotent_but_conflicts_are_rejected() {
    let slot: TreeSlot = Arc::default();
    let registry = ComponentRegistry::new();
    let factory = capture_factory(slot, Duration::ZERO);

    registry
        .register(FORMANT_EFFECT, FORMANT_DISPLAY_NAME, 1, factory.clone())
        .unwrap();
    // same identity: fine
    registry
        .register(FORMANT_EFFECT, FORMANT_DISPLAY_NAME, 1, factory.clone())
        .unwrap();
    // different version: rejected, original stays
    let conflict = registry.register(FORMANT_EFFECT, FORMANT_DISPLAY_NAME, 2, factory.clone());
    assert!(matches!(conflict, Err(Error::ConflictingRegistration(_))));
    // different name: rejected too
    let conflict = registry.register(FORMANT_EFFECT, "Robot Voice", 1, factory);
    assert!(matches!(conflict, Err(Error::ConflictingRegistration(_))));

    assert!(registry.is_registered(&FORMANT_EFFECT));
    assert_eq!(
        registry.display_name(&FORMANT_EFFECT).as_deref(),
        Some(FORMANT_DISPLAY_NAME)
    );
}

#[test]
fn tree_clamps_and_ignores_unknown_names() {
    let tree = ParameterTree::new(&formant_param_specs());
    assert_eq!(tree.len(), 3);
    assert!(tree.lookup("resonance").is_none());

    let center = tree.lookup(CENTER_FREQUENCY).unwrap();
    let stored = center.set_value(50_000.0, Originator::EXTERNAL);
    assert_eq!(stored, 20_000.0);
    assert_eq!(center.value(), 20_000.0);

    let attack = tree.lookup(ATTACK_DURATION).unwrap();
    assert_eq!(attack.set_value(-1.0, Originator::EXTERNAL), 0.0);
}

#[test]
fn unsubscribed_observer_stops_firing() {
    let tree = ParameterTree::new(&formant_param_specs());
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    let token = tree.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let center = tree.lookup(CENTER_FREQUENCY).unwrap();
    center.set_value(2000.0, Originator::EXTERNAL);
    assert_eq!(count.load(Ordering::SeqCst), 1);

    tree.unsubscribe(&token);
    center.set_value(3000.0, Originator::EXTERNAL);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn unknown_engine_node_is_an_error() {
    let engine = Engine::new();
    let a = engine.attach("a");
    let other = Engine::new();
    let phantom = other.attach("phantom");

    assert!(engine.connect(a, a).is_ok());
    assert!(matches!(
        engine.connect(a, phantom),
        Err(Error::UnknownNode(_))
    ));
    assert!(!engine.is_connected(a, phantom));
}

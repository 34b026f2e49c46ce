//! Example: wiring a formant filter node and sweeping its center frequency
//!
//! This demonstrates the full lifecycle: one-time component registration,
//! node construction against a shared engine, waiting for the asynchronous
//! unit instantiation, and message-driven parameter control.
//!
//! Run with: cargo run --example formant_sweep

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};

use vokal::{
    formant_param_specs, register_formant_unit, EffectUnit, Engine, FilterParams, FormantFilter,
    ParameterTree, Readiness, UnitFactory,
};

// =============================================================================
// Step 1: Provide a unit implementation
// =============================================================================
//
// In a real host this comes from the platform: an opaque component that does
// the actual filtering. Here a stub with a genuine parameter tree stands in,
// so the example runs anywhere.

struct StubFormantUnit {
    tree: ParameterTree,
    playing: AtomicBool,
}

impl EffectUnit for StubFormantUnit {
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

fn stub_factory() -> UnitFactory {
    Arc::new(|opts| {
        println!("instantiating stub formant unit @ {} Hz", opts.sample_rate);
        Ok(Arc::new(StubFormantUnit {
            tree: ParameterTree::new(&formant_param_specs()),
            playing: AtomicBool::new(false),
        }))
    })
}

// =============================================================================
// Step 2: Register once, construct nodes freely
// =============================================================================

fn main() {
    tracing_subscriber::fmt::init();

    register_formant_unit(stub_factory()).expect("component registration");

    let engine = Arc::new(Engine::new());
    let source = engine.attach("oscillator");

    let mut filter = FormantFilter::new(engine.clone(), source, FilterParams::default());
    println!(
        "constructed: cf={} Hz, readiness={:?}",
        filter.center_frequency(),
        filter.readiness()
    );

    // The unit arrives asynchronously; pump until it does.
    while filter.readiness() == Readiness::NotReady {
        filter.pump();
        sleep(Duration::from_millis(1));
    }
    println!("ready, node {:?} wired after source", filter.node_id());

    filter.start().expect("start");

    // =========================================================================
    // Step 3: Sweep the center frequency, pumping echoes as we go
    // =========================================================================

    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(2) {
        let t = start.elapsed().as_secs_f64();
        // 200 Hz .. 3200 Hz, four octaves over two seconds
        let cf = 200.0 * 2f64.powf(t * 2.0);
        filter.set_center_frequency(cf).expect("parameter write");
        filter.pump();
        sleep(Duration::from_millis(10));
    }

    filter.stop().expect("stop");
    println!(
        "done: cf={:.0} Hz, started={}",
        filter.center_frequency(),
        filter.is_started().expect("is_started")
    );
}

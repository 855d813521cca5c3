//! Process-wide init/end semantics, in their own test process so the
//! global guard starts clean.

use longeron_core::config::EngineConfig;
use longeron_core::engine::Engine;

#[test]
fn test_init_end_cycle_allows_reinit() {
    let engine = Engine::init(EngineConfig::new().with_workers(1)).unwrap();
    assert_eq!(engine.connection_count(), 0);
    engine.end();

    // After a clean end, the process may establish a fresh engine.
    let engine = Engine::init(EngineConfig::new().with_workers(1)).unwrap();

    // While it is live, a second init is refused.
    assert!(Engine::init(EngineConfig::new().with_workers(1)).is_err());

    // Dropping without an explicit end also releases the guard.
    drop(engine);
    let engine = Engine::init(EngineConfig::new().with_workers(1)).unwrap();
    engine.end();
}

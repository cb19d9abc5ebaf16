use crate::frontend::server_state::ServerState;
use crate::logging::init_for_tests;

#[test]
fn test_server_state_starts_running() {
    init_for_tests();

    let server_state = ServerState::new();
    assert!(!server_state.is_shutting_down());
}

#[test]
fn test_server_state_shutdown_is_shared_by_clones() {
    init_for_tests();

    let server_state = ServerState::new();
    let clone = server_state.clone();

    server_state.signal_shutdown();

    assert!(server_state.is_shutting_down());
    assert!(clone.is_shutting_down());
}

use msc_core::errors::{ErrorInfo, MscError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("id", "1")
        .with_context("reason", "example")
}

#[test]
fn config_error_surface() {
    let err = MscError::Config(sample_info("no-tree-source", "no source given"));
    assert_eq!(err.info().code, "no-tree-source");
    assert!(err.info().context.contains_key("id"));
}

#[test]
fn duplicate_init_error_surface() {
    let err = MscError::DuplicateInit(sample_info("node-claimed-twice", "already initialized"));
    assert_eq!(err.info().code, "node-claimed-twice");
    assert!(err.info().context.contains_key("reason"));
}

#[test]
fn invalid_state_error_surface() {
    let err = MscError::InvalidState(sample_info("run-finished", "driver already ran"));
    assert_eq!(err.info().code, "run-finished");
}

#[test]
fn kernel_error_surface() {
    let err = MscError::Kernel(sample_info("stale-link-tree", "tree deleted"));
    assert_eq!(err.info().code, "stale-link-tree");
}

#[test]
fn display_includes_context_and_hint() {
    let err = MscError::Tree(
        ErrorInfo::new("unknown-node", "node does not exist")
            .with_context("node", 7)
            .with_hint("check the node index"),
    );
    let rendered = err.to_string();
    assert!(rendered.contains("unknown-node"));
    assert!(rendered.contains("node=7"));
    assert!(rendered.contains("check the node index"));
}

#[test]
fn errors_roundtrip_through_json() {
    let err = MscError::Kernel(sample_info("kernel-size-mismatch", "size parameter diverged"));
    let json = serde_json::to_string(&err).unwrap();
    assert!(json.contains("\"family\":\"Kernel\""));
    let back: MscError = serde_json::from_str(&json).unwrap();
    assert_eq!(back, err);
}

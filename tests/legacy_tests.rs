//! Single-pass directory processing

mod fixtures;

use std::fs;
use std::sync::Arc;

use fixtures::{pipeline, Workspace};
use webstart_deps::config::ConfigError;
use webstart_deps::filter::{list_files, FileFilter};
use webstart_deps::mock::{MockToolkit, ToolOp, SIGNED_MARKER};
use webstart_deps::PipelineError;

#[test]
fn test_each_stage_finishes_for_all_jars_first() {
    let ws = Workspace::new();
    let artifacts: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|n| ws.artifact(n, "1.0", n.as_bytes()))
        .collect();
    let toolkit = Arc::new(MockToolkit::new());
    let report = pipeline(ws.signing_config(), &toolkit)
        .run_legacy(&artifacts)
        .unwrap();

    assert_eq!(report.signed_count, 3);
    assert_eq!(report.processed.len(), 3);

    let ops: Vec<ToolOp> = toolkit.calls().iter().map(|c| c.op).collect();
    let last = |op: ToolOp| ops.iter().rposition(|o| *o == op).unwrap();
    let first = |op: ToolOp| ops.iter().position(|o| *o == op).unwrap();
    assert!(last(ToolOp::Unpack) < first(ToolOp::Sign));
    assert_eq!(ops.iter().filter(|o| **o == ToolOp::Sign).count(), 3);
    assert!(ops[..3].iter().all(|o| *o == ToolOp::Pack));
    assert!(ops[3..6].iter().all(|o| *o == ToolOp::Unpack));

    for name in ["a.jar", "b.jar", "c.jar"] {
        let jar = fs::read(ws.out(name)).unwrap();
        assert!(jar.starts_with(SIGNED_MARKER), "{name}");
        assert!(ws.out(&format!("{name}.pack")).exists());
    }
    let leftovers = list_files(&ws.path().join("out"), &FileFilter::is_unprocessed()).unwrap();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}

#[test]
fn test_second_legacy_run_skips_deployed_jars() {
    let ws = Workspace::new();
    let artifacts = vec![ws.artifact("a", "1.0", b"a")];
    let toolkit = Arc::new(MockToolkit::new());
    let pipeline = pipeline(ws.signing_config(), &toolkit);

    pipeline.run_legacy(&artifacts).unwrap();
    toolkit.reset_calls();
    let report = pipeline.run_legacy(&artifacts).unwrap();

    assert_eq!(report.signed_count, 0);
    assert!(report.processed.is_empty());
    assert!(toolkit.calls().is_empty());
}

#[test]
fn test_unsign_refusal_precedes_staging() {
    let ws = Workspace::new();
    let mut config = ws.signing_config();
    config.unsign_already_signed_jars = true;
    config.can_unsign = false;
    let artifacts = vec![
        ws.artifact("plain", "1.0", b"plain"),
        ws.artifact("vendor", "1.0", &[SIGNED_MARKER, b"vendor".as_slice()].concat()),
    ];

    let toolkit = Arc::new(MockToolkit::new());
    let err = pipeline(config, &toolkit).run_legacy(&artifacts).unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Config(ConfigError::UnsignNotPermitted { .. })
    ));
    assert_eq!(err.exit_code(), 2);
    assert!(toolkit.calls().is_empty());
    assert!(!ws.path().join("out").exists());
}

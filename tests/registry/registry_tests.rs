// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use rstest::rstest;
use serde_json::json;
use std::io::Write;
use std::sync::{Arc, Mutex};

use kraskov::EstimatorError;
use kraskov::estimators::registry::{self, ESTIMATORS};
use kraskov::estimators::{EstimatorKind, MutualInformation, MutualInformationEstimator, resolve};

use crate::test_helpers::generate_correlated_pair;

#[rstest]
#[case("gpu_kraskov", true)]
#[case("kraskov", false)]
#[case("gaussian", false)]
#[case("discrete", false)]
fn resolves_registered_names(#[case] name: &str, #[case] parallel: bool) {
    let resolved = resolve(name);
    let kind = resolved.kind.expect("registered name");
    assert_eq!(kind.name(), name);
    assert_eq!(resolved.supports_parallel, parallel);
    assert_eq!(registry::is_parallel(name), parallel);
    assert!(registry::exists(name));
}

#[rstest]
#[case("")]
#[case("Kraskov")]
#[case("opencl_kraskov")]
fn unknown_names_resolve_to_nothing(#[case] name: &str) {
    let resolved = resolve(name);
    assert!(resolved.kind.is_none());
    assert!(!resolved.supports_parallel);
    assert!(!registry::is_parallel(name));
}

/// Log sink shared between the subscriber and the test body.
#[derive(Clone, Default)]
struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl CapturedLog {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn unknown_name_is_logged() {
    let log = CapturedLog::default();
    let writer = log.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("warn"))
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, || {
        assert!(resolve("no_such_estimator").kind.is_none());
        assert!(resolve("kraskov").kind.is_some());
    });

    let output = log.contents();
    let warnings: Vec<_> = output.lines().filter(|l| l.contains("WARN")).collect();
    assert_eq!(warnings.len(), 1, "{output}");
    assert!(warnings[0].contains("no_such_estimator"), "{output}");
}

#[test]
fn registry_is_consistent() {
    assert_eq!(ESTIMATORS.len(), registry::known_names().len());
    for d in ESTIMATORS {
        let kind: EstimatorKind = d.name.parse().unwrap();
        assert_eq!(kind, d.kind);
        assert_eq!(kind.to_string(), d.name);
    }
}

#[test]
fn built_estimators_report_their_name() {
    for d in ESTIMATORS {
        let est = MutualInformation::from_name(d.name, json!({})).unwrap();
        assert_eq!(est.name(), d.name);
        assert_eq!(est.supports_parallel(), d.supports_parallel);
    }
}

#[test]
fn from_name_applies_options() {
    let (x, y) = generate_correlated_pair(300, 0.5, 1);
    let est = MutualInformation::from_name("kraskov", json!({"kraskov_k": 3, "noise_level": 0.0})).unwrap();
    let direct = MutualInformation::new_kraskov(
        kraskov::estimators::EstimatorOptions::default()
            .with_k(3)
            .with_noise_level(0.0),
    )
    .unwrap();
    assert_eq!(
        est.estimate(x.view(), y.view(), 1).unwrap(),
        direct.estimate(x.view(), y.view(), 1).unwrap()
    );
}

#[rstest]
#[case("kraskov", json!({"kraskov_k": -1}))]
#[case("kraskov", json!({"theiler_t": "sometimes"}))]
#[case("kraskov", json!(42))]
#[case("unknown", json!({}))]
fn from_name_rejects_bad_configuration(#[case] name: &str, #[case] opts: serde_json::Value) {
    assert!(matches!(
        MutualInformation::from_name(name, opts),
        Err(EstimatorError::InvalidConfiguration(_))
    ));
}

#[cfg(not(feature = "gpu_support"))]
#[test]
fn gpu_kraskov_without_feature_fails_at_call_time() {
    let (x, y) = generate_correlated_pair(64, 0.5, 1);
    let est = MutualInformation::from_name("gpu_kraskov", serde_json::Value::Null).unwrap();
    assert!(est.supports_parallel());
    assert!(matches!(
        est.estimate(x.view(), y.view(), 2),
        Err(EstimatorError::DeviceOrBackendError { .. })
    ));
}

#[cfg(feature = "gpu_support")]
#[test]
#[ignore = "requires a GPU adapter"]
fn gpu_kraskov_matches_kd_tree_estimates() {
    use kraskov::estimators::EstimatorOptions;
    use kraskov::estimators::approaches::neighbours::KdTreeBackend;

    let (x, y) = generate_correlated_pair(2048, 0.6, 3);
    let opts = EstimatorOptions::default().with_seed(5);
    let gpu = MutualInformation::new_gpu_kraskov(opts.clone()).unwrap();
    let cpu = MutualInformation::new_kraskov_with_backend(KdTreeBackend::new(), opts).unwrap();
    let a = gpu.estimate(x.view(), y.view(), 8).unwrap();
    let b = cpu.estimate(x.view(), y.view(), 8).unwrap();
    for (g, c) in a.iter().zip(&b) {
        assert!((g - c).abs() < 0.02, "gpu {g} vs cpu {c}");
    }
}

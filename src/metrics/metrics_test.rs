use super::*;

fn create_test_registry() -> Registry {
    let registry = Registry::new_custom(Some("nacos_compat".to_string()), None).unwrap();
    register_custom_metrics(&registry);
    registry
}

#[test]
fn test_custom_registry() {
    let registry = create_test_registry();

    PUSH_TOTAL_METRIC.with_label_values(&["datagram", "success"]).inc();
    let metrics = &registry.gather();
    assert!(!metrics.is_empty());

    let metric_names: Vec<_> = metrics.iter().map(|m| m.get_name()).collect();
    assert!(
        metric_names.contains(&"nacos_compat_push_total"),
        "Missing nacos_compat_push_total"
    );
}

#[test]
fn test_counter_increment() {
    let before = EVICTED_CONNECTIONS_METRIC.get();
    EVICTED_CONNECTIONS_METRIC.inc();

    assert_eq!(EVICTED_CONNECTIONS_METRIC.get(), before + 1);
}

#[test]
fn test_gather_metrics_renders_text() {
    SYNC_CHANGED_SERVICES_METRIC.inc();

    let text = gather_metrics();
    assert!(text.contains("sync_changed_services"));
}

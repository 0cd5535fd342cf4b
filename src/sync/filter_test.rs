use super::*;
use crate::Instance;
use crate::ResourceKey;
use crate::ServiceView;

fn view(
    threshold: f32,
    instances: Vec<Instance>,
) -> ServiceView {
    ServiceView {
        protect_threshold: threshold,
        instances,
        revision: "7".to_string(),
        ..ServiceView::empty(ResourceKey::new("ns", "g", "svc"))
    }
}

fn mixed(
    total: usize,
    healthy: usize,
) -> Vec<Instance> {
    (0..total)
        .map(|i| {
            Instance::new(format!("i-{i}"), "10.0.0.2", 9000 + i as u16).with_healthy(i < healthy)
        })
        .collect()
}

#[test]
fn pass_through_returns_view_unchanged() {
    let original = view(0.9, mixed(4, 1));

    let out = apply_filter(&original, FilterPolicy::PassThrough, &FilterContext::healthy_only());

    assert_eq!(out, original);
}

#[test]
fn ratio_equal_to_threshold_is_not_protected() {
    let out = apply_filter(
        &view(0.5, mixed(4, 2)),
        FilterPolicy::HealthProtection,
        &FilterContext::healthy_only(),
    );

    assert_eq!(out.instances.len(), 2);
    assert!(!out.reached_protect_threshold);
}

#[test]
fn above_threshold_without_healthy_only_keeps_unhealthy() {
    let out = apply_filter(
        &view(0.5, mixed(10, 8)),
        FilterPolicy::HealthProtection,
        &FilterContext::default(),
    );

    assert_eq!(out.instances.len(), 10);
    assert_eq!(out.healthy_count(), 8);
    assert!(!out.reached_protect_threshold);
}

#[test]
fn below_threshold_marks_every_instance_healthy() {
    let out = apply_filter(
        &view(0.5, mixed(10, 1)),
        FilterPolicy::HealthProtection,
        &FilterContext::default(),
    );

    assert_eq!(out.healthy_count(), 10);
    assert!(out.reached_protect_threshold);
    assert_eq!(out.revision, "7");
}

#[test]
fn zero_threshold_never_protects() {
    let out = apply_filter(
        &view(0.0, mixed(3, 0)),
        FilterPolicy::HealthProtection,
        &FilterContext::healthy_only(),
    );

    assert!(out.instances.is_empty());
    assert!(!out.reached_protect_threshold);
}

#[test]
fn empty_view_does_not_trip_protection() {
    let out = apply_filter(
        &view(0.8, Vec::new()),
        FilterPolicy::HealthProtection,
        &FilterContext::healthy_only(),
    );

    assert!(out.instances.is_empty());
    assert!(!out.reached_protect_threshold);
}

#[test]
fn protection_only_considers_requested_enabled_clusters() {
    let instances = vec![
        Instance::new("a", "10.0.0.1", 1).with_cluster("c1"),
        Instance::new("b", "10.0.0.2", 2).with_cluster("c1").with_healthy(false),
        Instance::new("c", "10.0.0.3", 3).with_cluster("c2"),
        Instance::new("d", "10.0.0.4", 4).with_cluster("c1").with_enabled(false),
    ];
    let ctx = FilterContext {
        healthy_only: true,
        clusters: vec!["c1".to_string()],
    };

    let out = apply_filter(&view(0.5, instances), FilterPolicy::HealthProtection, &ctx);

    let ids: Vec<&str> = out.instances.iter().map(|i| i.instance_id.as_str()).collect();
    assert_eq!(ids, vec!["a"]);
}

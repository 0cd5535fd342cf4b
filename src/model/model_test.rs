use super::*;

#[test]
fn resource_key_should_fill_default_namespace_and_group() {
    let key = ResourceKey::new("", "", "orders");

    assert_eq!(key.namespace, "public");
    assert_eq!(key.group, "DEFAULT_GROUP");
    assert_eq!(key.grouped_name(), "DEFAULT_GROUP@@orders");
    assert_eq!(key.to_string(), "public/DEFAULT_GROUP@@orders");
}

#[test]
fn instance_serializes_with_client_field_names() {
    let instance = Instance::new("i-1", "10.0.0.1", 8080).with_cluster("c1");
    let json = serde_json::to_value(&instance).unwrap();

    assert_eq!(json["instanceId"], "i-1");
    assert_eq!(json["clusterName"], "c1");
    assert_eq!(json["healthy"], true);
}

#[test]
fn empty_view_has_no_instances() {
    let view = ServiceView::empty(ResourceKey::new("ns", "g", "s"));

    assert!(view.instances.is_empty());
    assert_eq!(view.healthy_count(), 0);
    assert!(!view.reached_protect_threshold);
}

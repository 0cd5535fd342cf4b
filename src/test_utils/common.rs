use std::net::SocketAddr;
use std::sync::Arc;

use crate::ChangedService;
use crate::Instance;
use crate::ResourceKey;
use crate::ServiceChangeEvent;
use crate::ServiceView;

pub(crate) fn orders_key() -> ResourceKey {
    ResourceKey::new("public", "DEFAULT_GROUP", "orders")
}

/// `total` instances on 10.1.0.x, the first `healthy` of them healthy
pub(crate) fn instances(
    total: usize,
    healthy: usize,
) -> Vec<Instance> {
    (0..total)
        .map(|i| {
            Instance::new(format!("i-{i}"), format!("10.1.0.{}", i + 1), 8080)
                .with_healthy(i < healthy)
        })
        .collect()
}

pub(crate) fn view_of(
    key: ResourceKey,
    instances: Vec<Instance>,
) -> ServiceView {
    ServiceView {
        instances,
        revision: "1".to_string(),
        ..ServiceView::empty(key)
    }
}

pub(crate) fn change_event(views: Vec<ServiceView>) -> ServiceChangeEvent {
    ServiceChangeEvent {
        changed: views
            .into_iter()
            .map(|view| ChangedService {
                key: view.key.clone(),
                view: Arc::new(view),
            })
            .collect(),
    }
}

pub(crate) fn udp_addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

use crate::Instance;
use crate::ServiceView;

/// Read-side policy applied to a materialized view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterPolicy {
    /// Return the view unchanged
    #[default]
    PassThrough,
    /// Fail open to an all-healthy view when too few instances are healthy
    HealthProtection,
}

/// What the requesting client asked for
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FilterContext {
    pub healthy_only: bool,
    /// Cluster names to keep; empty keeps every cluster
    pub clusters: Vec<String>,
}

impl FilterContext {
    pub fn healthy_only() -> Self {
        Self {
            healthy_only: true,
            clusters: Vec::new(),
        }
    }
}

pub fn apply_filter(
    view: &ServiceView,
    policy: FilterPolicy,
    ctx: &FilterContext,
) -> ServiceView {
    match policy {
        FilterPolicy::PassThrough => view.clone(),
        FilterPolicy::HealthProtection => protect(view, ctx),
    }
}

fn protect(
    view: &ServiceView,
    ctx: &FilterContext,
) -> ServiceView {
    let selected: Vec<&Instance> = view
        .instances
        .iter()
        .filter(|i| i.enabled)
        .filter(|i| ctx.clusters.is_empty() || ctx.clusters.contains(&i.cluster_name))
        .collect();

    let mut out = ServiceView {
        instances: Vec::new(),
        reached_protect_threshold: false,
        ..view.clone()
    };

    let total = selected.len();
    if total == 0 {
        return out;
    }

    let healthy = selected.iter().filter(|i| i.healthy).count();
    let ratio = healthy as f32 / total as f32;

    if ratio >= view.protect_threshold {
        out.instances = selected
            .into_iter()
            .filter(|i| !ctx.healthy_only || i.healthy)
            .cloned()
            .collect();
    } else {
        out.instances = selected
            .into_iter()
            .map(|i| Instance {
                healthy: true,
                ..i.clone()
            })
            .collect();
        out.reached_protect_threshold = true;
    }
    out
}

use std::collections::BTreeMap;

use crate::model::element::{Node, Vm};

/// Kind tag for shareable-resource views, used by the solver-side view
/// registry.
pub const SHAREABLE_KIND: &str = "shareable";

/// A resource dimension shared by the VMs hosted on a node, e.g. "cpu" or
/// "mem": each VM consumes a fixed amount, each node offers a capacity.
///
/// Elements without an explicit value fall back to the view defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareableResource {
    resource: String,
    capacities: BTreeMap<Node, i32>,
    consumptions: BTreeMap<Vm, i32>,
    default_capacity: i32,
    default_consumption: i32,
}

impl ShareableResource {
    pub fn new(resource: &str) -> Self {
        Self {
            resource: resource.to_string(),
            capacities: BTreeMap::new(),
            consumptions: BTreeMap::new(),
            default_capacity: 0,
            default_consumption: 0,
        }
    }

    pub fn with_defaults(resource: &str, default_capacity: i32, default_consumption: i32) -> Self {
        Self { default_capacity, default_consumption, ..Self::new(resource) }
    }

    /// The resource name, e.g. "cpu".
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// The view identifier, unique per resource name.
    pub fn id(&self) -> String {
        format!("{}.{}", SHAREABLE_KIND, self.resource)
    }

    pub fn set_capacity(&mut self, n: Node, amount: i32) -> &mut Self {
        self.capacities.insert(n, amount);
        self
    }

    pub fn set_consumption(&mut self, vm: Vm, amount: i32) -> &mut Self {
        self.consumptions.insert(vm, amount);
        self
    }

    pub fn capacity(&self, n: Node) -> i32 {
        self.capacities.get(&n).copied().unwrap_or(self.default_capacity)
    }

    pub fn consumption(&self, vm: Vm) -> i32 {
        self.consumptions.get(&vm).copied().unwrap_or(self.default_consumption)
    }

    pub fn sum_consumptions(&self, vms: impl Iterator<Item = Vm>) -> i64 {
        vms.map(|vm| self.consumption(vm) as i64).sum()
    }

    pub fn defined_capacities(&self) -> impl Iterator<Item = (Node, i32)> + '_ {
        self.capacities.iter().map(|(n, c)| (*n, *c))
    }

    pub fn defined_consumptions(&self) -> impl Iterator<Item = (Vm, i32)> + '_ {
        self.consumptions.iter().map(|(v, c)| (*v, *c))
    }
}

/// A model view: a named side-table of per-element data the core placement
/// model does not carry itself.
///
/// Views are a closed set; consumers dispatch with an exhaustive `match`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelView {
    Shareable(ShareableResource),
}

impl ModelView {
    /// The unique identifier this view is attached under.
    pub fn id(&self) -> String {
        match self {
            ModelView::Shareable(rc) => rc.id(),
        }
    }

    /// The view kind tag, keying the solver-side view registry.
    pub fn kind(&self) -> &'static str {
        match self {
            ModelView::Shareable(_) => SHAREABLE_KIND,
        }
    }

    pub fn as_shareable(&self) -> Option<&ShareableResource> {
        match self {
            ModelView::Shareable(rc) => Some(rc),
        }
    }
}

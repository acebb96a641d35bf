use std::collections::BTreeMap;

use crate::model::attributes::Attributes;
use crate::model::element::{Node, Vm};
use crate::model::mapping::Mapping;
use crate::model::view::ModelView;

/// The complete description of a datacenter: one [`Mapping`], any number of
/// named resource views, and an attribute store.
///
/// `Model` is the unit of cloning: a clone is structurally independent and
/// usable as a branch point, e.g. when a plan is replayed over a copy of its
/// source.
#[derive(Debug, Clone, Default)]
pub struct Model {
    mapping: Mapping,
    views: BTreeMap<String, ModelView>,
    attributes: Attributes,

    next_vm: u32,
    next_node: u32,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh, unused VM identifier.
    pub fn new_vm(&mut self) -> Vm {
        let vm = Vm(self.next_vm);
        self.next_vm += 1;
        vm
    }

    /// Allocate a fresh, unused node identifier.
    pub fn new_node(&mut self) -> Node {
        let n = Node(self.next_node);
        self.next_node += 1;
        n
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn mapping_mut(&mut self) -> &mut Mapping {
        &mut self.mapping
    }

    /// Attach a view under its identifier.
    ///
    /// # Returns
    /// `false` if a view with the same identifier is already attached; the
    /// existing view is kept.
    pub fn attach(&mut self, view: ModelView) -> bool {
        let id = view.id();
        if self.views.contains_key(&id) {
            return false;
        }
        self.views.insert(id, view);
        true
    }

    /// Detach the view registered under `id`.
    pub fn detach(&mut self, id: &str) -> bool {
        self.views.remove(id).is_some()
    }

    pub fn view(&self, id: &str) -> Option<&ModelView> {
        self.views.get(id)
    }

    pub fn view_mut(&mut self, id: &str) -> Option<&mut ModelView> {
        self.views.get_mut(id)
    }

    pub fn views(&self) -> impl Iterator<Item = &ModelView> {
        self.views.values()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attributes::AttrValue;
    use crate::model::element::Element;
    use crate::model::view::ShareableResource;

    #[test]
    fn fresh_ids_are_unique() {
        let mut mo = Model::new();
        let a = mo.new_vm();
        let b = mo.new_vm();
        assert_ne!(a, b);
        assert_ne!(mo.new_node(), mo.new_node());
    }

    #[test]
    fn one_view_per_id() {
        let mut mo = Model::new();
        assert!(mo.attach(ModelView::Shareable(ShareableResource::new("cpu"))));
        assert!(!mo.attach(ModelView::Shareable(ShareableResource::new("cpu"))));
        assert!(mo.attach(ModelView::Shareable(ShareableResource::new("mem"))));
        assert!(mo.view("shareable.cpu").is_some());
        assert!(mo.detach("shareable.cpu"));
        assert!(mo.view("shareable.cpu").is_none());
    }

    #[test]
    fn clone_is_independent() {
        let mut mo = Model::new();
        let n = mo.new_node();
        let vm = mo.new_vm();
        mo.mapping_mut().add_online_node(n);
        mo.mapping_mut().add_running_vm(vm, n);
        let mut rc = ShareableResource::new("cpu");
        rc.set_capacity(n, 8).set_consumption(vm, 2);
        mo.attach(ModelView::Shareable(rc));
        mo.attributes_mut().put(Element::Vm(vm), "boot", AttrValue::Int(3));

        let mut copy = mo.clone();
        copy.mapping_mut().add_ready_vm(vm);
        copy.attributes_mut().unset(Element::Vm(vm), "boot");

        assert!(mo.mapping().is_running(vm));
        assert!(copy.mapping().is_ready(vm));
        assert!(mo.attributes().is_set(Element::Vm(vm), "boot"));
        assert!(!copy.attributes().is_set(Element::Vm(vm), "boot"));
    }
}

pub mod attributes;
pub mod element;
pub mod mapping;
pub mod model;
pub mod view;

pub use attributes::{AttrValue, Attributes};
pub use element::{Element, Node, NodeState, Vm, VmState};
pub use mapping::Mapping;
pub use model::Model;
pub use view::{ModelView, ShareableResource, SHAREABLE_KIND};

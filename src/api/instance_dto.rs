//! Wire format for a whole problem instance: a model plus the constraints
//! to satisfy. Consumed by the CLI driver.

use serde::{Deserialize, Serialize};

use crate::api::constraint_dto::ConstraintDto;
use crate::constraint::SatConstraint;
use crate::error::Error;
use crate::model::{AttrValue, Element, Model, ModelView, Node, ShareableResource, Vm};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InstanceDto {
    pub model: ModelDto,
    #[serde(default)]
    pub constraints: Vec<ConstraintDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ModelDto {
    pub mapping: MappingDto,
    #[serde(default)]
    pub views: Vec<ShareableResourceDto>,
    #[serde(default)]
    pub attributes: Vec<AttributeDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct MappingDto {
    #[serde(default)]
    pub online_nodes: Vec<u32>,
    #[serde(default)]
    pub offline_nodes: Vec<u32>,
    #[serde(default)]
    pub running_vms: Vec<PlacementDto>,
    #[serde(default)]
    pub sleeping_vms: Vec<PlacementDto>,
    #[serde(default)]
    pub ready_vms: Vec<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub struct PlacementDto {
    pub vm: u32,
    pub node: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ShareableResourceDto {
    pub resource: String,
    #[serde(default)]
    pub default_capacity: i32,
    #[serde(default)]
    pub default_consumption: i32,
    #[serde(default)]
    pub capacities: Vec<PlacedAmountDto>,
    #[serde(default)]
    pub consumptions: Vec<PlacedAmountDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub struct PlacedAmountDto {
    pub element: u32,
    pub amount: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDto {
    /// "vm" or "node".
    pub kind: String,
    pub element: u32,
    pub key: String,
    pub value: AttrValue,
}

impl TryFrom<InstanceDto> for (Model, Vec<SatConstraint>) {
    type Error = Error;

    fn try_from(dto: InstanceDto) -> Result<Self, Error> {
        let mut model = Model::new();
        let map_dto = &dto.model.mapping;

        for n in &map_dto.online_nodes {
            model.mapping_mut().add_online_node(Node(*n));
        }
        for n in &map_dto.offline_nodes {
            if !model.mapping_mut().add_offline_node(Node(*n)) {
                return Err(Error::Conversion(format!("node {} cannot be declared offline", n)));
            }
        }
        for p in &map_dto.running_vms {
            if !model.mapping_mut().add_running_vm(Vm(p.vm), Node(p.node)) {
                return Err(Error::Conversion(format!("VM {} cannot run on node {}", p.vm, p.node)));
            }
        }
        for p in &map_dto.sleeping_vms {
            if !model.mapping_mut().add_sleeping_vm(Vm(p.vm), Node(p.node)) {
                return Err(Error::Conversion(format!("VM {} cannot sleep on node {}", p.vm, p.node)));
            }
        }
        for vm in &map_dto.ready_vms {
            model.mapping_mut().add_ready_vm(Vm(*vm));
        }

        for view in &dto.model.views {
            let mut rc =
                ShareableResource::with_defaults(&view.resource, view.default_capacity, view.default_consumption);
            for c in &view.capacities {
                rc.set_capacity(Node(c.element), c.amount);
            }
            for c in &view.consumptions {
                rc.set_consumption(Vm(c.element), c.amount);
            }
            if !model.attach(ModelView::Shareable(rc)) {
                return Err(Error::Conversion(format!("duplicate view for resource '{}'", view.resource)));
            }
        }

        for attr in &dto.model.attributes {
            let element = match attr.kind.as_str() {
                "vm" => Element::Vm(Vm(attr.element)),
                "node" => Element::Node(Node(attr.element)),
                other => {
                    return Err(Error::Conversion(format!("unknown element kind '{}' in attributes", other)));
                }
            };
            model.attributes_mut().put(element, &attr.key, attr.value.clone());
        }

        let mut constraints = Vec::with_capacity(dto.constraints.len());
        for c in dto.constraints {
            constraints.push(SatConstraint::try_from(c)?);
        }
        Ok((model, constraints))
    }
}

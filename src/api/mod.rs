pub mod constraint_dto;
pub mod instance_dto;

pub use constraint_dto::ConstraintDto;
pub use instance_dto::{InstanceDto, MappingDto, ModelDto};

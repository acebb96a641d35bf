use crate::api::instance_dto::InstanceDto;
use crate::constraint::SatConstraint;
use crate::error::Result;
use crate::loader::parser::parse_json_file;
use crate::model::Model;
use crate::solver::{ReconfigurationAlgorithm, SolveOutcome};

pub mod api;
pub mod constraint;
pub mod error;
pub mod loader;
pub mod logger;
pub mod model;
pub mod plan;
pub mod solver;

/// Load an instance file (model + constraints) and solve it with the
/// default algorithm configuration.
pub fn solve_instance(file_path: &str, algorithm: &ReconfigurationAlgorithm) -> Result<SolveOutcome> {
    logger::init();
    log::info!("Loading instance from '{}'.", file_path);

    let dto: InstanceDto = parse_json_file::<InstanceDto>(file_path)?;
    let (model, constraints): (Model, Vec<SatConstraint>) = dto.try_into()?;
    log::info!("Instance parsed: {} VMs on {} nodes.", model.mapping().nb_vms(), model.mapping().nb_nodes());

    algorithm.solve(&model, &constraints)
}

use crate::model::Element;
use crate::solver::store::VarId;

/// A time interval during which a subject occupies a host.
///
/// The current slice (`c_slice`) of an action model describes the placement
/// before the plan, the destination slice (`d_slice`) the placement after.
/// Fixed parts (a current host, a start pinned to 0) are expressed as
/// already-instantiated variables so every propagator handles pinned and
/// free slices alike.
#[derive(Debug, Clone, Copy)]
pub struct Slice {
    pub subject: Element,
    pub start: VarId,
    pub end: VarId,
    /// The hosting node, as a solver node index.
    pub host: VarId,
}

// Domain layer: session lifecycle models and ports (interfaces). No external
// dependencies beyond std and serde where the wire format needs it.

pub mod model;
pub mod ports;

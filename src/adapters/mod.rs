// Adapters layer: concrete integrations with external systems. Today that is
// the fleet manager's WebSocket lifecycle API and its wire protocol.

pub mod fleet_ws;
pub mod protocol;

pub use fleet_ws::{FleetClient, FleetEndpoint};

// Domain layer: models and ports. Only serde/chrono here, no transport.

pub mod model;
pub mod ports;
pub mod request;

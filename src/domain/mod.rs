// Domain layer: records, events and the ports the collector talks through.

pub mod model;
pub mod ports;

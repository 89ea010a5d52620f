// Domain layer - Core data models
pub mod channel;
pub mod device;
pub mod telemetry;

// Application layer - Use cases and ports
pub mod decoder;
pub mod dispatcher;
pub mod frame_sink;
pub mod session;

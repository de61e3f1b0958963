pub mod api_client;
pub mod refresh_coordinator;
pub mod session_terminator;

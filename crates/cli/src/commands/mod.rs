pub mod agent;
pub mod daemon;
pub mod heartbeat;
pub mod jobs;
pub mod onboard;
pub mod status;

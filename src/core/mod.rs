pub mod alarms;
pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod fishlog;
pub mod log_io;
pub mod model;
pub mod uptime;

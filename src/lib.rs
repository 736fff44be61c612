pub mod clock;
pub mod config;
pub mod env;
pub mod job_name;
pub mod locations;
pub mod logging;
pub mod options;
pub mod process;
pub mod region;
pub mod sanitize;

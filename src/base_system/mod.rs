pub mod config;
pub mod context;
pub mod fs_tools;
pub mod logging;
pub mod talent_paths;

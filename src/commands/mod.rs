// Command implementations split by subcommand for clarity.
pub mod gps;
pub mod send;
pub mod track;

pub use gps::run_gps;
pub use send::run_send;
pub use track::run_track;

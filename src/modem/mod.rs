// AT command/response plumbing for the cellular modem.
pub mod command;
pub mod engine;
pub mod reader;
pub mod setup;

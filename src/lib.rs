// Property type core - exposes all modules for the host plugin and tests

pub mod builtin;
pub mod bus;
pub mod patch;
pub mod plugin;
pub mod registry;
pub mod render;
pub mod schema;
pub mod store;
pub mod store_io;

//! Database catalog: the set of databases and the session's current one

mod registry;

pub use registry::Registry;

pub mod catalog;

pub use catalog::{NodeCatalog, NodeTypeSpec, ParamSpec, PortUsage};

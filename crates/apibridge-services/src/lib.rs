pub mod graph;
pub mod kintone;
pub mod seed;

pub use graph::GraphService;
pub use kintone::KintoneService;
pub use seed::default_endpoints;

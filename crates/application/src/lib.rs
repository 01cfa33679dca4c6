#![forbid(unsafe_code)]

pub mod flow_condition_service_impl;
pub mod macmap_service_impl;

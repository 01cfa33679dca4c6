pub mod flow_condition_store;
pub mod macmap_replication_port;
pub mod metrics_port;

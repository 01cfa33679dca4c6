pub mod condition;
pub mod desc;
pub mod error;
pub mod ether;
pub mod flow_match;
pub mod inet;
pub mod l4;
pub mod network;
pub mod packet;
pub mod range;

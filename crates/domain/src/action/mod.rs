pub mod context;
pub mod desc;
pub mod entity;
pub mod error;
pub mod value;
pub mod vendor;

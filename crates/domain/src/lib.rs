#![forbid(unsafe_code)]

pub mod action;
pub mod common;
pub mod flow;
pub mod macmap;

pub mod cmd_clear;
pub mod cmd_domain;
pub mod cmd_get;
pub mod cmd_nodedev;
pub mod cmd_set;
pub mod common;

#[macro_use]
extern crate lazy_static;

#[macro_use]
pub mod log;
pub mod common;
pub mod errors;
pub mod device;
pub mod routing_state;
pub mod netlist;
pub mod routing;
pub mod serialize;
pub mod evaluator;

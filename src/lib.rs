mod ac_terms;
mod dc;
mod distributed_slack;
mod engine;
mod equation_system;
mod jacobian;
mod lf_branch;
mod lf_bus;
mod lf_network;
mod loadflow;
mod macro_action;
mod network;
mod newton;
mod observer;
mod params;
mod reactive_limits;
mod slack;
mod voltage_init;

pub mod debug;

pub use ac_terms::*;
pub use dc::*;
pub use distributed_slack::*;
pub use engine::*;
pub use equation_system::*;
pub use jacobian::*;
pub use lf_branch::*;
pub use lf_bus::*;
pub use lf_network::*;
pub use loadflow::*;
pub use macro_action::*;
pub use network::*;
pub use newton::*;
pub use observer::*;
pub use params::*;
pub use reactive_limits::*;
pub use slack::*;
pub use voltage_init::*;

#[cfg(test)]
mod tests;

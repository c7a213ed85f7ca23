//! Domain types and the ports the application layer is wired through.

pub mod merchant;
pub mod order;
pub mod ports;

//! Общие DTO между клиентом и сервером DreamEcho.

pub mod domain;
pub mod shared;
pub mod system;

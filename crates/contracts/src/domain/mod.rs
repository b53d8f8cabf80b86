pub mod a001_dream;
pub mod common;

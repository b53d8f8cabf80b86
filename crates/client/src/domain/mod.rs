pub mod a001_dream;

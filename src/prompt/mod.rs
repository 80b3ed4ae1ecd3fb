pub mod catalog;
pub mod constructor;

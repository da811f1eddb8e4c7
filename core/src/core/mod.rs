pub mod counter;
pub mod macros;
pub mod policy;

pub mod prelude;
pub mod core;
pub mod harness;

#[cfg(any(test, feature = "unittest"))]
pub mod unittest;

//! Testing utilities and fixtures for Rebind

pub mod testing;

pub use testing::*;

pub mod prelude {
    pub use crate::testing::*;
}

//! Built-in handlers for Christopher: default, math, weather, writing and
//! programming.
//!
//! Each handler implements the kernel's [`Handler`](christopher_kernel::Handler)
//! contract.  [`register_builtins`] populates a registry from a static list,
//! filtered by configuration.

pub mod builtin;
pub mod chat;
pub mod math;
pub mod weather;

pub use builtin::{
    BuiltinOptions, DEFAULT_ENABLED, RegistrationReport, SkippedHandler, register_builtins,
};
pub use chat::ChatHandler;
pub use math::{MathError, MathHandler};
pub use weather::WeatherHandler;

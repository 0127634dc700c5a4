//! Out-of-process compilation.
//!
//! The toolchain runs with a fixed argument shape and a cleared environment,
//! under a wall-clock timeout and the build's cancellation token.

pub mod args;
pub mod depinfo;
mod invoker;

pub use invoker::ToolchainInvoker;

//! Step invoker implementations.

mod http;
mod mock;

pub use http::HttpStepInvoker;
pub use mock::MockStepInvoker;

//! Decision plane assembly and the end-to-end request pipeline

mod builder;
mod invoker;
mod plane;

pub use builder::{Heimdall, HeimdallBuilder};
pub use invoker::{InvocationResponse, InvokerProbe, ModelInvoker};
pub use plane::{DecisionPlane, HandledRequest};

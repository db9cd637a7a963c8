//! Path-segment router: resolves `(segments, method, query, body)` to one
//! client operation and wraps the outcome in a JSON envelope.

mod dispatch;
mod request;
mod route;

pub use dispatch::{Router, DESCRIPTOR_MESSAGE};
pub use request::{ConnectorRequest, ConnectorResponse};
pub use route::{IdField, ListMode, Route, RouteError, CANCELING_STATE};

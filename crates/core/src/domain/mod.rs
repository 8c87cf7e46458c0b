pub mod request;

pub use request::{Decision, ProductRequest, RequestId, RequestStatus};

pub mod logging;

pub use logging::{init_logging, make_request_span};

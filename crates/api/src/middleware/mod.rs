pub mod logging;
pub mod request_id;

pub use logging::http_logging_middleware;
pub use request_id::{request_id_middleware, REQUEST_ID_HEADER};

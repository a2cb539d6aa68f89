pub mod api_error;
pub mod api_key;
pub mod health_checks;
pub mod json_error;
pub mod request_logging;
pub mod unique_constraint;
pub mod validated_json;

pub use api_error::{ApiError, ApiResult};

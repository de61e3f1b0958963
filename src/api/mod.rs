pub mod request;
pub mod response;
pub mod schemas;

pub use request::RequestConfig;
pub use response::ApiResponse;

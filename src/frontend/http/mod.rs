pub mod handler;
pub mod listener;
pub mod query_params;
pub mod response;
pub mod router;

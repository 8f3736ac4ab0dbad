pub mod handlers;
pub mod middleware;
pub mod predictions;
pub mod routes;

pub use routes::create_router;

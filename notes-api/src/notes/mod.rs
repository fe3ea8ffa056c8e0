mod handlers;
mod model;
pub mod query;
mod routes;
mod store;

pub use model::*;
pub use store::NoteStore;

use crate::openapi::aide::axum::ApiRouter;

pub fn router() -> ApiRouter {
    ApiRouter::new().merge(routes::router())
}

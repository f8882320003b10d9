//! Endpoint groups of the portal API, borrowed from a [`PortalClient`](crate::PortalClient).

mod auth;
mod courses;
mod past_questions;
mod users;

pub use auth::AuthService;
pub use courses::CourseService;
pub use past_questions::PastQuestionService;
pub use users::{UserAdminService, UserQuery};

mod handler;
mod model;

pub use handler::update_username;
pub use model::User;

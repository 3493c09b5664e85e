mod handler;
mod model;

pub use handler::{get_session, login, logout, logout_all, signup};

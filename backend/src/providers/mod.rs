pub mod dispatcher;
pub mod models;

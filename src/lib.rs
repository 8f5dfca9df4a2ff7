pub mod delivery;
pub mod dsl;
pub mod error;
pub mod paths;
pub mod project;
pub mod schema;
pub mod settings;
pub mod template;

pub use dsl::{compile, compile_source};
pub use error::AppError;
pub use schema::ActionSchema;
pub use template::Program;

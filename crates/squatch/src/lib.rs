pub mod compose;
pub mod config;
pub mod error;
pub mod parsing;
pub mod site;
pub mod theme;
pub mod types;

pub use compose::*;
pub use config::*;
pub use error::*;
pub use parsing::*;
pub use site::*;
pub use theme::*;
pub use types::*;

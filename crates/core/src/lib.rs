pub mod config;
pub mod error;
pub mod model;
pub mod price;
pub mod time;

pub mod prelude {
    pub use crate::config::*;
    pub use crate::error::*;
    pub use crate::model::*;
    pub use crate::price::*;
    pub use crate::time::*;
}

pub mod api;
pub mod clock;
pub mod document;
pub mod error;
pub mod outcome;
pub mod value;

pub use api::*;
pub use clock::*;
pub use document::*;
pub use error::{DocflowError, DocflowResult};
pub use outcome::*;
pub use value::*;

mod model;
mod parser;

pub use model::Reading;
pub use parser::{parse, ParseError};

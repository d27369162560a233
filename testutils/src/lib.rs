mod constants;
mod discovery;
mod fake;
mod objs;

pub use constants::*;
pub use discovery::*;
pub use fake::*;
pub use objs::*;

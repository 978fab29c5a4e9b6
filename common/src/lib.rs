mod constants;
mod cursor;
mod wire;

pub use constants::*;
pub use cursor::{CursorError, PageCursor};
pub use wire::*;

pub mod image;
pub mod search;
pub mod taste;

pub use image::*;
pub use search::*;
pub use taste::*;

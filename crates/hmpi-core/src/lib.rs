pub mod calculator;
pub mod classification;
pub mod error;
pub mod metal;
pub mod reference;

pub use calculator::*;
pub use classification::*;
pub use error::IndexError;
pub use metal::Metal;
pub use reference::*;

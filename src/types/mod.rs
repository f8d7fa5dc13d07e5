pub mod candle;
pub mod ict;
pub mod signals;

pub use candle::*;
pub use ict::*;
pub use signals::*;

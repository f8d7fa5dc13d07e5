pub mod candle_store;
pub mod signals;

pub use candle_store::{CandleStore, FrameSnapshot, SymbolSnapshot};
pub use signals::{SignalEngine, SignalService};

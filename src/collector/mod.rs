//! A stand-in StatsD collector for the demo. It listens on UDP, splits the
//! interceptor's keys back into namespace and operation, and extrapolates
//! sampled lines into call counts.

pub mod listener;
pub mod store;

pub use store::{CollectorSnapshot, CollectorStore, NamespaceView, TailLine};

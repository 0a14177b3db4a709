pub mod providers;
pub mod relay;

pub use providers::{ChunkStream, IncrementalChunk, ProviderError, TextProvider};
pub use relay::{relay, Relay, RelayEvent};

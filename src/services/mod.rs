//! Service modules for the separation pipeline

pub mod audio_acquirer;
mod download;
pub mod media_resolver;
pub mod pipeline;
pub mod separation_client;
pub mod stem_fetcher;

pub use audio_acquirer::{AcquireError, Acquisition, AudioAcquirer};
pub use media_resolver::{MediaResolver, MediaStreams, ResolveError, SearchHit};
pub use pipeline::{Pipeline, PipelineError, StatusReport, SubmitOutcome};
pub use separation_client::{PollError, RemoteFile, RemoteStatus, SeparationClient, SubmitError};
pub use stem_fetcher::{FetchError, StemFetcher};

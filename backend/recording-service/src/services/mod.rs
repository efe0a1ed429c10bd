/// Business logic layer for recording-service
pub mod locks;
pub mod media;
pub mod orchestrator;
pub mod playback;
pub mod reconciler;
pub mod storage;
pub mod tokens;
pub mod upstream;

pub use media::{AgoraCloudRecording, MediaService, RecordingStatus, StopOutcome};
pub use orchestrator::{OrchestratorSettings, RecordingOrchestrator};
pub use playback::{select_playback_key, PlaybackResolver, PlaybackSettings};
pub use reconciler::{PendingSweeper, SweepReport};
pub use storage::{ObjectStore, S3ObjectStore, StoredObject};
pub use tokens::TokenIssuer;
pub use upstream::UpstreamError;

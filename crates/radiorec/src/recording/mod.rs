pub mod model;
pub mod repository;

pub use model::{
    new_recording_id, ParseEnumError, ProgramInfo, Recording, RecordingCommand, RecordingFile,
    RecordingMetadata, RecordingOptions, RecordingState, RecordingType, ReserveType, ServiceKind,
    SourceType,
};
pub use repository::{RecordingRepository, SqliteRecordingRepository};

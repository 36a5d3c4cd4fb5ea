//! Wire-level data types shared by the pipeline and the stream processors

pub mod chat;
pub mod citation;
pub mod metadata;

pub use citation::{merge_citations, Citation};
pub use metadata::{
    decode_message, encode_metadata, DecodedMessage, StreamMetadata, TranscriptMetadata,
    METADATA_END_MARKER, METADATA_START_MARKER,
};

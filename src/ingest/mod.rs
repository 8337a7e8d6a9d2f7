pub mod preview;
pub mod uploader;

pub use preview::{extract_preview, Preview, PreviewRow, PreviewValue};
pub use uploader::{block_id, ChunkedUploader, UploadOutcome, UploadStats};

pub mod pipeline;
pub mod receipt_image;
pub mod recognizer;
pub mod types;
pub mod words;

pub use pipeline::{is_receipt_image, spawn_intake_watcher, PipelineError, PipelineOptions, ReceiptPipeline};
pub use receipt_image::{ImageError, ReceiptImage, DEFAULT_MAX_SIDE};
pub use recognizer::{LayoutLabeler, MockLabeler, MockRecognizer, RecognizerError, TextRecognizer};
pub use types::{BoundingBox, LayoutInput, LayoutInputError};
pub use words::{estimate_boxes, extract_words_and_boxes, split_words};

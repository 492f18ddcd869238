pub mod client;
pub mod models;

pub use client::{
    ModelRef, Prediction, PredictionStatus, PredictionUrls, ReplicateClient, ReplicateError,
    DEFAULT_API_BASE, TOKEN_ENV,
};
pub use models::{layout_report, ocr_text, DeepSeekOcr, LayoutLmv3, DEFAULT_LAYOUT_MODEL, DEFAULT_OCR_MODEL};

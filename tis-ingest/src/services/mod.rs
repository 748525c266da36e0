//! Adapters for the pipeline's external capabilities
//!
//! - text_extractor: OCR of scanned images and PDFs
//! - record_extractor: model-based structuring of raw text
//! - csv_reader: flat tables that skip OCR and structuring
//! - validator: format rules plus model-based field correction
//! - classifier: ranked chain of course classification strategies
//! - categories: the category label set
//! - llm: chat-completion client shared by the model-backed adapters

pub mod categories;
pub mod classifier;
pub mod csv_reader;
pub mod llm;
pub mod record_extractor;
pub mod text_extractor;
pub mod validator;

pub use categories::{Category, CourseCategories};
pub use classifier::{
    ChainOutcome, Classification, ClassificationStrategy, ClassifierChain, LlmCategoryClassifier,
    SimilarityClassifier, SIMILARITY_THRESHOLD,
};
pub use csv_reader::read_transcript_csv;
pub use llm::{ChatRequest, ChatResponse, LlmError, LlmProvider, OpenAiCompatibleProvider};
pub use record_extractor::{LlmRecordExtractor, RecordExtractor};
pub use text_extractor::{CommandTextExtractor, TextExtractor};
pub use validator::{CorrectionGroup, FieldCorrector, LlmFieldCorrector, ValidationError, Validator};

use thiserror::Error;

/// Failure to turn an uploaded file into a record
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("{command} failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("no text could be extracted")]
    EmptyText,

    #[error("model call failed")]
    Llm(#[from] LlmError),

    #[error("malformed model output: {0}")]
    MalformedOutput(String),

    #[error("invalid CSV: {0}")]
    Csv(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub mod use_cases;

pub use use_cases::analysis_service::AnalysisService;
pub use use_cases::dictionary_service::DictionaryService;

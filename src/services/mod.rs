pub mod batch_source;
pub mod listing_generator;
pub mod listing_mapper;
pub mod listing_poster;
pub mod llm_service;
pub mod photo_importer;

pub use batch_source::{HttpBatchSource, StaticBatchSource};
pub use listing_generator::ListingGenerator;
pub use listing_mapper::ListingMapper;
pub use listing_poster::{
    BrowserFormFiller, FillReport, FillStatus, FormFiller, ListingPoster, NoScreenshots,
    PageScreenshotter, Screenshotter, StepLog,
};
pub use llm_service::{LlmService, Responder};
pub use photo_importer::PhotoImporter;

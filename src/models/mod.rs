pub mod card;
pub mod loaders;
pub mod state;
pub mod template;

pub use card::{Card, CardStatus, DEFAULT_TEMPLATE_ID, RESET_MARKER};
pub use loaders::load_template;
pub use state::{FlowState, NeedActionItem, PublicationRecord, StateSummary};
pub use template::ListingTemplate;

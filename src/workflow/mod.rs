pub mod card_flow;
pub mod stages;

pub use card_flow::{CardFlow, ChainEnd};
pub use stages::{
    BatchSource, Generator, Importer, Mapper, PhotoSet, PostOutcome, Poster, StageOutcome,
};

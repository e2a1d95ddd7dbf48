pub mod labels;
pub mod linker;
pub mod rect;
pub mod scoring;
pub mod spatial;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum LinkError {
        #[error("无效的部材名模式 `{pattern}`: {source}")]
        InvalidLabelPattern {
            pattern: String,
            #[source]
            source: regex::Error,
        },
    }
}

pub use labels::{PartLabel, PartLabelDetector};
pub use linker::{EntityLinker, PartLinkResult};
pub use rect::RectangleCandidate;
pub use spatial::SpatialIndex;

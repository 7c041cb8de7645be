//! Label-fusion stages.
//!
//! Each stage is a pure function over `ndarray` label images and fields;
//! the pipeline module composes them per frame.

pub mod clean;
pub mod config;
pub mod embed;
pub mod expand;
pub mod flow;
pub mod markers;
pub mod nms;
pub mod seeds;
pub mod semantic_mask;
pub mod skeleton;
pub mod stitch;
pub mod watershed;

pub use clean::{
    clean_labels, clip_to_mask, dilate_label_holes, fill_label_holes, filter_by_size,
    relabel_sequential, remove_big_objects, remove_small_objects, validate_labels,
};
pub use config::{
    CleanConfig, ExpandConfig, FlowConfig, InstanceConfig, MatchStrategy, NmsConfig,
    NormalizeConfig, ReconcileConfig, SemanticMaskConfig, SkeletonConfig,
};
pub use embed::{locate_roi, RoiLocation, TileRegionEmbedder};
pub use expand::{expand_labels, expand_labels_per_slice, expand_mask};
pub use flow::{fuse_flow_labels, FlowFusionParams};
pub use markers::build_markers;
pub use nms::suppress_duplicates;
pub use seeds::{collect_seeds, collect_uncovered_seeds, SeedCollection, SeedPoint, SeedSource};
pub use semantic_mask::{build_semantic_mask, SemanticMaskOutput};
pub use skeleton::{boundary_skeleton, probability_skeleton};
pub use stitch::{match_labels, relink_nearest, stitch};
pub use watershed::{grow_regions, BasinPolarity};

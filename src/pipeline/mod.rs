//! Value pipelines: named, lazily evaluated per-simulant computations.

pub mod combiner;
pub mod graph;
pub mod value;

pub use combiner::{Combiner, joint_union, union_post_processor};
pub use graph::{
    EvalContext, ModifierFn, PipelineGraphBuilder, PipelineHandle, Requirements, SourceFn,
    ValuePipelineGraph,
};
pub use value::PipelineValue;

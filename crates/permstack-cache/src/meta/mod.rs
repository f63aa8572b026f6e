//! Meta accumulation and value selection

pub mod accumulator;
pub mod selector;

pub use accumulator::MetaAccumulator;
pub(crate) use accumulator::AccumulatedMeta;
pub use selector::MetaValueSelector;

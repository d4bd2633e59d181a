pub mod segmented_map;

pub use segmented_map::SegmentedMap;

/// Data layer: core types, loading, slicing, and time normalization.
///
/// Architecture:
/// ```text
///  P(<pid>)/Preprocessed_Data_Matrix/
///    phase1 / phase2 matrices (.parquet / .csv / .json) + feature_indices.json
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse files → Array2<f64>, FeatureIndex
///   └──────────┘
///        │
///        ▼
///   ┌────────────────────┐
///   │ ParticipantDataset │  two phase matrices, validated index
///   └────────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  store    │  trial × modality views
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ resample  │  variable-length trial → fixed rows
///   └──────────┘
/// ```

pub mod error;
pub mod inspect;
pub mod loader;
pub mod model;
pub mod normalize;
pub mod resample;
pub mod store;
pub mod writer;

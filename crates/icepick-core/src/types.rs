pub use icepick_schema::{
    Artifact, Blake3Hash, ENTRY_PATH, Manifest, OrderedMap, PackageName, ProvidedSlice, Slice,
    SliceKind, Version, VersionRange,
};

// LanceDB vector database module
// Handles vector storage and similarity search for F1 documents

pub mod vector_store;

/// Table holding every document and its embedding
pub const DOCUMENTS_TABLE: &str = "f1_documents";

/// Map a cosine distance in `[0, 2]` to a similarity in `[0, 1]`
#[inline]
pub fn cosine_distance_to_score(distance: f32) -> f32 {
    if distance.is_nan() {
        return 0.0;
    }
    (1.0 - distance / 2.0).clamp(0.0, 1.0)
}

use crate::faces::extractor::FaceEmbeddingRecord;

/// Best cosine similarity over every input/target face pair, with the winning indices.
pub fn compute_best_similarity(
    input_faces: &[FaceEmbeddingRecord],
    target_faces: &[FaceEmbeddingRecord],
) -> (f64, usize, usize) {
    let mut best_similarity = f64::NEG_INFINITY;
    let mut best_pair = (0, 0);

    for (i, input_face) in input_faces.iter().enumerate() {
        for (j, target_face) in target_faces.iter().enumerate() {
            let similarity = cosine_similarity(&input_face.embedding, &target_face.embedding);
            if similarity > best_similarity {
                best_similarity = similarity;
                best_pair = (i, j);
            }
        }
    }

    (best_similarity, best_pair.0, best_pair.1)
}

pub fn cosine_similarity(lhs: &[f64], rhs: &[f64]) -> f64 {
    let mut dot = 0.0;
    let mut norm_lhs = 0.0;
    let mut norm_rhs = 0.0;

    for (l, r) in lhs.iter().zip(rhs.iter()) {
        dot += l * r;
        norm_lhs += l * l;
        norm_rhs += r * r;
    }

    dot / (norm_lhs.sqrt() * norm_rhs.sqrt())
}

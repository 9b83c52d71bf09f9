//! Embedding maintenance for historical cases.

use std::path::Path;

use serde::Deserialize;

use meridian_core::MeridianError;

pub const EMBEDDING_DIM: usize = 1536;

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingUpdate {
    pub event_name: String,
    pub date_range: String,
    pub embedding: Vec<f32>,
}

/// Render an embedding as a pgvector literal, validating its dimensionality.
pub fn format_embedding(values: &[f32]) -> Result<String, MeridianError> {
    if values.len() != EMBEDDING_DIM {
        return Err(MeridianError::Validation(format!(
            "embedding must have {EMBEDDING_DIM} dimensions, got {}",
            values.len()
        )));
    }
    let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    Ok(format!("[{}]", parts.join(",")))
}

/// Load `{event_name, date_range, embedding}` updates from a JSON file.
pub fn load_embedding_updates(path: &Path) -> Result<Vec<EmbeddingUpdate>, MeridianError> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| MeridianError::Parse(format!("{}: {err}", path.display())))?;
    let updates: Vec<EmbeddingUpdate> = serde_json::from_str(&text)
        .map_err(|err| MeridianError::Parse(format!("{}: {err}", path.display())))?;
    if updates.is_empty() {
        return Err(MeridianError::Validation(format!(
            "{}: embeddings file must be a non-empty list",
            path.display()
        )));
    }
    for (idx, update) in updates.iter().enumerate() {
        if update.event_name.trim().is_empty() {
            return Err(MeridianError::Validation(format!(
                "{}: entry {idx} missing event_name",
                path.display()
            )));
        }
        if update.date_range.trim().is_empty() {
            return Err(MeridianError::Validation(format!(
                "{}: entry {idx} missing date_range",
                path.display()
            )));
        }
        format_embedding(&update.embedding)?;
    }
    Ok(updates)
}

/// Load a single embedding vector from a JSON file.
pub fn load_embedding_vector(path: &Path) -> Result<Vec<f32>, MeridianError> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| MeridianError::Parse(format!("{}: {err}", path.display())))?;
    let vector: Vec<f32> = serde_json::from_str(&text)
        .map_err(|err| MeridianError::Parse(format!("{}: {err}", path.display())))?;
    format_embedding(&vector)?;
    Ok(vector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_rejects_wrong_dimensions() {
        assert!(format_embedding(&[0.0; 3]).is_err());
        assert!(format_embedding(&vec![0.5; EMBEDDING_DIM]).is_ok());
    }

    #[test]
    fn format_renders_pgvector_literal() {
        let mut values = vec![0.0f32; EMBEDDING_DIM];
        values[0] = 1.5;
        let rendered = format_embedding(&values).unwrap();
        assert!(rendered.starts_with("[1.5,0,"));
        assert!(rendered.ends_with(']'));
    }
}

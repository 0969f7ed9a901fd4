use serde::de::DeserializeOwned;
use thiserror::Error;

/// Deserialization failure located by its JSON path.
#[derive(Debug, Error)]
#[error("at JSON path {path} → {source}")]
pub struct PathError {
    pub path: String,
    #[source]
    pub source: serde_json::Error,
}

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, PathError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(located)
}

pub fn from_slice_with_path<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, PathError> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize::<_, T>(de).map_err(located)
}

fn located(err: serde_path_to_error::Error<serde_json::Error>) -> PathError {
    let path = err.path().to_string();
    PathError { path, source: err.into_inner() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::MapperConfig;

    #[test]
    fn errors_carry_the_path() {
        let err = from_str_with_path::<MapperConfig>(r#"{"class_mapping": {"A": 1}}"#).unwrap_err();
        assert_eq!(err.path, "class_mapping.A");
        assert!(err.to_string().starts_with("at JSON path class_mapping.A"));
    }

    #[test]
    fn slices_parse_like_strings() {
        let cfg: MapperConfig = from_slice_with_path(br#"{"class_mapping": {"A": "B"}}"#).unwrap();
        assert_eq!(cfg.class_mapping.get("A").map(String::as_str), Some("B"));
    }
}

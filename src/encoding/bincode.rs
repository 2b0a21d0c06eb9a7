use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Serialize a value using bincode
pub fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

/// Deserialize a value from a byte slice using bincode
pub fn deserialize<T: for<'a> Deserialize<'a>>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        generation: u64,
        columns: Vec<String>,
    }

    #[test]
    fn test_serialize_deserialize() {
        let original = Record {
            generation: 42,
            columns: vec!["a".to_string(), "b".to_string()],
        };

        let bytes = serialize(&original).unwrap();
        let decoded: Record = deserialize(&bytes).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_truncated_data() {
        let bytes = serialize(&"a longer string".to_string()).unwrap();
        let result: Result<String> = deserialize(&bytes[..bytes.len() - 3]);
        assert!(matches!(result, Err(Error::Encoding(_))));
    }
}

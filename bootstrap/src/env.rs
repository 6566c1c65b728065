use serde::Serialize;
use std::collections::BTreeMap;

/// Environment values that are safe to expose to the client as `ENV`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PublicEnv(BTreeMap<String, String>);

impl PublicEnv {
    pub fn new(mode: &str, values: BTreeMap<String, String>) -> Self {
        let mut values = values;
        values.insert("MODE".to_string(), mode.to_string());
        Self(values)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Search engines may index the site unless `ALLOW_INDEXING` is `"false"`.
    pub fn allow_indexing(&self) -> bool {
        self.get("ALLOW_INDEXING") != Some("false")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_env() {
        let env = PublicEnv::new(
            "production",
            BTreeMap::from([("ALLOW_INDEXING".to_string(), "false".to_string())]),
        );
        assert_eq!(env.get("MODE"), Some("production"));
        assert!(!env.allow_indexing());
        assert!(PublicEnv::new("development", BTreeMap::new()).allow_indexing());

        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"ALLOW_INDEXING": "false", "MODE": "production"})
        );
    }
}

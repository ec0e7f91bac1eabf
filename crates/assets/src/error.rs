use scenecraft_common::Category;
use scenecraft_render::BackendError;
use scenecraft_schema::ValidationError;
use std::sync::Arc;

/// Errors from asset operations.
///
/// Cloneable so one failed load can be handed to every waiter of a
/// coalesced request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AssetError {
    #[error("invalid {category} config `{key}`: {source}")]
    Validation {
        category: Category,
        key: String,
        #[source]
        source: ValidationError,
    },
    #[error("malformed {category} config `{key}`: {message}")]
    Config {
        category: Category,
        key: String,
        message: String,
    },
    #[error("`extends` cycle in material `{key}`: {chain}")]
    ExtendsCycle { key: String, chain: String },
    #[error("dependency cycle loading {category} `{key}`: {chain}")]
    DependencyCycle {
        category: Category,
        key: String,
        chain: String,
    },
    #[error("no provider registered for {0}")]
    MissingProvider(Category),
    #[error("failed to load {category} `{key}`: {message}")]
    Load {
        category: Category,
        key: String,
        message: String,
    },
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("YAML error: {0}")]
    Yaml(Arc<serde_yaml::Error>),
    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),
}

impl From<serde_yaml::Error> for AssetError {
    fn from(e: serde_yaml::Error) -> Self {
        AssetError::Yaml(Arc::new(e))
    }
}

impl From<std::io::Error> for AssetError {
    fn from(e: std::io::Error) -> Self {
        AssetError::Io(Arc::new(e))
    }
}

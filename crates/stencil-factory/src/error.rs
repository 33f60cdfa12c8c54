use stencil_compose::ComposeError;
use stencil_lazy::LazyError;
use stencil_store::StoreError;

/// Misuse of the declaration surface.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum DeclarationError {
    /// The reserved default name was used for an explicit document.
    #[error("blueprint `{blueprint}` cannot declare a document named \"default\"; use default_document")]
    ReservedName { blueprint: String },

    /// A blueprint or definition name was empty.
    #[error("{what} name must not be empty")]
    EmptyName { what: &'static str },

    /// A fixed date helper was given a calendar date that does not exist.
    #[error("invalid date {year:04}-{month:02}-{day:02}")]
    InvalidDate { year: i32, month: u32, day: u32 },
}

/// Errors from building, creating, and cleaning up documents.
#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    /// Blueprint declaration misuse.
    #[error(transparent)]
    Declaration(#[from] DeclarationError),

    /// A document, trait, or fragment could not be composed (includes the
    /// not-found class).
    #[error(transparent)]
    Compose(#[from] ComposeError),

    /// No blueprint is registered under the name.
    #[error("blueprint not found: \"{0}\"")]
    BlueprintNotFound(String),

    /// `create` or `cleanup` on a blueprint without a document store.
    #[error("blueprint `{blueprint}` has no document store; cannot {operation}")]
    Configuration {
        blueprint: String,
        operation: &'static str,
    },

    /// A blueprint was declared while another declaration was still open.
    #[error("cannot declare blueprint `{requested}` while `{open}` is still being declared")]
    Context { open: String, requested: String },

    /// The persistence collaborator failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Resolving the lazy tree failed.
    #[error(transparent)]
    Lazy(LazyError),

    /// Registry configuration could not be parsed.
    #[error("invalid registry configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl FactoryError {
    /// Returns `true` for the not-found class: unknown blueprints and
    /// undeclared documents, traits, or fragments.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::BlueprintNotFound(_) => true,
            Self::Compose(err) => err.is_not_found(),
            _ => false,
        }
    }

    pub(crate) fn configuration(blueprint: &str, operation: &'static str) -> Self {
        Self::Configuration {
            blueprint: blueprint.to_string(),
            operation,
        }
    }
}

/// Lazily evaluated positions box the errors they raise; unwrap them back
/// into the taxonomy so callers can match on them.
impl From<LazyError> for FactoryError {
    fn from(err: LazyError) -> Self {
        match err {
            LazyError::Expand {
                fragment,
                path,
                source,
            } => match source.downcast::<ComposeError>() {
                Ok(compose) => Self::Compose(*compose),
                Err(source) => Self::Lazy(LazyError::Expand {
                    fragment,
                    path,
                    source,
                }),
            },
            LazyError::Generator(source) => match source.downcast::<FactoryError>() {
                Ok(factory) => *factory,
                Err(source) => match source.downcast::<ComposeError>() {
                    Ok(compose) => Self::Compose(*compose),
                    Err(source) => Self::Lazy(LazyError::Generator(source)),
                },
            },
            other => Self::Lazy(other),
        }
    }
}

/// Result alias for factory operations.
pub type FactoryResult<T> = Result<T, FactoryError>;

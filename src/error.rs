use thiserror::Error;

use crate::types::TypeHandle;

pub type Result<T, E = ReflectError> = std::result::Result<T, E>;

/// Which half of a property was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accessor {
    Get,
    Set,
}

impl std::fmt::Display for Accessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Get => "getter",
            Self::Set => "setter",
        })
    }
}

/// Errors raised while resolving members or running generated thunks.
///
/// Cache misses and reclaimed entries are never errors; they show up as
/// `None` from the cache layer.
#[derive(Debug, Clone, Error)]
pub enum ReflectError {
    #[error("type `{0}` is not registered")]
    UnregisteredType(String),

    #[error("no field `{name}` on `{type_name}`{}", hint(.suggestion))]
    MissingField {
        type_name: String,
        name: String,
        suggestion: Option<String>,
    },

    #[error("no property {accessor} for `{name}` on `{type_name}`{}", hint(.suggestion))]
    MissingProperty {
        type_name: String,
        name: String,
        accessor: Accessor,
        suggestion: Option<String>,
    },

    #[error("no method `{name}({signature})` on `{type_name}`{}", hint(.suggestion))]
    MissingMethod {
        type_name: String,
        name: String,
        signature: String,
        suggestion: Option<String>,
    },

    #[error("no constructor `{type_name}({signature})`")]
    MissingConstructor { type_name: String, signature: String },

    #[error("`{0}` is not a registered array type")]
    MissingArrayElement(String),

    #[error("target is null but `{0}` requires an instance")]
    NullTarget(String),

    #[error("target mismatch: expected `{expected}`, found `{found}`")]
    TargetMismatch { expected: String, found: String },

    #[error("`{member}` expects a value of type `{expected}`, found `{found}`")]
    ValueMismatch {
        member: String,
        expected: String,
        found: String,
    },

    #[error("`{member}` takes {expected} argument(s) but {found} were supplied")]
    ArgumentCount {
        member: String,
        expected: usize,
        found: usize,
    },

    #[error("index {index} is out of range for an array of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("cannot mutate a bare `{0}` value; wrap it in a holder first")]
    ImmutableTarget(String),

    #[error(
        "cannot copy `{source_member}` ({source_type}) into `{target_member}` ({target_type})"
    )]
    MappingMismatch {
        source_member: String,
        source_type: String,
        target_member: String,
        target_type: String,
    },

    #[error("cached thunk is a {found}, not a {expected}")]
    SignatureMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("{0}")]
    Invocation(String),
}

impl ReflectError {
    pub fn value_mismatch(member: &str, expected: TypeHandle, found: Option<TypeHandle>) -> Self {
        Self::ValueMismatch {
            member: member.to_string(),
            expected: expected.to_string(),
            found: found.map_or_else(|| "null".to_string(), |ty| ty.to_string()),
        }
    }

    pub fn target_mismatch(expected: TypeHandle, found: Option<TypeHandle>) -> Self {
        Self::TargetMismatch {
            expected: expected.to_string(),
            found: found.map_or_else(|| "null".to_string(), |ty| ty.to_string()),
        }
    }

    /// Error raised from inside a registered member body.
    pub fn invocation(message: impl Into<String>) -> Self {
        Self::Invocation(message.into())
    }

    /// Whether this error reports a member that could not be resolved.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            Self::UnregisteredType(_)
                | Self::MissingField { .. }
                | Self::MissingProperty { .. }
                | Self::MissingMethod { .. }
                | Self::MissingConstructor { .. }
                | Self::MissingArrayElement(_)
        )
    }
}

fn hint(suggestion: &Option<String>) -> String {
    suggestion
        .as_deref()
        .map(|name| format!(" (did you mean `{name}`?)"))
        .unwrap_or_default()
}

//! Loader error types

use crate::executor::LifeError;
use crate::model::EntityId;

/// Errors raised while declaring or resolving relations
#[derive(Debug)]
pub enum LoaderError {
    /// The relation's join shape cannot be batch loaded
    UnsupportedRelation {
        model: String,
        relation: String,
        reason: String,
    },
    /// No model registered under this name
    UnknownModel(String),
    /// The model has no relation with this name
    UnknownRelation { model: String, relation: String },
    /// The entity handle does not belong to the working set
    UnknownEntity(EntityId),
    /// A model was registered twice
    DuplicateModel(String),
    /// A relation was declared twice on the same model
    DuplicateRelation { model: String, relation: String },
    /// An entity lacks a key column the relation or identity map needs
    MissingKey { model: String, column: String },
    /// The delegated fetch failed
    DataAccess(LifeError),
}

impl LoaderError {
    pub(crate) fn unsupported(model: &str, relation: &str, reason: impl Into<String>) -> Self {
        LoaderError::UnsupportedRelation {
            model: model.to_string(),
            relation: relation.to_string(),
            reason: reason.into(),
        }
    }

    /// Why a relation was rejected (`UnsupportedRelation` only)
    pub fn reason(&self) -> Option<&str> {
        match self {
            LoaderError::UnsupportedRelation { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

impl std::fmt::Display for LoaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoaderError::UnsupportedRelation { model, relation, .. } => write!(
                f,
                "BulkLazyLoader {}.{}: Only simple relations on 1 primary key and without custom joins are supported",
                model, relation
            ),
            LoaderError::UnknownModel(model) => write!(f, "Unknown model: {}", model),
            LoaderError::UnknownRelation { model, relation } => {
                write!(f, "Model '{}' has no relation '{}'", model, relation)
            }
            LoaderError::UnknownEntity(id) => {
                write!(f, "Entity {} is not tracked by this unit of work", id)
            }
            LoaderError::DuplicateModel(model) => {
                write!(f, "Model '{}' is already registered", model)
            }
            LoaderError::DuplicateRelation { model, relation } => {
                write!(f, "Relation {}.{} is already declared", model, relation)
            }
            LoaderError::MissingKey { model, column } => {
                write!(f, "{} entity has no value for key column '{}'", model, column)
            }
            LoaderError::DataAccess(e) => write!(f, "Data access error: {}", e),
        }
    }
}

impl std::error::Error for LoaderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoaderError::DataAccess(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LifeError> for LoaderError {
    fn from(error: LifeError) -> Self {
        LoaderError::DataAccess(error)
    }
}

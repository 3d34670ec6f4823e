use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// A project row. Only the id and display name carry meaning for the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Project {
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            extra: BTreeMap::new(),
        }
    }
}

/// Locally cached project list, indexed for display-name joins.
#[derive(Debug, Clone, Default)]
pub struct ProjectDirectory {
    projects: Vec<Project>,
    names: HashMap<i64, String>,
}

impl ProjectDirectory {
    #[must_use]
    pub fn new(projects: Vec<Project>) -> Self {
        let names = projects
            .iter()
            .map(|project| (project.id, project.name.clone()))
            .collect();
        Self { projects, names }
    }

    /// Display name for a project reference; empty when unknown or absent.
    #[must_use]
    pub fn display_name(&self, project_id: Option<i64>) -> String {
        project_id
            .and_then(|id| self.names.get(&id))
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

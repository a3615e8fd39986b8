//! Template context: one array per supported kind plus `env`.

use serde::Serialize;

use kubegen_core::{Environment, Resource, ResourceKind, Snapshot};

use crate::error::{tera_err, RenderError};

/// Rendering payload borrowed from a snapshot.
///
/// Kinds that were not selected render as empty arrays so templates never
/// need to guard against missing keys.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateContext<'a> {
    pub pods: &'a [Resource],
    pub services: &'a [Resource],
    pub endpoints: &'a [Resource],
    pub env: &'a Environment,
}

impl<'a> TemplateContext<'a> {
    pub fn new(snapshot: &'a Snapshot, env: &'a Environment) -> Self {
        Self {
            pods: snapshot.get(ResourceKind::Pods),
            services: snapshot.get(ResourceKind::Services),
            endpoints: snapshot.get(ResourceKind::Endpoints),
            env,
        }
    }

    pub fn to_tera_context(&self, template: &str) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(|e| tera_err(template, e))
    }
}

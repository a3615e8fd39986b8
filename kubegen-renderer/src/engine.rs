//! Tera rendering engine: [`Renderer`].
//!
//! A fresh [`Tera`] instance is built for every render. Template files are
//! re-read each time, so edits take effect on the next cycle without a
//! restart.

use std::fs;
use std::sync::Arc;

use tera::Tera;

use kubegen_core::{Environment, PlatformOps, Snapshot, TemplateSource};

use crate::context::TemplateContext;
use crate::error::{io_err, tera_err, RenderError};
use crate::{filters, functions};

const TEMPLATE_NAME: &str = "kube-gen";

// ---------------------------------------------------------------------------
// Tera setup
// ---------------------------------------------------------------------------

fn register_filters(tera: &mut Tera) {
    tera.register_filter("where", filters::where_eq);
    tera.register_filter("where_exist", filters::where_exist);
    tera.register_filter("where_not_exist", filters::where_not_exist);
    tera.register_filter("where_any", filters::where_any);
    tera.register_filter("where_all", filters::where_all);
    tera.register_filter("group_by", filters::group_by);
    tera.register_filter("group_by_multi", filters::group_by_multi);
    tera.register_filter("group_by_keys", filters::group_by_keys);
    tera.register_filter("first", filters::first);
    tera.register_filter("last", filters::last);
    tera.register_filter("keys", filters::keys);
    tera.register_filter("values", filters::values);
    tera.register_filter("slice", filters::slice);
    tera.register_filter("is_ready", filters::is_ready);
    tera.register_filter("all_ready", filters::all_ready);
    tera.register_filter("any_ready", filters::any_ready);
    tera.register_filter("ready_only", filters::ready_only);
    tera.register_filter("has_field", filters::has_field);
    tera.register_filter("deep_get", filters::deep_get);
    tera.register_filter("map_contains", filters::map_contains);
    tera.register_filter("json", filters::json);
    tera.register_filter("has_prefix", filters::has_prefix);
    tera.register_filter("has_suffix", filters::has_suffix);
    tera.register_filter("str_contains", filters::str_contains);
    tera.register_filter("trim_prefix", filters::trim_prefix);
    tera.register_filter("trim_suffix", filters::trim_suffix);
}

fn register_functions(tera: &mut Tera, platform: &Arc<dyn PlatformOps>) {
    tera.register_function("combine", functions::combine);
    tera.register_function("coalesce", functions::coalesce);
    tera.register_function("dict", functions::dict);
    tera.register_function("when", functions::when);
    tera.register_function("intersect", functions::intersect);
    tera.register_function("closest", functions::closest);
    tera.register_function("path_join", functions::path_join);
    tera.register_function("dir", functions::dir);
    tera.register_function("exists", functions::exists);
    tera.register_function("parse_json", functions::parse_json);
    tera.register_function("parse_json_safe", functions::parse_json_safe);
    tera.register_function("is_valid_json", functions::is_valid_json);
    tera.register_function("parse_bool", functions::parse_bool);
    tera.register_function("split_n", functions::split_n);
    tera.register_function("shell", functions::shell(Arc::clone(platform)));
}

fn build_tera(name: &str, text: &str, platform: &Arc<dyn PlatformOps>) -> Result<Tera, RenderError> {
    let mut tera = Tera::default();
    tera.autoescape_on(vec![]);
    register_filters(&mut tera);
    register_functions(&mut tera, platform);
    tera.add_raw_template(TEMPLATE_NAME, text)
        .map_err(|e| tera_err(name, e))?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Renders one template against a [`Snapshot`].
#[derive(Debug, Clone)]
pub struct Renderer {
    template: TemplateSource,
    env: Arc<Environment>,
    platform: Arc<dyn PlatformOps>,
}

impl Renderer {
    pub fn new(
        template: TemplateSource,
        env: Arc<Environment>,
        platform: Arc<dyn PlatformOps>,
    ) -> Self {
        Self {
            template,
            env,
            platform,
        }
    }

    pub fn template(&self) -> &TemplateSource {
        &self.template
    }

    /// Render the template into bytes.
    ///
    /// Any parse or execution failure aborts the whole render; nothing is
    /// returned in part.
    pub fn render(&self, snapshot: &Snapshot) -> Result<Vec<u8>, RenderError> {
        let name = self.template.name();
        let text = self.load_template()?;
        let tera = build_tera(&name, &text, &self.platform)?;
        let ctx = TemplateContext::new(snapshot, &self.env).to_tera_context(&name)?;
        let rendered = tera
            .render(TEMPLATE_NAME, &ctx)
            .map_err(|e| tera_err(&name, e))?;
        tracing::debug!(template = %name, bytes = rendered.len(), "template rendered");
        Ok(rendered.into_bytes())
    }

    fn load_template(&self) -> Result<String, RenderError> {
        match &self.template {
            TemplateSource::Inline(text) => Ok(text.clone()),
            TemplateSource::File(path) => fs::read_to_string(path).map_err(|e| io_err(path, e)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

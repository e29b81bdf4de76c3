use super::*;
use anyhow::Result;
use rust_embed::RustEmbed;
use serde_json::Value;
use std::collections::HashMap;
use tera::{Context, Tera};

const PAGE_TEMPLATE: &str = "contributors.html";

#[derive(RustEmbed)]
#[folder = "src/output/templates/"]
#[include = "*.html"]
struct Templates;

#[derive(RustEmbed)]
#[folder = "src/output/assets/"]
#[include = "*.css"]
struct Assets;

/// Renders a [`ContributorsPage`] with the embedded Tera templates.
pub struct HtmlGenerator {
    tera: Tera,
    css_content: String,
}

impl HtmlGenerator {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();

        // Load templates from embedded resources
        for file in Templates::iter() {
            let template_name = file.as_ref();
            let template_content = Templates::get(template_name)
                .ok_or_else(|| anyhow::anyhow!("Template {} not found", template_name))?;
            let template_str = std::str::from_utf8(&template_content.data)
                .map_err(|e| anyhow::anyhow!("Invalid UTF-8 in template {}: {}", template_name, e))?;

            tera.add_raw_template(template_name, template_str)
                .map_err(|e| anyhow::anyhow!("Failed to add template {}: {}", template_name, e))?;
        }

        tera.register_filter("percent", Self::percent_filter);

        let css_content = Self::load_asset("styles.css")?;
        Ok(Self { tera, css_content })
    }

    fn load_asset(filename: &str) -> Result<String> {
        let asset = Assets::get(filename)
            .ok_or_else(|| anyhow::anyhow!("Asset {} not found", filename))?;
        let content = std::str::from_utf8(&asset.data)
            .map_err(|e| anyhow::anyhow!("Invalid UTF-8 in asset {}: {}", filename, e))?;
        Ok(content.to_string())
    }

    /// `0.157` becomes `16`, rounding half away from zero.
    fn percent_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
        let score = value
            .as_f64()
            .ok_or_else(|| tera::Error::msg("percent filter expects a number"))?;
        Ok(Value::from((score * 100.0).round() as i64))
    }

    fn prepare_template_context(&self, page: &ContributorsPage) -> Context {
        let mut context = Context::new();

        context.insert("css_content", &self.css_content);
        context.insert(
            "generated_date",
            &page.generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        );
        context.insert("repositories", &page.repositories);
        context.insert("failed_count", &page.failed_count());

        context
    }
}

impl OutputGenerator for HtmlGenerator {
    fn generate(&self, page: &ContributorsPage) -> Result<String> {
        let context = self.prepare_template_context(page);
        let html = self.tera.render(PAGE_TEMPLATE, &context)?;
        Ok(html)
    }
}

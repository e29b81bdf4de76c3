use super::*;
use anyhow::{Context, Result};
use std::fs;
use tracing::info;

pub struct Reporter {
    format: OutputFormat,
    output_path: String,
}

impl Reporter {
    pub fn new(format: &str, output_path: &str) -> Self {
        let format = OutputFormat::from(format);
        let output_path = super::add_file_extension(output_path, &format);

        Self {
            format,
            output_path,
        }
    }

    pub fn output_path(&self) -> &str {
        &self.output_path
    }

    pub fn generate_report(&self, page: &ContributorsPage) -> Result<()> {
        let content = match self.format {
            OutputFormat::Html => HtmlGenerator::new()?.generate(page)?,
            OutputFormat::Json => JsonGenerator.generate(page)?,
        };

        fs::write(&self.output_path, content)
            .with_context(|| format!("Failed to write {}", self.output_path))?;
        info!("Report saved to {}", self.output_path);
        Ok(())
    }
}

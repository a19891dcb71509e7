use anyhow::{Context, Result};

const IMAGE_DESCRIPTION_PLACEHOLDER: &str = "{{IMAGE_DESCRIPTION}}";

const FOOD_IMAGE_DESCRIPTION: &str = include_str!("food_image_description.txt");
const FOOD_NUTRITIONAL_FEEDBACK: &str = include_str!("food_nutritional_feedback.txt");

/// Prompt text with at most one substitution point for the image description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Load the template from `path` when given, otherwise use the built-in text.
    pub fn load(path: Option<&str>, builtin: &str) -> Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read prompt file {}", path))?;
                log::info!("📝 Loaded prompt override from {}", path);
                Ok(Self::new(text))
            }
            None => Ok(Self::new(builtin)),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn render(&self, description: &str) -> String {
        self.text.replace(IMAGE_DESCRIPTION_PLACEHOLDER, description)
    }
}

/// Both prompts used by the pipeline.
#[derive(Debug, Clone)]
pub struct Prompts {
    pub description: PromptTemplate,
    pub feedback: PromptTemplate,
}

impl Prompts {
    pub fn builtin() -> Self {
        Self {
            description: PromptTemplate::new(FOOD_IMAGE_DESCRIPTION),
            feedback: PromptTemplate::new(FOOD_NUTRITIONAL_FEEDBACK),
        }
    }

    pub fn load(description_file: Option<&str>, feedback_file: Option<&str>) -> Result<Self> {
        let builtin = Self::builtin();
        let prompts = Self {
            description: PromptTemplate::load(description_file, builtin.description.text())?,
            feedback: PromptTemplate::load(feedback_file, builtin.feedback.text())?,
        };

        if !prompts.feedback.text().contains(IMAGE_DESCRIPTION_PLACEHOLDER) {
            log::warn!(
                "⚠️ Feedback prompt has no {} placeholder, the description will not reach the model",
                IMAGE_DESCRIPTION_PLACEHOLDER
            );
        }

        Ok(prompts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_description() {
        let prompts = Prompts::builtin();
        let rendered = prompts.feedback.render("a bowl of rice and beans");

        assert!(rendered.contains(
            "<image_description>\na bowl of rice and beans\n</image_description>"
        ));
        assert!(!rendered.contains(IMAGE_DESCRIPTION_PLACEHOLDER));
    }

    #[test]
    fn test_render_with_empty_description() {
        let template = PromptTemplate::new("before [{{IMAGE_DESCRIPTION}}] after");
        assert_eq!(template.render(""), "before [] after");
    }

    #[test]
    fn test_description_prompt_has_no_placeholder() {
        let prompts = Prompts::builtin();
        assert!(!prompts.description.text().contains(IMAGE_DESCRIPTION_PLACEHOLDER));
        assert!(prompts
            .description
            .text()
            .contains("do not make assumptions about ingredients"));
    }

    #[test]
    fn test_feedback_prompt_asks_for_breakdown_steps() {
        let feedback = Prompts::builtin().feedback;
        assert!(feedback.text().contains("<nutritional_breakdown>"));
        assert!(feedback.text().contains("It's OK for this section to be quite long."));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = Prompts::load(Some("/nonexistent/prompt.txt"), None);
        assert!(result.is_err());
    }
}

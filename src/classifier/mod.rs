pub mod backend;
pub mod interpret;
pub mod prompt;

use log::debug;

use crate::domain::email::{ClassificationResult, Email};
use crate::error::ClassifyError;
use backend::ChatBackend;
use prompt::{OutputMode, PromptOptions};

/// Prompt -> backend -> interpreter, with the interpretation contract fixed by the backend.
pub struct EmailClassifier {
    backend: Box<dyn ChatBackend>,
    options: PromptOptions,
}

impl EmailClassifier {
    pub fn new(backend: Box<dyn ChatBackend>, options: PromptOptions) -> Self {
        Self { backend, options }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn classify(&self, email: &Email) -> Result<ClassificationResult, ClassifyError> {
        let mode = self.backend.output_mode();
        let messages = prompt::build_messages(email, &self.options, mode);
        debug!(
            "classifying {} with {} ({} prompt messages)",
            email.id,
            self.backend.name(),
            messages.len()
        );
        match mode {
            OutputMode::Structured => {
                let schema = interpret::classification_schema();
                let raw = self.backend.complete(&messages, Some(&schema))?;
                interpret::parse_structured(&raw)
            }
            OutputMode::FreeText => {
                let raw = self.backend.complete(&messages, None)?;
                Ok(ClassificationResult {
                    label: interpret::parse_free_text(&raw),
                    reason: None,
                })
            }
        }
    }
}

//! Combined-instruction builder with simple `{{placeholder}}` substitution.
//!
//! Every generation request carries the user-facing prompt followed by a
//! fixed object-detection block. The block is a template whose placeholders
//! are filled per category: the expression context, the class list, and the
//! output contract the label converter expects.
use std::collections::HashMap;

use crate::error::{AppError, AppResult};
use crate::prompt::catalog::{Category, DETECTION_CLASSES};

const LABEL_TEMPLATE: &str = "After generating the image, you MUST also perform object detection on the image you just created.
{{context}}
The available detection classes are: {{classes}}.

Your object detection instructions are:
1. Bounding Boxes MUST be tight: The bounding box for each object (face, hand, phone) must be snug and tightly wrapped around the object with minimal empty space. For faces, the box should tightly frame the facial features. For hands, it should tightly enclose the entire hand and fingers.
2. Correct Face Class: If a face is detected, use the class name that corresponds to the person's expression as instructed above.
3. Detect all relevant objects from the class list.

Provide your object detection output as a JSON object inside a markdown code block (```json). The JSON object should contain a single key \"labels\", which is an array of objects. Each object in the array must have two keys:
- \"className\": A string matching one of the available classes.
- \"box2d\": An object with the keys \"xMin\", \"yMin\", \"xMax\", \"yMax\" representing the normalized (0.0 to 1.0) bounding box coordinates.
If no objects are found, return an empty \"labels\" array.";

#[derive(Debug, Clone)]
pub struct PromptConstructor {
    template: String,
}

impl Default for PromptConstructor {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptConstructor {
    pub fn new() -> Self {
        PromptConstructor { template: LABEL_TEMPLATE.to_string() }
    }

    /// Use a custom detection block. Placeholders that `construct_prompt`
    /// does not provide make construction fail.
    pub fn with_template(template: impl Into<String>) -> Self {
        PromptConstructor { template: template.into() }
    }

    /// The full instruction sent with one request: `prompt`, a blank line,
    /// then the detection block for `category`.
    pub fn construct_prompt(&self, prompt: &str, category: Category) -> AppResult<String> {
        let mut inputs = HashMap::new();
        inputs.insert("context", context_instruction(category));
        inputs.insert("classes", DETECTION_CLASSES.join(", "));

        let block = self.replace_placeholders(&inputs)?;
        Ok(format!("{}\n\n{}", prompt, block))
    }

    /// Replace every `{{ key }}` with `inputs[key]`.
    fn replace_placeholders(&self, inputs: &HashMap<&str, String>) -> AppResult<String> {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| {
                AppError::InvalidInput("Unterminated placeholder in prompt template".to_string())
            })?;
            let key = after[..end].trim();
            let replacement = inputs.get(key).ok_or_else(|| {
                AppError::InvalidInput(format!("Missing input for placeholder: {}", key))
            })?;
            out.push_str(replacement);
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

fn context_instruction(category: Category) -> String {
    match category.face_class() {
        Some(face) => format!(
            "The person in the image you generate is {}. When labeling the face, you MUST use the class '{}'.",
            category.description(),
            face
        ),
        None => format!("The person in the image you generate is {}.", category.description()),
    }
}

//! Generated images and the per-category result set of one run.
use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::generation::GeneratedVariant;
use crate::prompt::catalog::{Category, PROMPTS_PER_CATEGORY};

/// One successful generation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub id: Uuid,
    pub image_uri: String,
    pub prompt: String,
    pub label: String,
}

impl GeneratedImage {
    pub fn new(prompt: &str, variant: GeneratedVariant) -> Self {
        GeneratedImage {
            id: Uuid::new_v4(),
            image_uri: variant.image_uri,
            prompt: prompt.to_string(),
            label: variant.label,
        }
    }
}

/// Category to images, in completion order. At most one entry per prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    images: BTreeMap<Category, Vec<GeneratedImage>>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, category: Category, image: GeneratedImage) -> AppResult<()> {
        let list = self.images.entry(category).or_default();
        if list.len() >= PROMPTS_PER_CATEGORY {
            return Err(AppError::InvalidInput(format!(
                "Category {} already holds {} images",
                category, PROMPTS_PER_CATEGORY
            )));
        }
        list.push(image);
        Ok(())
    }

    pub fn get(&self, category: Category) -> &[GeneratedImage] {
        self.images.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Categories in declaration order, each with its images.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &[GeneratedImage])> {
        Category::ALL.into_iter().map(move |c| (c, self.get(c)))
    }

    pub fn find(&self, id: Uuid) -> Option<&GeneratedImage> {
        self.images.values().flatten().find(|img| img.id == id)
    }

    pub fn len(&self) -> usize {
        self.images.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }

    pub fn summary(&self) -> Vec<CategorySummary> {
        self.iter()
            .filter(|(_, images)| !images.is_empty())
            .map(|(category, images)| CategorySummary {
                category,
                title: category.title(),
                images: images
                    .iter()
                    .map(|img| ImageSummary {
                        id: img.id,
                        prompt: img.prompt.clone(),
                        label: img.label.clone(),
                    })
                    .collect(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub category: Category,
    pub title: &'static str,
    pub images: Vec<ImageSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageSummary {
    pub id: Uuid,
    pub prompt: String,
    pub label: String,
}

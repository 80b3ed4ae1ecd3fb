#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use expression_forge::error::{AppError, AppResult};
use expression_forge::utils::media::SourceImage;
use expression_forge::{Category, GeneratedVariant, GenerationService};

pub const PNG_URI: &str = "data:image/png;base64,AQID";
pub const HAND_LABEL: &str = "1 0.400000 0.500000 0.400000 0.400000";

type Responder = dyn Fn(Category, &str, usize) -> AppResult<GeneratedVariant> + Send + Sync;

/// Generation service driven by a closure of (category, prompt, attempt).
/// `attempt` counts calls for the same prompt, starting at 1.
pub struct ScriptedService {
    responder: Box<Responder>,
    attempts: Mutex<HashMap<String, usize>>,
    calls: Mutex<Vec<(Category, String)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedService {
    pub fn new(
        responder: impl Fn(Category, &str, usize) -> AppResult<GeneratedVariant> + Send + Sync + 'static,
    ) -> Self {
        ScriptedService {
            responder: Box::new(responder),
            attempts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn always_ok() -> Self {
        Self::new(|_, _, _| Ok(ok_variant()))
    }

    pub fn calls(&self) -> Vec<(Category, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationService for ScriptedService {
    async fn generate(
        &self,
        _source: &SourceImage,
        prompt: &str,
        category: Category,
    ) -> AppResult<GeneratedVariant> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push((category, prompt.to_string()));
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(prompt.to_string()).or_insert(0);
            *n += 1;
            *n
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        let result = (self.responder)(category, prompt, attempt);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub fn ok_variant() -> GeneratedVariant {
    GeneratedVariant { image_uri: PNG_URI.to_string(), label: HAND_LABEL.to_string() }
}

pub fn rate_limited() -> AppError {
    AppError::Api("Status: 429 Too Many Requests, Body: {\"error\":{\"status\":\"RESOURCE_EXHAUSTED\"}}".to_string())
}

pub fn source() -> SourceImage {
    SourceImage::new(vec![0x89, b'P', b'N', b'G'], "image/png").unwrap()
}

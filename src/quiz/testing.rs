//! Test doubles shared by the quiz tests.

use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::oneshot;

use crate::quiz::generation::{
    GeneratedImage, GenerationError, GenerationRequest, GenerationService,
};
use crate::quiz::language::Language;
use crate::quiz::pantheon::{Deity, LocalizedNames, Pantheon};

pub fn sample_pantheon() -> Pantheon {
    let deities = [
        ("ganesha", "Ganesha", "விநாயகர்"),
        ("shiva", "Shiva", "சிவன்"),
        ("vishnu", "Vishnu", "விஷ்ணு"),
        ("lakshmi", "Lakshmi", "லட்சுமி"),
        ("durga", "Durga", "துர்கை"),
        ("surya", "Surya", "சூரியன்"),
        ("agni", "Agni", "அக்னி"),
    ]
    .into_iter()
    .map(|(id, english, tamil)| {
        Deity::new(id, LocalizedNames::new(english).with(Language::Tamil, tamil))
    })
    .chain(std::iter::once(Deity::new(
        "hayagriva",
        LocalizedNames::new("Hayagriva"),
    )))
    .collect();

    Pantheon::from_deities(deities).unwrap()
}

struct ScriptedCall {
    request: GenerationRequest,
    reply: Option<oneshot::Sender<Result<GeneratedImage, GenerationError>>>,
}

/// Generation service whose calls stay pending until the test resolves them, in any order.
pub struct ScriptedArtist {
    calls: Mutex<Vec<ScriptedCall>>,
}

impl ScriptedArtist {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> GenerationRequest {
        self.calls.lock().unwrap()[index].request.clone()
    }

    pub fn image_url(&self, index: usize) -> String {
        format!("https://images.test/{}.png", index)
    }

    pub fn succeed(&self, index: usize) {
        let name = self.request(index).deity_name;
        self.resolve(
            index,
            Ok(GeneratedImage {
                image_url: self.image_url(index),
                description: Some(format!("{} is worshipped widely.", name)),
            }),
        );
    }

    pub fn fail(&self, index: usize) {
        self.resolve(index, Err(GenerationError::EmptyResponse));
    }

    fn resolve(&self, index: usize, result: Result<GeneratedImage, GenerationError>) {
        let reply = self.calls.lock().unwrap()[index]
            .reply
            .take()
            .expect("call resolved twice");
        let _ = reply.send(result);
    }

    /// Lets spawned tasks run until at least `count` calls have reached the service.
    pub async fn wait_for_calls(&self, count: usize) {
        for _ in 0..1_000 {
            if self.call_count() >= count {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!(
            "expected {} generation calls, saw {}",
            count,
            self.call_count()
        );
    }
}

#[async_trait]
impl GenerationService for ScriptedArtist {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GeneratedImage, GenerationError> {
        let (reply, result) = oneshot::channel();
        self.calls.lock().unwrap().push(ScriptedCall {
            request,
            reply: Some(reply),
        });
        result.await.unwrap_or(Err(GenerationError::Interrupted))
    }
}

use async_trait::async_trait;
use chatgpt::prelude::*;
use chatgpt::types::CompletionResponse;
use log::{debug, warn};
use rand::seq::SliceRandom;
use std::time::Duration;

use crate::quiz::difficulty::Difficulty;
use crate::quiz::generation::{
    GeneratedImage, GenerationError, GenerationRequest, GenerationService,
};

const IMAGE_TIMEOUT: Duration = Duration::from_secs(90);

const INDIAN_ART_STYLES: [&str; 7] = [
    "Tanjore Painting (Thanjavur) style with vibrant colors and embossed gold leaf textures",
    "Madhubani (Mithila) art style with intricate geometrical patterns and natural pigments",
    "Pattachitra style from Odisha with high detail, rich colors, and mythological narrative flair",
    "Classic Raja Ravi Varma oil painting style, elegant, realistic yet divine with Victorian influence",
    "Kangra Miniature painting style, delicate lines and poetic natural settings",
    "Mysore Painting style with subtle colors and gesso work",
    "Kalighat Art style, bold lines and expressive features from Bengal",
];

const MEDIUM_STYLES: [&str; 2] = [
    "Cinematic high-definition 3D Animation Movie Style render",
    "High-resolution realistic devotional representation, lifelike textures, professional lighting, authentic traditional photography",
];

const EASY_STYLE: &str = "Professional 3D Animation Movie Style. High-quality 3D character render, cute, friendly, vibrant colors, expressive features, and soft cinematic lighting.";

// Labels the chat model likes to put in front of the sentence
const DESCRIPTION_LABELS: [&str; 9] = [
    "Deity Description",
    "Divine Knowledge",
    "Description",
    "Significance",
    "About",
    "Note",
    "Info",
    "Meaning",
    "Answer",
];

/// Paints deities with the OpenAI image API and asks ChatGPT for a one-line description.
pub struct DeityArtist {
    chat_gpt: ChatGPT,
    http: reqwest::Client,
    api_key: String,
    api_base: String,
}

/// The image attempts, best first. Each one is tried only if the previous failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Styled,
    Fallback,
    Basic,
}

impl Attempt {
    const CHAIN: [Attempt; 3] = [Attempt::Styled, Attempt::Fallback, Attempt::Basic];

    fn model(&self) -> &'static str {
        match self {
            Attempt::Styled | Attempt::Fallback => "dall-e-3",
            Attempt::Basic => "dall-e-2",
        }
    }

    fn size(&self) -> &'static str {
        match self {
            Attempt::Styled | Attempt::Fallback => "1024x1024",
            Attempt::Basic => "512x512",
        }
    }

    fn quality(&self) -> Option<&'static str> {
        match self {
            Attempt::Styled => Some("hd"),
            Attempt::Fallback => Some("standard"),
            Attempt::Basic => None,
        }
    }

    fn prompt(&self, deity_name: &str, style: &str) -> String {
        match self {
            Attempt::Styled => format!(
                "Task: Generate a highly refined and artistic image of the Hindu Deity {}.
        Artistic Style: {}
        Iconography: Ensure accurate representation of weapons, vahanas (mounts), and mudras.
        Do not render any text or captions in the image.",
                deity_name, style
            ),
            Attempt::Fallback => format!(
                "High-quality refined artistic image of the deity {} in the style: {}",
                deity_name, style
            ),
            Attempt::Basic => format!("A beautiful and respectful painting of {}.", deity_name),
        }
    }

    /// Description used when ChatGPT did not give us one.
    fn fallback_description(&self, deity_name: &str) -> Option<String> {
        match self {
            Attempt::Styled => None,
            Attempt::Fallback => Some(format!(
                "{} is a revered figure in Indian spirituality.",
                deity_name
            )),
            Attempt::Basic => Some(format!("{} is a manifestation of the divine.", deity_name)),
        }
    }
}

#[derive(serde::Serialize)]
struct ImageBody<'a> {
    model: &'a str,
    prompt: String,
    n: u8,
    size: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    quality: Option<&'a str>,
    response_format: &'a str,
}

#[derive(Debug, serde::Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, serde::Deserialize)]
struct ImageData {
    url: Option<String>,
    b64_json: Option<String>,
}

impl ImageResponse {
    fn into_image_url(self) -> Option<String> {
        let image = self.data.into_iter().next()?;
        match (image.url, image.b64_json) {
            (Some(url), _) if !url.is_empty() => Some(url),
            (_, Some(data)) if !data.is_empty() => Some(format!("data:image/png;base64,{}", data)),
            _ => None,
        }
    }
}

impl DeityArtist {
    pub fn new(
        chat_gpt: ChatGPT,
        api_key: impl Into<String>,
        api_base: impl Into<String>,
    ) -> std::result::Result<Self, GenerationError> {
        let http = reqwest::Client::builder().timeout(IMAGE_TIMEOUT).build()?;
        Ok(Self {
            chat_gpt,
            http,
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    async fn request_image(
        &self,
        attempt: Attempt,
        prompt: String,
    ) -> std::result::Result<String, GenerationError> {
        let body = ImageBody {
            model: attempt.model(),
            prompt,
            n: 1,
            size: attempt.size(),
            quality: attempt.quality(),
            response_format: "url",
        };

        let response: ImageResponse = self
            .http
            .post(format!("{}/images/generations", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .into_image_url()
            .ok_or(GenerationError::EmptyResponse)
    }

    /// Walks the attempt chain until one of them produces an image.
    async fn paint(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<(String, Attempt), GenerationError> {
        let style = art_style(request.difficulty);

        for attempt in Attempt::CHAIN {
            let prompt = attempt.prompt(&request.deity_name, &style);
            match self.request_image(attempt, prompt).await {
                Ok(url) => return Ok((url, attempt)),
                Err(e) => warn!(
                    "{:?} image attempt for {} failed: {}",
                    attempt, request.deity_name, e
                ),
            }
        }

        Err(GenerationError::Exhausted {
            attempts: Attempt::CHAIN.len(),
        })
    }

    async fn describe(&self, request: &GenerationRequest) -> Result<String> {
        let prompt = format!("You are an expert on Hindu mythology.
        Provide exactly one sentence in {} explaining the spiritual significance of the Hindu Deity {}.
        IMPORTANT: Do not include labels like \"Description:\" or \"Significance:\". Return ONLY the descriptive sentence about the deity.",
            request.language.label().to_uppercase(), request.deity_name);

        let response: CompletionResponse = self.chat_gpt.send_message(&prompt).await?;
        let content = response.message().clone().content;

        debug!("Description for {}: {:?}", request.deity_name, content);

        Ok(clean_description(&content))
    }
}

#[async_trait]
impl GenerationService for DeityArtist {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GeneratedImage, GenerationError> {
        let (painted, described) = tokio::join!(self.paint(&request), self.describe(&request));
        let (image_url, attempt) = painted?;

        let description = match described {
            Ok(text) if !text.is_empty() => Some(text),
            Ok(_) => attempt.fallback_description(&request.deity_name),
            Err(e) => {
                warn!("Description for {} failed: {}", request.deity_name, e);
                attempt.fallback_description(&request.deity_name)
            }
        };

        Ok(GeneratedImage {
            image_url,
            description,
        })
    }
}

fn art_style(difficulty: Difficulty) -> String {
    let mut rng = rand::thread_rng();
    match difficulty {
        Difficulty::Easy => EASY_STYLE.to_string(),
        Difficulty::Medium => MEDIUM_STYLES
            .choose(&mut rng)
            .unwrap_or(&MEDIUM_STYLES[0])
            .to_string(),
        Difficulty::Hard => format!(
            "Exquisite Traditional Indian Art: {}. High artistry, refined brushwork, traditional iconography, and cultural depth.",
            INDIAN_ART_STYLES.choose(&mut rng).unwrap_or(&INDIAN_ART_STYLES[0])
        ),
    }
}

/// Strips a leading "Label:" and surrounding quotes from a model answer.
pub fn clean_description(text: &str) -> String {
    let mut text = text.trim();

    for label in DESCRIPTION_LABELS {
        let Some(head) = text.get(..label.len()) else {
            continue;
        };
        if head.eq_ignore_ascii_case(label) {
            if let Some(rest) = text[label.len()..].strip_prefix(':') {
                text = rest.trim_start();
                break;
            }
        }
    }

    text.trim_matches(|c: char| c == '"' || c == '\'').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_labels_and_quotes() {
        assert_eq!(
            clean_description("Significance: Ganesha removes obstacles."),
            "Ganesha removes obstacles."
        );
        assert_eq!(
            clean_description("  deity description:   \"Shiva is the destroyer.\" "),
            "Shiva is the destroyer."
        );
        assert_eq!(
            clean_description("Lakshmi brings prosperity: wealth and fortune."),
            "Lakshmi brings prosperity: wealth and fortune."
        );
        assert_eq!(clean_description("\"\""), "");
    }

    #[test]
    fn keeps_non_latin_text_intact() {
        assert_eq!(
            clean_description("गणेश विघ्नहर्ता हैं।"),
            "गणेश विघ्नहर्ता हैं।"
        );
    }

    #[test]
    fn attempts_degrade_in_quality() {
        assert_eq!(Attempt::CHAIN[0].quality(), Some("hd"));
        assert_eq!(Attempt::CHAIN[2].model(), "dall-e-2");
        assert!(Attempt::Styled.prompt("Agni", "Kalighat").contains("Kalighat"));
        assert!(Attempt::Basic.prompt("Agni", "Kalighat").contains("Agni"));
        assert_eq!(Attempt::Styled.fallback_description("Agni"), None);
        assert!(Attempt::Basic
            .fallback_description("Agni")
            .unwrap()
            .starts_with("Agni"));
    }

    #[test]
    fn hard_tier_uses_a_traditional_style() {
        let style = art_style(Difficulty::Hard);
        assert!(INDIAN_ART_STYLES.iter().any(|s| style.contains(s)));
        assert_eq!(art_style(Difficulty::Easy), EASY_STYLE);
    }

    #[test]
    fn image_response_prefers_url_then_inline_data() {
        let url: ImageResponse =
            serde_json::from_str(r#"{"created":1,"data":[{"url":"https://img/1.png"}]}"#).unwrap();
        assert_eq!(url.into_image_url().as_deref(), Some("https://img/1.png"));

        let inline: ImageResponse =
            serde_json::from_str(r#"{"data":[{"b64_json":"aGk="}]}"#).unwrap();
        assert_eq!(
            inline.into_image_url().as_deref(),
            Some("data:image/png;base64,aGk=")
        );

        let empty: ImageResponse = serde_json::from_str(r#"{"data":[]}"#).unwrap();
        assert_eq!(empty.into_image_url(), None);
    }
}

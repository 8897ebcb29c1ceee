//! Wire types of the TTS service.

use serde::{Deserialize, Serialize};

/// Success code inside the JSON envelope.
pub const SUCCESS_CODE: i64 = 200;

/// JSON envelope answered by the synthesis endpoint.
///
/// On success `url` points at the rendered audio file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynthesisEnvelope {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, alias = "message")]
    pub msg: Option<String>,
}

impl SynthesisEnvelope {
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// Audio URL, if present and non-blank.
    pub fn audio_url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_parsing() {
        let env: SynthesisEnvelope =
            serde_json::from_str(r#"{"code":200,"url":"https://cdn.example/a.mp3"}"#).unwrap();
        assert!(env.is_success());
        assert_eq!(env.audio_url(), Some("https://cdn.example/a.mp3"));

        let env: SynthesisEnvelope =
            serde_json::from_str(r#"{"code":429,"message":"slow down"}"#).unwrap();
        assert!(!env.is_success());
        assert_eq!(env.msg.as_deref(), Some("slow down"));
        assert_eq!(env.audio_url(), None);

        let env: SynthesisEnvelope = serde_json::from_str(r#"{"code":200,"url":"  "}"#).unwrap();
        assert_eq!(env.audio_url(), None);
    }
}

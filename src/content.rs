use crate::config::{ContentConfig, ContentSourceType, QUIZ_ID_PLACEHOLDER};
use crate::error::LoadError;
use reqwest::header::{CACHE_CONTROL, HeaderMap, HeaderValue, PRAGMA};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Normal,
    Vertical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// HTML-bearing question text.
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, deserialize_with = "deserialize_layout")]
    pub layout: Layout,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_links: Option<BookLinks>,
}

/// Canonical in-memory question bank, whatever shape the file arrived in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizDocument {
    pub meta: Option<QuizMeta>,
    pub questions: Vec<Question>,
}

// Shape A
#[derive(Debug, Deserialize)]
struct StructuredQuizFile {
    #[serde(default)]
    meta: Option<QuizMeta>,
    questions: Vec<Question>,
}

// Shape B: entries are single questions or one level of nested groups.
#[derive(Debug, Deserialize)]
struct LegacyQuizFile {
    #[serde(rename = "allQuizData")]
    all_quiz_data: Vec<LegacyEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LegacyEntry {
    Group(Vec<Question>),
    Single(Question),
}

#[derive(Debug)]
enum RawQuizFile {
    Structured(StructuredQuizFile),
    Legacy(LegacyQuizFile),
}

impl RawQuizFile {
    fn from_value(value: Value) -> Result<Self, String> {
        let Value::Object(map) = &value else {
            return Err("top-level value is not a JSON object".to_string());
        };

        if map.contains_key("questions") {
            serde_json::from_value(value)
                .map(RawQuizFile::Structured)
                .map_err(|e| format!("invalid `questions` document: {e}"))
        } else if map.contains_key("allQuizData") {
            serde_json::from_value(value)
                .map(RawQuizFile::Legacy)
                .map_err(|e| format!("invalid `allQuizData` document: {e}"))
        } else {
            Err("expected a `questions` or `allQuizData` key".to_string())
        }
    }

    fn into_document(self) -> QuizDocument {
        match self {
            RawQuizFile::Structured(file) => QuizDocument {
                meta: file.meta,
                questions: file.questions,
            },
            RawQuizFile::Legacy(file) => QuizDocument {
                meta: None,
                questions: file
                    .all_quiz_data
                    .into_iter()
                    .flat_map(|entry| match entry {
                        LegacyEntry::Group(group) => group,
                        LegacyEntry::Single(question) => vec![question],
                    })
                    .collect(),
            },
        }
    }
}

pub struct QuizDocumentParser;

impl QuizDocumentParser {
    #[tracing::instrument(skip(content), fields(content.length = content.len()))]
    pub fn parse_str(quiz_id: &str, content: &str) -> Result<QuizDocument, LoadError> {
        let value: Value = serde_json::from_str(content).map_err(|e| LoadError::MalformedData {
            quiz_id: quiz_id.to_string(),
            reason: format!("Failed to parse JSON: {e}"),
        })?;
        Self::normalize(quiz_id, value)
    }

    /// Turns either accepted file shape into a `QuizDocument`. Zero questions is an error.
    pub fn normalize(quiz_id: &str, value: Value) -> Result<QuizDocument, LoadError> {
        let document = RawQuizFile::from_value(value)
            .map_err(|reason| LoadError::MalformedData {
                quiz_id: quiz_id.to_string(),
                reason,
            })?
            .into_document();

        if document.questions.is_empty() {
            return Err(LoadError::MalformedData {
                quiz_id: quiz_id.to_string(),
                reason: "document contains no questions".to_string(),
            });
        }

        tracing::debug!(
            quiz.id = %quiz_id,
            questions.count = document.questions.len(),
            meta.present = document.meta.is_some(),
            "Normalized quiz document"
        );

        Ok(document)
    }
}

fn deserialize_layout<'de, D>(deserializer: D) -> Result<Layout, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if s == "vertical" => Layout::Vertical,
        _ => Layout::Normal,
    })
}

/// Checks a raw identifier and returns it trimmed.
pub fn validate_quiz_id(raw: &str) -> Result<&str, LoadError> {
    let quiz_id = raw.trim();
    if quiz_id.is_empty() {
        return Err(LoadError::MissingIdentifier);
    }
    if quiz_id.contains(['/', '\\', '?', '#']) || quiz_id.contains("..") {
        return Err(LoadError::InvalidIdentifier(quiz_id.to_string()));
    }
    Ok(quiz_id)
}

enum ContentBase {
    Dir(PathBuf),
    Url(reqwest::Url),
}

struct CandidateFailure {
    location: String,
    reason: String,
}

/// Resolves quiz identifiers against the configured candidate paths.
pub struct QuizLoader {
    base: ContentBase,
    candidate_paths: Vec<String>,
    client: reqwest::Client,
}

impl QuizLoader {
    #[tracing::instrument(skip(config), fields(
        content.source_type = ?config.source_type,
        content.base_dir = %config.base_dir,
        content.base_url = ?config.base_url
    ))]
    pub fn new(config: &ContentConfig) -> Result<Self, LoadError> {
        let base = match config.source_type {
            ContentSourceType::File => ContentBase::Dir(PathBuf::from(&config.base_dir)),
            ContentSourceType::Http => {
                let raw = config.base_url.as_deref().ok_or_else(|| {
                    LoadError::Config("HTTP base URL required for http source".to_string())
                })?;
                // Without a trailing slash, joins would replace the last path segment.
                let raw = if raw.ends_with('/') {
                    raw.to_string()
                } else {
                    format!("{raw}/")
                };
                let url = reqwest::Url::parse(&raw)
                    .map_err(|e| LoadError::Config(format!("Invalid base URL '{raw}': {e}")))?;
                ContentBase::Url(url)
            }
        };

        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .map_err(|e| LoadError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base,
            candidate_paths: config.candidate_paths.clone(),
            client,
        })
    }

    /// Tries each candidate in order and normalizes the first one that parses as JSON.
    #[tracing::instrument(skip(self))]
    pub async fn load(&self, quiz_id: &str) -> Result<QuizDocument, LoadError> {
        let quiz_id = validate_quiz_id(quiz_id)?;
        let mut attempts = Vec::with_capacity(self.candidate_paths.len());

        for template in &self.candidate_paths {
            let relative = template.replace(QUIZ_ID_PLACEHOLDER, quiz_id);

            let (location, body) = match self.fetch_candidate(&relative).await {
                Ok(found) => found,
                Err(failure) => {
                    tracing::debug!(
                        candidate.location = %failure.location,
                        reason = %failure.reason,
                        "Quiz candidate unavailable"
                    );
                    attempts.push(failure.location);
                    continue;
                }
            };

            match serde_json::from_str::<Value>(&body) {
                Ok(value) => {
                    tracing::info!(
                        quiz.id = %quiz_id,
                        candidate.location = %location,
                        "Loaded quiz data"
                    );
                    return QuizDocumentParser::normalize(quiz_id, value);
                }
                Err(e) => {
                    tracing::debug!(
                        candidate.location = %location,
                        error = %e,
                        "Quiz candidate is not valid JSON"
                    );
                    attempts.push(location);
                }
            }
        }

        tracing::warn!(
            quiz.id = %quiz_id,
            attempts.count = attempts.len(),
            "No quiz data candidate could be loaded"
        );
        Err(LoadError::LoadFailure {
            quiz_id: quiz_id.to_string(),
            attempts,
        })
    }

    async fn fetch_candidate(&self, relative: &str) -> Result<(String, String), CandidateFailure> {
        match &self.base {
            ContentBase::Dir(dir) => {
                let path = dir.join(relative);
                let location = path.display().to_string();
                match tokio::fs::read_to_string(&path).await {
                    Ok(body) => Ok((location, body)),
                    Err(e) => Err(CandidateFailure {
                        location,
                        reason: e.to_string(),
                    }),
                }
            }
            ContentBase::Url(base) => {
                let url = base.join(relative).map_err(|e| CandidateFailure {
                    location: format!("{base}{relative}"),
                    reason: e.to_string(),
                })?;
                let location = url.to_string();

                let response = self.client.get(url).send().await.map_err(|e| CandidateFailure {
                    location: location.clone(),
                    reason: e.to_string(),
                })?;

                if !response.status().is_success() {
                    return Err(CandidateFailure {
                        location,
                        reason: format!("HTTP status {}", response.status()),
                    });
                }

                match response.text().await {
                    Ok(body) => Ok((location, body)),
                    Err(e) => Err(CandidateFailure {
                        location,
                        reason: e.to_string(),
                    }),
                }
            }
        }
    }
}

use crate::error::{ConfigError, Result as AppResult};
use crate::game_logic::AnswerPolicy;
use crate::game_logic::utils::DEFAULT_QUESTION_COUNT;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, Value, ValueKind};
use serde::{Deserialize, Deserializer};

pub const DEFAULT_CANDIDATE_PATHS: &[&str] = &[
    "./{id}.json",
    "./data/{id}.json",
    "./common/data/{id}.json",
    "../{id}.json",
    "../data/{id}.json",
];

pub const QUIZ_ID_PLACEHOLDER: &str = "{id}";

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    #[serde(default, deserialize_with = "deserialize_string_or_list")]
    pub cors_origins: Vec<String>,
    /// Directory served as the front-end when set.
    #[serde(default)]
    pub static_dir: Option<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ContentSourceType {
    File,
    Http,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContentConfig {
    pub source_type: ContentSourceType,
    pub base_dir: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(deserialize_with = "deserialize_string_or_list")]
    pub candidate_paths: Vec<String>,
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QuizConfig {
    #[serde(default)]
    pub default_quiz_id: Option<String>,
    pub default_question_count: usize,
    pub answer_policy: AnswerPolicy,
    pub shuffle_options: bool,
    /// Sessions with no command for this long are dropped, finished or not.
    pub session_idle_secs: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum RankStorageType {
    File,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RanksConfig {
    pub storage: RankStorageType,
    pub file_path: String,
    pub key_prefix: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub server: ServerConfig,
    pub content: ContentConfig,
    pub quiz: QuizConfig,
    pub ranks: RanksConfig,
}

impl AppSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.content.source_type == ContentSourceType::Http
            && self
                .content
                .base_url
                .as_deref()
                .is_none_or(|url| url.trim().is_empty())
        {
            return Err(ConfigError::Missing(
                "content.base_url is required when content.source_type is http".to_string(),
            ));
        }

        if self.content.candidate_paths.is_empty() {
            return Err(ConfigError::InvalidValue(
                "content.candidate_paths must not be empty".to_string(),
            ));
        }

        if let Some(path) = self
            .content
            .candidate_paths
            .iter()
            .find(|path| !path.contains(QUIZ_ID_PLACEHOLDER))
        {
            return Err(ConfigError::InvalidValue(format!(
                "candidate path '{path}' does not contain {QUIZ_ID_PLACEHOLDER}"
            )));
        }

        if self.quiz.default_question_count == 0 {
            return Err(ConfigError::InvalidValue(
                "quiz.default_question_count must be at least 1".to_string(),
            ));
        }

        if self.quiz.session_idle_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "quiz.session_idle_secs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

pub fn load_settings() -> AppResult<AppSettings> {
    let builder = with_defaults(Config::builder())?
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::with_prefix("QUIZDECK")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("server.cors_origins")
                .with_list_parse_key("content.candidate_paths")
                .try_parsing(true),
        );

    let settings: AppSettings = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    settings.validate()?;
    Ok(settings)
}

fn with_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let default_paths: Vec<Value> = DEFAULT_CANDIDATE_PATHS
        .iter()
        .map(|path| Value::new(None, ValueKind::String(path.to_string())))
        .collect();

    builder
        .set_default("server.port", 8080_i64)
        .and_then(|b| {
            b.set_default(
                "server.cors_origins",
                Value::new(None, ValueKind::Array(vec![])),
            )
        })
        .and_then(|b| b.set_default("content.source_type", "file"))
        .and_then(|b| b.set_default("content.base_dir", "."))
        .and_then(|b| {
            b.set_default(
                "content.candidate_paths",
                Value::new(None, ValueKind::Array(default_paths)),
            )
        })
        .and_then(|b| b.set_default("content.fetch_timeout_secs", 10_i64))
        .and_then(|b| b.set_default("quiz.default_question_count", DEFAULT_QUESTION_COUNT as i64))
        .and_then(|b| b.set_default("quiz.answer_policy", "submit_then_reveal"))
        .and_then(|b| b.set_default("quiz.shuffle_options", false))
        .and_then(|b| b.set_default("quiz.session_idle_secs", 3600_i64))
        .and_then(|b| b.set_default("ranks.storage", "file"))
        .and_then(|b| b.set_default("ranks.file_path", "ranks.json"))
        .and_then(|b| b.set_default("ranks.key_prefix", "quizRank_"))
        .map_err(|e| ConfigError::Load(e.to_string()))
}

fn deserialize_string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use serde_json::Value;

    let value = Value::deserialize(deserializer)?;

    let items = match value {
        Value::String(s) => s.split(',').map(|item| item.trim().to_string()).collect(),
        Value::Array(arr) => {
            let mut items = Vec::with_capacity(arr.len());
            for item in arr {
                if let Value::String(s) = item {
                    items.push(s.trim().to_string());
                } else {
                    return Err(D::Error::custom("Array must contain only strings"));
                }
            }
            items
        }
        Value::Null => Vec::new(),
        _ => return Err(D::Error::custom("Expected string or array of strings")),
    };

    Ok(items.into_iter().filter(|item: &String| !item.is_empty()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_settings() -> AppSettings {
        with_defaults(Config::builder())
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_deserialize() {
        let settings = default_settings();
        assert_eq!(settings.server.port, 8080);
        assert!(settings.server.cors_origins.is_empty());
        assert_eq!(settings.content.source_type, ContentSourceType::File);
        assert_eq!(settings.content.candidate_paths, DEFAULT_CANDIDATE_PATHS);
        assert_eq!(settings.quiz.default_question_count, 10);
        assert_eq!(settings.quiz.answer_policy, AnswerPolicy::SubmitThenReveal);
        assert!(!settings.quiz.shuffle_options);
        assert_eq!(settings.quiz.session_idle_secs, 3600);
        assert_eq!(settings.ranks.key_prefix, "quizRank_");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_http_source_requires_base_url() {
        let mut settings = default_settings();
        settings.content.source_type = ContentSourceType::Http;
        assert!(matches!(settings.validate(), Err(ConfigError::Missing(_))));

        settings.content.base_url = Some("http://localhost:8000/quiz/".to_string());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_candidate_paths_need_placeholder() {
        let mut settings = default_settings();
        settings.content.candidate_paths = vec!["./data/fixed.json".to_string()];
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidValue(_))
        ));

        settings.content.candidate_paths.clear();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_default_count_rejected() {
        let mut settings = default_settings();
        settings.quiz.default_question_count = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_idle_timeout_rejected() {
        let mut settings = default_settings();
        settings.quiz.session_idle_secs = 0;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_string_or_list_deserializer() {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(deserialize_with = "deserialize_string_or_list")]
            items: Vec<String>,
        }

        let from_string: Wrapper =
            serde_json::from_str(r#"{"items": "./{id}.json, ./data/{id}.json,"}"#).unwrap();
        assert_eq!(from_string.items, vec!["./{id}.json", "./data/{id}.json"]);

        let from_list: Wrapper =
            serde_json::from_str(r#"{"items": [" a ", "b"]}"#).unwrap();
        assert_eq!(from_list.items, vec!["a", "b"]);

        assert!(serde_json::from_str::<Wrapper>(r#"{"items": [1]}"#).is_err());
    }
}

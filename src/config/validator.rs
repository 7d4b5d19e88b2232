use thiserror::Error;

use crate::agents::config::LlmProviderConfig;
use crate::agents::orchestration::TerminationMode;
use crate::config::{
    DatabaseSettings, OrchestrationSettings, RetrievalSettings, ServerSettings, Settings,
};
use crate::db::BackendKind;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Cross-reference error: {0}")]
    CrossReference(String),
}

fn invalid(field: &str, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(settings: &Settings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        Self::validate_server(&settings.server, &mut errors);
        Self::validate_llm(&settings.llm, &mut errors);
        Self::validate_database(&settings.database, &mut errors);
        Self::validate_orchestration(&settings.orchestration, &mut errors);
        Self::validate_retrieval(&settings.retrieval, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_server(server: &ServerSettings, errors: &mut Vec<ValidationError>) {
        if server.host.is_empty() {
            errors.push(ValidationError::MissingField("server.host".to_string()));
        }

        if server.port == 0 {
            errors.push(invalid("server.port", "Port must be greater than 0"));
        }
    }

    fn validate_llm(llm: &LlmProviderConfig, errors: &mut Vec<ValidationError>) {
        if llm.model.trim().is_empty() {
            errors.push(ValidationError::MissingField("llm.model".to_string()));
        }
        if llm.api_key_env.trim().is_empty() {
            errors.push(ValidationError::MissingField("llm.api_key_env".to_string()));
        }
        if llm.request_timeout_secs == 0 {
            errors.push(invalid(
                "llm.request_timeout_secs",
                "Timeout must be greater than 0",
            ));
        }
        if let Some(temperature) = llm.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                errors.push(invalid("llm.temperature", "Must be between 0.0 and 2.0"));
            }
        }
    }

    fn validate_database(database: &DatabaseSettings, errors: &mut Vec<ValidationError>) {
        match database.backend {
            BackendKind::Postgres => {
                if database.url.as_deref().map_or(true, str::is_empty) {
                    errors.push(ValidationError::MissingField(
                        "database.url (or DATABASE_URL)".to_string(),
                    ));
                }
            }
            BackendKind::Presto => match &database.presto {
                None => errors.push(ValidationError::CrossReference(
                    "database.backend is 'presto' but no [database.presto] section is set"
                        .to_string(),
                )),
                Some(presto) => {
                    for (field, value) in [
                        ("database.presto.host", &presto.host),
                        ("database.presto.user", &presto.user),
                        ("database.presto.catalog", &presto.catalog),
                        ("database.presto.schema", &presto.schema),
                    ] {
                        if value.is_empty() {
                            errors.push(ValidationError::MissingField(field.to_string()));
                        }
                    }
                }
            },
        }

        if database.max_connections == 0 {
            errors.push(invalid(
                "database.max_connections",
                "Must allow at least one connection",
            ));
        }
    }

    fn validate_orchestration(
        orchestration: &OrchestrationSettings,
        errors: &mut Vec<ValidationError>,
    ) {
        if !orchestration.price_per_1k_tokens.is_finite() || orchestration.price_per_1k_tokens < 0.0 {
            errors.push(invalid(
                "orchestration.price_per_1k_tokens",
                "Price must be a non-negative number",
            ));
        }

        if orchestration.self_correction_attempts == 0 {
            errors.push(invalid(
                "orchestration.self_correction_attempts",
                "At least one attempt is required",
            ));
        }

        if orchestration.termination != TerminationMode::Hook
            && orchestration.completion_keyword.trim().is_empty()
        {
            errors.push(ValidationError::CrossReference(
                "orchestration.termination uses a keyword but orchestration.completion_keyword is empty"
                    .to_string(),
            ));
        }

        if orchestration.assistant_poll_interval_ms == 0 {
            errors.push(invalid(
                "orchestration.assistant_poll_interval_ms",
                "Poll interval must be greater than 0",
            ));
        }
        if orchestration.assistant_max_polls == 0 {
            errors.push(invalid(
                "orchestration.assistant_max_polls",
                "At least one poll is required",
            ));
        }
    }

    fn validate_retrieval(retrieval: &RetrievalSettings, errors: &mut Vec<ValidationError>) {
        if retrieval.similar_tables == 0 {
            errors.push(invalid(
                "retrieval.similar_tables",
                "At least one similar table must be retrieved",
            ));
        }
        if retrieval.embeddings && retrieval.embedding_model.trim().is_empty() {
            errors.push(ValidationError::CrossReference(
                "retrieval.embeddings is enabled but retrieval.embedding_model is empty"
                    .to_string(),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_settings() -> Settings {
        Settings {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            llm: LlmProviderConfig::default(),
            database: DatabaseSettings {
                url: Some("postgres://localhost/app".to_string()),
                ..DatabaseSettings::default()
            },
            workspace: Default::default(),
            orchestration: OrchestrationSettings::default(),
            retrieval: RetrievalSettings::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(ConfigValidator::validate(&valid_settings()).is_ok());
    }

    #[test]
    fn test_invalid_port() {
        let mut settings = valid_settings();
        settings.server.port = 0;

        let errors = ConfigValidator::validate(&settings).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            ValidationError::InvalidValue { field, .. } if field == "server.port"
        ));
    }

    #[test]
    fn test_postgres_requires_url() {
        let mut settings = valid_settings();
        settings.database.url = None;

        let errors = ConfigValidator::validate(&settings).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.to_string().contains("database.url")));
    }

    #[test]
    fn test_presto_requires_section() {
        let mut settings = valid_settings();
        settings.database.backend = BackendKind::Presto;

        let errors = ConfigValidator::validate(&settings).unwrap_err();
        assert!(matches!(&errors[0], ValidationError::CrossReference(_)));
    }

    #[test]
    fn test_collects_every_error() {
        let mut settings = valid_settings();
        settings.server.host = String::new();
        settings.orchestration.self_correction_attempts = 0;
        settings.orchestration.price_per_1k_tokens = -1.0;
        settings.retrieval.similar_tables = 0;

        let errors = ConfigValidator::validate(&settings).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_keyword_termination_needs_keyword() {
        let mut settings = valid_settings();
        settings.orchestration.termination = TerminationMode::Keyword;
        settings.orchestration.completion_keyword = "  ".to_string();

        let errors = ConfigValidator::validate(&settings).unwrap_err();
        assert!(matches!(&errors[0], ValidationError::CrossReference(_)));
    }
}

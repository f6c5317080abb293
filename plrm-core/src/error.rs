//! # Erros do Motor PLRM
//!
//! Todos os erros do crate passam por [`PlrmError`]. As variantes seguem três famílias:
//!
//! - **Estruturais**: documentos malformados, nomes duplicados, rótulos conflitantes.
//! - **Configuração**: tipo de learner desconhecido, combinações de opções inválidas.
//! - **Consistência**: dicionário de features menor que o esperado, ids fora do espaço.
//!
//! Casos numéricos (underflow, exponenciais de números muito negativos) não são erros:
//! são tratados no domínio logarítmico pelo módulo [`crate::scores`].

use thiserror::Error;

/// Erro único do crate. As mensagens sempre nomeiam as entidades envolvidas.
#[derive(Debug, Error)]
pub enum PlrmError {
    // --- Estruturais ---
    #[error("a discriminação '{name}' já existe na suite")]
    DuplicateDiscrimination { name: String },

    #[error("a classe '{class}' já existe na discriminação '{discrimination}'")]
    DuplicateClass { discrimination: String, class: String },

    #[error(
        "o exemplo '{example}' recebeu duas classes da discriminação '{discrimination}': '{first}' e '{second}'"
    )]
    ConflictingLabels {
        example: String,
        discrimination: String,
        first: String,
        second: String,
    },

    #[error("discriminação desconhecida: '{name}'")]
    UnknownDiscrimination { name: String },

    #[error("classe desconhecida '{class}' na discriminação '{discrimination}'")]
    UnknownClass { discrimination: String, class: String },

    #[error("a classe referenciada pertence a uma discriminação removida (id {dis})")]
    StaleClass { dis: u32 },

    #[error("a feature '{feature}' aparece mais de uma vez no exemplo '{example}'")]
    DuplicateFeature { example: String, feature: String },

    #[error("documento malformado: {0}")]
    MalformedDocument(String),

    // --- Configuração ---
    #[error("tipo de learner desconhecido: '{name}'")]
    UnknownLearner { name: String },

    #[error("opções incompatíveis: {0}")]
    IncompatibleOptions(String),

    #[error("parâmetro inválido '{name}' = {value}")]
    InvalidParameter { name: String, value: f64 },

    #[error("learner {index} não existe (a suite tem {count})")]
    NoSuchLearner { index: usize, count: usize },

    // --- Consistência ---
    #[error("o dicionário de features tem {actual} entradas, mas o modelo espera pelo menos {expected}")]
    DictionaryShrunk { expected: usize, actual: usize },

    #[error("feature id {id} fora do dicionário (tamanho {size})")]
    UnknownFeatureId { id: usize, size: usize },

    #[error("renumeração inválida: {0}")]
    Renumbering(String),

    // --- Externos ---
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Regex(#[from] regex::Error),
}

impl PlrmError {
    /// `true` para erros de consistência (modelo e dados divergiram).
    pub fn is_consistency(&self) -> bool {
        matches!(
            self,
            PlrmError::DictionaryShrunk { .. }
                | PlrmError::UnknownFeatureId { .. }
                | PlrmError::Renumbering(_)
        )
    }

    /// `true` para erros de configuração, detectados antes de qualquer treino.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PlrmError::UnknownLearner { .. }
                | PlrmError::IncompatibleOptions(_)
                | PlrmError::InvalidParameter { .. }
                | PlrmError::NoSuchLearner { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PlrmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_message_names_entities() {
        let err = PlrmError::ConflictingLabels {
            example: "doc7".into(),
            discrimination: "Cor".into(),
            first: "Azul".into(),
            second: "Verde".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("doc7"));
        assert!(msg.contains("Cor"));
        assert!(msg.contains("Azul") && msg.contains("Verde"));
    }

    #[test]
    fn test_error_families() {
        assert!(PlrmError::DictionaryShrunk { expected: 10, actual: 3 }.is_consistency());
        assert!(PlrmError::UnknownLearner { name: "svm".into() }.is_configuration());
        assert!(!PlrmError::MalformedDocument("x".into()).is_configuration());
    }
}

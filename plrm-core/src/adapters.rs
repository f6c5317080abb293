//! # Adaptadores de Arquivos Planos
//!
//! Formatos de linha de terceiros, traduzidos para [`DatasetDoc`] antes de chegar ao
//! núcleo. Uma linha por exemplo:
//!
//! ```text
//! <rótulo> feature:valor feature:valor ... [# nome]
//! ```
//!
//! - **Duas classes**: o rótulo é `+1`/`1` ou `-1`, mapeado para as classes positiva e
//!   negativa de uma discriminação.
//! - **Rótulo numérico**: o rótulo é um inteiro qualquer e vira o nome da classe.
//!
//! Linhas vazias e linhas que começam com `#` são ignoradas. Sem nome explícito, o
//! exemplo se chama `linha<N>`.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::dataset::{DatasetDoc, ExampleDoc};
use crate::error::{PlrmError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlatFormat {
    TwoClass {
        discrimination: String,
        positive: String,
        negative: String,
    },
    NumericLabel {
        discrimination: String,
    },
}

/// Leitor de um formato plano com as expressões regulares já compiladas.
pub struct FlatFileReader {
    format: FlatFormat,
    line_re: Regex,
    feature_re: Regex,
}

impl FlatFileReader {
    pub fn new(format: FlatFormat) -> Result<Self> {
        Ok(Self {
            format,
            line_re: Regex::new(r"^\s*(?P<label>[+-]?\d+)(?P<body>[^#]*)(?:#\s*(?P<name>.*?))?\s*$")?,
            feature_re: Regex::new(r"^(?P<feature>[^\s:]+):(?P<value>[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)$")?,
        })
    }

    pub fn format(&self) -> &FlatFormat {
        &self.format
    }

    /// Lê o texto inteiro, preservando a ordem das linhas.
    pub fn read(&self, text: &str) -> Result<DatasetDoc> {
        let mut examples = Vec::new();
        for (i, line) in text.lines().enumerate() {
            if let Some(example) = self.parse_line(i + 1, line)? {
                examples.push(example);
            }
        }
        Ok(DatasetDoc { examples })
    }

    fn parse_line(&self, number: usize, line: &str) -> Result<Option<ExampleDoc>> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(None);
        }
        let caps = self
            .line_re
            .captures(line)
            .ok_or_else(|| malformed(number, "linha sem rótulo numérico"))?;

        let raw_label = &caps["label"];
        let label = match &self.format {
            FlatFormat::TwoClass {
                discrimination,
                positive,
                negative,
            } => match raw_label {
                "+1" | "1" => format!("{discrimination}:{positive}"),
                "-1" => format!("{discrimination}:{negative}"),
                other => return Err(malformed(number, &format!("rótulo '{other}' não é +1 nem -1"))),
            },
            FlatFormat::NumericLabel { discrimination } => {
                let value: i64 = raw_label
                    .parse()
                    .map_err(|_| malformed(number, &format!("rótulo '{raw_label}' fora do intervalo")))?;
                format!("{discrimination}:{value}")
            }
        };

        let name = caps
            .name("name")
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty())
            .map_or_else(|| format!("linha{number}"), str::to_string);

        let mut features: Vec<(String, f64)> = Vec::new();
        for token in caps["body"].split_whitespace() {
            let fc = self
                .feature_re
                .captures(token)
                .ok_or_else(|| malformed(number, &format!("feature '{token}' não está no formato nome:valor")))?;
            let value: f64 = fc["value"]
                .parse()
                .map_err(|_| malformed(number, &format!("valor inválido em '{token}'")))?;
            let feature = &fc["feature"];
            if features.iter().any(|(n, _)| n == feature) {
                return Err(PlrmError::DuplicateFeature {
                    example: name,
                    feature: feature.to_string(),
                });
            }
            features.push((feature.to_string(), value));
        }

        Ok(Some(ExampleDoc {
            name,
            labels: vec![label],
            features,
        }))
    }
}

fn malformed(line: usize, detail: &str) -> PlrmError {
    PlrmError::MalformedDocument(format!("linha {line}: {detail}"))
}

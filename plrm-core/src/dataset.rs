//! # Documentos de Dataset
//!
//! Formato de troca dos exemplos: uma sequência **ordenada** de exemplos nomeados, cada um
//! com rótulos `"Discriminação:Classe"` e features `nome → valor`.
//!
//! ```json
//! { "examples": [
//!     { "name": "TinyDoc2", "labels": ["Kind:GADGET"], "features": { "Size": 2.1 } }
//! ] }
//! ```
//!
//! A conversão para [`DataPoint`]s é feita contra uma [`Suite`], segundo uma
//! [`ParsePolicy`]:
//!
//! | Política | Discriminação/classe desconhecida |
//! |----------|-----------------------------------|
//! | `Definitional` | é criada |
//! | `Strict` | erro |
//! | `Lenient` | o rótulo é ignorado (e contado) |
//!
//! Em [`parse_dataset`], features desconhecidas recebem um id novo no dicionário, na
//! ordem em que aparecem no documento. [`parse_dataset_frozen`] só lê a suite: features
//! desconhecidas são descartadas (e contadas) e nenhuma discriminação é criada.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::datapoint::DataPoint;
use crate::error::{PlrmError, Result};
use crate::suite::{ClassRef, Suite};

/// Um exemplo no documento.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExampleDoc {
    pub name: String,
    #[serde(default)]
    pub labels: Vec<String>,
    /// Pares `nome → valor` na ordem do documento. Repetições são preservadas para que a
    /// conversão as rejeite.
    #[serde(default, with = "feature_pairs")]
    pub features: Vec<(String, f64)>,
}

impl ExampleDoc {
    /// Valor da primeira ocorrência da feature `name`.
    pub fn feature(&self, name: &str) -> Option<f64> {
        self.features.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }
}

/// Objeto JSON `{ nome: valor }` lido como lista ordenada de pares.
mod feature_pairs {
    use std::fmt;

    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(pairs: &[(String, f64)], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(pairs.len()))?;
        for (name, value) in pairs {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<(String, f64)>, D::Error> {
        struct PairsVisitor;

        impl<'de> Visitor<'de> for PairsVisitor {
            type Value = Vec<(String, f64)>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("um objeto feature → valor")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(pair) = access.next_entry::<String, f64>()? {
                    pairs.push(pair);
                }
                Ok(pairs)
            }
        }

        deserializer.deserialize_map(PairsVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DatasetDoc {
    pub examples: Vec<ExampleDoc>,
}

impl DatasetDoc {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Tratamento de nomes de discriminação/classe desconhecidos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsePolicy {
    Definitional,
    Strict,
    Lenient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOptions {
    pub policy: ParsePolicy,
    /// Tamanho mínimo do dicionário esperado por um modelo já treinado.
    #[serde(default)]
    pub expected_features: Option<usize>,
}

impl ParseOptions {
    /// Política derivada do modo da suite: definicional ou estrita.
    pub fn for_suite(suite: &Suite) -> Self {
        Self {
            policy: if suite.config().mode.definitional {
                ParsePolicy::Definitional
            } else {
                ParsePolicy::Strict
            },
            expected_features: None,
        }
    }
}

/// Resultado da conversão.
#[derive(Debug, Clone, Default)]
pub struct ParsedDataset {
    pub points: Vec<DataPoint>,
    /// Rótulos descartados pela política `Lenient`.
    pub ignored_labels: usize,
    /// Features fora do dicionário, descartadas por [`parse_dataset_frozen`].
    pub ignored_features: usize,
}

/// Converte o documento em `DataPoint`s, na ordem do documento.
pub fn parse_dataset(doc: &DatasetDoc, suite: &mut Suite, options: ParseOptions) -> Result<ParsedDataset> {
    if let Some(expected) = options.expected_features {
        suite.dictionary().check_min_len(expected)?;
    }
    let create = options.policy == ParsePolicy::Definitional;
    let mut parsed = ParsedDataset {
        points: Vec::with_capacity(doc.examples.len()),
        ..ParsedDataset::default()
    };
    for example in &doc.examples {
        let mut point = DataPoint::from_named(example.name.as_str(), &example.features, suite.dictionary_mut())?;
        let labels = resolve_labels(example, options.policy, &mut parsed, |label| {
            suite.resolve_label(label, create)
        })?;
        point.set_classes(labels, suite)?;
        parsed.points.push(point);
    }
    Ok(parsed)
}

/// Converte o documento sem alterar a suite.
///
/// Features fora do dicionário não têm peso em nenhum learner e são descartadas. A política
/// `Definitional` não é aceita, porque criaria discriminações.
pub fn parse_dataset_frozen(doc: &DatasetDoc, suite: &Suite, options: ParseOptions) -> Result<ParsedDataset> {
    if options.policy == ParsePolicy::Definitional {
        return Err(PlrmError::IncompatibleOptions(
            "a leitura sem alterar a suite não pode criar discriminações (política definitional)".into(),
        ));
    }
    if let Some(expected) = options.expected_features {
        suite.dictionary().check_min_len(expected)?;
    }
    let dictionary = suite.dictionary();
    let mut parsed = ParsedDataset {
        points: Vec::with_capacity(doc.examples.len()),
        ..ParsedDataset::default()
    };
    for example in &doc.examples {
        let mut seen = HashSet::with_capacity(example.features.len());
        let mut pairs = Vec::with_capacity(example.features.len());
        for (name, value) in &example.features {
            if !seen.insert(name.as_str()) {
                return Err(PlrmError::DuplicateFeature {
                    example: example.name.clone(),
                    feature: name.clone(),
                });
            }
            match dictionary.id(name) {
                Some(id) => pairs.push((id, *value)),
                None => parsed.ignored_features += 1,
            }
        }
        let mut point = DataPoint::from_ids(example.name.as_str(), pairs, dictionary)?;
        let labels = resolve_labels(example, options.policy, &mut parsed, |label| suite.resolve_label_existing(label))?;
        point.set_classes(labels, suite)?;
        parsed.points.push(point);
    }
    Ok(parsed)
}

fn resolve_labels(
    example: &ExampleDoc,
    policy: ParsePolicy,
    parsed: &mut ParsedDataset,
    mut resolve: impl FnMut(&str) -> Result<ClassRef>,
) -> Result<Vec<ClassRef>> {
    let mut labels = Vec::with_capacity(example.labels.len());
    for label in &example.labels {
        match resolve(label) {
            Ok(class) => labels.push(class),
            Err(PlrmError::UnknownDiscrimination { .. } | PlrmError::UnknownClass { .. })
                if policy == ParsePolicy::Lenient =>
            {
                tracing::debug!(example = %example.name, label = %label, "rótulo desconhecido ignorado");
                parsed.ignored_labels += 1;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(labels)
}

/// Exemplo embutido (nome, rótulo, features).
pub struct BuiltinExample {
    pub name: &'static str,
    pub label: &'static str,
    pub features: &'static [(&'static str, f64)],
}

/// Os sete exemplos WIDGET/GADGET usados como cenário mínimo de treino.
pub const TINY_DOCS: &[BuiltinExample] = &[
    BuiltinExample { name: "TinyDoc1", label: "Kind:WIDGET", features: &[] },
    BuiltinExample { name: "TinyDoc2", label: "Kind:GADGET", features: &[("Size", 2.1)] },
    BuiltinExample { name: "TinyDoc3", label: "Kind:WIDGET", features: &[("Size", 3.1), ("Heat", 3.2)] },
    BuiltinExample { name: "TinyDoc4", label: "Kind:GADGET", features: &[("Size", 4.1)] },
    BuiltinExample {
        name: "TinyDoc5",
        label: "Kind:WIDGET",
        features: &[("Size", 5.1), ("Heat", 5.2), ("Mass", 5.3)],
    },
    BuiltinExample { name: "TinyDoc6", label: "Kind:GADGET", features: &[("Size", 6.1)] },
    BuiltinExample { name: "TinyDoc7", label: "Kind:WIDGET", features: &[("Heat", 7.2), ("Mass", 7.3)] },
];

/// Documento com os [`TINY_DOCS`].
pub fn tiny_docs() -> DatasetDoc {
    DatasetDoc {
        examples: TINY_DOCS
            .iter()
            .map(|e| ExampleDoc {
                name: e.name.to_string(),
                labels: vec![e.label.to_string()],
                features: e.features.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            })
            .collect(),
    }
}

use rand::Rng;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};

use crate::quiz::difficulty::TierSettings;
use crate::quiz::language::Language;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to parse the pantheon: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("the pantheon is empty")]
    Empty,
    #[error("deity is missing its {} name", Language::DEFAULT)]
    MissingDefaultName,
    #[error("deity {0:?} has a blank name")]
    BlankName(String),
    #[error("deity id {0:?} appears more than once")]
    DuplicateId(String),
    #[error("{name:?} names both {first:?} and {second:?} in {language}")]
    DuplicateName {
        name: String,
        language: Language,
        first: String,
        second: String,
    },
    #[error("tier needs {required} distinct deities but the pantheon only has {available}")]
    TooFewDeities { required: usize, available: usize },
}

/// Display names of a deity, keyed by language.
///
/// The English name is mandatory and checked when the pantheon is loaded, so lookups never fail:
/// a language without its own entry falls back to English.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(
    try_from = "BTreeMap<Language, String>",
    into = "BTreeMap<Language, String>"
)]
pub struct LocalizedNames {
    default: String,
    localized: BTreeMap<Language, String>,
}

impl LocalizedNames {
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            default: default.into(),
            localized: BTreeMap::new(),
        }
    }

    pub fn with(mut self, language: Language, name: impl Into<String>) -> Self {
        if language == Language::DEFAULT {
            self.default = name.into();
        } else {
            self.localized.insert(language, name.into());
        }
        self
    }

    /// Name in `language`, or the English name when there is no translation.
    pub fn get(&self, language: Language) -> &str {
        self.localized
            .get(&language)
            .map(String::as_str)
            .unwrap_or(&self.default)
    }

    pub fn default_name(&self) -> &str {
        &self.default
    }

    pub fn has(&self, language: Language) -> bool {
        language == Language::DEFAULT || self.localized.contains_key(&language)
    }

    fn names(&self) -> impl Iterator<Item = &String> {
        std::iter::once(&self.default).chain(self.localized.values())
    }
}

impl TryFrom<BTreeMap<Language, String>> for LocalizedNames {
    type Error = CatalogError;

    fn try_from(mut names: BTreeMap<Language, String>) -> Result<Self, Self::Error> {
        let default = names
            .remove(&Language::DEFAULT)
            .ok_or(CatalogError::MissingDefaultName)?;
        Ok(Self {
            default,
            localized: names,
        })
    }
}

impl From<LocalizedNames> for BTreeMap<Language, String> {
    fn from(names: LocalizedNames) -> Self {
        let mut map = names.localized;
        map.insert(Language::DEFAULT, names.default);
        map
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Deity {
    pub id: String,
    pub names: LocalizedNames,
    /// Only ever set on the copy of a deity that a round owns, once its image has been generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Deity {
    pub fn new(id: impl Into<String>, names: LocalizedNames) -> Self {
        Self {
            id: id.into(),
            names,
            description: None,
        }
    }

    pub fn name(&self, language: Language) -> &str {
        self.names.get(language)
    }
}

/// The catalog of deities the quiz draws from. Never mutated after loading.
#[derive(Debug, Clone)]
pub struct Pantheon {
    deities: Vec<Deity>,
}

impl Pantheon {
    pub fn new(file: File) -> Result<Self, CatalogError> {
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let deities: Vec<Deity> = serde_json::from_reader(reader)?;
        Self::from_deities(deities)
    }

    pub fn from_deities(deities: Vec<Deity>) -> Result<Self, CatalogError> {
        if deities.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::new();
        for deity in &deities {
            if !seen.insert(deity.id.as_str()) {
                return Err(CatalogError::DuplicateId(deity.id.clone()));
            }
            if deity.names.names().any(|n| n.trim().is_empty()) {
                return Err(CatalogError::BlankName(deity.id.clone()));
            }
        }
        ensure_unique_names(&deities)?;

        // The catalog entries themselves never carry a description
        let deities = deities
            .into_iter()
            .map(|d| Deity {
                description: None,
                ..d
            })
            .collect();

        Ok(Self { deities })
    }

    pub fn all(&self) -> &[Deity] {
        &self.deities
    }

    pub fn len(&self) -> usize {
        self.deities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deities.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Deity> {
        self.deities.iter().find(|d| d.id == id)
    }

    /// Uniformly random deity from the whole pantheon.
    pub fn pick_random(&self) -> &Deity {
        let rand = rand::thread_rng().gen_range(0..self.deities.len());
        &self.deities[rand]
    }

    pub fn list_excluding(&self, id: &str) -> Vec<&Deity> {
        self.deities.iter().filter(|d| d.id != id).collect()
    }

    /// Fails when a tier asks for more options per round than there are deities.
    pub fn ensure_supports(&self, settings: &TierSettings) -> Result<(), CatalogError> {
        if settings.options == 0 || settings.options > self.deities.len() {
            return Err(CatalogError::TooFewDeities {
                required: settings.options.max(1),
                available: self.deities.len(),
            });
        }
        Ok(())
    }
}

/// Players answer with a name, so within one language the names on offer (the localized one,
/// and the English one that is also accepted) must point at a single deity.
fn ensure_unique_names(deities: &[Deity]) -> Result<(), CatalogError> {
    for language in Language::ALL {
        let mut owners: HashMap<&str, &str> = HashMap::new();
        for deity in deities {
            for name in [deity.names.get(language), deity.names.default_name()] {
                let name = name.trim();
                match owners.insert(name, deity.id.as_str()) {
                    Some(first) if first != deity.id => {
                        return Err(CatalogError::DuplicateName {
                            name: name.to_string(),
                            language,
                            first: first.to_string(),
                            second: deity.id.clone(),
                        })
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

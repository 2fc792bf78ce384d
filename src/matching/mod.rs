//! Comparaison d'un shader incompatible avec les shaders des manifestes
//!
//! Un score plus bas indique une meilleure correspondance. Une correspondance
//! complète exige le même nom et le même ensemble de propriétés (noms et
//! types, sans tenir compte de l'ordre).

use serde::Serialize;
use std::collections::HashMap;

use crate::shader::{ShaderEntry, ShaderProperty, ShaderPropertyType, ShaderSignature};

/// Pénalité quand les noms ne diffèrent que par la casse ou le chemin
pub const SIMILAR_NAME_PENALTY: u32 = 8;

/// Propriété utilisée par le shader mais absente du candidat
pub const MISSING_PROPERTY_PENALTY: u32 = 4;

/// Propriété présente des deux côtés avec un type différent
pub const TYPE_MISMATCH_PENALTY: u32 = 3;

/// Mot-clé demandé mais non déclaré par le candidat
pub const MISSING_KEYWORD_PENALTY: u32 = 2;

/// Propriété du candidat inconnue du shader
pub const EXTRA_PROPERTY_PENALTY: u32 = 1;

/// Nom d'affichage différent pour une même propriété
pub const DISPLAY_NAME_PENALTY: u32 = 1;

/// Classification d'une correspondance; l'absence de correspondance est `None`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ShaderMatch {
    Full,
    Partial { score: u32 },
}

impl ShaderMatch {
    pub fn is_full(&self) -> bool {
        matches!(self, ShaderMatch::Full)
    }

    /// Score de tri (0 pour une correspondance complète)
    pub fn score(&self) -> u32 {
        match self {
            ShaderMatch::Full => 0,
            ShaderMatch::Partial { score } => *score,
        }
    }
}

/// Compare la signature d'un shader incompatible à un candidat
pub fn match_shader(query: &ShaderSignature, candidate: &ShaderEntry) -> Option<ShaderMatch> {
    let name_penalty = name_penalty(&query.name, candidate.name())?;
    let properties = property_distance(&query.properties, candidate.properties());

    if name_penalty == 0 && properties.structural == 0 {
        return Some(ShaderMatch::Full);
    }

    let score = name_penalty
        + properties.structural
        + properties.cosmetic
        + keyword_penalty(&query.keywords, candidate.keywords());

    Some(ShaderMatch::Partial { score })
}

fn name_penalty(query: &str, candidate: &str) -> Option<u32> {
    if query == candidate {
        return Some(0);
    }

    if query.eq_ignore_ascii_case(candidate) {
        return Some(SIMILAR_NAME_PENALTY);
    }

    // Un nom terminé par '/' n'a pas de dernier segment comparable
    let leaf = leaf_name(query);
    if !leaf.is_empty() && leaf.eq_ignore_ascii_case(leaf_name(candidate)) {
        return Some(SIMILAR_NAME_PENALTY);
    }

    None
}

/// Dernier segment d'un nom de shader ("Custom/Glow" -> "Glow")
fn leaf_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

struct PropertyDistance {
    /// Différences de noms et de types
    structural: u32,
    /// Différences de noms d'affichage
    cosmetic: u32,
}

fn property_distance(query: &[ShaderProperty], candidate: &[ShaderProperty]) -> PropertyDistance {
    let mut remaining: HashMap<&str, Vec<&ShaderProperty>> = HashMap::new();
    for property in candidate {
        remaining.entry(property.name.as_str()).or_default().push(property);
    }

    let mut distance = PropertyDistance {
        structural: 0,
        cosmetic: 0,
    };

    for wanted in query {
        let slot = remaining.get_mut(wanted.name.as_str());
        match slot.and_then(|props| take_best(props, wanted.property_type)) {
            Some(found) if found.property_type != wanted.property_type => {
                distance.structural += TYPE_MISMATCH_PENALTY;
            }
            Some(found) => {
                if found.display_name != wanted.display_name {
                    distance.cosmetic += DISPLAY_NAME_PENALTY;
                }
            }
            None => distance.structural += MISSING_PROPERTY_PENALTY,
        }
    }

    let extra: usize = remaining.values().map(Vec::len).sum();
    distance.structural += extra as u32 * EXTRA_PROPERTY_PENALTY;
    distance
}

/// Retire la propriété de même type si elle existe, sinon la première
fn take_best<'a>(props: &mut Vec<&'a ShaderProperty>, wanted: ShaderPropertyType) -> Option<&'a ShaderProperty> {
    if props.is_empty() {
        return None;
    }
    let index = props.iter().position(|p| p.property_type == wanted).unwrap_or(0);
    Some(props.remove(index))
}

fn keyword_penalty(query: &[String], candidate: &[String]) -> u32 {
    // Un candidat sans mots-clés déclarés n'est pas pénalisé
    if candidate.is_empty() {
        return 0;
    }
    let missing = query.iter().filter(|k| !candidate.contains(k)).count();
    missing as u32 * MISSING_KEYWORD_PENALTY
}

/// Suivi de la meilleure correspondance partielle.
///
/// En cas d'égalité de score, le premier candidat rencontré est conservé.
#[derive(Debug)]
pub struct BestMatch<T> {
    best: Option<(T, ShaderMatch)>,
}

impl<T> BestMatch<T> {
    pub fn new() -> Self {
        Self { best: None }
    }

    /// Propose un candidat; retourne vrai s'il devient le meilleur
    pub fn offer(&mut self, candidate: T, matched: ShaderMatch) -> bool {
        let better = match &self.best {
            Some((_, current)) => matched.score() < current.score(),
            None => true,
        };
        if better {
            self.best = Some((candidate, matched));
        }
        better
    }

    pub fn into_inner(self) -> Option<(T, ShaderMatch)> {
        self.best
    }
}

impl<T> Default for BestMatch<T> {
    fn default() -> Self {
        Self::new()
    }
}

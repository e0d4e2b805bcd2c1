//! Curated reference translations
//!
//! Static ground truth used by the auto-validator (ingredients and units)
//! and by the evaluation harness (ingredients, units and instruction
//! keywords).

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

use crate::types::{normalize, DomainType, Language};

/// Reference translations of one source term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    pub fr: &'static str,
    pub es: &'static str,
}

impl ReferenceEntry {
    pub fn get(&self, language: Language) -> &'static str {
        match language {
            Language::Fr => self.fr,
            Language::Es => self.es,
        }
    }
}

const INGREDIENTS: &[(&str, &str, &str)] = &[
    ("chicken", "poulet", "pollo"),
    ("beef", "boeuf", "carne de res"),
    ("pork", "porc", "cerdo"),
    ("fish", "poisson", "pescado"),
    ("tomato", "tomate", "tomate"),
    ("onion", "oignon", "cebolla"),
    ("garlic", "ail", "ajo"),
    ("carrot", "carotte", "zanahoria"),
    ("potato", "pomme de terre", "patata"),
    ("rice", "riz", "arroz"),
    ("pasta", "pâtes", "pasta"),
    ("flour", "farine", "harina"),
    ("sugar", "sucre", "azúcar"),
    ("salt", "sel", "sal"),
    ("pepper", "poivre", "pimienta"),
    ("oil", "huile", "aceite"),
    ("butter", "beurre", "mantequilla"),
    ("egg", "œuf", "huevo"),
    ("milk", "lait", "leche"),
    ("cheese", "fromage", "queso"),
];

const UNITS: &[(&str, &str, &str)] = &[
    ("cup", "tasse", "taza"),
    ("tablespoon", "cuillère à soupe", "cucharada"),
    ("teaspoon", "cuillère à café", "cucharadita"),
    ("gram", "gramme", "gramo"),
    ("kilogram", "kilogramme", "kilogramo"),
    ("liter", "litre", "litro"),
    ("milliliter", "millilitre", "mililitro"),
    ("piece", "pièce", "pieza"),
    ("pound", "livre", "libra"),
    ("ounce", "once", "onza"),
];

const INSTRUCTION_KEYWORDS: &[(&str, &str, &str)] = &[
    ("chop", "hacher", "picar"),
    ("dice", "couper en dés", "cortar en cubos"),
    ("slice", "trancher", "cortar en rodajas"),
    ("mince", "émincer", "picar finamente"),
    ("mix", "mélanger", "mezclar"),
    ("stir", "remuer", "revolver"),
    ("cook", "cuire", "cocinar"),
    ("bake", "cuire au four", "hornear"),
    ("fry", "frire", "freír"),
    ("boil", "bouillir", "hervir"),
    ("simmer", "mijoter", "hervir a fuego lento"),
    ("season", "assaisonner", "sazonar"),
    ("garnish", "garnir", "decorar"),
    ("serve", "servir", "servir"),
];

static BUILTIN: Lazy<ReferenceDictionary> = Lazy::new(|| {
    let mut dictionary = ReferenceDictionary::empty();
    for (domain, rows) in [
        (DomainType::Ingredient, INGREDIENTS),
        (DomainType::Unit, UNITS),
        (DomainType::Instruction, INSTRUCTION_KEYWORDS),
    ] {
        for &(source, fr, es) in rows {
            dictionary.insert(domain, source, ReferenceEntry { fr, es });
        }
    }
    dictionary
});

/// (domain type, normalized source) -> per-language reference
#[derive(Debug, Clone, Default)]
pub struct ReferenceDictionary {
    entries: BTreeMap<(DomainType, String), ReferenceEntry>,
}

impl ReferenceDictionary {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The curated built-in dictionary
    pub fn builtin() -> &'static ReferenceDictionary {
        &BUILTIN
    }

    pub fn insert(&mut self, domain: DomainType, source: &str, entry: ReferenceEntry) {
        self.entries.insert((domain, normalize(source)), entry);
    }

    pub fn lookup(&self, domain: DomainType, source: &str) -> Option<&ReferenceEntry> {
        self.entries.get(&(domain, normalize(source)))
    }

    /// Reference translation for one language
    pub fn translation(&self, domain: DomainType, source: &str, language: Language) -> Option<&'static str> {
        self.lookup(domain, source).map(|e| e.get(language))
    }

    /// Source terms of a domain type, sorted
    pub fn terms(&self, domain: DomainType) -> impl Iterator<Item = (&str, &ReferenceEntry)> {
        self.entries
            .iter()
            .filter(move |((d, _), _)| *d == domain)
            .map(|((_, source), entry)| (source.as_str(), entry))
    }

    /// Instruction keywords contained in a sentence
    pub fn keywords_in(&self, sentence: &str) -> Vec<(&str, &ReferenceEntry)> {
        let lowered = sentence.to_lowercase();
        self.terms(DomainType::Instruction)
            .filter(|(keyword, _)| lowered.contains(keyword))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_sizes() {
        let dict = ReferenceDictionary::builtin();
        assert_eq!(dict.terms(DomainType::Ingredient).count(), 20);
        assert_eq!(dict.terms(DomainType::Unit).count(), 10);
        assert_eq!(dict.terms(DomainType::Instruction).count(), 14);
    }

    #[test]
    fn test_lookup_normalizes() {
        let dict = ReferenceDictionary::builtin();
        assert_eq!(dict.translation(DomainType::Ingredient, " Chicken ", Language::Fr), Some("poulet"));
        assert_eq!(dict.translation(DomainType::Unit, "cup", Language::Es), Some("taza"));
        assert!(dict.lookup(DomainType::Ingredient, "cup").is_none());
    }

    #[test]
    fn test_keywords_in_sentence() {
        let dict = ReferenceDictionary::builtin();
        let found: Vec<&str> = dict
            .keywords_in("Stir well, then Simmer for 10 minutes")
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(found, vec!["simmer", "stir"]);
        assert!(dict.keywords_in("Preheat the oven").is_empty());
    }
}

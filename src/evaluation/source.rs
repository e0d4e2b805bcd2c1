//! Sample recipe sources
//!
//! The harness pulls random recipes from TheMealDB. When nothing can be
//! collected it falls back to synthetic recipes built from the reference
//! dictionary.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::config::EvaluationConfig;
use crate::feedback::ReferenceDictionary;
use crate::types::DomainType;

/// Unit assumed when a measure has no recognizable unit
pub const DEFAULT_UNIT: &str = "piece";

/// TheMealDB numbers its ingredient slots 1..=20
const MEAL_SLOTS: usize = 20;

static AMOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*(.*)$").unwrap());

/// One ingredient line of a sample recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleIngredient {
    pub name: String,
    pub amount: f64,
    pub unit: String,
}

/// A recipe used as evaluation input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecipe {
    pub id: String,
    pub title: String,
    pub ingredients: Vec<SampleIngredient>,
    pub instructions: Vec<String>,
}

/// Supplier of sample recipes
#[async_trait]
pub trait RecipeSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch one random recipe; `Ok(None)` when the source returned nothing
    async fn fetch_random(&self) -> Result<Option<SampleRecipe>>;
}

/// Random recipes from TheMealDB
pub struct TheMealDbSource {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct MealResponse {
    meals: Option<Vec<Map<String, Value>>>,
}

impl TheMealDbSource {
    pub fn new(config: &EvaluationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("adaptive-translation/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, url: config.source_url.clone() })
    }
}

#[async_trait]
impl RecipeSource for TheMealDbSource {
    fn name(&self) -> &str {
        "themealdb"
    }

    async fn fetch_random(&self) -> Result<Option<SampleRecipe>> {
        let response = self.client
            .get(&self.url)
            .send()
            .await
            .context("Failed to fetch random recipe")?;

        if !response.status().is_success() {
            bail!("Recipe source error: {}", response.status());
        }

        let body: MealResponse = response
            .json()
            .await
            .context("Failed to parse recipe response")?;

        Ok(body
            .meals
            .and_then(|meals| meals.into_iter().next())
            .and_then(|meal| meal_to_recipe(&meal)))
    }
}

fn field<'a>(meal: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    meal.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Convert one TheMealDB meal object; meals without an id are dropped
pub fn meal_to_recipe(meal: &Map<String, Value>) -> Option<SampleRecipe> {
    let id = field(meal, "idMeal")?.to_string();
    let title = field(meal, "strMeal").unwrap_or("Unknown Recipe").to_string();

    let ingredients = (1..=MEAL_SLOTS)
        .filter_map(|i| {
            let name = field(meal, &format!("strIngredient{}", i))?;
            let measure = field(meal, &format!("strMeasure{}", i)).unwrap_or("");
            Some(SampleIngredient {
                name: name.to_string(),
                amount: parse_amount(measure),
                unit: parse_unit(measure),
            })
        })
        .collect();

    let instructions = field(meal, "strInstructions")
        .map(|text| {
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(SampleRecipe { id, title, ingredients, instructions })
}

/// Leading decimal number of a measure, 1 when absent
pub fn parse_amount(measure: &str) -> f64 {
    AMOUNT
        .captures(measure)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(1.0)
}

/// Canonical unit following the leading amount of a measure
pub fn parse_unit(measure: &str) -> String {
    let Some(rest) = AMOUNT.captures(measure).and_then(|c| c.get(2)) else {
        return DEFAULT_UNIT.to_string();
    };
    let word: String = rest
        .as_str()
        .chars()
        .take_while(|c| c.is_alphabetic())
        .collect::<String>()
        .to_lowercase();

    let unit = match word.as_str() {
        "cup" | "cups" => "cup",
        "tablespoon" | "tablespoons" | "tbsp" | "tbs" => "tablespoon",
        "teaspoon" | "teaspoons" | "tsp" => "teaspoon",
        "g" | "gram" | "grams" | "gr" => "gram",
        "kg" | "kilogram" | "kilograms" => "kilogram",
        "l" | "liter" | "liters" | "litre" | "litres" => "liter",
        "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres" => "milliliter",
        "lb" | "lbs" | "pound" | "pounds" => "pound",
        "oz" | "ounce" | "ounces" => "ounce",
        _ => DEFAULT_UNIT,
    };
    unit.to_string()
}

/// Recipes assembled from reference terms, used when no source is reachable
pub fn synthetic_recipes<R: Rng + ?Sized>(
    reference: &ReferenceDictionary,
    count: usize,
    rng: &mut R,
) -> Vec<SampleRecipe> {
    let ingredients: Vec<&str> = reference.terms(DomainType::Ingredient).map(|(t, _)| t).collect();
    let units: Vec<&str> = reference.terms(DomainType::Unit).map(|(t, _)| t).collect();
    let keywords: Vec<&str> = reference.terms(DomainType::Instruction).map(|(t, _)| t).collect();

    (0..count)
        .map(|i| {
            let mut names = ingredients.clone();
            names.shuffle(rng);
            names.truncate(5 + i % 10);

            let mut steps = keywords.clone();
            steps.shuffle(rng);
            steps.truncate(3 + i % 5);

            SampleRecipe {
                id: format!("synthetic-{}", i),
                title: format!("Synthetic Recipe {}", i + 1),
                ingredients: names
                    .into_iter()
                    .map(|name| SampleIngredient {
                        name: name.to_string(),
                        amount: rng.random_range(1..=5) as f64,
                        unit: units.choose(rng).copied().unwrap_or(DEFAULT_UNIT).to_string(),
                    })
                    .collect(),
                instructions: steps
                    .into_iter()
                    .map(|step| format!("First, {} the ingredients. Then cook for {} minutes.", step, 10 + i))
                    .collect(),
            }
        })
        .collect()
}

use anyhow::{Context, Result};

use crate::models::{Classification, IngredientCategory};
use crate::units::UnitRegistry;

/// Categories created by schema setup: (name, description, sort order).
pub const CATEGORY_SEEDS: &[(&str, &str, i64)] = &[
    ("Vegetables", "Fresh and preserved vegetables", 1),
    ("Proteins", "Meat, fish, poultry and plant proteins", 2),
    ("Dairy & Eggs", "Milk, cheese, cream and eggs", 3),
    ("Grains & Cereals", "Flour, rice, pasta and bread", 4),
    ("Herbs & Spices", "Herbs, spices and seasonings", 5),
    ("Oils & Fats", "Cooking oils, butter and other fats", 6),
    ("Other", "Anything not covered above", 99),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Vegetables,
    HerbsAndSpices,
    OilsAndFats,
    DairyAndEggs,
    Proteins,
    GrainsAndCereals,
}

impl Rule {
    fn category_name(self) -> &'static str {
        match self {
            Rule::Vegetables => "Vegetables",
            Rule::HerbsAndSpices => "Herbs & Spices",
            Rule::OilsAndFats => "Oils & Fats",
            Rule::DairyAndEggs => "Dairy & Eggs",
            Rule::Proteins => "Proteins",
            Rule::GrainsAndCereals => "Grains & Cereals",
        }
    }
}

/// Keyword rules in application order. Every matching rule overwrites the
/// previous result, so later rules take precedence.
const CATEGORY_RULES: &[(Rule, &[&str])] = &[
    (
        Rule::Vegetables,
        &[
            "tomato",
            "onion",
            "garlic",
            "carrot",
            "potato",
            "celery",
            "lettuce",
            "spinach",
            "cucumber",
            "zucchini",
            "eggplant",
            "mushroom",
            "cabbage",
            "broccoli",
            "cauliflower",
            "leek",
            "shallot",
            "squash",
            "pumpkin",
        ],
    ),
    (
        Rule::HerbsAndSpices,
        &[
            "basil", "oregano", "thyme", "rosemary", "parsley", "cilantro", "coriander", "mint",
            "sage", "dill", "bay leaf", "pepper", "salt", "cinnamon", "paprika", "cumin",
            "nutmeg", "chili", "chilli", "turmeric", "vanilla", "clove", "ginger", "saffron",
        ],
    ),
    (
        Rule::OilsAndFats,
        &["oil", "butter", "lard", "margarine", "shortening", "ghee"],
    ),
    (
        Rule::DairyAndEggs,
        &[
            "milk",
            "cream",
            "cheese",
            "yogurt",
            "yoghurt",
            "egg",
            "mozzarella",
            "parmesan",
            "ricotta",
            "mascarpone",
        ],
    ),
    (
        Rule::Proteins,
        &[
            "chicken", "beef", "pork", "lamb", "veal", "turkey", "duck", "fish", "salmon", "tuna",
            "cod", "shrimp", "prawn", "bacon", "pancetta", "sausage", "prosciutto", "tofu",
            "anchov", "lentil", "chickpea",
        ],
    ),
    (
        Rule::GrainsAndCereals,
        &[
            "rice", "pasta", "flour", "bread", "oats", "oatmeal", "quinoa", "barley", "couscous",
            "noodle", "spaghetti", "penne", "polenta", "semolina", "cornmeal",
        ],
    ),
];

/// Densities in g/ml. Later matches overwrite earlier ones.
const DENSITIES: &[(&str, f64)] = &[
    ("water", 1.0),
    ("milk", 1.03),
    ("oil", 0.92),
    ("honey", 1.4),
    ("sugar", 0.845),
    ("flour", 0.593),
    ("salt", 2.16),
];

/// Density estimate for an ingredient name, if any keyword matches.
#[must_use]
pub fn estimate_density(name: &str) -> Option<f64> {
    let lower = name.to_lowercase();
    DENSITIES
        .iter()
        .filter(|(keyword, _)| lower.contains(keyword))
        .map(|&(_, density)| density)
        .last()
}

fn matching_rule(name: &str) -> Option<Rule> {
    let lower = name.to_lowercase();
    CATEGORY_RULES.iter().fold(None, |current, (rule, keywords)| {
        if keywords.iter().any(|k| lower.contains(k)) {
            Some(*rule)
        } else {
            current
        }
    })
}

/// Keyword classifier bound to the category and unit ids of one database.
#[derive(Debug, Clone)]
pub struct Classifier {
    categories: Vec<(Rule, IngredientCategory)>,
    piece_id: i64,
    gram_id: i64,
    milliliter_id: i64,
}

impl Classifier {
    /// Fails if a rule's category or one of the default units is not seeded.
    pub fn new(categories: &[IngredientCategory], registry: &UnitRegistry) -> Result<Self> {
        let categories = CATEGORY_RULES
            .iter()
            .map(|(rule, _)| {
                categories
                    .iter()
                    .find(|c| c.name == rule.category_name())
                    .map(|c| (*rule, c.clone()))
                    .with_context(|| format!("Category '{}' not found", rule.category_name()))
            })
            .collect::<Result<Vec<_>>>()?;

        let unit_id = |name: &str| {
            registry
                .lookup(name)
                .map(|u| u.id)
                .with_context(|| format!("Unit '{name}' not found"))
        };

        Ok(Self {
            categories,
            piece_id: unit_id("piece")?,
            gram_id: unit_id("gram")?,
            milliliter_id: unit_id("milliliter")?,
        })
    }

    fn category(&self, rule: Rule) -> Option<&IngredientCategory> {
        self.categories
            .iter()
            .find(|(r, _)| *r == rule)
            .map(|(_, c)| c)
    }

    fn rule_for(&self, category: &IngredientCategory) -> Option<Rule> {
        self.categories
            .iter()
            .find(|(_, c)| c.id == category.id)
            .map(|(r, _)| *r)
    }

    /// Category for a canonical name. `None` when no keyword matches.
    #[must_use]
    pub fn classify(&self, name: &str) -> Option<&IngredientCategory> {
        matching_rule(name).and_then(|rule| self.category(rule))
    }

    #[must_use]
    pub fn default_unit_for(
        &self,
        category: Option<&IngredientCategory>,
        name: &str,
    ) -> Option<i64> {
        let rule = self.rule_for(category?)?;
        let lower = name.to_lowercase();
        let unit = match rule {
            Rule::Vegetables if lower.contains("powder") || lower.contains("juice") => return None,
            Rule::Vegetables => self.piece_id,
            Rule::OilsAndFats if lower.contains("butter") => self.gram_id,
            Rule::OilsAndFats => self.milliliter_id,
            Rule::DairyAndEggs if lower.contains("egg") => self.piece_id,
            Rule::DairyAndEggs if lower.contains("milk") || lower.contains("cream") => {
                self.milliliter_id
            }
            Rule::DairyAndEggs
            | Rule::HerbsAndSpices
            | Rule::Proteins
            | Rule::GrainsAndCereals => self.gram_id,
        };
        Some(unit)
    }

    /// Category, density and default unit in one go.
    #[must_use]
    pub fn classification(&self, name: &str) -> Classification {
        let category = self.classify(name);
        Classification {
            category_id: category.map(|c| c.id),
            density_g_per_ml: estimate_density(name),
            default_unit_id: self.default_unit_for(category, name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories() -> Vec<IngredientCategory> {
        CATEGORY_SEEDS
            .iter()
            .enumerate()
            .map(|(i, (name, description, sort_order))| IngredientCategory {
                id: i as i64 + 1,
                name: (*name).to_string(),
                description: Some((*description).to_string()),
                sort_order: *sort_order,
            })
            .collect()
    }

    fn classifier() -> (Classifier, UnitRegistry) {
        let registry = UnitRegistry::standard().unwrap();
        (Classifier::new(&categories(), &registry).unwrap(), registry)
    }

    fn category_of(c: &Classifier, name: &str) -> Option<String> {
        c.classify(name).map(|cat| cat.name.clone())
    }

    #[test]
    fn test_basic_categories() {
        let (c, _) = classifier();
        assert_eq!(category_of(&c, "Tomatoes").as_deref(), Some("Vegetables"));
        assert_eq!(category_of(&c, "Basil").as_deref(), Some("Herbs & Spices"));
        assert_eq!(category_of(&c, "Milk").as_deref(), Some("Dairy & Eggs"));
        assert_eq!(category_of(&c, "Chicken Breast").as_deref(), Some("Proteins"));
        assert_eq!(category_of(&c, "Spaghetti").as_deref(), Some("Grains & Cereals"));
        assert_eq!(category_of(&c, "Xanthan Gum"), None);
    }

    #[test]
    fn test_last_matching_rule_wins() {
        let (c, _) = classifier();
        assert_eq!(category_of(&c, "Pepper Oil").as_deref(), Some("Oils & Fats"));
        assert_eq!(category_of(&c, "Garlic Butter").as_deref(), Some("Oils & Fats"));
        assert_eq!(
            category_of(&c, "Chicken Stock Cube With Rice").as_deref(),
            Some("Grains & Cereals")
        );
    }

    #[test]
    fn test_other_is_never_assigned() {
        let (c, _) = classifier();
        for name in ["Water", "Sugar", "Honey", ""] {
            assert!(c.classify(name).is_none(), "{name}");
        }
    }

    #[test]
    fn test_density_later_match_overwrites() {
        assert_eq!(estimate_density("Whole Milk"), Some(1.03));
        assert_eq!(estimate_density("Olive Oil"), Some(0.92));
        assert_eq!(estimate_density("Salted Water"), Some(2.16));
        assert_eq!(estimate_density("Tomatoes"), None);
    }

    #[test]
    fn test_default_units() {
        let (c, registry) = classifier();
        let unit = |name: &str| {
            c.classification(name)
                .default_unit_id
                .and_then(|id| registry.get(id))
                .map(|u| u.name.clone())
        };
        assert_eq!(unit("Tomatoes").as_deref(), Some("piece"));
        assert_eq!(unit("Tomato Juice"), None);
        assert_eq!(unit("Onion Powder"), None);
        assert_eq!(unit("Olive Oil").as_deref(), Some("milliliter"));
        assert_eq!(unit("Butter").as_deref(), Some("gram"));
        assert_eq!(unit("Eggs").as_deref(), Some("piece"));
        assert_eq!(unit("Milk").as_deref(), Some("milliliter"));
        assert_eq!(unit("Heavy Cream").as_deref(), Some("milliliter"));
        assert_eq!(unit("Ricotta").as_deref(), Some("gram"));
        assert_eq!(unit("Flour").as_deref(), Some("gram"));
        assert_eq!(unit("Honey"), None);
    }

    #[test]
    fn test_classification_for_milk() {
        let (c, registry) = classifier();
        let result = c.classification("Milk");
        assert_eq!(result.category_id, Some(3));
        assert_eq!(result.density_g_per_ml, Some(1.03));
        assert_eq!(result.default_unit_id, registry.lookup("milliliter").map(|u| u.id));
    }

    #[test]
    fn test_missing_category_is_an_error() {
        let registry = UnitRegistry::standard().unwrap();
        let mut cats = categories();
        cats.retain(|c| c.name != "Proteins");
        let err = Classifier::new(&cats, &registry).unwrap_err();
        assert!(err.to_string().contains("Proteins"));
    }
}

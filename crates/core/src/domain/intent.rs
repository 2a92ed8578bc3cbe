use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Help,
    Categories,
    ProductSearch,
    PriceInquiry,
    QuantityPrice,
    HowMuch,
    Comparison,
    StockCheck,
    Recommendation,
    Alternatives,
    AttributeQuestion,
    MostExpensive,
    Cheapest,
    CategoryList,
    CalculatorInquiry,
    StoreInfo,
    FollowUp,
    ClearContext,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Help => "help",
            Self::Categories => "categories",
            Self::ProductSearch => "product_search",
            Self::PriceInquiry => "price_inquiry",
            Self::QuantityPrice => "quantity_price",
            Self::HowMuch => "how_much",
            Self::Comparison => "comparison",
            Self::StockCheck => "stock_check",
            Self::Recommendation => "recommendation",
            Self::Alternatives => "alternatives",
            Self::AttributeQuestion => "attribute_question",
            Self::MostExpensive => "most_expensive",
            Self::Cheapest => "cheapest",
            Self::CategoryList => "category_list",
            Self::CalculatorInquiry => "calculator_inquiry",
            Self::StoreInfo => "store_info",
            Self::FollowUp => "follow_up",
            Self::ClearContext => "clear_context",
            Self::Unknown => "unknown",
        }
    }
}

/// Product attribute a contextual question asks about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeTopic {
    Material,
    Quantity,
    Size,
    Price,
    Weight,
    Color,
    Stock,
    Supplier,
    Coverage,
}

impl AttributeTopic {
    /// Attribute keys consulted, in order, when answering about this topic.
    pub fn attribute_keys(&self) -> &'static [&'static str] {
        match self {
            Self::Material => &["material", "type", "grade"],
            Self::Quantity => &["quantity", "quantity_per_pack", "pieces", "count", "pack_size"],
            Self::Size => &["size", "dimensions", "length", "width", "height", "thickness"],
            Self::Price => &[],
            Self::Weight => &["weight", "weight_kg"],
            Self::Color => &["color", "colour", "finish"],
            Self::Stock => &[],
            Self::Supplier => &[],
            Self::Coverage => &["coverage", "coverage_per_unit"],
        }
    }
}

/// Output of the intent router. `extracted` carries the entity phrase a rule
/// captured (e.g. the product words after "looking for").
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IntentClassification {
    pub intent: Intent,
    pub confidence: f64,
    pub extracted: Vec<String>,
    pub attribute: Option<AttributeTopic>,
}

impl IntentClassification {
    pub fn new(intent: Intent, confidence: f64) -> Self {
        Self { intent, confidence, extracted: Vec::new(), attribute: None }
    }

    pub fn unknown() -> Self {
        Self::new(Intent::Unknown, 0.0)
    }

    pub fn with_extracted(mut self, extracted: Vec<String>) -> Self {
        self.extracted = extracted;
        self
    }

    pub fn with_attribute(mut self, attribute: Option<AttributeTopic>) -> Self {
        self.attribute = attribute;
        self
    }

    pub fn primary_entity(&self) -> Option<&str> {
        self.extracted.first().map(String::as_str).filter(|entity| !entity.trim().is_empty())
    }
}

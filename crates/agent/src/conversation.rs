//! Intent handlers.
//!
//! A handler sees an immutable [`TurnContext`] and returns a [`HandlerOutcome`]
//! with the reply and the memory mutations the turn wants. Nothing here
//! writes to the conversation directly; the orchestrator applies the
//! mutations under the user's lock.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use construkt_core::audit::{AuditContext, AuditSink};
use construkt_core::calculator::CalculatorDialogue;
use construkt_core::catalog::{CatalogSnapshot, ProductMatcher};
use construkt_core::config::AppConfig;
use construkt_core::domain::calculator::CalculationReport;
use construkt_core::domain::conversation::{
    AwaitingKind, ConversationMemory, MemoryMutation, Topic,
};
use construkt_core::domain::intent::{AttributeTopic, Intent, IntentClassification};
use construkt_core::domain::product::{MatchKind, ProductRecord};
use construkt_core::errors::DomainError;
use construkt_core::flows::CalculatorState;
use construkt_core::intent::rules::{detect_attribute, PRONOUNS};
use construkt_core::intent::{normalize, IntentRouter, FOLLOW_UP_CONFIDENCE};
use construkt_core::recommend::{
    compare, recommend, suggest_for_out_of_stock, SizeToken, RECOMMENDATION_LIMIT,
};

use crate::replies;
use crate::store_info::StoreInfoProvider;

const SEARCH_LIMIT: usize = 20;
const PRICE_SORT_LIMIT: usize = 5;
const SHORT_STOCK_ALTERNATIVES: usize = 2;

/// Intents that keep their own reading even while a calculation is open.
const CALCULATOR_PROTECTED: &[Intent] = &[
    Intent::Greeting,
    Intent::Help,
    Intent::Categories,
    Intent::ClearContext,
    Intent::StoreInfo,
    Intent::Comparison,
    Intent::QuantityPrice,
    Intent::StockCheck,
    Intent::CategoryList,
    Intent::Cheapest,
    Intent::MostExpensive,
    Intent::CalculatorInquiry,
];

static PRICE_SORT_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:cheapest|lowest price[ds]?|least expensive|most expensive|highest price[ds]?|expensive|priciest|premium|top quality|budget|affordable|what(?:'s| is| are)?|show me|the|your|you|do|have|options?)\b",
    )
    .expect("price sort pattern must compile")
});

/// Classifies `message` against the conversation, letting an open calculator
/// session claim bare dimensions and follow-up edits that would otherwise
/// read as unknown or as questions about the current product.
pub fn route(
    router: &IntentRouter,
    message: &str,
    memory: &ConversationMemory,
) -> IntentClassification {
    let base = router.classify_in_context(message, memory);
    if memory.topic != Topic::Calculator || CALCULATOR_PROTECTED.contains(&base.intent) {
        return base;
    }

    let continues = match memory.calculator.state {
        CalculatorState::AwaitingDimensions => CalculatorDialogue::is_relevant(message),
        CalculatorState::Complete => CalculatorDialogue::is_follow_up(message),
        CalculatorState::None => false,
    };
    if continues {
        IntentClassification::new(Intent::CalculatorInquiry, FOLLOW_UP_CONFIDENCE)
    } else {
        base
    }
}

pub struct TurnContext<'a> {
    pub message: &'a str,
    pub memory: &'a ConversationMemory,
    pub catalog: &'a CatalogSnapshot,
    pub classification: &'a IntentClassification,
    pub config: &'a AppConfig,
    pub store_info: &'a dyn StoreInfoProvider,
    pub audit: &'a dyn AuditSink,
    pub audit_context: &'a AuditContext,
}

#[derive(Clone, Debug, Default)]
pub struct HandlerOutcome {
    /// `None` asks the caller to consult the generative fallback.
    pub response: Option<String>,
    pub products: Vec<ProductRecord>,
    pub primary: Option<ProductRecord>,
    pub calculation: Option<CalculationReport>,
    /// Category names offered when nothing matched.
    pub suggestions: Vec<String>,
    pub mutations: Vec<MemoryMutation>,
    /// Forget the conversation before applying `mutations`.
    pub reset: bool,
}

impl HandlerOutcome {
    fn reply(text: impl Into<String>) -> Self {
        Self { response: Some(text.into()), ..Self::default() }
    }

    fn products(mut self, products: Vec<ProductRecord>) -> Self {
        if !products.is_empty() {
            self.mutations.push(MemoryMutation::MentionProducts(products.clone()));
        }
        self.products.extend(products);
        self
    }

    /// Makes `product` the conversation's current product and lists it first.
    fn focus(mut self, product: ProductRecord) -> Self {
        if !self.products.iter().any(|shown| shown.id == product.id) {
            self.products.insert(0, product.clone());
        }
        self.about(product)
    }

    /// Makes `product` the current product without listing it among the
    /// products offered, as for an out-of-stock item.
    fn about(mut self, product: ProductRecord) -> Self {
        self.mutations.push(MemoryMutation::SetCurrentProduct(product.clone()));
        self.primary = Some(product);
        self
    }

    fn focus_if_in_stock(self, product: ProductRecord) -> Self {
        if product.in_stock() {
            self.focus(product)
        } else {
            self.about(product)
        }
    }

    fn topic(mut self, topic: Topic, awaiting: Option<AwaitingKind>) -> Self {
        self.mutations.push(MemoryMutation::SetTopic(topic));
        self.mutations.push(MemoryMutation::SetAwaiting(awaiting));
        self
    }
}

impl<'a> TurnContext<'a> {
    pub fn handle(&self) -> HandlerOutcome {
        match self.classification.intent {
            Intent::Greeting => HandlerOutcome::reply(replies::GREETING),
            Intent::Help => HandlerOutcome::reply(replies::HELP),
            Intent::Categories => {
                HandlerOutcome::reply(replies::categories(self.catalog.categories()))
            }
            Intent::ClearContext => {
                HandlerOutcome { reset: true, ..HandlerOutcome::reply(replies::CLEARED) }
            }
            Intent::StoreInfo => self.store_info(),
            Intent::ProductSearch => self.product_search(),
            Intent::PriceInquiry => self.price_inquiry(),
            Intent::QuantityPrice => self.quantity_price(),
            Intent::HowMuch => self.how_much(),
            Intent::Comparison => self.comparison(),
            Intent::StockCheck => self.stock_check(),
            Intent::Recommendation => self.recommendation(),
            Intent::Alternatives => self.alternatives(),
            Intent::AttributeQuestion => self.attribute_question(),
            Intent::FollowUp => self.follow_up(),
            Intent::Cheapest => self.price_sorted(true),
            Intent::MostExpensive => self.price_sorted(false),
            Intent::CategoryList => self.category_list(),
            Intent::CalculatorInquiry => self.calculator(),
            Intent::Unknown => self.unknown(),
        }
    }

    fn matcher(&self) -> ProductMatcher<'a> {
        ProductMatcher::new(self.catalog)
    }

    fn category_hints(&self) -> Vec<String> {
        self.catalog
            .categories()
            .iter()
            .take(self.config.fallback.category_hint_limit)
            .map(|category| category.name.clone())
            .collect()
    }

    /// Current product with catalog-fresh stock and price.
    fn current_product(&self) -> Option<ProductRecord> {
        let current = self.memory.current_product.as_ref()?;
        Some(self.catalog.product(current.id).cloned().unwrap_or_else(|| current.clone()))
    }

    /// Resolves a product phrase with the best fuzzy match. Pronouns and a
    /// missing phrase fall back to the current product.
    fn resolve(&self, phrase: Option<&str>) -> Option<ProductRecord> {
        match phrase.map(str::trim).filter(|phrase| !phrase.is_empty()) {
            Some(phrase) if !PRONOUNS.is_match(phrase) => {
                self.matcher().find(phrase, 1).into_iter().next().map(|found| found.product)
            }
            _ => self.current_product(),
        }
    }

    fn store_info(&self) -> HandlerOutcome {
        let answer = self
            .store_info
            .answer(self.message)
            .unwrap_or_else(|| replies::STORE_INFO_OVERVIEW.to_owned());
        HandlerOutcome::reply(answer).topic(Topic::StoreInfo, None)
    }

    fn product_search(&self) -> HandlerOutcome {
        let query = self.classification.primary_entity().unwrap_or(self.message).to_owned();
        let matcher = self.matcher();
        let matches = matcher.find(&query, SEARCH_LIMIT);

        let Some(top) = matches.first() else {
            return HandlerOutcome {
                suggestions: self.category_hints(),
                ..HandlerOutcome::reply(replies::no_match(
                    &query,
                    self.catalog.categories(),
                    self.config.fallback.category_hint_limit,
                ))
            };
        };

        let top_kind = top.kind;
        let products: Vec<ProductRecord> = matches.into_iter().map(|found| found.product).collect();

        if let Some(size) = SizeToken::parse(&query) {
            if let Some(exact) = products.iter().find(|product| size.matches(product)).cloned() {
                let others: Vec<ProductRecord> =
                    products.iter().filter(|product| product.id != exact.id).cloned().collect();
                return HandlerOutcome::reply(replies::size_match(&query, &exact, &others))
                    .products(others)
                    .focus(exact)
                    .topic(Topic::Product, Some(AwaitingKind::MoreInfo));
            }
        }

        if products.len() == 1 || top_kind == MatchKind::Exact {
            let product = products[0].clone();
            let suggestion = (!product.in_stock())
                .then(|| suggest_for_out_of_stock(&product, &matcher));
            let note = suggestion.as_ref().map(|suggestion| suggestion.message.as_str());
            let reply = replies::product_found(&product, note);
            let alternatives = suggestion.map(|suggestion| suggestion.alternatives).unwrap_or_default();
            return HandlerOutcome::reply(reply)
                .focus_if_in_stock(product)
                .products(alternatives)
                .topic(Topic::Product, Some(AwaitingKind::MoreInfo));
        }

        let reply = replies::product_list(&query, &products);
        let top = products[0].clone();
        HandlerOutcome::reply(reply)
            .products(products)
            .focus(top)
            .topic(Topic::Product, Some(AwaitingKind::MoreInfo))
    }

    fn price_inquiry(&self) -> HandlerOutcome {
        match self.resolve(self.classification.primary_entity()) {
            Some(product) => HandlerOutcome::reply(replies::product_found(&product, None))
                .focus(product)
                .topic(Topic::Product, Some(AwaitingKind::MoreInfo)),
            None => HandlerOutcome::reply(replies::ASK_PRODUCT_FOR_PRICE),
        }
    }

    fn quantity_price(&self) -> HandlerOutcome {
        let extracted = &self.classification.extracted;
        let quantity = extracted
            .first()
            .and_then(|raw| raw.parse::<u32>().ok())
            .filter(|quantity| *quantity > 0)
            .unwrap_or(1);
        let Some(product) = self.resolve(extracted.get(1).map(String::as_str)) else {
            return HandlerOutcome::reply(replies::ASK_PRODUCT_FOR_CALCULATION);
        };

        let alternatives = if product.stock_quantity < i64::from(quantity) {
            let mut alternatives = self.matcher().find_alternatives(&product, &[product.id]);
            alternatives.truncate(SHORT_STOCK_ALTERNATIVES);
            alternatives
        } else {
            Vec::new()
        };

        HandlerOutcome::reply(replies::price_calculation(&product, quantity, &alternatives))
            .focus(product)
            .products(alternatives)
            .topic(Topic::Product, None)
    }

    fn how_much(&self) -> HandlerOutcome {
        match self.current_product() {
            Some(product) => HandlerOutcome::reply(replies::bulk_pricing(&product))
                .focus(product)
                .topic(Topic::Product, None),
            None => HandlerOutcome::reply(replies::ASK_PRODUCT_FOR_PRICE),
        }
    }

    /// The two products to compare: both named, one named against the
    /// current product, or the last pair discussed.
    fn comparison_pair(&self) -> Result<(ProductRecord, ProductRecord), String> {
        let named: Vec<&str> = self
            .classification
            .extracted
            .iter()
            .map(|entity| entity.trim())
            .filter(|entity| !entity.is_empty())
            .collect();

        let lookup = |phrase: &str| {
            self.resolve(Some(phrase)).ok_or_else(|| replies::comparison_missing(phrase))
        };

        match named.as_slice() {
            [first, second, ..] => Ok((lookup(*first)?, lookup(*second)?)),
            [only] => {
                let current = self
                    .current_product()
                    .ok_or_else(|| replies::NEED_TWO_PRODUCTS.to_owned())?;
                Ok((current, lookup(*only)?))
            }
            [] => {
                let recent = if self.memory.comparison_products.len() >= 2 {
                    &self.memory.comparison_products
                } else {
                    &self.memory.mentioned_products
                };
                match recent.as_slice() {
                    [.., first, second] => Ok((first.clone(), second.clone())),
                    _ => Err(replies::NEED_TWO_PRODUCTS.to_owned()),
                }
            }
        }
    }

    fn comparison(&self) -> HandlerOutcome {
        let (first, second) = match self.comparison_pair() {
            Ok(pair) => pair,
            Err(reply) => return HandlerOutcome::reply(reply),
        };

        match compare(&first, &second) {
            Ok(report) => {
                let mut outcome = HandlerOutcome::reply(replies::comparison(&report));
                outcome.mutations.push(MemoryMutation::SetComparison(vec![first.clone(), second.clone()]));
                outcome.products = vec![first, second];
                outcome.topic(Topic::Product, None)
            }
            Err(DomainError::IncompatibleComparison(reason)) => {
                HandlerOutcome::reply(replies::comparison_rejected(&reason))
                    .products(vec![first, second])
                    .topic(Topic::Product, None)
            }
            Err(other) => HandlerOutcome::reply(replies::comparison_rejected(&other.to_string())),
        }
    }

    fn stock_check(&self) -> HandlerOutcome {
        match self.resolve(self.classification.primary_entity()) {
            Some(product) => self.stock_of(product),
            None => HandlerOutcome::reply(replies::ASK_PRODUCT_FOR_STOCK),
        }
    }

    /// Availability of `product`; out-of-stock products come with in-stock
    /// alternatives from the same category.
    fn stock_of(&self, product: ProductRecord) -> HandlerOutcome {
        let suggestion = suggest_for_out_of_stock(&product, &self.matcher());

        HandlerOutcome::reply(replies::stock(&product, &suggestion.alternatives))
            .focus_if_in_stock(product)
            .products(suggestion.alternatives)
            .topic(Topic::Product, None)
    }

    fn recommendation(&self) -> HandlerOutcome {
        let matcher = self.matcher();
        let recommended = if self.memory.current_product.is_some() {
            recommend(self.memory, self.message, &matcher)
        } else {
            match self.classification.primary_entity() {
                Some(entity) => {
                    let mut found: Vec<ProductRecord> = matcher
                        .find(entity, SEARCH_LIMIT)
                        .into_iter()
                        .map(|found| found.product)
                        .collect();
                    found.sort_by_key(|product| !product.in_stock());
                    found.truncate(RECOMMENDATION_LIMIT);
                    found
                }
                None => Vec::new(),
            }
        };

        HandlerOutcome::reply(replies::recommendations(&recommended))
            .products(recommended)
            .topic(Topic::Product, Some(AwaitingKind::MoreInfo))
    }

    fn alternatives(&self) -> HandlerOutcome {
        let Some(product) = self.resolve(self.classification.primary_entity()) else {
            return HandlerOutcome::reply(replies::ASK_PRODUCT_FOR_ALTERNATIVES);
        };
        let alternatives = self.matcher().find_alternatives(&product, &[]);

        HandlerOutcome::reply(replies::alternatives(&product, &alternatives))
            .focus(product)
            .products(alternatives)
            .topic(Topic::Product, Some(AwaitingKind::MoreInfo))
    }

    fn attribute_question(&self) -> HandlerOutcome {
        let Some(product) = self.resolve(self.classification.primary_entity()) else {
            return HandlerOutcome::reply(replies::ASK_PRODUCT_FOR_DETAILS);
        };
        let topic = self.classification.attribute.or_else(|| detect_attribute(&normalize(self.message)));
        if topic == Some(AttributeTopic::Stock) {
            return self.stock_of(product);
        }

        HandlerOutcome::reply(replies::attribute_answer(&product, topic))
            .focus(product)
            .topic(Topic::Product, None)
    }

    fn follow_up(&self) -> HandlerOutcome {
        match self.current_product() {
            Some(product) => HandlerOutcome::reply(replies::detailed_info(&product))
                .focus(product)
                .topic(Topic::Product, None),
            None => HandlerOutcome::reply(replies::ASK_PRODUCT_FOR_DETAILS),
        }
    }

    fn price_sorted(&self, cheapest_first: bool) -> HandlerOutcome {
        let normalized = normalize(self.message);
        let stripped = PRICE_SORT_WORDS.replace_all(&normalized, " ");
        let query = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

        let mut candidates: Vec<ProductRecord> = if query.is_empty() {
            self.catalog.products().to_vec()
        } else {
            let found: Vec<ProductRecord> = self
                .matcher()
                .find(&query, SEARCH_LIMIT)
                .into_iter()
                .map(|found| found.product)
                .collect();
            match (found.is_empty(), self.catalog.category_named(&query)) {
                (true, Some(category)) => self.catalog.products_in_category(category.id).cloned().collect(),
                _ => found,
            }
        };
        candidates.retain(ProductRecord::in_stock);
        candidates.sort_by(|left, right| {
            let order = left.price.cmp(&right.price);
            if cheapest_first { order } else { order.reverse() }
        });
        candidates.truncate(PRICE_SORT_LIMIT);

        let label = if query.is_empty() { "products".to_owned() } else { query };
        HandlerOutcome::reply(replies::price_sorted(&label, &candidates, cheapest_first))
            .products(candidates)
            .topic(Topic::Product, Some(AwaitingKind::MoreInfo))
    }

    fn category_list(&self) -> HandlerOutcome {
        let label = self.classification.primary_entity().unwrap_or(self.message).to_owned();
        let products: Vec<ProductRecord> = match self.catalog.category_named(&label) {
            Some(category) => self.catalog.products_in_category(category.id).cloned().collect(),
            None => self
                .matcher()
                .find(&label, SEARCH_LIMIT)
                .into_iter()
                .map(|found| found.product)
                .collect(),
        };

        HandlerOutcome::reply(replies::category_list(&label, &products))
            .products(products)
            .topic(Topic::Product, Some(AwaitingKind::MoreInfo))
    }

    fn calculator(&self) -> HandlerOutcome {
        let current = self.current_product();
        let turn = CalculatorDialogue::new(&self.config.calculator)
            .with_audit(self.audit, self.audit_context)
            .advance(&self.memory.calculator, self.message, current.as_ref());

        if let Some(fault) = &turn.fault {
            warn!(
                event_name = "calculator.computation.failed",
                correlation_id = %self.audit_context.correlation_id,
                error = %fault,
                "calculator turn ended in an apology"
            );
        }
        if let Some(report) = &turn.report {
            info!(
                event_name = "calculator.session.completed",
                correlation_id = %self.audit_context.correlation_id,
                material = report.material.as_str(),
                measure = report.measure,
                quantity = report.rounded_quantity,
                recalculation = turn.is_recalculation(),
                "calculation completed"
            );
        }

        let awaiting = (turn.session.state == CalculatorState::AwaitingDimensions)
            .then_some(AwaitingKind::Dimensions);
        let primary = turn
            .report
            .as_ref()
            .and_then(|report| report.product_id)
            .and_then(|id| self.catalog.product(id).cloned());

        let mut outcome = HandlerOutcome::reply(turn.reply);
        outcome.calculation = turn.report;
        outcome.mutations.push(MemoryMutation::ReplaceCalculator(turn.session));
        if let Some(product) = primary {
            outcome.products.push(product.clone());
            outcome.primary = Some(product);
        }
        outcome.topic(Topic::Calculator, awaiting)
    }

    fn unknown(&self) -> HandlerOutcome {
        HandlerOutcome { suggestions: self.category_hints(), ..HandlerOutcome::default() }
    }
}

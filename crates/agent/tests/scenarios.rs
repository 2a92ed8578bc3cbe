use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;

use construkt_agent::{CatalogCache, ConversationStateStore, DialogueOrchestrator};
use construkt_core::config::AppConfig;
use construkt_core::domain::calculator::MaterialType;
use construkt_core::domain::intent::Intent;
use construkt_core::domain::product::{CategoryId, CategoryRecord, ProductId, ProductRecord};
use construkt_core::flows::CalculatorState;
use construkt_db::repositories::{
    InMemoryCatalogRepository, InMemoryConversationRepository, SqlCatalogRepository,
};
use construkt_db::{connect_with_settings, migrations, DemoCatalogSeed};

fn orchestrator_over(catalog: CatalogCache, config: AppConfig) -> DialogueOrchestrator {
    let state = ConversationStateStore::new(
        Arc::new(InMemoryConversationRepository::default()),
        &config.conversation,
    );
    DialogueOrchestrator::new(Arc::new(config), Arc::new(catalog), Arc::new(state))
}

async fn seeded_orchestrator() -> Result<DialogueOrchestrator, String> {
    let config = AppConfig::default();
    let pool = connect_with_settings("sqlite::memory:", 1, 5)
        .await
        .map_err(|error| format!("connect failed: {error}"))?;
    migrations::run_pending(&pool).await.map_err(|error| format!("migrate failed: {error}"))?;
    DemoCatalogSeed::load(&pool).await.map_err(|error| format!("seed failed: {error}"))?;

    let catalog = CatalogCache::new(Arc::new(SqlCatalogRepository::new(pool)), &config.catalog);
    Ok(orchestrator_over(catalog, config))
}

fn single_cement_catalog(config: &AppConfig) -> CatalogCache {
    let cement = ProductRecord {
        id: ProductId(1),
        name: "Portland Cement".to_owned(),
        description: "General purpose grey cement, 50kg bag".to_owned(),
        price: Decimal::new(1250, 2),
        unit: "bag".to_owned(),
        stock_quantity: 120,
        category_id: CategoryId(1),
        category_name: "Concrete & Cement".to_owned(),
        supplier_id: None,
        supplier_name: None,
        attributes: BTreeMap::new(),
    };
    let category = CategoryRecord {
        id: CategoryId(1),
        name: "Concrete & Cement".to_owned(),
        description: "Cement, concrete mixes and mortar".to_owned(),
        product_count: Some(1),
    };
    CatalogCache::new(
        Arc::new(InMemoryCatalogRepository::new(vec![cement], vec![category])),
        &config.catalog,
    )
}

#[tokio::test]
async fn product_search_sets_the_current_product() -> Result<(), String> {
    let config = AppConfig::default();
    let orchestrator = orchestrator_over(single_cement_catalog(&config), config);

    let result = orchestrator.handle_message("scenario-a", "I need cement").await;

    assert_eq!(result.intent, Intent::ProductSearch);
    let response = result.response.ok_or("search should answer directly")?;
    assert!(response.contains("Portland Cement"), "unexpected reply: {response}");
    assert!(response.contains("$12.50"), "unexpected reply: {response}");

    let memory = orchestrator.state().get("scenario-a").await;
    assert_eq!(memory.current_product.map(|product| product.id), Some(ProductId(1)));
    Ok(())
}

#[tokio::test]
async fn calculator_collects_dimensions_then_recalculates_on_edit() -> Result<(), String> {
    let orchestrator = seeded_orchestrator().await?;
    let user = "scenario-b";

    let opening = orchestrator.handle_message(user, "calculate area").await;
    assert_eq!(opening.intent, Intent::CalculatorInquiry);
    assert!(opening.calculation.is_none());
    let memory = orchestrator.state().get(user).await;
    assert_eq!(memory.calculator.state, CalculatorState::AwaitingDimensions);

    let computed = orchestrator.handle_message(user, "4m long and 3m wide").await;
    assert_eq!(computed.intent, Intent::CalculatorInquiry);
    let report = computed.calculation.ok_or("dimensions should complete the calculation")?;
    assert_eq!(report.measure, 12.0);
    assert_eq!(report.rounded_quantity, 1.0);
    let memory = orchestrator.state().get(user).await;
    assert_eq!(memory.calculator.state, CalculatorState::Complete);

    let edited = orchestrator.handle_message(user, "what if the width is 5").await;
    assert_eq!(edited.intent, Intent::CalculatorInquiry);
    let report = edited.calculation.ok_or("edit should recalculate")?;
    assert_eq!(report.measure, 20.0);
    let response = edited.response.ok_or("recalculation should answer")?;
    assert!(response.starts_with("With the updated dimensions"), "unexpected reply: {response}");
    Ok(())
}

#[tokio::test]
async fn unrelated_categories_are_not_compared() -> Result<(), String> {
    let orchestrator = seeded_orchestrator().await?;

    let result =
        orchestrator.handle_message("scenario-d", "compare pvc pipe with red clay brick").await;

    assert_eq!(result.intent, Intent::Comparison);
    let response = result.response.ok_or("comparison should answer")?;
    assert!(response.contains("can't meaningfully compare"), "unexpected reply: {response}");
    let memory = orchestrator.state().get("scenario-d").await;
    assert!(memory.comparison_products.is_empty());
    Ok(())
}

#[tokio::test]
async fn out_of_stock_products_come_with_in_stock_alternatives() -> Result<(), String> {
    let orchestrator = seeded_orchestrator().await?;

    let result =
        orchestrator.handle_message("scenario-e", "is vinyl plank flooring in stock").await;

    assert_eq!(result.intent, Intent::StockCheck);
    let primary = result.primary_product.ok_or("stock check should name the product")?;
    assert_eq!(primary.id, ProductId(18));
    assert!(!primary.in_stock());
    assert!(!result.products.is_empty());
    assert!(result.products.len() <= 3);
    assert!(result.products.iter().all(|product| product.in_stock()));
    assert!(result.products.iter().all(|product| product.id != ProductId(18)));
    Ok(())
}

#[tokio::test]
async fn stock_follow_up_on_the_current_product_offers_alternatives() -> Result<(), String> {
    let orchestrator = seeded_orchestrator().await?;
    let user = "scenario-e-context";

    orchestrator.handle_message(user, "show me vinyl plank flooring").await;
    let result = orchestrator.handle_message(user, "is it in stock").await;

    let primary = result.primary_product.ok_or("stock follow-up should name the product")?;
    assert_eq!(primary.id, ProductId(18));
    let response = result.response.ok_or("stock follow-up should answer")?;
    assert!(response.contains("currently out of stock"), "unexpected reply: {response}");
    assert!(response.contains("Oak Laminate Flooring"), "unexpected reply: {response}");
    assert!(!result.products.is_empty());
    assert!(result.products.len() <= 3);
    assert!(result.products.iter().all(|product| product.in_stock()));
    Ok(())
}

#[tokio::test]
async fn follow_up_price_uses_the_product_in_focus() -> Result<(), String> {
    let orchestrator = seeded_orchestrator().await?;
    let user = "scenario-focus";

    orchestrator.handle_message(user, "do you have portland cement").await;
    let result = orchestrator.handle_message(user, "how much is it").await;

    assert_eq!(result.intent, Intent::HowMuch);
    let response = result.response.ok_or("price follow-up should answer")?;
    assert!(response.starts_with("Price for Portland Cement"), "unexpected reply: {response}");
    assert!(response.contains("$12.50"), "unexpected reply: {response}");
    Ok(())
}

#[tokio::test]
async fn concurrent_users_keep_separate_memories() -> Result<(), String> {
    let orchestrator = Arc::new(seeded_orchestrator().await?);

    let mut tasks = Vec::new();
    for index in 0..8 {
        let orchestrator = Arc::clone(&orchestrator);
        tasks.push(tokio::spawn(async move {
            let user = format!("crowd-{index}");
            let query = if index % 2 == 0 { "show me portland cement" } else { "show me copper pipe" };
            orchestrator.handle_message(&user, query).await;
            orchestrator.handle_message(&user, "how much is it").await;
            user
        }));
    }

    for task in tasks {
        let user = task.await.map_err(|error| format!("turn task panicked: {error}"))?;
        let memory = orchestrator.state().get(&user).await;
        assert_eq!(memory.messages.len(), 4, "{user} should have two full turns");
        let index: usize = user.trim_start_matches("crowd-").parse().map_err(|_| "bad user id")?;
        let expected = if index % 2 == 0 { ProductId(1) } else { ProductId(14) };
        assert_eq!(memory.current_product.map(|product| product.id), Some(expected));
    }
    Ok(())
}

#[tokio::test]
async fn dimensions_in_the_first_message_go_straight_to_the_calculator() -> Result<(), String> {
    let orchestrator = seeded_orchestrator().await?;

    let wall =
        orchestrator.handle_message("dims-wall", "I need to paint a wall 5m long and 3m high").await;
    assert_eq!(wall.intent, Intent::CalculatorInquiry);
    let report = wall.calculation.ok_or("wall dimensions should be enough to compute")?;
    assert_eq!(report.material, MaterialType::Area);
    assert_eq!(report.measure, 15.0);
    let memory = orchestrator.state().get("dims-wall").await;
    assert_eq!(memory.calculator.state, CalculatorState::Complete);

    let slab = orchestrator.handle_message("dims-slab", "concrete slab 4m x 3m x 0.15m deep").await;
    assert_eq!(slab.intent, Intent::CalculatorInquiry);
    let report = slab.calculation.ok_or("slab dimensions should be enough to compute")?;
    assert_eq!(report.material, MaterialType::Volume);
    assert!((report.measure - 1.8).abs() < 1e-9, "unexpected volume {}", report.measure);

    let bare = orchestrator.handle_message("dims-bare", "4m long and 3m wide").await;
    assert_eq!(bare.intent, Intent::CalculatorInquiry);
    let report = bare.calculation.ok_or("length and width imply an area")?;
    assert_eq!(report.measure, 12.0);
    Ok(())
}

#[tokio::test]
async fn zero_wastage_edit_recalculates_without_allowance() -> Result<(), String> {
    let orchestrator = seeded_orchestrator().await?;
    let user = "scenario-wastage";

    orchestrator.handle_message(user, "calculate area").await;
    let first = orchestrator.handle_message(user, "4m long and 3m wide").await;
    let first = first.calculation.ok_or("dimensions should complete the calculation")?;
    assert!(first.required_quantity > first.base_quantity);

    let edited = orchestrator.handle_message(user, "change the wastage to 0").await;
    assert_eq!(edited.intent, Intent::CalculatorInquiry);
    let report = edited.calculation.ok_or("wastage edit should recalculate")?;
    assert_eq!(report.wastage_pct, 0.0);
    assert_eq!(report.required_quantity, report.base_quantity);
    assert_eq!(report.measure, 12.0);
    let response = edited.response.ok_or("recalculation should answer")?;
    assert!(response.starts_with("With the updated dimensions"), "unexpected reply: {response}");
    Ok(())
}

#[tokio::test]
async fn one_users_focus_does_not_leak_to_another() -> Result<(), String> {
    let orchestrator = seeded_orchestrator().await?;

    orchestrator.handle_message("first-user", "do you have portland cement").await;
    let other = orchestrator.handle_message("second-user", "how much is it").await;

    assert!(other.primary_product.is_none());
    let response = other.response.ok_or("price question should answer")?;
    assert!(!response.contains("Portland Cement"), "unexpected reply: {response}");
    let second = orchestrator.state().get("second-user").await;
    assert!(second.current_product.is_none());
    assert!(second.mentioned_products.is_empty());
    let first = orchestrator.state().get("first-user").await;
    assert_eq!(first.current_product.map(|product| product.id), Some(ProductId(1)));
    assert_eq!(first.messages.len(), 2);
    Ok(())
}

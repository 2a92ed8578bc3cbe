//! Customer-facing reply text for every handled intent.
//!
//! Everything here is pure formatting over catalog records and core reports;
//! choosing what to show happens in [`crate::conversation`].

use rust_decimal::Decimal;

use construkt_core::domain::intent::AttributeTopic;
use construkt_core::domain::product::{CategoryRecord, ProductRecord};
use construkt_core::recommend::{ComparisonReport, ComparisonVerdict};

pub const GREETING: &str = "Hello! Welcome to Construkt. I can help you find construction materials, \
compare products, calculate prices, and check stock availability. What are you looking for today?";

pub const HELP: &str = "I can help you with:\n\n\
- Finding products (e.g., \"show me nails\", \"I need cement\")\n\
- Checking prices (e.g., \"price of portland cement\", \"how much for 5 bags of cement\")\n\
- Comparing products (e.g., \"compare galvanized nails with stainless steel nails\")\n\
- Checking stock (e.g., \"is vinyl plank flooring in stock?\")\n\
- Recommendations and alternatives (e.g., \"recommend something similar\")\n\
- Calculating materials (e.g., \"calculate tiles for a floor 4m by 3m\")\n\
- Store hours, locations and delivery\n\n\
What are you looking for?";

pub const CLEARED: &str =
    "Okay, I've cleared our conversation. What are you looking for?";

pub const STORE_INFO_OVERVIEW: &str = "I can tell you about our store hours, locations, \
delivery zones, contact details and payment methods. What would you like to know?";

pub const NEED_TWO_PRODUCTS: &str = "Please specify two products to compare. For example: \
'compare galvanized nails with stainless steel nails'";

pub const ASK_PRODUCT_FOR_PRICE: &str = "Which product would you like to know the price for?";
pub const ASK_PRODUCT_FOR_CALCULATION: &str =
    "Which product would you like to calculate the price for?";
pub const ASK_PRODUCT_FOR_STOCK: &str = "Which product would you like to check stock for?";
pub const ASK_PRODUCT_FOR_DETAILS: &str = "Which product would you like to know about?";
pub const ASK_PRODUCT_FOR_ALTERNATIVES: &str =
    "Which product would you like alternatives for? Tell me what you're looking for.";
pub const ASK_RECOMMENDATION_TOPIC: &str =
    "I'd be happy to recommend products! What type of materials are you looking for?";
pub const NOTHING_TO_SORT: &str = "Sorry, I couldn't find products to sort by price.";

const LIST_LIMIT: usize = 10;
const BULK_TIERS: &[u32] = &[1, 5, 10, 25];

fn money(amount: Decimal) -> String {
    format!("${amount:.2}")
}

fn stock_label(product: &ProductRecord) -> String {
    if product.in_stock() {
        format!("{} in stock", product.stock_quantity)
    } else {
        "Out of stock".to_owned()
    }
}

fn specifications(product: &ProductRecord) -> Option<String> {
    if product.attributes.is_empty() {
        return None;
    }
    Some(
        product
            .attributes
            .iter()
            .map(|(key, value)| format!("{}: {}", key.replace('_', " "), value.as_text()))
            .collect::<Vec<_>>()
            .join(", "),
    )
}

pub fn categories(categories: &[CategoryRecord]) -> String {
    if categories.is_empty() {
        return "Sorry, categories list is not available right now. Try searching for a product by name."
            .to_owned();
    }
    let listed = categories
        .iter()
        .enumerate()
        .map(|(index, category)| match category.product_count {
            Some(count) => format!("{}. {} ({count} products)", index + 1, category.name),
            None => format!("{}. {}", index + 1, category.name),
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("Our product categories:\n\n{listed}\n\nType a category or product name to search.")
}

/// Single product card. `out_of_stock_note` is appended for products that
/// have run out.
pub fn product_found(product: &ProductRecord, out_of_stock_note: Option<&str>) -> String {
    let availability = if product.in_stock() {
        format!("{} in stock", product.stock_quantity)
    } else {
        "OUT OF STOCK".to_owned()
    };
    let mut reply = format!(
        "Found: {}!\n\nPrice: {} ({availability})\nCategory: {}",
        product.name,
        product.price_label(),
        product.category_name
    );
    if !product.description.is_empty() {
        reply.push_str(&format!("\n\n{}", product.description));
    }
    if let Some(specs) = specifications(product) {
        reply.push_str(&format!("\n\nSpecifications: {specs}"));
    }
    if let Some(note) = out_of_stock_note {
        reply.push_str(&format!("\n\n{note}"));
    }
    reply.push_str("\n\nWould you like to know the price for a quantity or see alternatives?");
    reply
}

pub fn product_list(query: &str, products: &[ProductRecord]) -> String {
    let mut reply = format!("Found {} products for '{query}':\n\n", products.len());
    for (index, product) in products.iter().take(LIST_LIMIT).enumerate() {
        let availability = if product.in_stock() {
            format!("({} in stock)", product.stock_quantity)
        } else {
            "(out of stock)".to_owned()
        };
        reply.push_str(&format!(
            "{}. {}\n   {} {availability}\n",
            index + 1,
            product.name,
            product.price_label()
        ));
    }
    if products.len() > LIST_LIMIT {
        reply.push_str(&format!("\n...and {} more products.\n", products.len() - LIST_LIMIT));
    }
    reply.push_str("\nType a number or product name for details.");
    reply
}

/// Reply for a query naming a size that one product carries exactly.
pub fn size_match(query: &str, exact: &ProductRecord, others: &[ProductRecord]) -> String {
    let mut reply = format!(
        "Found exact match: {}\n\nPrice: {}\nIn stock: {}\n",
        exact.name,
        exact.price_label(),
        exact.stock_quantity
    );
    if !others.is_empty() {
        reply.push_str(&format!("\nOther {query} options:\n"));
        for product in others.iter().take(4) {
            reply.push_str(&format!("- {} ({})\n", product.name, product.price_label()));
        }
    }
    reply.trim_end().to_owned()
}

pub fn no_match(query: &str, categories: &[CategoryRecord], limit: usize) -> String {
    let mut reply = format!("Sorry, I couldn't find any products matching '{query}'.");
    if !categories.is_empty() {
        reply.push_str("\n\nBrowse our product categories:\n\n");
        let listed = categories
            .iter()
            .take(limit)
            .map(|category| format!("- {}", category.name))
            .collect::<Vec<_>>()
            .join("\n");
        reply.push_str(&listed);
        reply.push_str("\n\nType a category name to see products.");
    }
    reply.push_str("\n\nOr type 'help' for available commands.");
    reply
}

pub fn price_calculation(
    product: &ProductRecord,
    quantity: u32,
    alternatives: &[ProductRecord],
) -> String {
    let total = product.price * Decimal::from(quantity);
    let mut reply = format!(
        "Price calculation for {}:\n\nUnit price: {}/{}\nQuantity: {quantity}\nTotal: {}\n\n",
        product.name,
        money(product.price),
        product.unit,
        money(total)
    );
    if product.stock_quantity >= i64::from(quantity) {
        reply.push_str(&format!("Available in stock: {} {}(s)", product.stock_quantity, product.unit));
    } else {
        reply.push_str(&format!(
            "Note: Only {} in stock (you requested {quantity})",
            product.stock_quantity
        ));
        if !alternatives.is_empty() {
            reply.push_str("\n\nYou could also consider:");
            for alternative in alternatives.iter().take(2) {
                reply.push_str(&format!(
                    "\n- {}: {} ({} in stock)",
                    alternative.name,
                    alternative.price_label(),
                    alternative.stock_quantity
                ));
            }
        }
    }
    reply
}

pub fn bulk_pricing(product: &ProductRecord) -> String {
    let mut reply = format!(
        "Price for {}:\n\nUnit price: {} per {}\nAvailable: {} {}(s) in stock\n\nQuantity pricing:\n",
        product.name,
        money(product.price),
        product.unit,
        product.stock_quantity,
        product.unit
    );
    for quantity in BULK_TIERS {
        reply.push_str(&format!(
            "  {quantity} {}(s) = {}\n",
            product.unit,
            money(product.price * Decimal::from(*quantity))
        ));
    }
    reply.trim_end().to_owned()
}

pub fn comparison(report: &ComparisonReport) -> String {
    let (first, second) = (&report.first, &report.second);
    let mut reply = format!("Comparison: {} vs {}\n{}\n\n", first.name, second.name, "=".repeat(50));

    reply.push_str("PRICE:\n");
    reply.push_str(&format!("  {}: {}\n", first.name, first.price_label()));
    reply.push_str(&format!("  {}: {}\n", second.name, second.price_label()));
    if let Some(gap) = report.cheaper {
        if let Some(product) = report.product(gap.product_id) {
            reply.push_str(&format!("  -> {} is {} cheaper\n", product.name, money(gap.saving)));
        }
    }

    reply.push_str("\nAVAILABILITY:\n");
    for product in [first, second] {
        reply.push_str(&format!("  {}: {}\n", product.name, stock_label(product)));
    }

    if !report.specifications.is_empty() {
        reply.push_str("\nSPECIFICATIONS:\n");
        for row in &report.specifications {
            reply.push_str(&format!(
                "  {}: {} vs {}\n",
                row.key.replace('_', " "),
                row.first.as_deref().unwrap_or("N/A"),
                row.second.as_deref().unwrap_or("N/A")
            ));
        }
    }

    reply.push_str("\nRECOMMENDATION:\n");
    let verdict = match report.verdict {
        ComparisonVerdict::OnlyInStock(id) => report
            .product(id)
            .map(|product| format!("  -> Go with {} (other is out of stock)", product.name)),
        ComparisonVerdict::BetterValue(id) => {
            report.product(id).map(|product| format!("  -> {} offers better value", product.name))
        }
        ComparisonVerdict::Specifications => None,
    };
    reply.push_str(&verdict.unwrap_or_else(|| {
        "  -> Both are similar in price, choose based on specifications".to_owned()
    }));
    reply
}

pub fn comparison_rejected(reason: &str) -> String {
    format!(
        "I can't meaningfully compare these products. {reason}\n\n\
Try comparing similar products, like different types of nails or different cement brands."
    )
}

pub fn comparison_missing(query: &str) -> String {
    format!("Could not find product: {query}")
}

pub fn stock(product: &ProductRecord, alternatives: &[ProductRecord]) -> String {
    if product.in_stock() {
        return format!(
            "Yes! {} is in stock.\n\nAvailable: {} {}(s)\nPrice: {}",
            product.name,
            product.stock_quantity,
            product.unit,
            product.price_label()
        );
    }

    let mut reply = format!("Sorry, {} is currently out of stock.", product.name);
    if alternatives.is_empty() {
        reply.push_str("\n\nThere are no similar products in stock right now.");
    } else {
        reply.push_str("\n\nHere are similar products that are available:\n");
        for alternative in alternatives {
            reply.push_str(&format!(
                "\n- {}: {} ({} in stock)",
                alternative.name,
                alternative.price_label(),
                alternative.stock_quantity
            ));
        }
    }
    reply
}

pub fn recommendations(products: &[ProductRecord]) -> String {
    if products.is_empty() {
        return ASK_RECOMMENDATION_TOPIC.to_owned();
    }
    let mut reply = String::from("Here are my recommendations:\n\n");
    for (index, product) in products.iter().enumerate() {
        reply.push_str(&format!(
            "{}. {}\n   {} - {}\n",
            index + 1,
            product.name,
            product.price_label(),
            stock_label(product)
        ));
    }
    reply.push_str("\nWould you like more details on any of these?");
    reply
}

pub fn alternatives(product: &ProductRecord, alternatives: &[ProductRecord]) -> String {
    if alternatives.is_empty() {
        return format!(
            "Sorry, I couldn't find alternatives for {} in the same category.",
            product.name
        );
    }
    let mut reply = format!("Alternatives to {} ({}):\n\n", product.name, product.category_name);
    for (index, alternative) in alternatives.iter().enumerate() {
        reply.push_str(&format!(
            "{}. {}\n   {} - {}\n",
            index + 1,
            alternative.name,
            alternative.price_label(),
            stock_label(alternative)
        ));
        if let Some(specs) = specifications(alternative) {
            reply.push_str(&format!("   ({specs})\n"));
        }
    }
    reply.push_str("\nWould you like more details on any of these?");
    reply
}

pub fn price_sorted(label: &str, products: &[ProductRecord], cheapest_first: bool) -> String {
    if products.is_empty() {
        return NOTHING_TO_SORT.to_owned();
    }
    let heading = if cheapest_first { "Cheapest" } else { "Most expensive" };
    let listed = products
        .iter()
        .enumerate()
        .map(|(index, product)| {
            format!(
                "{}. {}\n   {} - {} in stock",
                index + 1,
                product.name,
                product.price_label(),
                product.stock_quantity
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("{heading} {label}:\n\n{listed}")
}

pub fn category_list(label: &str, products: &[ProductRecord]) -> String {
    if products.is_empty() {
        return format!("I couldn't find any {label} products.");
    }
    let mut reply = format!("We have {} types of {label}:\n\n", products.len());
    for (index, product) in products.iter().enumerate() {
        let availability = if product.in_stock() { "In stock" } else { "Out of stock" };
        reply.push_str(&format!(
            "{}. {} - {} ({availability})\n",
            index + 1,
            product.name,
            product.price_label()
        ));
    }
    reply.push_str("\nWould you like details on any of these?");
    reply
}

fn first_attribute(product: &ProductRecord, topic: AttributeTopic) -> Option<String> {
    topic
        .attribute_keys()
        .iter()
        .find_map(|key| product.attribute(key).map(|value| value.as_text()))
}

/// Answer to a question about one attribute of `product`. Without a
/// recognised topic the full details are returned.
pub fn attribute_answer(product: &ProductRecord, topic: Option<AttributeTopic>) -> String {
    let name = &product.name;
    let Some(topic) = topic else {
        return detailed_info(product);
    };
    let value = first_attribute(product, topic);

    match (topic, value) {
        (AttributeTopic::Price, _) => {
            format!("{name} costs {} per {}.", money(product.price), product.unit)
        }
        (AttributeTopic::Stock, _) if product.in_stock() => format!(
            "We currently have {} {}s of {name} in stock.",
            product.stock_quantity, product.unit
        ),
        (AttributeTopic::Stock, _) => format!("{name} is currently out of stock."),
        (AttributeTopic::Supplier, _) => match &product.supplier_name {
            Some(supplier) => format!("{name} is supplied by {supplier}."),
            None => format!("I don't have supplier information for {name}."),
        },
        (AttributeTopic::Size, Some(size)) => format!("The dimensions of {name} are: {size}."),
        (AttributeTopic::Size, None) => format!(
            "I don't have specific size information for {name}. Please contact the supplier for details."
        ),
        (AttributeTopic::Quantity, Some(count)) => {
            format!("{name} comes with {count} units per package.")
        }
        (AttributeTopic::Quantity, None) => format!(
            "{name} is sold by the {}. For bulk packaging information, please contact the supplier.",
            product.unit
        ),
        (AttributeTopic::Material, Some(material)) => format!("{name} is made of {material}."),
        (AttributeTopic::Material, None) if !product.description.is_empty() => {
            format!("{name}: {}", product.description)
        }
        (AttributeTopic::Material, None) => {
            format!("I don't have material information for {name}.")
        }
        (AttributeTopic::Weight, Some(weight)) => format!("{name} weighs {weight}."),
        (AttributeTopic::Weight, None) => format!(
            "I don't have weight information for {name}. Please check the product specifications."
        ),
        (AttributeTopic::Color, Some(color)) => format!("{name} is available in {color}."),
        (AttributeTopic::Color, None) => format!("I don't have color information for {name}."),
        (AttributeTopic::Coverage, Some(coverage)) => {
            format!("One {} of {name} covers {coverage}.", product.unit)
        }
        (AttributeTopic::Coverage, None) => format!(
            "I don't have coverage information for {name}. The calculator can estimate quantities from your dimensions."
        ),
    }
}

pub fn detailed_info(product: &ProductRecord) -> String {
    let mut reply = format!(
        "Here's detailed information about {}:\n\n* Price: {} per {}\n* Category: {}\n",
        product.name,
        money(product.price),
        product.unit,
        product.category_name
    );
    if let Some(supplier) = &product.supplier_name {
        reply.push_str(&format!("* Supplier: {supplier}\n"));
    }
    reply.push_str(&format!("* In stock: {} units\n", product.stock_quantity));
    if !product.description.is_empty() {
        reply.push_str(&format!("* Description: {}\n", product.description));
    }
    if let Some(specs) = specifications(product) {
        reply.push_str(&format!("* Specifications: {specs}\n"));
    }
    reply.push_str(
        "\nWould you like to calculate how much you need for your project, or ask about other products?",
    );
    reply
}

/// Static reply for messages nothing understood.
pub fn unknown(category_hints: &[String]) -> String {
    if category_hints.is_empty() {
        return "I'm not sure what you're looking for. Try searching for a product by name, or type 'help'."
            .to_owned();
    }
    let listed =
        category_hints.iter().map(|name| format!("- {name}")).collect::<Vec<_>>().join("\n");
    format!("I'm not sure what you're looking for. Browse our categories:\n\n{listed}")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rust_decimal::Decimal;

    use construkt_core::domain::intent::AttributeTopic;
    use construkt_core::domain::product::{
        AttributeValue, CategoryId, ProductId, ProductRecord, SupplierId,
    };
    use construkt_core::recommend::compare;

    use super::{attribute_answer, bulk_pricing, comparison, price_calculation, product_found, stock};

    fn nails(id: i64, name: &str, cents: i64, stock: i64, material: &str) -> ProductRecord {
        ProductRecord {
            id: ProductId(id),
            name: name.to_owned(),
            description: "Box of nails".to_owned(),
            price: Decimal::new(cents, 2),
            unit: "box".to_owned(),
            stock_quantity: stock,
            category_id: CategoryId(2),
            category_name: "Fasteners".to_owned(),
            supplier_id: Some(SupplierId(1)),
            supplier_name: Some("BuildRight Supply".to_owned()),
            attributes: BTreeMap::from([
                ("material".to_owned(), AttributeValue::Text(material.to_owned())),
                ("quantity_per_pack".to_owned(), AttributeValue::Number(100.0)),
            ]),
        }
    }

    #[test]
    fn product_card_shows_price_stock_and_specifications() {
        let reply = product_found(&nails(1, "Common Nails", 899, 40, "steel"), None);

        assert!(reply.starts_with("Found: Common Nails!"));
        assert!(reply.contains("Price: $8.99/box (40 in stock)"));
        assert!(reply.contains("Specifications: material: steel, quantity per pack: 100"));
    }

    #[test]
    fn quantity_price_multiplies_and_flags_short_stock() {
        let product = nails(1, "Common Nails", 899, 3, "steel");
        let reply = price_calculation(&product, 5, &[nails(2, "Wire Nails", 750, 50, "steel")]);

        assert!(reply.contains("Total: $44.95"));
        assert!(reply.contains("Note: Only 3 in stock (you requested 5)"));
        assert!(reply.contains("- Wire Nails: $7.50/box (50 in stock)"));
    }

    #[test]
    fn bulk_pricing_lists_every_tier() {
        let reply = bulk_pricing(&nails(1, "Common Nails", 1000, 40, "steel"));

        for line in ["1 box(s) = $10.00", "5 box(s) = $50.00", "10 box(s) = $100.00", "25 box(s) = $250.00"] {
            assert!(reply.contains(line), "missing `{line}` in {reply}");
        }
    }

    #[test]
    fn comparison_has_every_section_and_a_verdict() {
        let galvanized = nails(1, "Galvanized Nails", 1099, 25, "galvanized steel");
        let stainless = nails(2, "Stainless Nails", 1549, 18, "stainless steel");
        let report = compare(&galvanized, &stainless).expect("same category compares");

        let reply = comparison(&report);

        for section in ["PRICE:", "AVAILABILITY:", "SPECIFICATIONS:", "RECOMMENDATION:"] {
            assert!(reply.contains(section), "missing {section}");
        }
        assert!(reply.contains("-> Galvanized Nails is $4.50 cheaper"));
        assert!(reply.contains("-> Galvanized Nails offers better value"));
    }

    #[test]
    fn out_of_stock_reply_lists_alternatives() {
        let reply = stock(
            &nails(1, "Roofing Nails", 1099, 0, "steel"),
            &[nails(2, "Wire Nails", 750, 50, "steel")],
        );

        assert!(reply.starts_with("Sorry, Roofing Nails is currently out of stock."));
        assert!(reply.contains("- Wire Nails: $7.50/box (50 in stock)"));
    }

    #[test]
    fn attribute_answers_use_the_first_known_key() {
        let product = nails(1, "Common Nails", 899, 40, "steel");

        assert_eq!(
            attribute_answer(&product, Some(AttributeTopic::Material)),
            "Common Nails is made of steel."
        );
        assert_eq!(
            attribute_answer(&product, Some(AttributeTopic::Quantity)),
            "Common Nails comes with 100 units per package."
        );
        assert!(attribute_answer(&product, Some(AttributeTopic::Weight))
            .starts_with("I don't have weight information"));
        assert!(attribute_answer(&product, None).starts_with("Here's detailed information"));
    }
}

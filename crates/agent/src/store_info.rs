//! Store hours, locations, delivery, contacts and payment answers.

pub trait StoreInfoProvider: Send + Sync {
    /// Answer for a store question, or `None` when the message asks nothing
    /// this provider knows about.
    fn answer(&self, message: &str) -> Option<String>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StoreTopic {
    Hours,
    Location,
    Delivery,
    Contact,
    Payment,
}

const TOPIC_KEYWORDS: &[(StoreTopic, &[&str])] = &[
    (StoreTopic::Hours, &["hour", "time", "open", "close", "schedule"]),
    (StoreTopic::Location, &["address", "location", "where", "directions", "located"]),
    (StoreTopic::Delivery, &["delivery", "deliver", "shipping", "ship", "freight"]),
    (StoreTopic::Contact, &["contact", "phone", "call", "email", "reach"]),
    (StoreTopic::Payment, &["payment", "pay", "card", "cash", "credit", "debit"]),
];

pub struct Store {
    pub id: &'static str,
    pub city: &'static str,
    pub aliases: &'static [&'static str],
    pub address: &'static str,
    pub phone: &'static str,
    pub email: &'static str,
    pub weekdays: (&'static str, &'static str),
    pub saturday: (&'static str, &'static str),
    pub sunday: Option<(&'static str, &'static str)>,
}

pub struct DeliveryZone {
    pub name: &'static str,
    pub min_order: u32,
    pub cost: u32,
    pub free_from: u32,
}

/// Fixed store directory compiled into the binary.
pub struct StaticStoreDirectory {
    pub stores: &'static [Store],
    pub zones: &'static [DeliveryZone],
    pub delivery_notes: &'static [&'static str],
    pub general_phone: &'static str,
    pub general_email: &'static str,
    pub support_email: &'static str,
    pub payment_methods: &'static [&'static str],
}

const STORES: &[Store] = &[
    Store {
        id: "new-york",
        city: "New York",
        aliases: &["new york", "nyc", "manhattan"],
        address: "245 Water Street, New York, NY 10038",
        phone: "+1 212 555 0142",
        email: "newyork@construkt.example",
        weekdays: ("07:00", "19:00"),
        saturday: ("08:00", "17:00"),
        sunday: Some(("10:00", "16:00")),
    },
    Store {
        id: "los-angeles",
        city: "Los Angeles",
        aliases: &["los angeles", "california"],
        address: "1800 Industrial Way, Los Angeles, CA 90021",
        phone: "+1 323 555 0187",
        email: "losangeles@construkt.example",
        weekdays: ("07:00", "18:00"),
        saturday: ("08:00", "16:00"),
        sunday: None,
    },
    Store {
        id: "chicago",
        city: "Chicago",
        aliases: &["chicago", "illinois"],
        address: "3100 South Halsted Street, Chicago, IL 60608",
        phone: "+1 312 555 0119",
        email: "chicago@construkt.example",
        weekdays: ("07:30", "18:30"),
        saturday: ("08:00", "15:00"),
        sunday: None,
    },
];

const ZONES: &[DeliveryZone] = &[
    DeliveryZone { name: "City", min_order: 50, cost: 15, free_from: 300 },
    DeliveryZone { name: "Suburbs", min_order: 100, cost: 30, free_from: 600 },
    DeliveryZone { name: "Regional", min_order: 250, cost: 75, free_from: 1500 },
];

impl Default for StaticStoreDirectory {
    fn default() -> Self {
        Self {
            stores: STORES,
            zones: ZONES,
            delivery_notes: &[
                "Orders placed before noon ship the next business day.",
                "Bulk materials (cement, bricks, lumber) are delivered by flatbed; someone must be on site.",
            ],
            general_phone: "+1 800 555 0100",
            general_email: "hello@construkt.example",
            support_email: "support@construkt.example",
            payment_methods: &[
                "Credit and debit cards",
                "Cash in store",
                "Bank transfer for trade accounts",
                "Net-30 invoicing for approved contractors",
            ],
        }
    }
}

impl StaticStoreDirectory {
    fn topics(message: &str) -> Vec<StoreTopic> {
        TOPIC_KEYWORDS
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|keyword| message.contains(keyword)))
            .map(|(topic, _)| *topic)
            .collect()
    }

    fn store_named(&self, message: &str) -> Option<&Store> {
        self.stores.iter().find(|store| store.aliases.iter().any(|alias| message.contains(alias)))
    }

    fn hours(store: &Store) -> String {
        let sunday = match store.sunday {
            Some((open, close)) => format!("Sunday: {open} - {close}"),
            None => "Sunday: Closed".to_owned(),
        };
        format!(
            "{} ({})\nMon-Fri: {} - {}\nSaturday: {} - {}\n{sunday}",
            store.city,
            store.address,
            store.weekdays.0,
            store.weekdays.1,
            store.saturday.0,
            store.saturday.1
        )
    }

    fn render(&self, topic: StoreTopic, store: Option<&Store>) -> String {
        match (topic, store) {
            (StoreTopic::Hours, Some(store)) => {
                format!("{} Store Working Hours:\n\n{}", store.city, Self::hours(store))
            }
            (StoreTopic::Hours, None) => {
                let listed = self.stores.iter().map(Self::hours).collect::<Vec<_>>().join("\n\n");
                format!("Our Store Working Hours:\n\n{listed}")
            }
            (StoreTopic::Location, Some(store)) => format!(
                "{} Store Location:\n\nAddress: {}\nPhone: {}\nEmail: {}",
                store.city, store.address, store.phone, store.email
            ),
            (StoreTopic::Location, None) => {
                let listed = self
                    .stores
                    .iter()
                    .map(|store| format!("{}: {}\nPhone: {}", store.city, store.address, store.phone))
                    .collect::<Vec<_>>()
                    .join("\n\n");
                format!("Our Store Locations:\n\n{listed}")
            }
            (StoreTopic::Delivery, _) => {
                let mut reply = String::from("Delivery Information:\n\n");
                for zone in self.zones {
                    reply.push_str(&format!(
                        "- {}: minimum order ${}, delivery ${}, free from ${}\n",
                        zone.name, zone.min_order, zone.cost, zone.free_from
                    ));
                }
                reply.push_str("\nNotes:\n");
                for note in self.delivery_notes.iter().take(2) {
                    reply.push_str(&format!("- {note}\n"));
                }
                reply.trim_end().to_owned()
            }
            (StoreTopic::Contact, _) => format!(
                "Contact Information:\n\nGeneral Phone: {} (free)\nEmail: {}\nSupport: {}",
                self.general_phone, self.general_email, self.support_email
            ),
            (StoreTopic::Payment, _) => {
                let listed = self
                    .payment_methods
                    .iter()
                    .map(|method| format!("- {method}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("Accepted Payment Methods:\n\n{listed}")
            }
        }
    }
}

impl StoreInfoProvider for StaticStoreDirectory {
    fn answer(&self, message: &str) -> Option<String> {
        let lowered = message.to_lowercase();
        let topics = Self::topics(&lowered);
        if topics.is_empty() {
            return None;
        }

        let store = self.store_named(&lowered);
        let sections: Vec<String> = topics.into_iter().map(|topic| self.render(topic, store)).collect();
        Some(sections.join("\n\n---\n\n"))
    }
}

// src/catalog.rs
use crate::models::{PriceChange, Stock, UserPreference};

struct CatalogEntry {
    symbol: &'static str,
    company_name: &'static str,
    current_price: f64,
    changes: &'static [f64],
}

const ENTERTAINMENT: &[CatalogEntry] = &[
    CatalogEntry {
        symbol: "NFLX",
        company_name: "Netflix, Inc.",
        current_price: 612.04,
        changes: &[1.2, -0.4, 2.1],
    },
    CatalogEntry {
        symbol: "DIS",
        company_name: "The Walt Disney Company",
        current_price: 101.35,
        changes: &[-0.8, 0.3, -1.1],
    },
    CatalogEntry {
        symbol: "SPOT",
        company_name: "Spotify Technology S.A.",
        current_price: 312.7,
        changes: &[3.4, -1.6, 0.9],
    },
    CatalogEntry {
        symbol: "WBD",
        company_name: "Warner Bros. Discovery, Inc.",
        current_price: 8.62,
        changes: &[-2.3, -0.7, 1.0],
    },
];

const GASTRONOMY: &[CatalogEntry] = &[
    CatalogEntry {
        symbol: "MCD",
        company_name: "McDonald's Corporation",
        current_price: 268.9,
        changes: &[0.4, 0.6, -0.2],
    },
    CatalogEntry {
        symbol: "SBUX",
        company_name: "Starbucks Corporation",
        current_price: 92.18,
        changes: &[-1.5, 0.2, -0.3],
    },
    CatalogEntry {
        symbol: "CMG",
        company_name: "Chipotle Mexican Grill, Inc.",
        current_price: 58.41,
        changes: &[2.2, -0.9, 1.3],
    },
    CatalogEntry {
        symbol: "YUM",
        company_name: "Yum! Brands, Inc.",
        current_price: 131.07,
        changes: &[0.1, -0.1, 0.5],
    },
];

const HEALTHCARE: &[CatalogEntry] = &[
    CatalogEntry {
        symbol: "JNJ",
        company_name: "Johnson & Johnson",
        current_price: 155.32,
        changes: &[0.3, -0.2, 0.6],
    },
    CatalogEntry {
        symbol: "PFE",
        company_name: "Pfizer Inc.",
        current_price: 28.77,
        changes: &[-1.9, 0.4, -0.6],
    },
    CatalogEntry {
        symbol: "UNH",
        company_name: "UnitedHealth Group Incorporated",
        current_price: 521.1,
        changes: &[1.1, 0.8, -2.4],
    },
    CatalogEntry {
        symbol: "MRNA",
        company_name: "Moderna, Inc.",
        current_price: 104.56,
        changes: &[4.2, -3.1, 1.7],
    },
];

const SPORTS: &[CatalogEntry] = &[
    CatalogEntry {
        symbol: "NKE",
        company_name: "NIKE, Inc.",
        current_price: 94.21,
        changes: &[2.5, -1.0],
    },
    CatalogEntry {
        symbol: "ADDYY",
        company_name: "adidas AG",
        current_price: 117.48,
        changes: &[-0.6, 1.4, 0.2],
    },
    CatalogEntry {
        symbol: "PUM",
        company_name: "PUMA SE",
        current_price: 44.9,
        changes: &[-2.1, -0.4, 0.3],
    },
    CatalogEntry {
        symbol: "MSGS",
        company_name: "Madison Square Garden Sports Corp.",
        current_price: 187.63,
        changes: &[0.7, 0.0, 0.9],
    },
];

const TECHNOLOGY: &[CatalogEntry] = &[
    CatalogEntry {
        symbol: "AAPL",
        company_name: "Apple Inc.",
        current_price: 189.84,
        changes: &[1.3, -0.5, 0.8],
    },
    CatalogEntry {
        symbol: "GOOGL",
        company_name: "Alphabet Inc.",
        current_price: 141.8,
        changes: &[0.9, 1.1, -0.4],
    },
    CatalogEntry {
        symbol: "MSFT",
        company_name: "Microsoft Corporation",
        current_price: 378.85,
        changes: &[0.5, 0.7, 0.2],
    },
    CatalogEntry {
        symbol: "ADBE",
        company_name: "Adobe Inc.",
        current_price: 512.33,
        changes: &[-1.2, -0.8, 0.6],
    },
    CatalogEntry {
        symbol: "ABNB",
        company_name: "Airbnb, Inc.",
        current_price: 137.02,
        changes: &[2.0, -2.6, 0.1],
    },
];

fn slice_for(preference: Option<UserPreference>) -> &'static [CatalogEntry] {
    match preference {
        Some(UserPreference::Entertainment) => ENTERTAINMENT,
        Some(UserPreference::Gastronomy) => GASTRONOMY,
        Some(UserPreference::Healthcare) => HEALTHCARE,
        Some(UserPreference::Sports) => SPORTS,
        Some(UserPreference::Technology) => TECHNOLOGY,
        // No preference on the profile: show technology.
        None => TECHNOLOGY,
    }
}

fn to_stock(entry: &CatalogEntry) -> Stock {
    Stock {
        symbol: entry.symbol.to_string(),
        company_name: entry.company_name.to_string(),
        current_price: entry.current_price,
        price_changes: entry
            .changes
            .iter()
            .map(|&change_percent| PriceChange { change_percent })
            .collect(),
    }
}

/// Recommended instruments for a preference category, in catalog order.
pub fn recommendations(preference: Option<UserPreference>) -> Vec<Stock> {
    slice_for(preference).iter().map(to_stock).collect()
}

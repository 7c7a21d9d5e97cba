// src/view.rs
use crate::models::{SavedStock, Stock};
use crate::purchase::PurchaseState;
use serde::Serialize;

pub const EMPTY_ASSETS_MESSAGE: &str = "You have no assets in place.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Trend {
    Positive,
    Negative,
}

impl Trend {
    pub fn from_total(total: f64) -> Self {
        if total > 0.0 {
            Trend::Positive
        } else {
            Trend::Negative
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Trend::Positive => "#008000",
            Trend::Negative => "#ff0000",
        }
    }
}

/// One instrument tile, ready to draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockCard {
    pub symbol: String,
    pub company_name: String,
    pub price: String,
    pub final_total: f64,
    pub change: String,
    pub trend: Trend,
    pub color: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
}

pub fn change_label(total: f64) -> String {
    // Avoid printing "-0.00" for a flat instrument.
    let total = if total == 0.0 { 0.0 } else { total };
    let sign = if total > 0.0 { "+" } else { "" };
    format!("({}{:.2}%)", sign, total)
}

impl StockCard {
    pub fn from_stock(stock: &Stock) -> Self {
        let final_total = stock.final_total();
        let trend = Trend::from_total(final_total);
        StockCard {
            symbol: stock.symbol.clone(),
            company_name: stock.company_name.clone(),
            price: format!("{:.2}", stock.current_price),
            final_total,
            change: change_label(final_total),
            trend,
            color: trend.color(),
            amount: None,
            doc_id: None,
        }
    }

    pub fn from_saved(saved: &SavedStock) -> Self {
        StockCard {
            amount: Some(saved.amount),
            doc_id: Some(saved.doc_id.clone()),
            ..StockCard::from_stock(&saved.stock)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AssetsSection {
    Empty { message: String },
    Assets { cards: Vec<StockCard> },
}

impl AssetsSection {
    pub fn from_assets(assets: &[SavedStock]) -> Self {
        if assets.is_empty() {
            AssetsSection::Empty {
                message: EMPTY_ASSETS_MESSAGE.to_string(),
            }
        } else {
            AssetsSection::Assets {
                cards: assets.iter().map(StockCard::from_saved).collect(),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardScreen {
    pub greeting: String,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub notification_badge: i64,
    pub recommendations: Vec<StockCard>,
    pub my_assets: AssetsSection,
    pub purchase: PurchaseState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "screen", rename_all = "camelCase")]
pub enum DashboardView {
    Loading,
    Ready(DashboardScreen),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceChange;

    fn stock(changes: &[f64]) -> Stock {
        Stock {
            symbol: "ABC".into(),
            company_name: "Abc Corp".into(),
            current_price: 12.5,
            price_changes: changes
                .iter()
                .map(|&change_percent| PriceChange { change_percent })
                .collect(),
        }
    }

    #[test]
    fn positive_total_renders_with_plus_sign_in_green() {
        let card = StockCard::from_stock(&stock(&[2.5, -1.0]));
        assert_eq!(card.final_total, 1.5);
        assert_eq!(card.change, "(+1.50%)");
        assert_eq!(card.trend, Trend::Positive);
        assert_eq!(card.color, "#008000");
        assert_eq!(card.price, "12.50");
    }

    #[test]
    fn flat_and_negative_totals_render_red() {
        let flat = StockCard::from_stock(&stock(&[1.0, -1.0]));
        assert_eq!(flat.change, "(0.00%)");
        assert_eq!(flat.trend, Trend::Negative);

        let down = StockCard::from_stock(&stock(&[-0.75]));
        assert_eq!(down.change, "(-0.75%)");
        assert_eq!(down.color, "#ff0000");
    }

    #[test]
    fn no_price_changes_is_flat() {
        assert_eq!(StockCard::from_stock(&stock(&[])).change, "(0.00%)");
    }

    #[test]
    fn empty_asset_list_shows_the_empty_state() {
        assert_eq!(
            AssetsSection::from_assets(&[]),
            AssetsSection::Empty {
                message: EMPTY_ASSETS_MESSAGE.to_string()
            }
        );
    }

    #[test]
    fn saved_cards_carry_amount_and_id() {
        let saved = SavedStock {
            stock: stock(&[0.5]),
            amount: 4.0,
            doc_id: "d1".into(),
        };
        match AssetsSection::from_assets(&[saved]) {
            AssetsSection::Assets { cards } => {
                assert_eq!(cards[0].amount, Some(4.0));
                assert_eq!(cards[0].doc_id.as_deref(), Some("d1"));
            }
            other => panic!("unexpected section {:?}", other),
        }
    }
}

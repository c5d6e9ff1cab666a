// Multi-key ordering for the portfolio table.
//
// Descriptors apply left to right; later ones only break ties left by earlier
// ones. A descriptor without a direction is skipped.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::types::Stock;

/// Sortable stock columns, named as the dashboard names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StockField {
    Symbol,
    Name,
    Price,
    DayChange,
    ChangePct,
    Volume,
    VolumeAvg,
    MarketCap,
    Pe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortDescriptor {
    pub field: StockField,
    #[serde(default)]
    pub dir: Option<SortDirection>,
}

impl SortDescriptor {
    pub fn asc(field: StockField) -> Self {
        Self {
            field,
            dir: Some(SortDirection::Asc),
        }
    }

    pub fn desc(field: StockField) -> Self {
        Self {
            field,
            dir: Some(SortDirection::Desc),
        }
    }
}

fn compare_field(a: &Stock, b: &Stock, field: StockField) -> Ordering {
    match field {
        StockField::Symbol => a.symbol.cmp(&b.symbol),
        StockField::Name => a.name.cmp(&b.name),
        StockField::Price => a.price.total_cmp(&b.price),
        StockField::DayChange => a.day_change.total_cmp(&b.day_change),
        StockField::ChangePct => a.change_pct.total_cmp(&b.change_pct),
        StockField::Volume => a.volume.total_cmp(&b.volume),
        StockField::VolumeAvg => a.volume_avg.total_cmp(&b.volume_avg),
        StockField::MarketCap => a.market_cap.total_cmp(&b.market_cap),
        // None < Some(_)
        StockField::Pe => match (a.pe, b.pe) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (x, y) => x.is_some().cmp(&y.is_some()),
        },
    }
}

/// Stable copy of `stocks` ordered by `sort`.
pub fn order_by(stocks: &[Stock], sort: &[SortDescriptor]) -> Vec<Stock> {
    let mut out = stocks.to_vec();
    let active: Vec<(StockField, SortDirection)> = sort
        .iter()
        .filter_map(|d| d.dir.map(|dir| (d.field, dir)))
        .collect();
    if active.is_empty() {
        return out;
    }

    out.sort_by(|a, b| {
        for (field, dir) in &active {
            let ord = compare_field(a, b, *field);
            let ord = match dir {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock(symbol: &str, price: f64, pe: Option<f64>) -> Stock {
        Stock {
            symbol: symbol.into(),
            name: format!("{symbol} Corp"),
            price,
            day_change: 0.0,
            change_pct: 0.0,
            volume: 0.0,
            volume_avg: 0.0,
            market_cap: 0.0,
            pe,
            intraday: vec![price],
        }
    }

    fn symbols(stocks: &[Stock]) -> Vec<&str> {
        stocks.iter().map(|s| s.symbol.as_str()).collect()
    }

    #[test]
    fn sorts_by_price_descending() {
        let input = vec![
            stock("A", 10.0, None),
            stock("B", 30.0, None),
            stock("C", 20.0, None),
        ];
        let out = order_by(&input, &[SortDescriptor::desc(StockField::Price)]);
        assert_eq!(symbols(&out), vec!["B", "C", "A"]);
    }

    #[test]
    fn later_descriptors_break_ties() {
        let input = vec![
            stock("B", 10.0, None),
            stock("C", 20.0, None),
            stock("A", 10.0, None),
        ];
        let out = order_by(
            &input,
            &[
                SortDescriptor::asc(StockField::Price),
                SortDescriptor::asc(StockField::Symbol),
            ],
        );
        assert_eq!(symbols(&out), vec!["A", "B", "C"]);
    }

    #[test]
    fn missing_direction_keeps_input_order() {
        let input = vec![stock("Z", 1.0, None), stock("A", 2.0, None)];
        let out = order_by(
            &input,
            &[SortDescriptor {
                field: StockField::Symbol,
                dir: None,
            }],
        );
        assert_eq!(symbols(&out), vec!["Z", "A"]);
    }

    #[test]
    fn null_pe_sorts_first_ascending() {
        let input = vec![
            stock("A", 1.0, Some(12.0)),
            stock("B", 1.0, None),
            stock("C", 1.0, Some(8.0)),
        ];
        let out = order_by(&input, &[SortDescriptor::asc(StockField::Pe)]);
        assert_eq!(symbols(&out), vec!["B", "C", "A"]);
    }

    #[test]
    fn descriptor_deserialises_from_dashboard_shape() {
        let json = r#"[{ "field": "changePct", "dir": "desc" }, { "field": "symbol" }]"#;
        let sort: Vec<SortDescriptor> = serde_json::from_str(json).unwrap();
        assert_eq!(sort[0], SortDescriptor::desc(StockField::ChangePct));
        assert_eq!(sort[1].dir, None);
        assert!(serde_json::from_str::<SortDescriptor>(r#"{ "field": "bogus" }"#).is_err());
    }
}

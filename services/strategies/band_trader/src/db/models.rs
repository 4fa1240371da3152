//! Row types for the trades table

use diesel::prelude::*;

use super::schema::trades;
use crate::trade::Trade;

/// One trades row. Dates are epoch milliseconds and `open` is an integer
/// flag, mirroring the legacy layout. `treat_none_as_null` makes the
/// upsert write the full row, clearing stale sell columns if a key is
/// ever reused.
#[derive(
    Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Insertable, AsChangeset,
)]
#[diesel(table_name = trades)]
#[diesel(primary_key(buy_date, symbol))]
#[diesel(treat_none_as_null = true)]
pub struct TradeRow {
    pub buy_date: i64,
    pub symbol: String,
    pub buy_price: f64,
    pub sell_price: Option<f64>,
    pub sell_date: Option<i64>,
    pub open: i32,
}

impl From<&Trade> for TradeRow {
    fn from(trade: &Trade) -> Self {
        Self {
            buy_date: trade.buy_date,
            symbol: trade.symbol.clone(),
            buy_price: trade.buy_price,
            sell_price: trade.sell_price,
            sell_date: trade.sell_date,
            open: i32::from(trade.open),
        }
    }
}

impl From<TradeRow> for Trade {
    fn from(row: TradeRow) -> Self {
        Self {
            symbol: row.symbol,
            buy_date: row.buy_date,
            buy_price: row.buy_price,
            sell_price: row.sell_price,
            sell_date: row.sell_date,
            open: row.open != 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_between_domain_and_row() {
        let mut trade = Trade::new("SOLUSDT", 58.12, 1_700_000_000_000);
        trade.mark(59.0);
        let row = TradeRow::from(&trade);
        assert_eq!(row.open, 1);
        assert_eq!(row.sell_price, Some(59.0));
        assert_eq!(row.sell_date, None);
        assert_eq!(Trade::from(row), trade);
    }
}

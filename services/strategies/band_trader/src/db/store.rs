//! Trade store with upsert writes and status reads

use diesel::prelude::*;
use parking_lot::Mutex;

use super::models::TradeRow;
use super::schema::trades::dsl;
use super::{connection, migrate};
use crate::error::Result;
use crate::trade::Trade;

/// SQLite-backed store behind a mutex. Writes land once per evaluation
/// tick and reads come from chat commands, so a single connection is
/// plenty.
pub struct TradeStore {
    conn: Mutex<SqliteConnection>,
}

impl TradeStore {
    /// Opens the database, applying pragmas and pending migrations.
    pub fn open(database_url: &str) -> Result<Self> {
        let mut conn = connection::establish(database_url)?;
        migrate::run(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Inserts or fully updates the row keyed by (buy_date, symbol).
    pub fn save(&self, trade: &Trade) -> Result<()> {
        let row = TradeRow::from(trade);
        let mut conn = self.conn.lock();
        diesel::insert_into(dsl::trades)
            .values(&row)
            .on_conflict((dsl::buy_date, dsl::symbol))
            .do_update()
            .set(&row)
            .execute(&mut *conn)?;
        Ok(())
    }

    /// Open positions, oldest entry first.
    pub fn open_trades(&self) -> Result<Vec<Trade>> {
        let mut conn = self.conn.lock();
        let rows: Vec<TradeRow> = dsl::trades
            .filter(dsl::open.eq(1))
            .order(dsl::buy_date.asc())
            .select(TradeRow::as_select())
            .load(&mut *conn)?;
        Ok(rows.into_iter().map(Trade::from).collect())
    }

    /// The position to resume after a restart. The lifecycle keeps at most
    /// one trade open, so this is simply the oldest open row.
    pub fn last_open_trade(&self) -> Result<Option<Trade>> {
        let mut conn = self.conn.lock();
        let row: Option<TradeRow> = dsl::trades
            .filter(dsl::open.eq(1))
            .order(dsl::buy_date.asc())
            .select(TradeRow::as_select())
            .first(&mut *conn)
            .optional()?;
        Ok(row.map(Trade::from))
    }

    /// Closed trades, oldest entry first.
    pub fn closed_trades(&self) -> Result<Vec<Trade>> {
        let mut conn = self.conn.lock();
        let rows: Vec<TradeRow> = dsl::trades
            .filter(dsl::open.eq(0))
            .order(dsl::buy_date.asc())
            .select(TradeRow::as_select())
            .load(&mut *conn)?;
        Ok(rows.into_iter().map(Trade::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> TradeStore {
        TradeStore::open(":memory:").unwrap()
    }

    #[test]
    fn saves_and_resumes_an_open_trade() {
        let store = store();
        let trade = Trade::new("SOLUSDT", 58.12, 1_700_000_000_000);
        store.save(&trade).unwrap();

        let resumed = store.last_open_trade().unwrap().unwrap();
        assert_eq!(resumed, trade);
        assert_eq!(store.open_trades().unwrap().len(), 1);
        assert!(store.closed_trades().unwrap().is_empty());
    }

    #[test]
    fn repeated_saves_update_in_place() {
        let store = store();
        let mut trade = Trade::new("SOLUSDT", 100.0, 1_700_000_000_000);
        store.save(&trade).unwrap();
        trade.mark(101.0);
        store.save(&trade).unwrap();
        trade.mark(102.5);
        store.save(&trade).unwrap();

        let open = store.open_trades().unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].sell_price, Some(102.5));
    }

    #[test]
    fn closing_moves_the_trade_between_queries() {
        let store = store();
        let mut trade = Trade::new("SOLUSDT", 100.0, 1_700_000_000_000);
        store.save(&trade).unwrap();
        trade.sell(102.0, 1_700_000_060_000, 0.99, 1.005);
        store.save(&trade).unwrap();

        assert!(store.open_trades().unwrap().is_empty());
        assert!(store.last_open_trade().unwrap().is_none());
        let closed = store.closed_trades().unwrap();
        assert_eq!(closed.len(), 1);
        assert!(!closed[0].open);
        assert_eq!(closed[0].sell_date, Some(1_700_000_060_000));
    }

    #[test]
    fn queries_order_by_entry_time() {
        let store = store();
        for (offset, symbol) in [(2, "B"), (0, "A"), (1, "C")] {
            let mut trade = Trade::new(symbol, 100.0, 1_700_000_000_000 + offset);
            trade.force_sell(101.0, 1_700_000_100_000);
            store.save(&trade).unwrap();
        }
        let symbols: Vec<String> = store
            .closed_trades()
            .unwrap()
            .into_iter()
            .map(|t| t.symbol)
            .collect();
        assert_eq!(symbols, vec!["A", "C", "B"]);
    }
}

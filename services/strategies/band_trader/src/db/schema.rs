//! Hand-maintained diesel schema
//!
//! The trades table predates this service and keeps its camelCase column
//! names; `sql_name` maps them onto snake_case on the Rust side.

diesel::table! {
    trades (buy_date, symbol) {
        #[sql_name = "buyDate"]
        buy_date -> BigInt,
        symbol -> Text,
        #[sql_name = "buyPrice"]
        buy_price -> Double,
        #[sql_name = "sellPrice"]
        sell_price -> Nullable<Double>,
        #[sql_name = "sellDate"]
        sell_date -> Nullable<BigInt>,
        open -> Integer,
    }
}

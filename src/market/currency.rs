//! Currency conversion through cross symbols

use super::base::MarketBase;
use super::types::{MarketError, TradeSide};

impl MarketBase {
    /// Convert `amount` of `from` currency into `to` currency.
    ///
    /// Looks up the direct pair (`FROMTO`, multiply) first, then the inverse
    /// pair (`TOFROM`, divide). Buys convert at the ask, sells at the bid.
    /// The amount is never returned unconverted when no usable quote exists.
    pub fn convert(
        &self,
        amount: f64,
        from: &str,
        to: &str,
        side: TradeSide,
    ) -> Result<f64, MarketError> {
        if from.eq_ignore_ascii_case(to) {
            return Ok(amount);
        }

        let direct = format!("{}{}", from, to).to_ascii_uppercase();
        if let Ok(symbol) = self.get_symbol(&direct) {
            let price = quote_for(symbol.bid(), symbol.ask(), side)
                .ok_or_else(|| MarketError::QuoteUnavailable(direct.clone()))?;
            return Ok(amount * price);
        }

        let inverse = format!("{}{}", to, from).to_ascii_uppercase();
        if let Ok(symbol) = self.get_symbol(&inverse) {
            let price = quote_for(symbol.bid(), symbol.ask(), side)
                .ok_or_else(|| MarketError::QuoteUnavailable(inverse.clone()))?;
            return Ok(amount / price);
        }

        tracing::warn!(from, to, "No conversion symbol available");
        Err(MarketError::ConversionUnavailable {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

fn quote_for(bid: f64, ask: f64, side: TradeSide) -> Option<f64> {
    let price = match side {
        TradeSide::Buy => ask,
        TradeSide::Sell => bid,
    };
    if price.is_finite() && price > 0.0 {
        Some(price)
    } else {
        None
    }
}

//! Gain/loss aggregation over a numeric field.
//!
//! A value is a gain when strictly positive and a loss otherwise, so a
//! break-even (zero) outcome always counts as a loss. Items lacking the
//! aggregated field are skipped and counted, never fatal.

use crate::domain::error::SigstatsError;
use crate::domain::event::NumericFields;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateTotals {
    pub field: String,
    pub gains: f64,
    pub losses: f64,
    pub net: f64,
    pub gain_count: usize,
    pub loss_count: usize,
    pub skipped: usize,
}

impl AggregateTotals {
    /// Sum gains and losses of `field` across `items`.
    pub fn compute<'a, T: NumericFields + 'a>(
        items: impl IntoIterator<Item = &'a T>,
        field: &str,
    ) -> Self {
        let mut totals = AggregateTotals {
            field: field.to_string(),
            ..Default::default()
        };

        for item in items {
            let Some(value) = item.field(field) else {
                totals.skipped += 1;
                continue;
            };
            if is_gain(value) {
                totals.gains += value;
                totals.gain_count += 1;
            } else {
                totals.losses += value;
                totals.loss_count += 1;
            }
            totals.net += value;
        }

        totals
    }

    pub fn counted(&self) -> usize {
        self.gain_count + self.loss_count
    }

    /// Gain count over loss count; undefined when there are no losses.
    pub fn ratio(&self) -> Result<f64, SigstatsError> {
        if self.loss_count == 0 {
            return Err(SigstatsError::UndefinedRatio {
                gain_count: self.gain_count,
            });
        }
        Ok(self.gain_count as f64 / self.loss_count as f64)
    }
}

pub fn is_gain(value: f64) -> bool {
    value > 0.0
}

/// Stable split into (gains, losses) by the sign of `field`.
///
/// Items lacking the field land in neither half.
pub fn partition<T: NumericFields + Clone>(items: &[T], field: &str) -> (Vec<T>, Vec<T>) {
    let mut gains = Vec::new();
    let mut losses = Vec::new();
    for item in items {
        match item.field(field) {
            Some(v) if is_gain(v) => gains.push(item.clone()),
            Some(_) => losses.push(item.clone()),
            None => {}
        }
    }
    (gains, losses)
}

/// Totals per strategy, each over the `<key>Profit` field.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyTotals {
    pub key: String,
    pub totals: AggregateTotals,
}

pub fn strategy_field(key: &str) -> String {
    format!("{}Profit", key)
}

pub fn strategy_breakdown<T: NumericFields>(items: &[T], keys: &[String]) -> Vec<StrategyTotals> {
    keys.iter()
        .map(|key| StrategyTotals {
            key: key.clone(),
            totals: AggregateTotals::compute(items, &strategy_field(key)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::Event;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn events(values: &[serde_json::Value]) -> Vec<Event> {
        values
            .iter()
            .map(|v| Event::from_json(v.clone()).unwrap())
            .collect()
    }

    #[test]
    fn totals_basic() {
        let items = events(&[
            json!({"profit": 10}),
            json!({"profit": -5}),
            json!({"profit": 2.5}),
        ]);
        let totals = AggregateTotals::compute(&items, "profit");
        assert_relative_eq!(totals.gains, 12.5);
        assert_relative_eq!(totals.losses, -5.0);
        assert_relative_eq!(totals.net, 7.5);
        assert_eq!(totals.gain_count, 2);
        assert_eq!(totals.loss_count, 1);
        assert_eq!(totals.skipped, 0);
        assert_relative_eq!(totals.ratio().unwrap(), 2.0);
    }

    #[test]
    fn zero_counts_as_loss() {
        let items = events(&[json!({"profit": 0}), json!({"profit": 1})]);
        let totals = AggregateTotals::compute(&items, "profit");
        assert_eq!(totals.gain_count, 1);
        assert_eq!(totals.loss_count, 1);
        assert_relative_eq!(totals.losses, 0.0);
    }

    #[test]
    fn ratio_undefined_without_losses() {
        let items = events(&[json!({"profit": 3}), json!({"profit": 4})]);
        let totals = AggregateTotals::compute(&items, "profit");
        let err = totals.ratio().unwrap_err();
        assert!(matches!(err, SigstatsError::UndefinedRatio { gain_count: 2 }));
    }

    #[test]
    fn ratio_undefined_on_empty_input() {
        let empty: Vec<Event> = Vec::new();
        let totals = AggregateTotals::compute(&empty, "profit");
        assert_eq!(totals.counted(), 0);
        assert!(totals.ratio().is_err());
    }

    #[test]
    fn missing_field_is_skipped() {
        let items = events(&[
            json!({"profit": 1, "rsiProfit": 4}),
            json!({"profit": 1}),
            json!({"profit": 1, "rsiProfit": -2}),
        ]);
        let totals = AggregateTotals::compute(&items, "rsiProfit");
        assert_eq!(totals.skipped, 1);
        assert_eq!(totals.counted(), 2);
        assert_relative_eq!(totals.net, 2.0);
    }

    #[test]
    fn partition_is_stable() {
        let items = events(&[
            json!({"profit": 1, "id": 1}),
            json!({"profit": -1, "id": 2}),
            json!({"profit": 3, "id": 3}),
            json!({"profit": 0, "id": 4}),
        ]);
        let (gains, losses) = partition(&items, "profit");
        fn ids(v: &[Event]) -> Vec<f64> {
            v.iter().map(|e| e.field("id").unwrap()).collect()
        }
        assert_eq!(ids(&gains), vec![1.0, 3.0]);
        assert_eq!(ids(&losses), vec![2.0, 4.0]);
    }

    #[test]
    fn partition_drops_items_without_field() {
        let items = events(&[json!({"profit": 1, "macdProfit": 2}), json!({"profit": -1})]);
        let (gains, losses) = partition(&items, "macdProfit");
        assert_eq!(gains.len(), 1);
        assert!(losses.is_empty());
    }

    #[test]
    fn breakdown_uses_suffixed_fields() {
        let items = events(&[
            json!({"profit": 1, "rsiProfit": 4, "deathProfit": -1}),
            json!({"profit": 1, "rsiProfit": -2}),
        ]);
        let keys = vec!["rsi".to_string(), "death".to_string(), "macd".to_string()];
        let breakdown = strategy_breakdown(&items, &keys);

        assert_eq!(breakdown[0].key, "rsi");
        assert_eq!(breakdown[0].totals.field, "rsiProfit");
        assert_eq!(breakdown[0].totals.gain_count, 1);
        assert_eq!(breakdown[0].totals.loss_count, 1);
        assert_eq!(breakdown[1].totals.loss_count, 1);
        assert_eq!(breakdown[1].totals.skipped, 1);
        assert_eq!(breakdown[2].totals.counted(), 0);
        assert_eq!(breakdown[2].totals.skipped, 2);
    }
}

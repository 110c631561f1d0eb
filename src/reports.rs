use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::domain::query::parse_all;
use crate::models::{MonthTotal, Order, PayerYearTotal, Totals, YearTotal};

/// Yearly spend for the bar chart. Records without a valid date or amount are skipped.
pub fn aggregate_by_year(orders: &[Order]) -> Vec<YearTotal> {
  let mut totals: BTreeMap<i32, f64> = BTreeMap::new();
  for (date, amount) in parse_all(orders).iter().filter_map(|parsed| parsed.dated_amount()) {
    *totals.entry(date.year()).or_insert(0.0) += amount;
  }
  totals
    .into_iter()
    .map(|(year, total)| YearTotal { year, total })
    .collect()
}

pub fn aggregate_by_year_and_payer(orders: &[Order]) -> Vec<PayerYearTotal> {
  let mut totals: BTreeMap<(i32, String), f64> = BTreeMap::new();
  for parsed in parse_all(orders) {
    if let Some((date, amount)) = parsed.dated_amount() {
      let payer = parsed.order.payer.trim().to_string();
      *totals.entry((date.year(), payer)).or_insert(0.0) += amount;
    }
  }
  totals
    .into_iter()
    .map(|((year, payer), total)| PayerYearTotal { year, payer, total })
    .collect()
}

/// Twelve buckets for `year`, empty months included as zero.
pub fn aggregate_by_month(orders: &[Order], year: i32) -> Vec<MonthTotal> {
  let mut months = [0.0_f64; 12];
  for (date, amount) in parse_all(orders).iter().filter_map(|parsed| parsed.dated_amount()) {
    if date.year() == year {
      months[date.month0() as usize] += amount;
    }
  }
  months
    .iter()
    .enumerate()
    .map(|(index, total)| MonthTotal {
      month: index as u32 + 1,
      total: *total,
    })
    .collect()
}

/// Status line figures: spend in `today`'s year and over all time.
pub fn totals(orders: &[Order], today: NaiveDate) -> Totals {
  let year = today.year();
  let mut result = Totals {
    year,
    year_total: 0.0,
    all_time_total: 0.0,
    counted: 0,
    skipped: 0,
  };
  for parsed in parse_all(orders) {
    match parsed.dated_amount() {
      Some((date, amount)) => {
        result.counted += 1;
        result.all_time_total += amount;
        if date.year() == year {
          result.year_total += amount;
        }
      }
      None => result.skipped += 1,
    }
  }
  result
}

#[cfg(test)]
mod tests {
  use super::*;

  fn order(date: &str, amount: &str, payer: &str) -> Order {
    Order {
      date: date.to_string(),
      amount: amount.to_string(),
      payer: payer.to_string(),
      ..Order::default()
    }
  }

  fn sample() -> Vec<Order> {
    vec![
      order("10.01.2023", "100", "Офис"),
      order("11.02.2024", "1 234,50", "Офис"),
      order("12.02.2024", "abc", "Офис"),
      order("13.03.2024", "65.5", "Склад"),
      order("31.02.2024", "1000", "Склад"),
    ]
  }

  #[test]
  fn yearly_totals_skip_unparseable_records() {
    assert_eq!(
      aggregate_by_year(&sample()),
      vec![YearTotal { year: 2023, total: 100.0 }, YearTotal { year: 2024, total: 1300.0 }]
    );
  }

  #[test]
  fn payer_totals_group_by_year_and_payer() {
    let totals = aggregate_by_year_and_payer(&sample());
    assert_eq!(totals.len(), 3);
    assert_eq!(totals[1], PayerYearTotal { year: 2024, payer: "Офис".to_string(), total: 1234.5 });
    assert_eq!(totals[2], PayerYearTotal { year: 2024, payer: "Склад".to_string(), total: 65.5 });
  }

  #[test]
  fn monthly_totals_cover_one_year() {
    let months = aggregate_by_month(&sample(), 2024);
    assert_eq!(months.len(), 12);
    assert_eq!(months[0].total, 0.0);
    assert_eq!(months[1], MonthTotal { month: 2, total: 1234.5 });
    assert_eq!(months[2], MonthTotal { month: 3, total: 65.5 });
  }

  #[test]
  fn status_totals_count_skipped_records() {
    let totals = totals(&sample(), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    assert_eq!(totals.year_total, 1300.0);
    assert_eq!(totals.all_time_total, 1400.0);
    assert_eq!(totals.counted, 3);
    assert_eq!(totals.skipped, 2);
  }
}

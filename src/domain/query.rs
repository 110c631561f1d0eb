use std::cmp::{Ordering, Reverse};

use chrono::{Datelike, NaiveDate};

use crate::domain::validation::{parse_amount, parse_date};
use crate::models::{Column, Order, Query, SortDirection};

/// Typed view of a record for one pipeline pass: the date and amount are
/// parsed once here instead of at every comparison.
#[derive(Debug, Clone, Copy)]
pub struct ParsedOrder<'a> {
  pub order: &'a Order,
  pub date: Option<NaiveDate>,
  pub amount: Option<f64>,
}

impl<'a> ParsedOrder<'a> {
  pub fn parse(order: &'a Order) -> Self {
    Self {
      order,
      date: parse_date(&order.date).ok(),
      amount: parse_amount(&order.amount).ok(),
    }
  }

  /// Date and amount both usable, i.e. the record counts towards totals.
  pub fn dated_amount(&self) -> Option<(NaiveDate, f64)> {
    Some((self.date?, self.amount?))
  }
}

pub fn parse_all(orders: &[Order]) -> Vec<ParsedOrder<'_>> {
  orders.iter().map(ParsedOrder::parse).collect()
}

enum DateRange {
  Off,
  Unusable,
  Bounds(Option<NaiveDate>, Option<NaiveDate>),
}

impl DateRange {
  fn from_query(query: &Query) -> Self {
    let from = non_blank(query.date_from.as_deref());
    let to = non_blank(query.date_to.as_deref());
    if from.is_none() && to.is_none() {
      return DateRange::Off;
    }
    let from = from.map(parse_date).transpose();
    let to = to.map(parse_date).transpose();
    match (from, to) {
      (Ok(from), Ok(to)) => DateRange::Bounds(from, to),
      _ => DateRange::Unusable,
    }
  }

  fn admits(&self, date: Option<NaiveDate>) -> bool {
    match self {
      DateRange::Off => true,
      DateRange::Unusable => false,
      DateRange::Bounds(from, to) => match date {
        Some(date) => from.map_or(true, |from| date >= from) && to.map_or(true, |to| date <= to),
        None => false,
      },
    }
  }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
  value.map(str::trim).filter(|value| !value.is_empty())
}

/// Derives the visible subset without touching the authoritative list. The
/// search term is matched as typed (lowercased only), so surrounding spaces count.
pub fn filter<'a>(orders: &'a [Order], query: &Query) -> Vec<&'a Order> {
  let needle = query
    .search
    .as_deref()
    .filter(|term| !term.is_empty())
    .map(str::to_lowercase);
  let range = DateRange::from_query(query);

  parse_all(orders)
    .into_iter()
    .filter(|parsed| match &needle {
      Some(needle) => parsed
        .order
        .values()
        .iter()
        .any(|value| value.to_lowercase().contains(needle.as_str())),
      None => true,
    })
    .filter(|parsed| range.admits(parsed.date))
    .map(|parsed| parsed.order)
    .collect()
}

#[derive(Debug, Clone)]
enum SortKey {
  Date(i32, u32, u32),
  Number(f64),
  Text(String),
}

impl SortKey {
  fn for_column(order: &Order, column: Column) -> Self {
    let value = order.get(column);
    if column == Column::Date {
      return match parse_date(value) {
        Ok(date) => SortKey::Date(date.year(), date.month(), date.day()),
        Err(_) => SortKey::Date(i32::MAX, u32::MAX, u32::MAX),
      };
    }
    match parse_amount(value) {
      Ok(number) => SortKey::Number(number),
      Err(_) => SortKey::Text(value.to_lowercase()),
    }
  }

  fn rank(&self) -> u8 {
    match self {
      SortKey::Date(..) => 0,
      SortKey::Number(_) => 1,
      SortKey::Text(_) => 2,
    }
  }
}

impl Ord for SortKey {
  fn cmp(&self, other: &Self) -> Ordering {
    match (self, other) {
      (SortKey::Date(y1, m1, d1), SortKey::Date(y2, m2, d2)) => (y1, m1, d1).cmp(&(y2, m2, d2)),
      (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
      (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
      _ => self.rank().cmp(&other.rank()),
    }
  }
}

impl PartialOrd for SortKey {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl PartialEq for SortKey {
  fn eq(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Equal
  }
}

impl Eq for SortKey {}

/// Stable sort of the authoritative list by one column. Numeric cells order
/// before text cells when a column mixes both.
pub fn sort(orders: &mut [Order], column: Column, direction: SortDirection) {
  match direction {
    SortDirection::Ascending => orders.sort_by_cached_key(|order| SortKey::for_column(order, column)),
    SortDirection::Descending => orders.sort_by_cached_key(|order| Reverse(SortKey::for_column(order, column))),
  }
}

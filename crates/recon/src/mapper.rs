use std::collections::BTreeMap;

use log::{debug, warn};
use zalyshok_engine::{to_cents, Resolver};

use crate::config::{CalculationLayout, CategoryConfig};
use crate::model::{CategoryInput, Event, LineItem, Usage};

/// Line items behind a category's planned-total formula on the event's first row.
///
/// A literal or empty planned cell yields no items. A row referenced twice
/// becomes a single item (the first reference wins).
pub fn line_items(
    resolver: &mut Resolver<'_>,
    layout: &CalculationLayout,
    event: &Event,
    category: &CategoryConfig,
) -> Vec<LineItem> {
    let planned_cell = category.planned_col.at(event.start_row);
    let references = resolver.references(planned_cell);

    let mut by_row = BTreeMap::new();
    for address in references {
        if by_row.contains_key(&address.row) {
            warn!(
                "event {}: {} references row {} more than once, keeping the first",
                event.number,
                planned_cell,
                address.row_number()
            );
            continue;
        }
        by_row.insert(address.row, address);
    }

    let sheet = resolver.sheet();
    let items: Vec<LineItem> = by_row
        .into_values()
        .map(|address| LineItem {
            address,
            name: sheet.text(layout.item_name_col.at(address.row)),
            category: category.code.clone(),
            planned_cents: to_cents(resolver.value(address)),
        })
        .collect();

    debug!(
        "event {} category {}: {} planned items from {}",
        event.number,
        category.code,
        items.len(),
        planned_cell
    );
    items
}

/// Usage aggregate of a category, classified by what the cell holds.
pub fn usage(resolver: &mut Resolver<'_>, event: &Event, category: &CategoryConfig) -> Usage {
    let expr = resolver.resolve(category.usage_col.at(event.start_row));
    if expr.is_formula() {
        let referenced_cents = expr
            .references
            .iter()
            .map(|r| to_cents(resolver.value(*r)))
            .collect();
        let literal_cents = expr.literals.iter().map(|l| to_cents(*l)).collect();
        Usage::Formula { referenced_cents, literal_cents }
    } else if expr.is_empty() {
        Usage::Missing
    } else {
        Usage::Number { cents: to_cents(expr.value) }
    }
}

/// Everything the matcher needs for one category of one event.
pub fn category_input(
    resolver: &mut Resolver<'_>,
    layout: &CalculationLayout,
    event: &Event,
    category: &CategoryConfig,
) -> CategoryInput {
    let row = event.start_row;
    let items = line_items(resolver, layout, event, category);
    let planned_total_cents = to_cents(resolver.value(category.planned_col.at(row)));
    let usage = usage(resolver, event, category);
    let used_cents = to_cents(resolver.value(category.usage_col.at(row)));
    let remainder_cents = to_cents(resolver.value(category.remainder_col.at(row)));

    CategoryInput {
        event_number: event.number,
        category: category.code.clone(),
        items,
        planned_total_cents,
        usage,
        used_cents,
        remainder_cents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconConfig;
    use zalyshok_engine::{CellAddress, CellValue, Sheet};

    fn a(s: &str) -> CellAddress {
        CellAddress::parse(s).unwrap()
    }

    fn event() -> Event {
        Event { number: 7, name: "Кубок".into(), term: "Одеса".into(), start_row: 4, end_row: 8 }
    }

    fn sheet(cells: &[(&str, &str)]) -> Sheet {
        let mut s = Sheet::new("calc");
        for (addr, raw) in cells {
            s.set_raw(a(addr), raw);
        }
        s
    }

    #[test]
    fn items_follow_planned_formula() {
        let config = ReconConfig::default();
        let s = sheet(&[
            ("H5", "Футболки"),
            ("K5", "2000"),
            ("H7", "Кепки"),
            ("K7", "1 500,50"),
            ("L5", "=K7+K5+K7"),
        ]);
        let mut r = Resolver::new(&s);
        let items = line_items(&mut r, &config.calculation, &event(), &config.categories[0]);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Футболки");
        assert_eq!(items[0].planned_cents, 200_000);
        assert_eq!(items[1].address, a("K7"));
        assert_eq!(items[1].planned_cents, 150_050);
        assert_eq!(items[1].source_row(), 7);
        assert!(items.iter().all(|i| i.category == "2210"));
    }

    #[test]
    fn literal_planned_cell_has_no_items() {
        let config = ReconConfig::default();
        let s = sheet(&[("L5", "4000")]);
        let mut r = Resolver::new(&s);
        assert!(line_items(&mut r, &config.calculation, &event(), &config.categories[0]).is_empty());
        assert!(line_items(&mut r, &config.calculation, &event(), &config.categories[1]).is_empty());
    }

    #[test]
    fn usage_classification() {
        let config = ReconConfig::default();
        let s = sheet(&[("K5", "700"), ("P5", "=K5+1300"), ("Q5", "1987,88")]);
        let mut r = Resolver::new(&s);
        let ev = event();
        assert_eq!(
            usage(&mut r, &ev, &config.categories[0]),
            Usage::Formula { referenced_cents: vec![70_000], literal_cents: vec![130_000] }
        );
        assert_eq!(usage(&mut r, &ev, &config.categories[1]), Usage::Number { cents: 198_788 });
        assert_eq!(usage(&mut r, &ev, &config.categories[2]), Usage::Missing);
    }

    #[test]
    fn category_input_reads_all_cells() {
        let config = ReconConfig::default();
        let s = sheet(&[
            ("H5", "Футболки"),
            ("K5", "2000"),
            ("H6", "Кепки"),
            ("K6", "2012.12"),
            ("L5", "=SUM(K5:K6)"),
            ("P5", "2024.24"),
            ("T5", "=L5-P5"),
        ]);
        let mut r = Resolver::new(&s);
        let input = category_input(&mut r, &config.calculation, &event(), &config.categories[0]);
        assert_eq!(input.event_number, 7);
        assert_eq!(input.items.len(), 2);
        assert_eq!(input.planned_total_cents, 401_212);
        assert_eq!(input.used_cents, 202_424);
        assert_eq!(input.remainder_cents, 198_788);
    }

    #[test]
    fn rounded_cells_use_cached_results() {
        let config = ReconConfig::default();
        let mut s = sheet(&[("H5", "Футболки"), ("L5", "=K5"), ("P5", "=K5-100"), ("T5", "=L5-P5")]);
        s.set_formula(a("K5"), "=ROUND(1000/3,2)");
        s.set_value(a("K5"), CellValue::Number(333.33));
        let mut r = Resolver::new(&s);
        let input = category_input(&mut r, &config.calculation, &event(), &config.categories[0]);
        assert_eq!(input.items.len(), 1);
        assert_eq!(input.items[0].planned_cents, 33_333);
        assert_eq!(input.planned_total_cents, 33_333);
        assert_eq!(input.usage, Usage::Formula { referenced_cents: vec![33_333], literal_cents: vec![10_000] });
        assert_eq!(input.used_cents, 23_333);
        assert_eq!(input.remainder_cents, 10_000);
    }
}

use log::{debug, warn};
use zalyshok_engine::{to_cents, Resolver, Sheet};

use crate::config::{CategoryConfig, EstimateLayout};
use crate::error::ReconError;
use crate::model::{Estimate, EstimateItem, EstimateNeed};

/// Read the target event name and its itemized needs from the estimate sheet.
///
/// Items are read from `first_item_row` down to the row whose name contains
/// the total marker. Award rows, unknown codes and zero amounts are skipped.
pub fn read_estimate(
    sheet: &Sheet,
    layout: &EstimateLayout,
    categories: &[CategoryConfig],
) -> Result<Estimate, ReconError> {
    let event_name = sheet.text(layout.name_cell);
    if event_name.is_empty() {
        return Err(ReconError::EstimateNameMissing {
            sheet: sheet.name.clone(),
            cell: layout.name_cell.to_string(),
        });
    }

    let total_marker = layout.total_marker.to_lowercase();
    let award_marker = layout.award_marker.to_lowercase();
    let mut resolver = Resolver::new(sheet);
    let mut items = Vec::new();
    let mut saw_total = false;

    let first = layout.first_item_row.saturating_sub(1);
    let last = sheet.last_row().unwrap_or(0);
    for row in first..=last {
        let name = sheet.text(layout.name_col.at(row));
        let lowered = name.to_lowercase();
        if lowered.contains(&total_marker) {
            saw_total = true;
            break;
        }
        if !award_marker.is_empty() && lowered.contains(&award_marker) {
            debug!("estimate row {}: award row skipped", row + 1);
            continue;
        }

        let code = sheet.text(layout.code_col.at(row));
        if !categories.iter().any(|c| c.code == code) {
            continue;
        }
        let amount_cents = to_cents(resolver.value(layout.amount_col.at(row)));
        if amount_cents == 0 {
            continue;
        }
        items.push(EstimateItem { row: row + 1, category: code, name, amount_cents });
    }

    if !saw_total {
        warn!(
            "estimate sheet '{}': no '{}' row found, read up to the last row",
            sheet.name, layout.total_marker
        );
    }

    let needs = categories
        .iter()
        .map(|c| EstimateNeed {
            category: c.code.clone(),
            needed_cents: items
                .iter()
                .filter(|i| i.category == c.code)
                .map(|i| i.amount_cents)
                .sum(),
        })
        .collect();

    debug!("estimate '{}': {} items", event_name, items.len());
    Ok(Estimate { event_name, items, needs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconConfig;
    use zalyshok_engine::{CellAddress, CellValue};

    fn a(s: &str) -> CellAddress {
        CellAddress::parse(s).unwrap()
    }

    fn estimate_sheet() -> Sheet {
        let mut s = Sheet::new("Кошторис");
        for (addr, raw) in [
            ("D12", "Турнір «Весна» 2024"),
            ("G17", "2210"),
            ("H17", "Футболки"),
            ("K17", "1 200,00"),
            ("G18", "2210"),
            ("H18", "Нагородна атрибутика"),
            ("K18", "999"),
            ("G19", "2240"),
            ("H19", "Автобус"),
            ("K19", "=300*2"),
            ("G20", "2250"),
            ("H20", "Добові"),
            ("K20", "0"),
            ("G21", "3110"),
            ("H21", "Обладнання"),
            ("K21", "5000"),
            ("G22", "2210"),
            ("H22", "Кепки"),
            ("K22", "150.5"),
            ("H23", "РАЗОМ"),
            ("K23", "=SUM(K17:K22)"),
            ("G24", "2210"),
            ("H24", "after total"),
            ("K24", "777"),
        ] {
            s.set_raw(a(addr), raw);
        }
        s
    }

    #[test]
    fn reads_items_until_total_marker() {
        let config = ReconConfig::default();
        let estimate = read_estimate(&estimate_sheet(), &config.estimate, &config.categories).unwrap();
        assert_eq!(estimate.event_name, "Турнір «Весна» 2024");
        let names: Vec<_> = estimate.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Футболки", "Автобус", "Кепки"]);
        assert_eq!(estimate.items[1].row, 19);
        assert_eq!(estimate.needed_cents("2210"), 135_050);
        assert_eq!(estimate.needed_cents("2240"), 60_000);
        assert_eq!(estimate.needed_cents("2250"), 0);
        assert_eq!(estimate.needs.len(), 3);
    }

    #[test]
    fn missing_name_is_an_error() {
        let config = ReconConfig::default();
        let err = read_estimate(&Sheet::new("empty"), &config.estimate, &config.categories).unwrap_err();
        assert!(err.to_string().contains("D12"));
    }

    #[test]
    fn missing_total_marker_reads_to_end() {
        let config = ReconConfig::default();
        let mut s = Sheet::new("e");
        s.set_raw(a("D12"), "Кубок");
        s.set_raw(a("G17"), "2240");
        s.set_raw(a("H17"), "Пальне");
        s.set_raw(a("K17"), "400");
        let estimate = read_estimate(&s, &config.estimate, &config.categories).unwrap();
        assert_eq!(estimate.needed_cents("2240"), 40_000);
    }

    #[test]
    fn rounded_amount_uses_cached_result() {
        let config = ReconConfig::default();
        let mut s = Sheet::new("e");
        s.set_raw(a("D12"), "Кубок");
        s.set_raw(a("G17"), "2210");
        s.set_raw(a("H17"), "Футболки");
        s.set_formula(a("K17"), "=ROUND(300*2.5,2)");
        s.set_value(a("K17"), CellValue::Number(750.0));
        s.set_raw(a("H18"), "РАЗОМ");
        let estimate = read_estimate(&s, &config.estimate, &config.categories).unwrap();
        assert_eq!(estimate.items.len(), 1);
        assert_eq!(estimate.needed_cents("2210"), 75_000);
    }
}

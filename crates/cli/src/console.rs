// Interactive decisions on a terminal
//
// Every prompt loops until it gets a valid answer. End of input gives the
// conservative answer: skip the event, decline the question.

use std::io::{self, BufRead, Write};

use log::warn;
use zalyshok_recon::disambiguator::category_combinations;
use zalyshok_recon::model::{CategoryOutcome, Event, ResidualSelection};
use zalyshok_recon::{format_cents, Disambiguator, DiscrepancyQuestion, SingleItemQuestion};

pub struct ConsoleDisambiguator<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ConsoleDisambiguator<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Ask for comma-separated event numbers. An empty answer or end of input
    /// selects nothing.
    pub fn prompt_event_numbers(&mut self, events: &[Event]) -> io::Result<Vec<i64>> {
        writeln!(self.output, "Events in the calculation sheet:")?;
        for event in events {
            writeln!(self.output, "  {:>3}  {}  ({})", event.number, event.name, event.term)?;
        }
        loop {
            let Some(line) = self.ask("Event numbers to reconcile (comma-separated): ")? else {
                return Ok(Vec::new());
            };
            match parse_event_numbers(&line) {
                Ok(numbers) => return Ok(numbers),
                Err(bad) => writeln!(self.output, "'{bad}' is not an event number, try again")?,
            }
        }
    }

    /// One trimmed line, `None` at end of input.
    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn ask_yes_no(&mut self, prompt: &str) -> io::Result<bool> {
        loop {
            let Some(answer) = self.ask(prompt)? else {
                return Ok(false);
            };
            match parse_yes_no(&answer) {
                Some(yes) => return Ok(yes),
                None => writeln!(self.output, "answer y or n")?,
            }
        }
    }

    fn choose_categories(&mut self, event: &Event, outcomes: &[CategoryOutcome]) -> io::Result<Vec<String>> {
        writeln!(self.output)?;
        writeln!(self.output, "Event {} «{}» ({})", event.number, event.name, event.term)?;
        for outcome in outcomes {
            let note = if outcome.is_withdrawable() { "" } else { "  not withdrawable" };
            writeln!(
                self.output,
                "  {}  residual {:>12}  remainder {:>12}  [{}]{}",
                outcome.category,
                format_cents(outcome.residual_cents()),
                format_cents(outcome.remainder_cents),
                outcome.strategy,
                note
            )?;
        }

        let codes: Vec<String> = outcomes
            .iter()
            .filter(|o| o.is_withdrawable())
            .map(|o| o.category.clone())
            .collect();
        let menu = category_combinations(&codes);
        for (i, combo) in menu.iter().enumerate() {
            let total: i64 = outcomes
                .iter()
                .filter(|o| combo.contains(&o.category))
                .map(CategoryOutcome::residual_cents)
                .sum();
            writeln!(self.output, "  {}) {}  ({})", i + 1, combo.join(" + "), format_cents(total))?;
        }
        writeln!(self.output, "  0) skip event")?;

        let prompt = format!("Withdraw from [0-{}]: ", menu.len());
        loop {
            let Some(answer) = self.ask(&prompt)? else {
                return Ok(Vec::new());
            };
            match answer.parse::<usize>() {
                Ok(0) => return Ok(Vec::new()),
                Ok(n) if n <= menu.len() => return Ok(menu[n - 1].clone()),
                _ => writeln!(self.output, "choose a number from 0 to {}", menu.len())?,
            }
        }
    }
}

impl<R: BufRead, W: Write> Disambiguator for ConsoleDisambiguator<R, W> {
    fn select_categories(&mut self, event: &Event, outcomes: &[CategoryOutcome]) -> ResidualSelection {
        match self.choose_categories(event, outcomes) {
            Ok(categories) => ResidualSelection { event_number: event.number, categories },
            Err(e) => {
                warn!("event {}: console unavailable ({}), skipped", event.number, e);
                ResidualSelection::skip(event.number)
            }
        }
    }

    fn confirm_single_item(&mut self, question: &SingleItemQuestion) -> bool {
        let prompt = format!(
            "Event {}, category {}: remainder {} does not match the only item '{}' ({}). \
             Attribute the remainder to it? [y/n]: ",
            question.event_number,
            question.category,
            format_cents(question.remainder_cents),
            question.item.name,
            format_cents(question.item.planned_cents)
        );
        self.ask_yes_no(&prompt).unwrap_or_else(|e| {
            warn!("console unavailable ({}), remainder not attributed", e);
            false
        })
    }

    fn accept_discrepancy(&mut self, question: &DiscrepancyQuestion) -> bool {
        let prompt = format!(
            "Event {}, category {}: residuals {} differ from the remainder {} by {}. \
             Keep this category? [y/n]: ",
            question.event_number,
            question.category,
            format_cents(question.residual_cents),
            format_cents(question.remainder_cents),
            format_cents(question.delta_cents.abs())
        );
        self.ask_yes_no(&prompt).unwrap_or_else(|e| {
            warn!("console unavailable ({}), category rejected", e);
            false
        })
    }
}

/// Parse `"1, 2,5"`; the first token that is not a positive integer is the error.
pub fn parse_event_numbers(line: &str) -> Result<Vec<i64>, String> {
    let mut numbers = Vec::new();
    for token in line.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.parse::<i64>() {
            Ok(n) if n > 0 => numbers.push(n),
            _ => return Err(token.to_string()),
        }
    }
    Ok(numbers)
}

fn parse_yes_no(answer: &str) -> Option<bool> {
    match answer.to_lowercase().as_str() {
        "y" | "yes" | "т" | "так" => Some(true),
        "n" | "no" | "н" | "ні" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use zalyshok_engine::CellAddress;
    use zalyshok_recon::model::{CategoryStatus, ItemResidual, LineItem, MatchStrategy};

    fn console(input: &str) -> ConsoleDisambiguator<Cursor<Vec<u8>>, Vec<u8>> {
        ConsoleDisambiguator::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn transcript(c: &ConsoleDisambiguator<Cursor<Vec<u8>>, Vec<u8>>) -> String {
        String::from_utf8_lossy(&c.output).into_owned()
    }

    fn event() -> Event {
        Event {
            number: 4,
            name: "Кубок області".into(),
            term: "Київ".into(),
            start_row: 4,
            end_row: 8,
        }
    }

    fn item(name: &str, cents: i64) -> LineItem {
        LineItem {
            address: CellAddress::new(4, 10),
            name: name.into(),
            category: "2210".into(),
            planned_cents: cents,
        }
    }

    fn outcome(category: &str, residual_cents: i64) -> CategoryOutcome {
        CategoryOutcome {
            event_number: 4,
            category: category.into(),
            strategy: MatchStrategy::FormulaUsage,
            status: CategoryStatus::Accepted,
            items: vec![ItemResidual { item: item("Кепки", residual_cents), residual_cents }],
            planned_total_cents: residual_cents,
            used_cents: 0,
            remainder_cents: residual_cents,
            verification: None,
        }
    }

    #[test]
    fn event_numbers_parse_and_reprompt() {
        assert_eq!(parse_event_numbers(" 1, 2,,5 "), Ok(vec![1, 2, 5]));
        assert_eq!(parse_event_numbers("1, x"), Err("x".to_string()));
        assert_eq!(parse_event_numbers("0"), Err("0".to_string()));

        let mut c = console("1,a\n3, 1\n");
        assert_eq!(c.prompt_event_numbers(&[event()]).unwrap(), vec![3, 1]);
        let out = transcript(&c);
        assert!(out.contains("Кубок області"));
        assert!(out.contains("'a' is not an event number"));
    }

    #[test]
    fn end_of_input_selects_no_events() {
        let mut c = console("");
        assert!(c.prompt_event_numbers(&[event()]).unwrap().is_empty());
    }

    #[test]
    fn menu_offers_withdrawable_combinations() {
        let mut excluded = outcome("2250", 0);
        excluded.status = CategoryStatus::Excluded;
        let outcomes = vec![outcome("2210", 201_212), outcome("2240", 15_000), excluded];

        // 9 is out of range, 3 is 2210 + 2240
        let mut c = console("9\n3\n");
        let selection = c.select_categories(&event(), &outcomes);
        assert_eq!(selection.categories, vec!["2210", "2240"]);

        let out = transcript(&c);
        assert!(out.contains("1) 2210  (2 012.12)"));
        assert!(out.contains("3) 2210 + 2240  (2 162.12)"));
        assert!(out.contains("0) skip event"));
        assert!(out.contains("choose a number from 0 to 3"));
        assert!(!out.contains("2250  ("));
    }

    #[test]
    fn skip_and_end_of_input_select_nothing() {
        let outcomes = vec![outcome("2210", 100)];
        let mut c = console("0\n");
        assert!(c.select_categories(&event(), &outcomes).categories.is_empty());
        let mut c = console("");
        assert!(c.select_categories(&event(), &outcomes).categories.is_empty());
    }

    #[test]
    fn yes_no_questions() {
        let single = SingleItemQuestion {
            event_number: 4,
            category: "2250".into(),
            item: item("Медалі", 150_000),
            remainder_cents: 98_000,
        };
        let mut c = console("maybe\nтак\n");
        assert!(c.confirm_single_item(&single));
        let out = transcript(&c);
        assert!(out.contains("remainder 980.00"));
        assert!(out.contains("answer y or n"));

        let discrepancy = DiscrepancyQuestion {
            event_number: 4,
            category: "2210".into(),
            residual_cents: 201_212,
            remainder_cents: 198_788,
            delta_cents: 2_424,
        };
        assert!(!console("n\n").accept_discrepancy(&discrepancy));
        assert!(console("Y\n").accept_discrepancy(&discrepancy));
        assert!(!console("").accept_discrepancy(&discrepancy));
    }
}

//! Plain-text session report. Display rounding happens only here.

use idle_core::ObjectiveKind;
use idle_objectives::progress_of;
use idle_runtime::Game;
use std::fmt;

/// Round to a whole cookie and abbreviate large magnitudes (K, M, B).
pub fn format_count(value: f64) -> String {
    let n = value.round();
    if n >= 1e9 {
        format!("{:.1}B", n / 1e9)
    } else if n >= 1e6 {
        format!("{:.1}M", n / 1e6)
    } else if n >= 1e3 {
        format!("{:.1}K", n / 1e3)
    } else {
        format!("{}", n as i64)
    }
}

fn progress_text(game: &Game, kind: ObjectiveKind, target: f64) -> String {
    let value = progress_of(kind, game.economy());
    match kind {
        ObjectiveKind::Count => format!("{}/{}", value.round() as i64, target),
        ObjectiveKind::Income => format!("{value:.1}/{target}"),
        ObjectiveKind::Upgrades => format!("{}/{}", value as u64, target),
    }
}

/// Snapshot of a session at elapsed time `now`, ready to print.
pub struct Report<'a> {
    pub game: &'a Game,
    pub now: f64,
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let econ = self.game.economy();
        writeln!(
            f,
            "Cookies: {} | Income: {:.1}/s | Prestige: {} ({:.1}x)",
            format_count(econ.balance()),
            econ.effective_income(),
            econ.prestige_level(),
            econ.prestige_multiplier()
        )?;
        writeln!(f, "== UPGRADES ==")?;
        for u in econ.upgrades() {
            let name = if u.level() > 0 { u.name() } else { "???" };
            writeln!(
                f,
                "  {:<10} lvl {:>4} | next {:>8} | {} x {}/s",
                name,
                u.level(),
                format_count(u.price() as f64),
                u.level(),
                u.spec().income_per_level
            )?;
        }

        let book = self.game.objectives();
        writeln!(f, "== OBJECTIVES ==")?;
        for o in book.objectives().iter().filter(|o| !o.is_completed()) {
            let spec = o.spec();
            writeln!(f, "- {}", spec.description)?;
            writeln!(f, "  {}", progress_text(self.game, spec.kind, spec.target))?;
        }
        writeln!(f, "== TIMED OBJECTIVES ==")?;
        for t in book.timed().iter().filter(|t| !t.is_completed()) {
            let spec = t.spec();
            let left = t.remaining(self.now).unwrap_or(spec.time_limit);
            writeln!(f, "- {}", spec.description)?;
            writeln!(
                f,
                "  {} | Time: {:.1}s",
                progress_text(self.game, ObjectiveKind::Count, spec.target),
                left
            )?;
        }
        write!(
            f,
            "Completed: {}/{}",
            book.completed_count(),
            book.objectives().len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idle_core::GameConfig;
    use proptest::prelude::*;

    #[test]
    fn small_counts_are_whole_numbers() {
        assert_eq!(format_count(0.0), "0");
        assert_eq!(format_count(999.4), "999");
        assert_eq!(format_count(12.6), "13");
    }

    #[test]
    fn large_counts_are_abbreviated() {
        assert_eq!(format_count(1_500.0), "1.5K");
        assert_eq!(format_count(2_000_000.0), "2.0M");
        assert_eq!(format_count(3_100_000_000.0), "3.1B");
    }

    #[test]
    fn report_lists_open_objectives() {
        let mut game = Game::new(&GameConfig::default());
        game.click();
        let text = Report { game: &game, now: 0.0 }.to_string();
        assert!(text.contains("Cookies: 1 |"));
        assert!(text.contains("Bake 100 cookies"));
        assert!(text.contains("1/100"));
        assert!(text.contains("Time: 30.0s"));
        assert!(text.ends_with("Completed: 0/4"));
    }

    #[test]
    fn formatting_never_touches_the_balance() {
        let mut game = Game::new(&GameConfig::default());
        for _ in 0..1_234 {
            game.click();
        }
        let _ = Report { game: &game, now: 0.0 }.to_string();
        assert_eq!(game.economy().balance(), 1_234.0);
    }

    proptest! {
        #[test]
        fn abbreviation_has_one_decimal(n in 1_000.0f64..1e12) {
            let s = format_count(n);
            let digits = s.trim_end_matches(['K', 'M', 'B']);
            prop_assert!(s.len() > digits.len());
            prop_assert_eq!(digits.split('.').nth(1).map(str::len), Some(1));
        }
    }
}

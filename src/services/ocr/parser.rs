use regex::Regex;
use std::sync::LazyLock;

/// Lowest value accepted by the last-resort "largest number" strategy
pub const PLAUSIBLE_MIN: u32 = 100;
/// Highest value accepted by the last-resort "largest number" strategy
pub const PLAUSIBLE_MAX: u32 = 3000;

/// Strategy that produced a parsed value, in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    /// 3-4 digit token with non-digit (or text) boundaries on both sides
    BoundedToken,
    /// First 3-4 digit run anywhere in the text
    DigitRun,
    /// Digit run found after applying one glyph repair rule
    Repaired(&'static str),
    /// Largest digit run inside the plausibility band
    LargestPlausible,
}

/// One OCR-confusable glyph fix, applied to every match in the text
#[derive(Debug, Clone, Copy)]
pub struct RepairRule {
    pub name: &'static str,
    pub pattern: &'static str,
    pub replacement: &'static str,
}

/// Glyph repairs, tried one at a time in this order
pub const REPAIR_RULES: &[RepairRule] = &[
    // S64 -> 864, B72 -> 872
    RepairRule {
        name: "leading S/B as 8",
        pattern: r"[SB]([0-9]{2,3})",
        replacement: "8${1}",
    },
    // 86 4 -> 864
    RepairRule {
        name: "split digits",
        pattern: r"([0-9]+)\s+([0-9]+)",
        replacement: "${1}${2}",
    },
    RepairRule {
        name: "leading O as 0",
        pattern: r"O([0-9]{2,3})",
        replacement: "0${1}",
    },
    RepairRule {
        name: "leading G as 6",
        pattern: r"[Gg]([0-9]{2,3})",
        replacement: "6${1}",
    },
    RepairRule {
        name: "leading l/I as 1",
        pattern: r"[lI]([0-9]{2,3})",
        replacement: "1${1}",
    },
    RepairRule {
        name: "trailing l/I as 1",
        pattern: r"([0-9]{2,3})[lI]",
        replacement: "${1}1",
    },
];

static BOUNDED_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^0-9])([0-9]{3,4})(?:[^0-9]|$)").expect("valid bounded token regex"));

static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{3,4}").expect("valid digit run regex"));

static ANY_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+").expect("valid digits regex"));

static COMPILED_RULES: LazyLock<Vec<(RepairRule, Regex)>> = LazyLock::new(|| {
    REPAIR_RULES
        .iter()
        .map(|rule| {
            let re = Regex::new(rule.pattern).expect("valid repair rule regex");
            (*rule, re)
        })
        .collect()
});

/// Parse a metric value out of raw recognizer text
///
/// Pure and deterministic. Returns `None` when no strategy yields a value.
pub fn parse_value(text: &str, max_value: u32) -> Option<u32> {
    parse_value_with_strategy(text, max_value).map(|(value, _)| value)
}

/// Same as [`parse_value`], also reporting which strategy matched
pub fn parse_value_with_strategy(text: &str, max_value: u32) -> Option<(u32, ParseStrategy)> {
    if text.trim().is_empty() {
        return None;
    }

    if let Some(value) = bounded_token(text) {
        return Some((value, ParseStrategy::BoundedToken));
    }

    if let Some(value) = first_digit_run(text) {
        return Some((value, ParseStrategy::DigitRun));
    }

    for (rule, re) in COMPILED_RULES.iter() {
        if let Some(value) = apply_repair(re, rule, text) {
            if (1..=max_value).contains(&value) {
                return Some((value, ParseStrategy::Repaired(rule.name)));
            }
        }
    }

    largest_plausible(text).map(|value| (value, ParseStrategy::LargestPlausible))
}

/// Apply a single repair rule and look for a digit run in the result
pub fn apply_repair(re: &Regex, rule: &RepairRule, text: &str) -> Option<u32> {
    let fixed = re.replace_all(text, rule.replacement);
    if fixed == text {
        return None;
    }
    first_digit_run(&fixed)
}

/// Every digit run of at least `min_len` digits, in order of appearance
pub fn digit_runs(text: &str, min_len: usize) -> Vec<u32> {
    ANY_DIGITS
        .find_iter(text)
        .filter(|m| m.as_str().len() >= min_len)
        .filter_map(|m| m.as_str().parse::<u32>().ok())
        .collect()
}

fn bounded_token(text: &str) -> Option<u32> {
    BOUNDED_TOKEN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn first_digit_run(text: &str) -> Option<u32> {
    DIGIT_RUN
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}

fn largest_plausible(text: &str) -> Option<u32> {
    digit_runs(text, 1)
        .into_iter()
        .filter(|v| (PLAUSIBLE_MIN..=PLAUSIBLE_MAX).contains(v))
        .max()
}

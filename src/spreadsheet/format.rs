//! Number formats: classifying format codes, rendering numbers the way a
//! spreadsheet displays them, and converting between Excel serial dates and
//! chrono values.

use chrono::Datelike;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use chrono::Timelike;

pub const FORMAT_GENERAL: &str = "General";
pub const FORMAT_DATE: &str = "yyyy-mm-dd";
pub const FORMAT_DATETIME: &str = "yyyy-mm-dd hh:mm:ss";
pub const FORMAT_TIME: &str = "hh:mm:ss";

/// Built-in number formats every XLSX consumer knows by id.
const BUILTIN_FORMATS: [(u32, &str); 27] = [
    (0, "General"),
    (1, "0"),
    (2, "0.00"),
    (3, "#,##0"),
    (4, "#,##0.00"),
    (9, "0%"),
    (10, "0.00%"),
    (11, "0.00E+00"),
    (12, "# ?/?"),
    (13, "# ??/??"),
    (14, "mm-dd-yy"),
    (15, "d-mmm-yy"),
    (16, "d-mmm"),
    (17, "mmm-yy"),
    (18, "h:mm AM/PM"),
    (19, "h:mm:ss AM/PM"),
    (20, "h:mm"),
    (21, "h:mm:ss"),
    (22, "m/d/yy h:mm"),
    (37, "#,##0 ;(#,##0)"),
    (38, "#,##0 ;[Red](#,##0)"),
    (39, "#,##0.00;(#,##0.00)"),
    (40, "#,##0.00;[Red](#,##0.00)"),
    (45, "mm:ss"),
    (46, "[h]:mm:ss"),
    (47, "mmss.0"),
    (49, "@"),
];

/// Id of the first custom number format in a styles part.
pub(crate) const FIRST_CUSTOM_FORMAT_ID: u32 = 164;

pub(crate) fn builtin_format_code(id: u32) -> Option<&'static str> {
    BUILTIN_FORMATS
        .iter()
        .find(|(builtin, _)| *builtin == id)
        .map(|(_, code)| *code)
}

pub(crate) fn builtin_format_id(code: &str) -> Option<u32> {
    BUILTIN_FORMATS
        .iter()
        .find(|(_, builtin)| *builtin == code)
        .map(|(id, _)| *id)
}

/// Broad category of a number format code.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FormatKind {
    General,
    Number,
    Text,
    Date,
    Time,
    DateTime,
}

impl FormatKind {
    /// Detects date/time placeholders outside quoted literals, escapes and
    /// bracketed sections.
    pub fn classify(code: &str) -> Self {
        if code.is_empty() || code.eq_ignore_ascii_case(FORMAT_GENERAL) {
            return Self::General;
        }
        if code == "@" {
            return Self::Text;
        }

        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut is_date = false;
        let mut is_time = false;
        for character in code.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' | '*' if !is_literal => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_literal && !is_bracket => is_literal = true,

                ']' if is_bracket => is_bracket = false,
                '[' if !is_bracket && !is_literal => is_bracket = true,
                _ if is_literal || is_bracket => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        // elapsed time formats like "[h]:mm:ss" only carry the unit inside brackets
        if !is_date && !is_time && is_elapsed(code) {
            is_time = true;
        }

        match (is_date, is_time) {
            (true, true) => Self::DateTime,
            (true, false) => Self::Date,
            (false, true) => Self::Time,
            (false, false) => Self::Number,
        }
    }
}

fn is_elapsed(code: &str) -> bool {
    let lower = code.to_ascii_lowercase();
    ["[h]", "[hh]", "[m]", "[mm]", "[s]", "[ss]"]
        .iter()
        .any(|unit| lower.contains(unit))
}

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).expect("NaiveDate Literal")
}

/// Converts an Excel serial number to a date-time.
/// Serials below 60 are shifted by one day to undo the Lotus 1-2-3 leap year bug.
pub fn excel_to_datetime(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let mut days = serial.floor() as i64;
    let mut millis = ((serial - serial.floor()) * 86_400_000f64).round() as i64;
    if millis >= 86_400_000 {
        days = days.checked_add(1)?;
        millis -= 86_400_000;
    }
    let offset = if is_1904 {
        1462
    } else if days < 60 {
        1
    } else {
        0
    };
    let date = base_date().checked_add_signed(Duration::try_days(days.checked_add(offset)?)?)?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(
        (millis / 1_000) as u32,
        ((millis % 1_000) * 1_000_000) as u32,
    )?;
    Some(date.and_time(time))
}

/// Parses `2017-01-01T08:30:00` or a bare `2017-01-01`.
pub(crate) fn parse_iso_datetime(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Converts a date-time to an Excel serial number.
pub fn datetime_to_excel(datetime: NaiveDateTime, is_1904: bool) -> f64 {
    let days = (datetime.date() - base_date()).num_days();
    let serial = if is_1904 {
        days - 1462
    } else if days <= 60 {
        days - 1
    } else {
        days
    };
    serial as f64 + time_to_excel(datetime.time())
}

pub fn date_to_excel(date: NaiveDate, is_1904: bool) -> f64 {
    datetime_to_excel(date.and_time(NaiveTime::MIN), is_1904)
}

/// Fraction of a day.
pub fn time_to_excel(time: NaiveTime) -> f64 {
    let seconds = time.num_seconds_from_midnight() as f64 + time.nanosecond() as f64 / 1e9;
    seconds / 86_400f64
}

/// Renders a number with the given format code.
pub fn format_number(value: f64, code: &str, is_1904: bool) -> String {
    let sections = split_sections(code);
    let (section, value) = match sections.as_slice() {
        [_, negative, ..] if value < 0.0 => (negative.as_str(), value.abs()),
        [_, _, zero, ..] if value == 0.0 => (zero.as_str(), value),
        [first, ..] => (first.as_str(), value),
        [] => (FORMAT_GENERAL, value),
    };

    match FormatKind::classify(section) {
        FormatKind::General | FormatKind::Text => format_general(value),
        FormatKind::Date | FormatKind::Time | FormatKind::DateTime => {
            format_temporal(value, section, is_1904).unwrap_or_else(|| format_general(value))
        }
        FormatKind::Number => format_numeric(value, section),
    }
}

/// Integral values print without a fraction; others with at most 15 significant digits.
pub fn format_general(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let rounded = format!("{:.14e}", value).parse::<f64>().unwrap_or(value);
        format!("{}", rounded)
    }
}

/// Splits a format code into its `;` separated sections, ignoring quoted separators.
fn split_sections(code: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();
    let mut is_literal = false;
    let mut is_escaped = false;
    for character in code.chars() {
        match character {
            _ if is_escaped => {
                is_escaped = false;
                current.push(character);
            }
            '\\' => {
                is_escaped = true;
                current.push(character);
            }
            '"' => {
                is_literal = !is_literal;
                current.push(character);
            }
            ';' if !is_literal => sections.push(std::mem::take(&mut current)),
            _ => current.push(character),
        }
    }
    sections.push(current);
    sections
}

#[derive(Clone, Debug, PartialEq)]
enum DateToken {
    Year(usize),
    Month(usize),
    Minute(usize),
    Day(usize),
    Hour(usize),
    Second(usize),
    Elapsed(char),
    Fraction(usize),
    Meridiem { short: bool, lower: bool },
    Literal(String),
}

fn tokenize_temporal(code: &str) -> Vec<DateToken> {
    let characters: Vec<char> = code.chars().collect();
    let mut tokens = Vec::<DateToken>::new();
    let mut index = 0usize;
    let run = |index: usize, target: char| {
        characters[index..]
            .iter()
            .take_while(|character| character.eq_ignore_ascii_case(&target))
            .count()
    };

    while index < characters.len() {
        let character = characters[index];
        match character {
            '"' => {
                let literal: String = characters[index + 1..]
                    .iter()
                    .take_while(|character| **character != '"')
                    .collect();
                index += literal.chars().count() + 2;
                tokens.push(DateToken::Literal(literal));
            }
            '\\' => {
                if let Some(next) = characters.get(index + 1) {
                    tokens.push(DateToken::Literal(next.to_string()));
                }
                index += 2;
            }
            '_' => {
                tokens.push(DateToken::Literal(" ".to_owned()));
                index += 2;
            }
            '*' => index += 2,
            '[' => {
                let content: String = characters[index + 1..]
                    .iter()
                    .take_while(|character| **character != ']')
                    .collect();
                index += content.chars().count() + 2;
                let lower = content.to_ascii_lowercase();
                if let Some(unit) = lower.chars().next().filter(|unit| "hms".contains(*unit)) {
                    if lower.chars().all(|character| character == unit) {
                        tokens.push(DateToken::Elapsed(unit));
                    }
                }
            }
            'y' | 'Y' => {
                let count = run(index, 'y');
                tokens.push(DateToken::Year(count));
                index += count;
            }
            'm' | 'M' => {
                let count = run(index, 'm');
                tokens.push(DateToken::Month(count));
                index += count;
            }
            'd' | 'D' => {
                let count = run(index, 'd');
                tokens.push(DateToken::Day(count));
                index += count;
            }
            'h' | 'H' => {
                let count = run(index, 'h');
                tokens.push(DateToken::Hour(count));
                index += count;
            }
            's' | 'S' => {
                let count = run(index, 's');
                tokens.push(DateToken::Second(count));
                index += count;
            }
            'a' | 'A' => {
                let rest: String = characters[index..].iter().take(5).collect();
                if rest.eq_ignore_ascii_case("am/pm") {
                    tokens.push(DateToken::Meridiem { short: false, lower: character == 'a' });
                    index += 5;
                } else if rest.get(..3).map(|short| short.eq_ignore_ascii_case("a/p")).unwrap_or(false) {
                    tokens.push(DateToken::Meridiem { short: true, lower: character == 'a' });
                    index += 3;
                } else {
                    tokens.push(DateToken::Literal(character.to_string()));
                    index += 1;
                }
            }
            '.' if matches!(tokens.last(), Some(DateToken::Second(_)) | Some(DateToken::Elapsed('s')))
                && characters.get(index + 1) == Some(&'0') =>
            {
                let count = run(index + 1, '0');
                tokens.push(DateToken::Fraction(count));
                index += count + 1;
            }
            _ => {
                tokens.push(DateToken::Literal(character.to_string()));
                index += 1;
            }
        }
    }

    // "m" means minutes right after an hour or right before a second
    let placeholders: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, token)| !matches!(token, DateToken::Literal(_)))
        .map(|(index, _)| index)
        .collect();
    for (position, &index) in placeholders.iter().enumerate() {
        if let DateToken::Month(count) = tokens[index] {
            if count > 2 {
                continue;
            }
            let after_hour = position > 0
                && matches!(tokens[placeholders[position - 1]], DateToken::Hour(_) | DateToken::Elapsed('h'));
            let before_second = placeholders
                .get(position + 1)
                .map(|next| matches!(tokens[*next], DateToken::Second(_) | DateToken::Elapsed('s')))
                .unwrap_or(false);
            if after_hour || before_second {
                tokens[index] = DateToken::Minute(count);
            }
        }
    }
    tokens
}

fn format_temporal(serial: f64, code: &str, is_1904: bool) -> Option<String> {
    let tokens = tokenize_temporal(code);
    let has_fraction = tokens.iter().any(|token| matches!(token, DateToken::Fraction(_)));
    let has_meridiem = tokens.iter().any(|token| matches!(token, DateToken::Meridiem { .. }));
    let serial = if has_fraction {
        serial
    } else {
        (serial * 86_400f64).round() / 86_400f64
    };
    let datetime = excel_to_datetime(serial, is_1904)?;

    let mut text = String::new();
    for token in &tokens {
        match token {
            DateToken::Year(count) if *count <= 2 => text.push_str(&format!("{:02}", datetime.year() % 100)),
            DateToken::Year(_) => text.push_str(&format!("{:04}", datetime.year())),
            DateToken::Month(1) => text.push_str(&datetime.month().to_string()),
            DateToken::Month(2) => text.push_str(&format!("{:02}", datetime.month())),
            DateToken::Month(3) => text.push_str(&datetime.format("%b").to_string()),
            DateToken::Month(4) => text.push_str(&datetime.format("%B").to_string()),
            DateToken::Month(_) => text.push_str(&datetime.format("%B").to_string()[..1]),
            DateToken::Day(1) => text.push_str(&datetime.day().to_string()),
            DateToken::Day(2) => text.push_str(&format!("{:02}", datetime.day())),
            DateToken::Day(3) => text.push_str(&datetime.format("%a").to_string()),
            DateToken::Day(_) => text.push_str(&datetime.format("%A").to_string()),
            DateToken::Hour(count) => {
                let hour = if has_meridiem {
                    match datetime.hour() % 12 {
                        0 => 12,
                        hour => hour,
                    }
                } else {
                    datetime.hour()
                };
                text.push_str(&pad(hour, *count));
            }
            DateToken::Minute(count) => text.push_str(&pad(datetime.minute(), *count)),
            DateToken::Second(count) => text.push_str(&pad(datetime.second(), *count)),
            DateToken::Elapsed(unit) => {
                let elapsed = match unit {
                    'h' => (serial * 24f64).floor(),
                    'm' => (serial * 1_440f64).floor(),
                    _ => (serial * 86_400f64).round(),
                };
                text.push_str(&format!("{}", elapsed as i64));
            }
            DateToken::Fraction(count) => {
                let millis = format!("{:03}", datetime.nanosecond() / 1_000_000);
                let digits: String = millis.chars().chain(std::iter::repeat('0')).take(*count).collect();
                text.push('.');
                text.push_str(&digits);
            }
            DateToken::Meridiem { short, lower } => {
                let marker = match (datetime.hour() < 12, short) {
                    (true, false) => "AM",
                    (false, false) => "PM",
                    (true, true) => "A",
                    (false, true) => "P",
                };
                if *lower {
                    text.push_str(&marker.to_ascii_lowercase());
                } else {
                    text.push_str(marker);
                }
            }
            DateToken::Literal(literal) => text.push_str(literal),
        }
    }
    Some(text)
}

fn pad(value: u32, count: usize) -> String {
    if count >= 2 {
        format!("{:02}", value)
    } else {
        value.to_string()
    }
}

/// Renders plain numeric formats: digit placeholders, decimals, thousands
/// separators, percent and literal affixes. Scientific notation falls back to
/// the general format.
fn format_numeric(value: f64, code: &str) -> String {
    let mut prefix = String::new();
    let mut body = String::new();
    let mut suffix = String::new();
    let mut is_percent = false;

    let characters: Vec<char> = code.chars().collect();
    let mut index = 0usize;
    while index < characters.len() {
        let character = characters[index];
        let literal = match character {
            '"' => {
                let literal: String = characters[index + 1..]
                    .iter()
                    .take_while(|character| **character != '"')
                    .collect();
                index += literal.chars().count() + 2;
                Some(literal)
            }
            '\\' => {
                index += 2;
                characters.get(index - 1).map(|next| next.to_string())
            }
            '_' => {
                index += 2;
                Some(" ".to_owned())
            }
            '*' => {
                index += 2;
                None
            }
            '[' => {
                index += characters[index..].iter().take_while(|character| **character != ']').count() + 1;
                None
            }
            'E' | 'e' if matches!(characters.get(index + 1), Some('+') | Some('-')) => {
                return format_general(value);
            }
            '0' | '#' | '?' | '.' | ',' if suffix.is_empty() => {
                body.push(character);
                index += 1;
                None
            }
            '%' => {
                is_percent = true;
                index += 1;
                Some("%".to_owned())
            }
            _ => {
                index += 1;
                Some(character.to_string())
            }
        };
        if let Some(literal) = literal {
            if body.is_empty() {
                prefix.push_str(&literal);
            } else {
                suffix.push_str(&literal);
            }
        }
    }

    let value = if is_percent { value * 100f64 } else { value };
    let (integer_pattern, decimal_pattern) = body.split_once('.').unwrap_or((body.as_str(), ""));
    let decimals = decimal_pattern.chars().filter(|character| matches!(character, '0' | '#' | '?')).count();
    let required_decimals = decimal_pattern.chars().filter(|character| *character == '0').count();
    let required_integers = integer_pattern.chars().filter(|character| *character == '0').count();
    let is_grouped = integer_pattern.trim_end_matches(',').contains(',');

    let rounded = format!("{:.*}", decimals, value.abs());
    let (integer, fraction) = rounded.split_once('.').unwrap_or((rounded.as_str(), ""));
    let mut fraction = fraction.to_owned();
    while fraction.len() > required_decimals && fraction.ends_with('0') {
        fraction.pop();
    }

    let mut integer = integer.trim_start_matches('0').to_owned();
    while integer.len() < required_integers {
        integer.insert(0, '0');
    }
    if is_grouped {
        integer = group_thousands(&integer);
    }

    let is_zero = rounded.chars().all(|character| matches!(character, '0' | '.'));
    let mut text = String::new();
    if value < 0.0 && !is_zero {
        text.push('-');
    }
    text.push_str(&prefix);
    text.push_str(&integer);
    if !fraction.is_empty() {
        text.push('.');
        text.push_str(&fraction);
    }
    text.push_str(&suffix);
    text
}

fn group_thousands(digits: &str) -> String {
    let length = digits.len();
    let mut grouped = String::with_capacity(length + length / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (length - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

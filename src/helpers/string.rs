//! String inflection utilities used to derive table names from workbook and
//! worksheet identities. All functions are pure.

use deunicode::deunicode_char;
use regex::Regex;
use std::sync::LazyLock;

/// Pluralization rules, tried in order; the first match wins.
static PLURAL_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)(s)tatus$", "${1}tatuses"),
        (r"(?i)(quiz)$", "${1}zes"),
        (r"(?i)^(ox)$", "${1}en"),
        (r"(?i)([ml])ouse$", "${1}ice"),
        (r"(?i)(matr|vert|ind)(ix|ex)$", "${1}ices"),
        (r"(?i)(x|ch|ss|sh)$", "${1}es"),
        (r"(?i)([^aeiouy]|qu)y$", "${1}ies"),
        (r"(?i)(hive)$", "${1}s"),
        (r"(?i)(chef)$", "${1}s"),
        (r"(?i)(?:([^f])fe|([lre])f)$", "${1}${2}ves"),
        (r"(?i)sis$", "ses"),
        (r"(?i)([ti])um$", "${1}a"),
        (r"(?i)(p)erson$", "${1}eople"),
        (r"(?i)(c)hild$", "${1}hildren"),
        (r"(?i)(buffal|tomat)o$", "${1}oes"),
        (r"(?i)(alumn|bacill|cact|foc|fung|nucle|radi|stimul|syllab|termin)us$", "${1}i"),
        (r"(?i)us$", "uses"),
        (r"(?i)(alias)$", "${1}es"),
        (r"(?i)(ax|cris|test)is$", "${1}es"),
        (r"s$", "s"),
        (r"^$", ""),
        (r"$", "s"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).expect("Hardcode regex pattern"), replacement))
    .collect()
});

/// Words that never change in the plural form.
static UNINFLECTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)^(?:.*[nrlm]ese|.*data|.*deer|.*fish|.*measles|.*ois|.*pox|.*sheep|people|feedback|",
        r"stadia|.*?media|chassis|clippers|debris|diabetes|equipment|gallows|graffiti|headquarters|",
        r"information|innings|news|nexus|proceedings|research|series|species|weather)$"
    ))
    .expect("Hardcode regex pattern")
});

/// Irregular singular → plural pairs, matched at the end of the word.
const IRREGULAR: [(&str, &str); 12] = [
    ("atlas", "atlases"),
    ("child", "children"),
    ("foot", "feet"),
    ("goose", "geese"),
    ("man", "men"),
    ("move", "moves"),
    ("person", "people"),
    ("sex", "sexes"),
    ("tooth", "teeth"),
    ("criterion", "criteria"),
    ("genus", "genera"),
    ("cookie", "cookies"),
];

/// Transliterates `value` to ASCII, then replaces every run of non-alphanumeric
/// characters with `replacement` and trims it from both ends.
pub(crate) fn slug(value: &str, replacement: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending = false;
    for character in value.chars() {
        let ascii = deunicode_char(character).unwrap_or_default();
        if ascii.is_empty() {
            pending = true;
        }
        for character in ascii.chars() {
            if !character.is_ascii_alphanumeric() {
                pending = true;
                continue;
            }
            if pending && !slug.is_empty() {
                slug.push_str(replacement);
            }
            pending = false;
            slug.push(character);
        }
    }
    slug
}

/// `hello_world` → `HelloWorld`. Only the first letter of each word is touched.
pub(crate) fn camelize(value: &str) -> String {
    value
        .split('_')
        .map(|word| {
            let mut characters = word.chars();
            match characters.next() {
                Some(first) => first.to_uppercase().chain(characters).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// `HelloWorld` → `hello_world`: an underscore goes before every upper-case
/// letter that follows a word character.
pub(crate) fn underscore(value: &str) -> String {
    let mut result = String::with_capacity(value.len() + 4);
    let mut previous: Option<char> = None;
    for character in value.replace('-', "_").chars() {
        if character.is_uppercase()
            && previous.map(|it| it.is_alphanumeric() || it == '_').unwrap_or(false)
        {
            result.push('_');
        }
        result.extend(character.to_lowercase());
        previous = Some(character);
    }
    result
}

/// English plural of the last word.
pub(crate) fn pluralize(word: &str) -> String {
    if UNINFLECTED.is_match(word) {
        return word.to_owned();
    }
    let lower = word.to_ascii_lowercase();
    for (singular, plural) in IRREGULAR {
        if let Some(prefix) = lower.strip_suffix(singular) {
            if prefix.is_empty() || prefix.ends_with('_') {
                // keep the caller's casing of the first irregular letter
                let start = prefix.len();
                let first = &word[start..start + 1];
                return format!("{}{}{}", &word[..start], first, &plural[1..]);
            }
        }
    }
    for (rule, replacement) in PLURAL_RULES.iter() {
        if rule.is_match(word) {
            return rule.replace(word, *replacement).into_owned();
        }
    }
    word.to_owned()
}

/// `UserProfile` → `user_profiles`
pub(crate) fn tableize(value: &str) -> String {
    pluralize(&underscore(value))
}

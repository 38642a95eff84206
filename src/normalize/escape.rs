//! Unicode to LaTeX escaping, and the reverse folding to ASCII used for citation keys.
use std::collections::HashMap;

use lazy_static::lazy_static;

lazy_static! {
    static ref ESCAPES: HashMap<char, &'static str> = {
        let pairs: Vec<(char, &'static str)> = vec![
            // Umlaut
            ('ä', "{\\\"a}"), ('Ä', "{\\\"A}"),
            ('ë', "{\\\"e}"), ('Ë', "{\\\"E}"),
            ('ï', "{\\\"i}"), ('Ï', "{\\\"I}"),
            ('ö', "{\\\"o}"), ('Ö', "{\\\"O}"),
            ('ü', "{\\\"u}"), ('Ü', "{\\\"U}"),
            ('ÿ', "{\\\"y}"), ('Ÿ', "{\\\"Y}"),

            // Acute accent
            ('á', "{\\'a}"), ('Á', "{\\'A}"),
            ('é', "{\\'e}"), ('É', "{\\'E}"),
            ('í', "{\\'i}"), ('Í', "{\\'I}"),
            ('ó', "{\\'o}"), ('Ó', "{\\'O}"),
            ('ú', "{\\'u}"), ('Ú', "{\\'U}"),
            ('ý', "{\\'y}"), ('Ý', "{\\'Y}"),
            ('ć', "{\\'c}"), ('Ć', "{\\'C}"),
            ('ń', "{\\'n}"), ('Ń', "{\\'N}"),
            ('ś', "{\\'s}"), ('Ś', "{\\'S}"),
            ('ź', "{\\'z}"), ('Ź', "{\\'Z}"),

            // Grave accent
            ('à', "{\\`a}"), ('À', "{\\`A}"),
            ('è', "{\\`e}"), ('È', "{\\`E}"),
            ('ì', "{\\`i}"), ('Ì', "{\\`I}"),
            ('ò', "{\\`o}"), ('Ò', "{\\`O}"),
            ('ù', "{\\`u}"), ('Ù', "{\\`U}"),

            // Circumflex
            ('â', "{\\^a}"), ('Â', "{\\^A}"),
            ('ê', "{\\^e}"), ('Ê', "{\\^E}"),
            ('î', "{\\^i}"), ('Î', "{\\^I}"),
            ('ô', "{\\^o}"), ('Ô', "{\\^O}"),
            ('û', "{\\^u}"), ('Û', "{\\^U}"),

            // Tilde
            ('ã', "{\\~a}"), ('Ã', "{\\~A}"),
            ('ñ', "{\\~n}"), ('Ñ', "{\\~N}"),
            ('õ', "{\\~o}"), ('Õ', "{\\~O}"),

            // Cedilla
            ('ç', "{\\c c}"), ('Ç', "{\\c C}"),
            ('ş', "{\\c s}"), ('Ş', "{\\c S}"),

            // Caron
            ('č', "{\\v c}"), ('Č', "{\\v C}"),
            ('ď', "{\\v d}"), ('Ď', "{\\v D}"),
            ('ě', "{\\v e}"), ('Ě', "{\\v E}"),
            ('ň', "{\\v n}"), ('Ň', "{\\v N}"),
            ('ř', "{\\v r}"), ('Ř', "{\\v R}"),
            ('š', "{\\v s}"), ('Š', "{\\v S}"),
            ('ť', "{\\v t}"), ('Ť', "{\\v T}"),
            ('ž', "{\\v z}"), ('Ž', "{\\v Z}"),

            // Double acute and ring
            ('ő', "{\\H o}"), ('Ő', "{\\H O}"),
            ('ű', "{\\H u}"), ('Ű', "{\\H U}"),
            ('ů', "{\\r u}"), ('Ů', "{\\r U}"),
            ('å', "{\\aa}"), ('Å', "{\\AA}"),

            // Letters
            ('ß', "{\\ss}"),
            ('æ', "{\\ae}"), ('Æ', "{\\AE}"),
            ('œ', "{\\oe}"), ('Œ', "{\\OE}"),
            ('ø', "{\\o}"), ('Ø', "{\\O}"),
            ('ł', "{\\l}"), ('Ł', "{\\L}"),
            ('ı', "{\\i}"),

            // Greek
            ('α', "{$\\alpha$}"), ('β', "{$\\beta$}"),
            ('γ', "{$\\gamma$}"), ('δ', "{$\\delta$}"),
            ('ε', "{$\\epsilon$}"), ('λ', "{$\\lambda$}"),
            ('μ', "{$\\mu$}"), ('π', "{$\\pi$}"),
            ('σ', "{$\\sigma$}"), ('ω', "{$\\omega$}"),

            // Punctuation and symbols
            ('–', "--"), ('—', "---"),
            ('‘', "`"), ('’', "'"),
            ('“', "``"), ('”', "''"),
            ('…', "{\\ldots}"),
            ('¡', "{!`}"), ('¿', "{?`}"),
            ('«', "{\\guillemotleft}"), ('»', "{\\guillemotright}"),
            ('§', "{\\S}"), ('¶', "{\\P}"),
            ('©', "{\\textcopyright}"), ('®', "{\\textregistered}"),
            ('™', "{\\texttrademark}"), ('°', "{\\textdegree}"),
            ('€', "{\\texteuro}"), ('£', "{\\pounds}"),
            ('&', "\\&"), ('%', "\\%"),
        ];
        pairs.into_iter().collect()
    };
}

/// The LaTeX replacement of a character, if it has one.
pub fn latex_for(c: char) -> Option<&'static str> {
    ESCAPES.get(&c).copied()
}

/// Length in bytes of the `\command` at the start of `s`: a backslash followed by a run of
/// ASCII letters or by a single other character.
fn command_len(s: &str) -> usize {
    let rest = &s[1..];
    let letters = rest.bytes().take_while(u8::is_ascii_alphabetic).count();
    if letters > 0 {
        1 + letters
    } else {
        1 + rest.chars().next().map_or(0, char::len_utf8)
    }
}

/// Replace special characters with LaTeX sequences. Existing commands and `$math$` are
/// copied unchanged.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;

    while let Some(c) = text[pos..].chars().next() {
        match c {
            '\\' => {
                let len = command_len(&text[pos..]);
                out.push_str(&text[pos..pos + len]);
                pos += len;
            }
            '$' => {
                let end = text[pos + 1..]
                    .find('$')
                    .map_or(text.len(), |offset| pos + 1 + offset + 1);
                out.push_str(&text[pos..end]);
                pos = end;
            }
            c => {
                match latex_for(c) {
                    Some(latex) => out.push_str(latex),
                    None => out.push(c),
                }
                pos += c.len_utf8();
            }
        }
    }
    out
}

/// ASCII letters standing for a letter with a LaTeX escape, e.g. `u` for `ü` and `ss`
/// for `ß`.
fn fold_letter(c: char) -> Option<String> {
    let latex = latex_for(c)?;
    let inner = latex.trim_matches(|c| matches!(c, '{' | '}' | '$'));
    let command = inner.strip_prefix('\\')?;
    let name_len = command.bytes().take_while(u8::is_ascii_alphabetic).count();
    let rest: String = command[name_len..]
        .chars()
        .filter(char::is_ascii_alphabetic)
        .collect();
    if rest.is_empty() {
        Some(command[..name_len].to_string())
    } else {
        Some(rest)
    }
}

/// Commands which stand for letters rather than decorating them.
const LETTER_COMMANDS: &[&str] = &[
    "ss", "ae", "AE", "oe", "OE", "o", "O", "l", "L", "aa", "AA", "i", "j",
];

/// Reduce LaTeX text to plain ASCII: commands and braces are dropped, letter commands
/// such as `\ss` are kept as letters and accented letters are folded to their base.
/// Characters which cannot be folded are dropped; whitespace is kept.
pub fn fold_ascii(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;

    while let Some(c) = text[pos..].chars().next() {
        match c {
            '\\' => {
                let len = command_len(&text[pos..]);
                let name = &text[pos + 1..pos + len];
                if LETTER_COMMANDS.contains(&name) {
                    out.push_str(name);
                }
                pos += len;
            }
            '{' | '}' | '$' => pos += 1,
            c if c.is_ascii() => {
                out.push(c);
                pos += 1;
            }
            c => {
                if c.is_whitespace() {
                    out.push(' ');
                } else if c.is_alphabetic() {
                    if let Some(letters) = fold_letter(c) {
                        out.push_str(&letters);
                    }
                }
                pos += c.len_utf8();
            }
        }
    }
    out
}

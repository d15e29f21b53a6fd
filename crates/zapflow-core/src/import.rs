//! Contact spreadsheet import (CSV)
//!
//! Headers are matched loosely: lowercased, trimmed, spaces turned into
//! underscores. Columns other than name/phone/email are kept as custom
//! fields.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use zapflow_common::{Error, Result};

/// Country code added to national numbers
const DEFAULT_COUNTRY_CODE: &str = "55";

/// Shortest phone (in digits) accepted
const MIN_PHONE_DIGITS: usize = 10;

const NAME_HEADERS: &[&str] = &["nome", "name"];
const PHONE_HEADERS: &[&str] = &["numero", "telefone", "phone"];
const EMAIL_HEADERS: &[&str] = &["email", "e-mail"];

/// One valid row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedContact {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub custom_fields: Map<String, Value>,
}

/// Parsed file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedImport {
    pub contacts: Vec<ParsedContact>,
    /// Non-empty data rows
    pub total: usize,
    /// Rows without a name or with a too short phone
    pub invalid: usize,
}

/// Reduce to digits and add the country code to 10/11 digit numbers
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 10 || digits.len() == 11 {
        format!("{}{}", DEFAULT_COUNTRY_CODE, digits)
    } else {
        digits
    }
}

fn normalize_header(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Pick the separator used by the header row (spreadsheet exports in
/// pt-BR locales use `;`)
fn detect_delimiter(header: &str) -> char {
    [',', ';', '\t']
        .into_iter()
        .max_by_key(|d| header.matches(*d).count())
        .filter(|d| header.contains(*d))
        .unwrap_or(',')
}

fn split_line(line: &str, delimiter: char) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    // Escaped quote
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(ch);
            }
        } else if ch == '"' {
            in_quotes = true;
        } else if ch == delimiter {
            result.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    result.push(current);
    result
}

/// First header containing any of `names`
fn find_column(headers: &[String], names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|name| h.contains(name)))
}

/// Parse an uploaded contact file
pub fn parse_contacts(data: &[u8]) -> Result<ParsedImport> {
    let text = std::str::from_utf8(data)
        .map_err(|_| Error::Validation("File must be UTF-8 encoded CSV".to_string()))?;
    let text = text.trim_start_matches('\u{feff}');

    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header_line = lines
        .next()
        .ok_or_else(|| Error::Validation("The uploaded file is empty".to_string()))?;

    let delimiter = detect_delimiter(header_line);
    let headers: Vec<String> = split_line(header_line, delimiter)
        .iter()
        .map(|h| normalize_header(h))
        .collect();

    let name_col = find_column(&headers, NAME_HEADERS).ok_or_else(|| {
        Error::Validation("Missing name column (expected \"nome\" or \"name\")".to_string())
    })?;
    let phone_col = find_column(&headers, PHONE_HEADERS).ok_or_else(|| {
        Error::Validation(
            "Missing phone column (expected \"numero\", \"telefone\" or \"phone\")".to_string(),
        )
    })?;
    let email_col = find_column(&headers, EMAIL_HEADERS);

    let mut parsed = ParsedImport::default();

    for line in lines {
        parsed.total += 1;
        let values = split_line(line, delimiter);
        let value = |i: usize| values.get(i).map(|v| v.trim()).unwrap_or("");

        let name = value(name_col);
        let phone = normalize_phone(value(phone_col));
        if name.is_empty() || phone.len() < MIN_PHONE_DIGITS {
            parsed.invalid += 1;
            continue;
        }

        let email = email_col
            .map(value)
            .filter(|e| !e.is_empty())
            .map(str::to_string);

        let mut custom_fields = Map::new();
        for (i, header) in headers.iter().enumerate() {
            if i == name_col || i == phone_col || Some(i) == email_col || header.is_empty() {
                continue;
            }
            let v = value(i);
            if !v.is_empty() {
                custom_fields.insert(header.clone(), Value::String(v.to_string()));
            }
        }

        parsed.contacts.push(ParsedContact {
            name: name.to_string(),
            phone,
            email,
            custom_fields,
        });
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("(11) 99999-0000"), "5511999990000");
        assert_eq!(normalize_phone("11 3333-4444"), "551133334444");
        assert_eq!(normalize_phone("+55 11 99999-0000"), "5511999990000");
        assert_eq!(normalize_phone("12345"), "12345");
    }

    #[test]
    fn test_parse_contacts() {
        let csv = "Nome,Telefone,E-mail,Cidade Natal\n\
                   Ana,(11) 99999-0001,ana@example.com,Recife\n\
                   Bruno,11999990002,,\n\
                   ,11999990003,,\n\
                   Carla,123,,\n";

        let parsed = parse_contacts(csv.as_bytes()).unwrap();
        assert_eq!(parsed.total, 4);
        assert_eq!(parsed.invalid, 2);
        assert_eq!(parsed.contacts.len(), 2);

        let ana = &parsed.contacts[0];
        assert_eq!(ana.name, "Ana");
        assert_eq!(ana.phone, "5511999990001");
        assert_eq!(ana.email.as_deref(), Some("ana@example.com"));
        assert_eq!(
            ana.custom_fields.get("cidade_natal"),
            Some(&Value::String("Recife".to_string()))
        );

        let bruno = &parsed.contacts[1];
        assert_eq!(bruno.email, None);
        assert!(bruno.custom_fields.is_empty());
    }

    #[test]
    fn test_semicolon_and_quotes() {
        let csv = "\u{feff}name;phone;notes\n\"Silva; Ana\";5511999990001;\"said \"\"hi\"\"\"\n";
        let parsed = parse_contacts(csv.as_bytes()).unwrap();
        assert_eq!(parsed.contacts.len(), 1);
        assert_eq!(parsed.contacts[0].name, "Silva; Ana");
        assert_eq!(
            parsed.contacts[0].custom_fields.get("notes"),
            Some(&Value::String("said \"hi\"".to_string()))
        );
    }

    #[test]
    fn test_descriptive_headers_match() {
        let csv = "Nome Completo,Telefone Celular,phone_number,Email Comercial\n\
                   Ana,11999990001,21999990002,ana@example.com\n";
        let parsed = parse_contacts(csv.as_bytes()).unwrap();
        assert_eq!(parsed.contacts.len(), 1);

        let ana = &parsed.contacts[0];
        assert_eq!(ana.name, "Ana");
        // First matching column wins
        assert_eq!(ana.phone, "5511999990001");
        assert_eq!(ana.email.as_deref(), Some("ana@example.com"));
        assert_eq!(
            ana.custom_fields.get("phone_number"),
            Some(&Value::String("21999990002".to_string()))
        );
    }

    #[test]
    fn test_missing_columns_rejected() {
        let err = parse_contacts(b"nome,cidade\nAna,Recife\n").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = parse_contacts(b"").unwrap_err();
        assert_eq!(err.to_string(), "The uploaded file is empty");
    }
}

//! Minimal HTML entity handling for HTML-authored templates.

/// Whether a template was written as encoded HTML, detected by the presence
/// of encoded angle brackets.
pub fn looks_html_encoded(template: &str) -> bool {
    let lower = template.to_ascii_lowercase();
    (lower.contains("&lt;") || lower.contains("&#60;"))
        && (lower.contains("&gt;") || lower.contains("&#62;"))
}

/// Decodes named (`&lt;`, `&amp;`, ...) and numeric (`&#60;`, `&#x3C;`)
/// entities. Unknown entities are left untouched.
pub fn decode_entities(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('&') {
        output.push_str(&rest[..start]);
        let candidate = &rest[start..];
        match candidate.find(';').filter(|end| *end <= 10) {
            Some(end) => match decode_entity(&candidate[1..end]) {
                Some(decoded) => {
                    output.push(decoded);
                    rest = &candidate[end + 1..];
                }
                None => {
                    output.push('&');
                    rest = &candidate[1..];
                }
            },
            None => {
                output.push('&');
                rest = &candidate[1..];
            }
        }
    }

    output.push_str(rest);
    output
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "lt" | "LT" => Some('<'),
        "gt" | "GT" => Some('>'),
        "amp" | "AMP" => Some('&'),
        "quot" | "QUOT" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let digits = name.strip_prefix('#')?;
            let code = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => digits.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Encodes the characters that are significant in HTML text and attributes.
pub fn encode(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '&' => output.push_str("&amp;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&#39;"),
            other => output.push(other),
        }
    }
    output
}

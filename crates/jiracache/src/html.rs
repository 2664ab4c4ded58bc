/// Flattens server-rendered issue markup into terminal text.
///
/// Block-level tags become line breaks, list items get a bullet, every other
/// tag is dropped. Only the common named entities and numeric references
/// are decoded.
pub fn to_plain_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut chars = html.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '<' => {
                let mut tag = String::new();
                for c in chars.by_ref() {
                    if c == '>' {
                        break;
                    }
                    tag.push(c);
                }
                apply_tag(&tag, &mut out);
            }
            '&' => {
                let mut entity = String::new();
                while let Some(&c) = chars.peek() {
                    if c == ';' || entity.len() > 8 || c.is_whitespace() || c == '&' {
                        break;
                    }
                    entity.push(c);
                    chars.next();
                }
                match (chars.peek() == Some(&';'), decode_entity(&entity)) {
                    (true, Some(decoded)) => {
                        chars.next();
                        out.push(decoded);
                    }
                    _ => {
                        out.push('&');
                        out.push_str(&entity);
                    }
                }
            }
            '\r' => {}
            '\n' => out.push(' '),
            _ => out.push(ch),
        }
    }

    collapse_blank_lines(&out)
}

fn apply_tag(tag: &str, out: &mut String) {
    let tag = tag.trim();
    let closing = tag.starts_with('/');
    let name: String = tag
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();

    match name.as_str() {
        "br" => out.push('\n'),
        "li" if !closing => out.push_str("\n• "),
        "p" | "div" | "tr" | "ul" | "ol" | "pre" | "blockquote" | "h1" | "h2" | "h3" | "h4"
        | "h5" | "h6" => out.push('\n'),
        _ => {}
    }
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" | "#39" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let num = entity.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

fn collapse_blank_lines(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut blank_run = 0;
    for line in text.lines().map(str::trim_end) {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 || lines.is_empty() {
                continue;
            }
        } else {
            blank_run = 0;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}
